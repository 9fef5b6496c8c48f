use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::post;
use axum::{Form, Router};
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::{flash, Flash};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, SessionToken};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CommentForm {
    pub body: String,
}

/// POST /comment/{post_id} — comment on a post
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let post_exists: bool = {
        let conn = state.conn()?;
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
            params![post_id],
            |row| row.get(0),
        )?
    };
    if !post_exists {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("That post no longer exists"),
            "/",
        );
    }

    let body = form.body.trim();
    if body.is_empty() {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("A comment needs some text"),
            &format!("/view/{}", post_id),
        );
    }

    let id = uuid::Uuid::now_v7().to_string();
    {
        let conn = state.conn()?;
        conn.execute(
            "INSERT INTO comments (id, post_id, user_id, body) VALUES (?1, ?2, ?3, ?4)",
            params![id, post_id, user.id, body],
        )?;
    }

    flash::redirect_with(
        &state,
        token.as_deref(),
        Flash::success("Comment added"),
        &format!("/view/{}", post_id),
    )
}

/// POST /comment/{id}/delete — author or admin only
async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let found: Option<(String, String)> = {
        let conn = state.conn()?;
        conn.query_row(
            "SELECT post_id, user_id FROM comments WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
    };
    let Some((post_id, owner_id)) = found else {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("That comment no longer exists"),
            "/",
        );
    };
    if !user.can_modify(&owner_id) {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("You can only delete your own comments"),
            &format!("/view/{}", post_id),
        );
    }

    {
        let conn = state.conn()?;
        conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    }

    flash::redirect_with(
        &state,
        token.as_deref(),
        Flash::success("Comment deleted"),
        &format!("/view/{}", post_id),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comment/{post_id}", post(create))
        .route("/comment/{id}/delete", post(delete))
}
