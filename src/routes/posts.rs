use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::{flash, Flash};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, SessionToken};
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/edit_post.html")]
struct EditPostTemplate {
    user: Option<CurrentUser>,
    flash: Option<Flash>,
    post_id: String,
    body: String,
}

#[derive(Deserialize)]
pub struct PostForm {
    pub body: String,
}

fn load_post(state: &AppState, id: &str) -> AppResult<Option<(String, String)>> {
    let conn = state.conn()?;
    Ok(conn
        .query_row(
            "SELECT user_id, body FROM posts WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

/// POST /post — create a post
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let body = form.body.trim();
    if body.is_empty() {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("A post needs some text"),
            "/",
        );
    }

    let id = uuid::Uuid::now_v7().to_string();
    {
        let conn = state.conn()?;
        conn.execute(
            "INSERT INTO posts (id, user_id, body) VALUES (?1, ?2, ?3)",
            params![id, user.id, body],
        )?;
    }

    flash::redirect_with(&state, token.as_deref(), Flash::success("Post created"), "/")
}

/// GET /post/{id}/edit — edit form, author or admin only
async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some((owner_id, body)) = load_post(&state, &id)? else {
        return Err(AppError::NotFound);
    };
    if !user.can_modify(&owner_id) {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("You can only edit your own posts"),
            "/",
        );
    }

    let flash = match &token {
        Some(token) => flash::take_flash(&state.db, token)?,
        None => None,
    };

    Ok(Html(EditPostTemplate {
        user: Some(user),
        flash,
        post_id: id,
        body,
    })
    .into_response())
}

/// POST /post/{id}/edit — apply the edit
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let Some((owner_id, _)) = load_post(&state, &id)? else {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("That post no longer exists"),
            "/",
        );
    };
    if !user.can_modify(&owner_id) {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("You can only edit your own posts"),
            "/",
        );
    }

    let body = form.body.trim();
    if body.is_empty() {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("A post needs some text"),
            &format!("/post/{}/edit", id),
        );
    }

    {
        let conn = state.conn()?;
        conn.execute(
            "UPDATE posts SET body = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![body, id],
        )?;
    }

    flash::redirect_with(
        &state,
        token.as_deref(),
        Flash::success("Post updated"),
        &format!("/view/{}", id),
    )
}

/// POST /post/{id}/delete — author or admin only
async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some((owner_id, _)) = load_post(&state, &id)? else {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("That post no longer exists"),
            "/",
        );
    };
    if !user.can_modify(&owner_id) {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("You can only delete your own posts"),
            "/",
        );
    }

    {
        let conn = state.conn()?;
        conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    }

    flash::redirect_with(&state, token.as_deref(), Flash::success("Post deleted"), "/")
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post", post(create))
        .route("/post/{id}/edit", get(edit_page).post(update))
        .route("/post/{id}/delete", post(delete))
}
