use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::Router;
use rusqlite::params;

use crate::auth::{flash, Flash};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, SessionToken};
use crate::state::AppState;

/// Send the browser back to the page the reaction came from (home or a
/// post view), falling back to home.
fn redirect_back(headers: &HeaderMap) -> Response {
    let target = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("/");
    Redirect::to(target).into_response()
}

/// Append one reaction row. Duplicates are allowed, and a like does not
/// displace a dislike (or vice versa).
fn add_reaction(
    state: &AppState,
    table: &str,
    post_id: &str,
    user_id: &str,
) -> AppResult<bool> {
    let conn = state.conn()?;
    let post_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    if !post_exists {
        return Ok(false);
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        &format!("INSERT INTO {} (id, post_id, user_id) VALUES (?1, ?2, ?3)", table),
        params![id, post_id, user_id],
    )?;
    Ok(true)
}

/// Remove all of a user's reaction rows of one kind on one post.
fn remove_reaction(
    state: &AppState,
    table: &str,
    post_id: &str,
    user_id: &str,
) -> AppResult<()> {
    let conn = state.conn()?;
    conn.execute(
        &format!("DELETE FROM {} WHERE post_id = ?1 AND user_id = ?2", table),
        params![post_id, user_id],
    )?;
    Ok(())
}

async fn like(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    if !add_reaction(&state, "likes", &post_id, &user.id)? {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("That post no longer exists"),
            "/",
        );
    }
    Ok(redirect_back(&headers))
}

async fn unlike(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    remove_reaction(&state, "likes", &post_id, &user.id)?;
    Ok(redirect_back(&headers))
}

async fn dislike(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    if !add_reaction(&state, "dislikes", &post_id, &user.id)? {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("That post no longer exists"),
            "/",
        );
    }
    Ok(redirect_back(&headers))
}

async fn undislike(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    remove_reaction(&state, "dislikes", &post_id, &user.id)?;
    Ok(redirect_back(&headers))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/like/{post_id}", post(like))
        .route("/like/{post_id}/remove", post(unlike))
        .route("/dislike/{post_id}", post(dislike))
        .route("/dislike/{post_id}/remove", post(undislike))
}
