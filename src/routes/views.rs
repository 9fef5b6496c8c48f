use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rusqlite::{params, OptionalExtension};

use crate::auth::{flash, Flash};
use crate::db::models::{Comment, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser, SessionToken};
use crate::routes::home::{author_name, load_usernames, CommentCard, Html, PostCard};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/post.html")]
struct PostTemplate {
    user: Option<CurrentUser>,
    flash: Option<Flash>,
    post: PostCard,
}

/// GET /view/{id} — a single post with all of its comments
async fn show(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let flash = match &token {
        Some(token) => flash::take_flash(&state.db, token)?,
        None => None,
    };

    let conn = state.conn()?;

    let found: Option<Post> = conn
        .query_row(
            "SELECT id, user_id, body, created_at, updated_at FROM posts WHERE id = ?1",
            params![id],
            |row| Post::from_row(row),
        )
        .optional()?;
    let Some(post) = found else {
        return Err(AppError::NotFound);
    };

    let usernames = load_usernames(&conn)?;

    let comments: Vec<Comment> = {
        let mut stmt = conn.prepare(
            "SELECT id, post_id, user_id, body, created_at FROM comments \
             WHERE post_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![id], |row| Comment::from_row(row))?;
        rows.collect::<Result<_, _>>()?
    };
    let comments: Vec<CommentCard> = comments
        .into_iter()
        .map(|comment| CommentCard {
            author: author_name(&usernames, &comment.user_id),
            id: comment.id,
            user_id: comment.user_id,
            body: comment.body,
            created_at: comment.created_at,
        })
        .collect();

    let like_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let dislike_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM dislikes WHERE post_id = ?1",
        params![id],
        |row| row.get(0),
    )?;

    let post = PostCard {
        author: author_name(&usernames, &post.user_id),
        id: post.id,
        user_id: post.user_id,
        body: post.body,
        created_at: post.created_at,
        comments,
        like_count,
        dislike_count,
    };

    Ok(Html(PostTemplate {
        user: maybe_user.0,
        flash,
        post,
    })
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/view/{id}", get(show))
}
