use std::collections::HashMap;

use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rusqlite::params;

use crate::auth::{flash, Flash};
use crate::db::models::{Comment, Event, Post};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser, SessionToken};
use crate::state::AppState;

/// Renders an askama template as an HTML response; render failures become
/// opaque 500s with the detail logged.
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub user: Option<CurrentUser>,
    pub flash: Option<Flash>,
    pub posts: Vec<PostCard>,
    pub events: Vec<EventCard>,
}

/// A post with its comments and reaction tallies merged in, ready to
/// render.
pub struct PostCard {
    pub id: String,
    pub user_id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub comments: Vec<CommentCard>,
    pub like_count: i64,
    pub dislike_count: i64,
}

pub struct CommentCard {
    pub id: String,
    pub user_id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
}

pub struct EventCard {
    pub id: String,
    pub user_id: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub scheduled_at: String,
}

pub fn author_name(usernames: &HashMap<String, String>, user_id: &str) -> String {
    match usernames.get(user_id) {
        Some(name) => name.clone(),
        None => "unknown".to_string(),
    }
}

pub fn load_usernames(conn: &rusqlite::Connection) -> Result<HashMap<String, String>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT id, username FROM users")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

pub fn reaction_counts(
    conn: &rusqlite::Connection,
    sql: &str,
) -> Result<HashMap<String, i64>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// GET / — the home feed. Each collection is scanned independently
/// (bounded by the configured feed limit) and the result sets are merged
/// here, in the handler, into one view.
pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    let flash = match &token {
        Some(token) => flash::take_flash(&state.db, token)?,
        None => None,
    };

    let limit = state.config.feed.limit;
    let conn = state.conn()?;

    let usernames = load_usernames(&conn)?;

    let posts: Vec<Post> = {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, body, created_at, updated_at FROM posts \
             ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| Post::from_row(row))?;
        rows.collect::<Result<_, _>>()?
    };

    let comments: Vec<Comment> = {
        let mut stmt = conn.prepare(
            "SELECT id, post_id, user_id, body, created_at FROM comments \
             ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| Comment::from_row(row))?;
        rows.collect::<Result<_, _>>()?
    };

    // Events already in the past stay off the home page
    let events: Vec<Event> = {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, body, scheduled_at, created_at FROM events \
             WHERE scheduled_at >= datetime('now') \
             ORDER BY scheduled_at ASC, id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| Event::from_row(row))?;
        rows.collect::<Result<_, _>>()?
    };
    let events: Vec<EventCard> = events
        .into_iter()
        .map(|event| EventCard {
            author: author_name(&usernames, &event.user_id),
            id: event.id,
            user_id: event.user_id,
            title: event.title,
            body: event.body,
            scheduled_at: event.scheduled_at,
        })
        .collect();

    let like_counts =
        reaction_counts(&conn, "SELECT post_id, COUNT(*) FROM likes GROUP BY post_id")?;
    let dislike_counts =
        reaction_counts(&conn, "SELECT post_id, COUNT(*) FROM dislikes GROUP BY post_id")?;

    let mut cards: Vec<PostCard> = posts
        .into_iter()
        .map(|post| PostCard {
            author: author_name(&usernames, &post.user_id),
            like_count: like_counts.get(&post.id).copied().unwrap_or(0),
            dislike_count: dislike_counts.get(&post.id).copied().unwrap_or(0),
            id: post.id,
            user_id: post.user_id,
            body: post.body,
            created_at: post.created_at,
            comments: Vec::new(),
        })
        .collect();

    let index_of: HashMap<String, usize> = cards
        .iter()
        .enumerate()
        .map(|(i, card)| (card.id.clone(), i))
        .collect();
    for comment in comments {
        if let Some(&i) = index_of.get(&comment.post_id) {
            cards[i].comments.push(CommentCard {
                author: author_name(&usernames, &comment.user_id),
                id: comment.id,
                user_id: comment.user_id,
                body: comment.body,
                created_at: comment.created_at,
            });
        }
    }

    Ok(Html(HomeTemplate {
        user: maybe_user.0,
        flash,
        posts: cards,
        events,
    })
    .into_response())
}
