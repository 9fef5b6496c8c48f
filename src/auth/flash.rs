use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::auth::session;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::state::AppState;

/// A transient notification attached to a session, rendered exactly once
/// on the next page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Store a flash on a live session, replacing any unread one.
pub fn set_flash(pool: &DbPool, token: &str, flash: &Flash) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE sessions SET flash = ?1 WHERE token = ?2 AND expires_at > datetime('now')",
        params![serde_json::to_string(flash)?, token],
    )?;
    Ok(())
}

/// Read and clear the session's flash. A message is returned at most once.
pub fn take_flash(pool: &DbPool, token: &str) -> AppResult<Option<Flash>> {
    let conn = pool.get()?;
    let raw: Option<String> = conn
        .query_row(
            "SELECT flash FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    let Some(raw) = raw else {
        return Ok(None);
    };

    conn.execute(
        "UPDATE sessions SET flash = NULL WHERE token = ?1",
        params![token],
    )?;

    Ok(Some(serde_json::from_str(&raw)?))
}

/// Flash-then-redirect, the standard response to an expected failure or a
/// completed form action. Creates an anonymous session (and sets its
/// cookie) when the visitor does not have one yet.
pub fn redirect_with(
    state: &AppState,
    token: Option<&str>,
    flash: Flash,
    location: &str,
) -> AppResult<Response> {
    let (token, created) =
        session::ensure_session(&state.db, token, state.config.auth.session_hours)?;
    set_flash(&state.db, &token, &flash)?;

    let redirect = Redirect::to(location);
    if created {
        let cookie = session::session_cookie(
            &state.config.auth.cookie_name,
            &token,
            state.config.auth.session_hours,
        );
        Ok(([(header::SET_COOKIE, cookie)], redirect).into_response())
    } else {
        Ok(redirect.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;

    fn test_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        db::run_migrations(&pool).unwrap();
        pool
    }

    #[test]
    fn flash_is_returned_exactly_once() {
        let pool = test_pool();
        let token = session::create_session(&pool, None, 1).unwrap();

        set_flash(&pool, &token, &Flash::success("Welcome back")).unwrap();

        let first = take_flash(&pool, &token).unwrap();
        assert_eq!(first, Some(Flash::success("Welcome back")));

        let second = take_flash(&pool, &token).unwrap();
        assert_eq!(second, None);
    }

    #[test]
    fn newer_flash_replaces_unread_one() {
        let pool = test_pool();
        let token = session::create_session(&pool, None, 1).unwrap();

        set_flash(&pool, &token, &Flash::error("first")).unwrap();
        set_flash(&pool, &token, &Flash::error("second")).unwrap();

        let flash = take_flash(&pool, &token).unwrap().unwrap();
        assert_eq!(flash.message, "second");
    }

    #[test]
    fn flash_on_unknown_token_is_none() {
        let pool = test_pool();
        assert_eq!(take_flash(&pool, "nope").unwrap(), None);
    }

    #[test]
    fn set_flash_on_expired_session_is_dropped() {
        let pool = test_pool();
        let token = session::create_session(&pool, None, 1).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 hour') WHERE token = ?1",
                params![token],
            )
            .unwrap();

        set_flash(&pool, &token, &Flash::success("late")).unwrap();
        assert_eq!(take_flash(&pool, &token).unwrap(), None);
    }

    #[test]
    fn kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&Flash::error("boom")).unwrap();
        assert!(json.contains("\"error\""));
    }
}
