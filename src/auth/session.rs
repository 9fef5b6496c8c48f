use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::DbPool;
use crate::error::AppResult;

/// Create a new session, optionally bound to a user. Returns the session
/// token.
pub fn create_session(pool: &DbPool, user_id: Option<&str>, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Return the visitor's token if it still names a live session; otherwise
/// create a fresh anonymous session. The bool is true when a new session
/// (and therefore a new cookie) is needed.
pub fn ensure_session(pool: &DbPool, token: Option<&str>, hours: u64) -> AppResult<(String, bool)> {
    if let Some(token) = token {
        let conn = pool.get()?;
        let live: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        )?;
        if live {
            return Ok((token.to_string(), false));
        }
    }
    Ok((create_session(pool, None, hours)?, true))
}

/// Detach the user from a session (logout). The session row survives so
/// flash messages still work for the now-anonymous visitor.
pub fn detach_user(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE sessions SET user_id = NULL WHERE token = ?1",
        params![token],
    )?;
    Ok(())
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop sessions past their expiry. Called once at startup.
pub fn purge_expired(pool: &DbPool) -> AppResult<usize> {
    let conn = pool.get()?;
    let purged = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }
    Ok(purged)
}

/// Resolve the user a live session is bound to, if any.
pub fn session_user(pool: &DbPool, token: &str) -> AppResult<Option<(String, String, bool)>> {
    let conn = pool.get()?;
    let row = conn
        .query_row(
            "SELECT u.id, u.username, u.is_admin FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    Ok(row)
}

/// Set-Cookie value carrying the session token.
pub fn session_cookie(name: &str, token: &str, hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name,
        token,
        hours * 3600
    )
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
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

    fn seed_user(pool: &DbPool, id: &str, username: &str) {
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, 'hash')",
                params![id, username],
            )
            .unwrap();
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn session_user_resolves_bound_user() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice");

        let token = create_session(&pool, Some("u1"), 1).unwrap();
        let (id, username, is_admin) = session_user(&pool, &token).unwrap().unwrap();
        assert_eq!(id, "u1");
        assert_eq!(username, "alice");
        assert!(!is_admin);
    }

    #[test]
    fn anonymous_session_has_no_user() {
        let pool = test_pool();
        let token = create_session(&pool, None, 1).unwrap();
        assert!(session_user(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_not_resolved() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice");

        let token = create_session(&pool, Some("u1"), 1).unwrap();
        pool.get()
            .unwrap()
            .execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 hour') WHERE token = ?1",
                params![token],
            )
            .unwrap();
        assert!(session_user(&pool, &token).unwrap().is_none());

        assert_eq!(purge_expired(&pool).unwrap(), 1);
    }

    #[test]
    fn detach_user_keeps_session_alive() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice");

        let token = create_session(&pool, Some("u1"), 1).unwrap();
        detach_user(&pool, &token).unwrap();

        assert!(session_user(&pool, &token).unwrap().is_none());
        let (same, created) = ensure_session(&pool, Some(&token), 1).unwrap();
        assert_eq!(same, token);
        assert!(!created);
    }

    #[test]
    fn ensure_session_creates_when_missing() {
        let pool = test_pool();
        let (token, created) = ensure_session(&pool, None, 1).unwrap();
        assert!(created);
        let (same, created_again) = ensure_session(&pool, Some(&token), 1).unwrap();
        assert_eq!(same, token);
        assert!(!created_again);
    }

    #[test]
    fn delete_session_removes_row() {
        let pool = test_pool();
        let token = create_session(&pool, None, 1).unwrap();
        delete_session(&pool, &token).unwrap();
        let (_, created) = ensure_session(&pool, Some(&token), 1).unwrap();
        assert!(created);
    }
}
