use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;

/// Everything a handler needs, built once at startup and cloned per
/// request. Nothing in the crate reaches for globals.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        Self { db, config }
    }

    /// Borrow a pooled connection for the duration of a handler's queries.
    pub fn conn(&self) -> AppResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.db.get()?)
    }
}
