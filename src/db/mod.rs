pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

pub type DbPool = Pool<SqliteConnectionManager>;

const POOL_SIZE: u32 = 8;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL persists in the database file; foreign_keys and busy_timeout are
    // per-connection state and must run on every connection the pool opens.
    // The delete cascades depend on foreign_keys being on everywhere.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });

    Ok(Pool::builder().max_size(POOL_SIZE).build(manager)?)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let seen: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM schema_version WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        if seen {
            continue;
        }

        tracing::info!("Applying migration {}", name);
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_version (name) VALUES (?1)",
            params![name],
        )?;
    }

    Ok(())
}
