use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use forum::auth::session;
use forum::config::{Cli, Config};
use forum::state::AppState;
use forum::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    let config = Config::load(&cli)?;
    tracing::info!("Using data directory {}", data_dir.display());

    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    // Sessions left over from earlier runs may have expired since
    session::purge_expired(&pool)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = routes::app(AppState::new(pool, config));

    tracing::info!("Forum listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
