use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use course_server::{
    api::{AppState, router},
    config::Config,
    db,
    stats::SqlStats,
    utils::init_log,
};
use time::Duration;
use tokio::net::TcpListener;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short = 'H', long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    /// Write daily-rotated logs here instead of stdout
    #[arg(short, long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let _guard = init_log(args.log_dir.or(config.log_dir.clone()));

    let database = db::connect(&config.database_url).await?;
    let store = SqliteStore::new(database.clone());
    store.migrate().await?;
    let sessions = SessionManagerLayer::new(store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::days(config.session_ttl_days)));

    let state = AppState::new(database.clone(), Arc::new(SqlStats::new(database)));
    let app = router(state).layer(sessions);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("listening on http://{}", listener.local_addr()?);
    info!(
        "Swagger UI available at http://{}/swagger-ui/",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}
