//! Rap-C API server binary.
//!
//! Serves the JSON API and the session-backed pages. PostgreSQL is used
//! unless `--in-memory` is given.

use std::sync::Arc;

use clap::Parser;
use rapc_api::AppState;
use rapc_api::config::ApiConfig;
use rapc_api::services::notifier::LogNotifier;
use rapc_core::auth::bootstrap::seed_users;
use rapc_core::session::SessionStore;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info, warn};

/// How often expired sessions are swept out of storage.
const SESSION_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15 * 60);

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "rapc_server", about = "Rap-C API server")]
struct Args {
    /// Port to listen on. Overrides the port of `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep users and sessions in process memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rapc_api=debug,rapc_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }

    info!(
        version = rapc_core::version(),
        bind_addr = %config.bind_addr,
        in_memory = args.in_memory,
        "starting rapc_server"
    );

    let notifier = Arc::new(LogNotifier);
    let state = if args.in_memory {
        warn!("in-memory storage: users and sessions are lost on exit");
        AppState::in_memory(config.clone(), notifier)
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        rapc_api::migrate(&pool).await?;

        AppState::postgres(pool, config.clone(), notifier)
    };

    let report = seed_users(&state.auth, &config.seed_settings()).await?;
    info!(
        first_user_created = report.first_user_created,
        guest_created = report.guest_created,
        "user seeding finished"
    );

    let purged = state.sessions.purge_expired().await?;
    info!(purged, "removed expired sessions");
    tokio::spawn(sweep_sessions(state.sessions.clone()));

    let app = rapc_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
        })
        .await?;

    Ok(())
}

/// Periodically delete expired sessions. Failures are logged and retried on
/// the next tick.
async fn sweep_sessions(sessions: SessionStore) {
    let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    // The first tick completes immediately; startup already swept.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match sessions.purge_expired().await {
            Ok(removed) => debug!(removed, "session sweep finished"),
            Err(e) => warn!(error = %e, "session sweep failed"),
        }
    }
}
