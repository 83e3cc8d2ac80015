mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use resolve_api::{AppState, AppStateInner};
use resolve_db::{Database, migrations};
use resolve_engine::files::DiskStore;
use resolve_engine::sweeper::run_escalation_loop;
use resolve_engine::{Engine, LogOutbound, SystemClock};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "resolveit=debug,resolve_engine=debug,notification=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    if let Some(email) = config.bootstrap_admin_email.clone() {
        let promoted =
            db.with_conn(|conn| migrations::promote_admin(conn, &email, chrono::Utc::now()))?;
        if promoted {
            info!("Promoted {} to ADMIN", email);
        }
    }

    let files = Arc::new(DiskStore::new(config.upload_dir.clone())?);
    let engine = Engine::new(db.clone(), files, Arc::new(LogOutbound), Arc::new(SystemClock));
    let escalator = Arc::new(engine.escalator(config.escalation_policy()));

    // Background escalation sweep
    tokio::spawn(run_escalation_loop(escalator.clone(), config.sweep_interval));
    info!(
        "Escalation sweep every {}s, SLA {}h",
        config.sweep_interval.as_secs(),
        config.sla_hours
    );

    let state: AppState = Arc::new(AppStateInner {
        db,
        engine,
        escalator,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = resolve_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("ResolveIT listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
