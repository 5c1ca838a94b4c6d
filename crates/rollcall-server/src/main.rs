mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use rollcall_api::auth::{AppState, AppStateInner, ensure_admin};
use rollcall_db::Database;
use rollcall_registry::notify::{LogNotifier, QueueNotifier, run_mail_worker};
use rollcall_registry::reminders::run_reminder_loop;
use rollcall_registry::{PostCommitHooks, RegistrationEngine};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        ensure_admin(&db, username, password)?;
    }

    // Notifications leave the request path through the mail queue
    let (queue, mail_rx) = QueueNotifier::channel();
    tokio::spawn(run_mail_worker(mail_rx, Arc::new(LogNotifier)));
    let hooks = PostCommitHooks::new().with(queue);

    // Background reminder task
    tokio::spawn(run_reminder_loop(db.clone(), hooks.clone(), config.reminder_interval_secs));

    // Shared state
    let engine = RegistrationEngine::new(db.clone(), hooks);
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        engine,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = rollcall_api::router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Rollcall server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
