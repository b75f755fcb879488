mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use moments_api::{AppStateInner, auth, router};
use moments_db::Database;
use moments_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moments=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Database::open(&config.db_path)?;

    for (user_id, hash) in &config.password_hashes {
        auth::provision_account(&db, *user_id, hash)?;
    }
    if config.password_hashes.len() < 2 {
        warn!("Not every participant has a password hash configured; they will be unable to sign in");
    }

    let state = Arc::new(AppStateInner {
        db: Arc::new(db),
        jwt_secret: config.jwt_secret,
        dispatcher: Dispatcher::new(),
    });

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Moments server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
