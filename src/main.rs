use std::sync::Arc;

use mediashare::{
    router, AppConfig, AppState, InMemoryUserRepository, PostgresUserRepository, UserRepository,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediashare=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting mediashare server");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let user_repository: Arc<dyn UserRepository + Send + Sync> =
        match config.server.database_url.as_deref() {
            Some(url) => match PostgresUserRepository::connect(url).await {
                Ok(repo) => Arc::new(repo),
                Err(e) => {
                    error!(error = %e, "Failed to open user store");
                    std::process::exit(1);
                }
            },
            None => {
                warn!("DATABASE_URL not set, users are kept in memory and lost on restart");
                Arc::new(InMemoryUserRepository::new())
            }
        };

    let app_state = AppState::new(user_repository, Arc::new(config.auth));
    let app = router(app_state, &config.server);

    let listener = match tokio::net::TcpListener::bind(&config.server.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.server.bind_addr, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!("Server running on http://{}", config.server.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
