use chat_service::auth::JwtAuthProvider;
use chat_service::storage::postgres::PgStore;
use chat_service::{config, db, error, logging, routes, state::AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let pool = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Embedded migrations are idempotent; a schema mismatch is fatal.
    db::MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| error::AppError::StartServer(format!("migrations: {e}")))?;

    let store = Arc::new(PgStore::new(pool));
    let auth = Arc::new(JwtAuthProvider::new(&cfg.jwt_secret));
    let state = AppState::new(store, auth, cfg.clone());

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    axum::serve(listener, routes::build_router(state))
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
