//! Bid Policy Service — standalone binary for storing and serving bidding
//! rule trees.
//!
//! Default: http://127.0.0.1:9110/

use bid_policy_service::cache::MemoryCache;
use bid_policy_service::config::{Config, MODE_DEVELOPMENT};
use bid_policy_service::db::Db;
use bid_policy_service::routes::{self, AppState};
use bid_policy_service::service::PolicyService;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    if std::env::var("MODE").as_deref() == Ok(MODE_DEVELOPMENT) {
        dotenv::from_filename(".env.Dev").ok();
    }
    env_logger::init();

    let config = Config::from_env().expect("Invalid configuration");
    log::info!("Starting in {} mode", config.mode);

    log::info!("Opening database at: {}", config.db_path);
    let database = Arc::new(
        Db::open(&config.db_path, config.db_pool_size).expect("Failed to open database"),
    );
    let cache = Arc::new(MemoryCache::new(config.cache_capacity));

    let state = Arc::new(AppState {
        service: PolicyService::new(database, cache, config.op_timeout),
        start_time: Instant::now(),
    });

    let cors = tower_http::cors::CorsLayer::permissive();
    let app = routes::router(state).layer(cors);

    let addr = config.bind_addr();
    log::info!("Bid Policy Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
