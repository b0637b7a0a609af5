use std::sync::Arc;

use tower_http::cors::CorsLayer;

use battle_backend::{api, config::Config, db, metrics, scheduler::BattleScheduler, sweep};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let db = db::Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    // Battle completion must never depend on a client tab staying open.
    let scheduler = Arc::new(BattleScheduler::new(db.clone()));
    sweep::spawn_expiry_sweep(scheduler, config.sweep_interval_secs);

    let app = api::router(db).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to port {}: {e}", config.port));

    tracing::info!("Battle backend listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
