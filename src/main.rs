use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tokio::signal;

use rewards_engine::config::Config;
use rewards_engine::db::{create_pool, run_migrations};
use rewards_engine::repo::{PgRepo, Repo};
use rewards_engine::service::{scheduler, EngineSettings, RewardEngine};
use rewards_engine::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize telemetry
    init_telemetry(&config.server.rust_log);

    // Create database pool
    let db_pool = create_pool(&config).await?;
    tracing::info!("Connected to database");

    if config.database.run_migrations {
        run_migrations(&db_pool).await?;
        tracing::info!("Database migrations applied");
    }

    let repo: Arc<dyn Repo> = Arc::new(PgRepo::new(db_pool.clone()));
    let engine = RewardEngine::new(
        repo,
        EngineSettings {
            rule_timeout: config.engine.rule_timeout(),
            write_policy: config.engine.write_policy,
        },
    );

    if !config.backfill.is_empty() {
        let reports = scheduler::backfill(&engine, &config.backfill).await;
        let failed = reports.iter().filter(|r| !r.all_succeeded()).count();
        tracing::info!(periods = reports.len(), failed = failed, "Processing completed");
        db_pool.close().await;
        return Ok(());
    }

    tracing::info!(
        day = config.schedule.day,
        hour = config.schedule.hour,
        minute = config.schedule.minute,
        "Starting monthly reward scheduler"
    );
    let scheduler_handle = tokio::spawn(scheduler::run_monthly(engine, config.schedule.clone()));

    tracing::info!(
        "Starting health endpoint on {}:{}",
        config.server.host,
        config.server.port
    );

    let pool = db_pool.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .wrap(actix_web::middleware::Logger::default())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(rewards_engine::http::health::health_check)),
            )
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, stopping...");
        server_handle.stop(true).await;
    });

    server.await?;
    scheduler_handle.abort();
    db_pool.close().await;
    tracing::info!("Database connection closed");
    Ok(())
}
