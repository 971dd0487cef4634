mod config;
mod detector;
mod error;
mod imaging;
mod processing;
mod progress;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use config::AppConfig;
use detector::remote::RemoteDetector;
use detector::EmotionDetector;
use imaging::annotate::Annotator;
use processing::batch::BatchProcessor;
use processing::views::EmotionViews;
use progress::ProgressTicker;
use routes::configure_routes;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use storage::emotion_log::EmotionLogStore;
use storage::paths::StoragePaths;

fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(e)
    })?;

    let paths = StoragePaths::from_config(&config.storage);
    paths.ensure_dirs().map_err(|e| {
        log::error!(
            "Failed to create storage directories under {}: {}",
            config.storage.static_dir.display(),
            e
        );
        e
    })?;

    // blocking reqwest client: build before the actix runtime starts
    let detector = RemoteDetector::new(&config.detector).map_err(|e| {
        log::error!("Failed to set up emotion detector client: {}", e);
        std::io::Error::other(e)
    })?;
    log::info!("Using emotion detector at {}", detector.url());
    let detector: Arc<dyn EmotionDetector> = Arc::new(detector);

    let log_store = EmotionLogStore::new(config.storage.log_file());
    log::info!("Emotion log at {}", log_store.path().display());
    let processor = web::Data::new(BatchProcessor::new(
        paths.clone(),
        log_store.clone(),
        detector,
        Annotator::from_config(&config.annotation),
        config.batch_policy,
    ));
    let views = web::Data::new(EmotionViews::new(log_store));
    let ticker = web::Data::new(ProgressTicker::new(Duration::from_millis(
        config.progress.tick_ms,
    )));
    log::info!("Batch policy: {:?}", config.batch_policy);

    actix_web::rt::System::new().block_on(serve(
        config,
        processor,
        views,
        web::Data::new(paths),
        ticker,
    ))
}

async fn serve(
    config: AppConfig,
    processor: web::Data<BatchProcessor>,
    views: web::Data<EmotionViews>,
    paths: web::Data<StoragePaths>,
    ticker: web::Data<ProgressTicker>,
) -> std::io::Result<()> {
    let bind_address = config.bind_address();
    let static_dir = config.storage.static_dir.clone();
    let config = web::Data::new(config);

    let shutdown_ticker = ticker.clone();
    actix_web::rt::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_ticker.stop();
        }
    });

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(processor.clone())
            .app_data(views.clone())
            .app_data(paths.clone())
            .app_data(ticker.clone())
            .app_data(config.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
