use anyhow::Context;
use clap::Parser;
use damage_reporter::adapters::camera::default_camera;
use damage_reporter::adapters::predictor::UnavailablePredictor;
use damage_reporter::domain::ports::Predictor;
use damage_reporter::utils::{logger, validation::Validate};
use damage_reporter::{
    build_router, AppConfig, AppState, DetectionBridge, HttpPredictor, LocalDetection,
    LocalStorage, LocationStore, ReportService, ServeArgs, SqliteReportRepository,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServeArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting damage-reporter");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    // 載入並驗證配置
    let mut config = match AppConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    args.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if args.check {
        println!("✅ Configuration '{}' is valid", args.config);
        return Ok(());
    }

    let upload_dir = config.ensure_upload_dir()?;
    tracing::info!("📁 Upload directory: {}", upload_dir.display());

    let repository = SqliteReportRepository::connect(&config.database.url)
        .await
        .context("failed to open the report database")?;

    let predictor: Arc<dyn Predictor> = if config.detector.endpoint.is_some() {
        Arc::new(HttpPredictor::from_settings(&config.detector)?)
    } else {
        tracing::warn!("⚠️ detector.endpoint not configured, detection is disabled");
        Arc::new(UnavailablePredictor)
    };

    let storage = LocalStorage::new(&upload_dir);
    let reports = ReportService::new(Arc::new(repository), storage);
    let bridge = DetectionBridge::new(predictor, reports.clone(), config.detector.threshold);
    let location = LocationStore::new(&config.location.store_path);

    let local_detection = Arc::new(LocalDetection::new(
        bridge.clone(),
        Arc::from(default_camera()),
        location.clone(),
        config.detector.webcam,
        config.monitoring_enabled(),
    ));

    let bind_address = config.bind_address();
    let state = AppState {
        config: Arc::new(config),
        reports,
        bridge,
        local_detection: Arc::clone(&local_detection),
        location,
        upload_dir,
    };

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    tracing::info!("🚀 Listening on http://{}", bind_address);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    local_detection.stop().await;
    tracing::info!("✅ Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}
