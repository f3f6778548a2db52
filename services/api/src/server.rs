use crate::cli::ServeArgs;
use crate::infra::{seeded_store, AppState};
use crate::routes::with_rating_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use talent_ratings::config::AppConfig;
use talent_ratings::error::AppError;
use talent_ratings::ratings::{InMemoryAuditLog, InMemoryRatingStore, RatingService};
use talent_ratings::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = if args.empty {
        Arc::new(InMemoryRatingStore::default())
    } else {
        let import = args.seed.load()?;
        seeded_store(&args.seed, import)?
    };
    let audit = Arc::new(InMemoryAuditLog::default());
    let rating_service = Arc::new(RatingService::new(store, audit, config.engine.clone()));

    let app = with_rating_routes(rating_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "talent rating service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
