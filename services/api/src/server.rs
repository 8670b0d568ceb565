use crate::cli::ServeArgs;
use crate::infra::{load_estimator, seed_store, AppState, ConfiguredStore};
use crate::routes::with_report_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use zhiyuan::admissions::ReportService;
use zhiyuan::config::AppConfig;
use zhiyuan::error::AppError;
use zhiyuan::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(csv) = args.admissions_csv.take() {
        config.data.admissions_csv = Some(csv);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let estimator = Arc::new(load_estimator(&config.data));
    let store = Arc::new(ConfiguredStore::open(&config.data)?);
    if let Some(csv) = &config.data.admissions_csv {
        seed_store(store.as_ref(), csv)?;
    }

    let report_service = Arc::new(ReportService::new(
        estimator,
        store,
        config.report.clone(),
    ));

    let app = with_report_routes(report_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, store = ?config.data.store, "admission advisory service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
