use crate::cli::ServeArgs;
use crate::infra::{
    settings_from_config, AppState, InMemoryApplicationRepository, InMemoryLeagueRegistry,
    LoggingNotifier, SequentialInvoiceIssuer, StubCheckoutGateway,
};
use crate::routes::with_membership_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use league_ops::config::AppConfig;
use league_ops::error::AppError;
use league_ops::telemetry;
use league_ops::workflows::membership::MembershipService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    let service = Arc::new(MembershipService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        Arc::new(InMemoryLeagueRegistry::default()),
        Arc::new(StubCheckoutGateway::default()),
        Arc::new(SequentialInvoiceIssuer::default()),
        Arc::new(LoggingNotifier),
        settings_from_config(&config),
    ));

    let app = with_membership_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "membership orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
