use std::sync::Arc;

use anyhow::Context;

use tillpoint_api::app::{AppServices, build_app};
use tillpoint_api::config::AppConfig;
use tillpoint_infra::workers::AuditLogWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tillpoint_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if config.uses_default_secret() {
        tracing::warn!("TILLPOINT_JWT_SECRET not set; using insecure dev default");
    }

    let services = Arc::new(AppServices::build(&config).context("startup failed")?);
    let audit = AuditLogWorker::spawn(&services.bus).context("could not start audit log worker")?;

    let app = build_app(services);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, tenant_id = %config.tenant_id, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;

    let logged = audit.shutdown();
    tracing::info!(events = logged, "shut down");
    Ok(())
}
