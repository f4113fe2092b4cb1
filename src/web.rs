use std::net::SocketAddr;

use axum::Router;
use miette::IntoDiagnostic;
use tower_http::trace::TraceLayer;

use crate::authz::web::{router as authz_router, AppState};
use crate::authz::Authz;
use crate::settings::Settings;

pub fn app(settings: &Settings, authz: Authz) -> Router {
    let state = AppState {
        authz,
        request_timeout: settings.graph.request_timeout(),
    };
    authz_router(state).layer(TraceLayer::new_for_http())
}

pub async fn serve(settings: Settings, authz: Authz) -> miette::Result<()> {
    let addr: SocketAddr = settings
        .bind_addr()
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;
    let router = app(&settings, authz);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    tracing::info!(%addr, "Authorization API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
