use crate::config::WebConfig;
use crate::forecast::forecast_handler;
use crate::views::view_handler;
use anyhow::Context;
use axum::Router;
use axum::routing::get;
use axum::routing::post;
use logweb_search_proxy::InMemorySessionStore;
use logweb_search_proxy::ProxyState;
use logweb_view::ViewSettings;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub proxy: ProxyState,
    pub view: Arc<ViewSettings>,
}

/// Full application router: view and forecast endpoints plus every façade
/// route.
pub fn app(proxy: ProxyState, view: ViewSettings) -> Router {
    let state = AppState {
        proxy: proxy.clone(),
        view: Arc::new(view),
    };
    Router::new()
        .route("/app/{app}/{view}", get(view_handler))
        .route("/forecast", post(forecast_handler))
        .with_state(state)
        .merge(logweb_search_proxy::router(proxy))
}

pub async fn run(config: WebConfig) -> anyhow::Result<()> {
    let WebConfig {
        server,
        proxy,
        session,
        view,
        ..
    } = config;
    let sessions = Arc::new(InMemorySessionStore::new());
    let state = ProxyState::new(proxy, session, sessions)
        .context("failed to initialise the search daemon client")?;
    info!(splunkd = %state.config.splunkd_uri, "search daemon configured");

    let listener = TcpListener::bind(server.listen)
        .await
        .with_context(|| format!("failed to bind {}", server.listen))?;
    let addr = listener.local_addr()?;
    info!("logweb listening on {addr}");

    axum::serve(listener, app(state, view))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("logweb stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
