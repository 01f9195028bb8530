use crate::server::AppState;
use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Response;
use html_escape::encode_text;
use logweb_search_proxy::ProxyError;
use logweb_search_proxy::upstream::UpstreamRequest;
use logweb_view::AppContext;
use logweb_view::ViewError;
use logweb_view::compile;
use serde_json::Value;
use thiserror::Error;

/// Content key holding the view's XML source.
const SOURCE_KEY: &str = "eai:data";
/// Content key naming the template the app registered for the view.
const TEMPLATE_KEY: &str = "template";

#[derive(Error, Debug)]
pub enum PageError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    View(#[from] ViewError),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Proxy(err) => err.into_response(),
            PageError::View(err @ ViewError::InvalidView { .. }) => {
                (StatusCode::BAD_REQUEST, Html(error_page(&err))).into_response()
            }
            PageError::View(err) => {
                tracing::error!("failed to render view: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(error_page(&err))).into_response()
            }
        }
    }
}

fn error_page(err: &ViewError) -> String {
    let line = err
        .line()
        .map(|line| format!("<p class=\"line\">line {line}</p>"))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html><head><title>Invalid view</title></head><body>\
         <h1>Invalid view</h1><p class=\"message\">{}</p>{line}</body></html>",
        encode_text(&err.to_string())
    )
}

pub fn view_path(app: &str, view: &str) -> String {
    format!(
        "servicesNS/-/{}/data/ui/views/{}",
        urlencoding::encode(app),
        urlencoding::encode(view)
    )
}

/// `GET /app/{app}/{view}`: compiles the stored view. Views on the escaped
/// HTML path come back as a page, everything else as the compiled model.
pub async fn view_handler(
    State(state): State<AppState>,
    Path((app, view)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let session = state.proxy.snapshot(&headers).await;
    let result = state
        .proxy
        .client
        .envelope(UpstreamRequest::get(view_path(&app, &view)).session_key(session.session_key))
        .await;
    let envelope = match result {
        Ok(envelope) => envelope,
        Err(ProxyError::Upstream { status, .. }) if status == StatusCode::NOT_FOUND => {
            return Err(ProxyError::not_found(format!("view {app}/{view} not found")).into());
        }
        Err(err) => return Err(err.into()),
    };
    let entry = envelope
        .first()
        .ok_or_else(|| ProxyError::not_found(format!("view {app}/{view} not found")))?;
    let source = entry
        .content
        .get(SOURCE_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| ProxyError::internal(format!("view {app}/{view} has no source")))?;
    let template = entry
        .content
        .get(TEMPLATE_KEY)
        .and_then(Value::as_str)
        .unwrap_or(state.view.dashboard_template.as_str());

    let context = AppContext::new(app.as_str(), view.as_str(), template);
    let mut compiled = compile(source, &context, &state.view)?;
    match compiled.html.take() {
        Some(html) => Ok(Html(html).into_response()),
        None => Ok(Json(compiled).into_response()),
    }
}
