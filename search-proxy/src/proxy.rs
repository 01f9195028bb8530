//! Generic pass-through to whitelisted back-end endpoints.

use crate::csrf::FORM_KEY_FIELD;
use crate::error::ProxyError;
use crate::error::Result;
use crate::params::Params;
use crate::state::ProxyState;
use crate::upstream::RequestBody;
use crate::upstream::UpstreamRequest;
use crate::whitelist;
use crate::whitelist::Lookup;
use axum::body::Body;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use bytes::Bytes;

/// Prefix that asks for the upstream reply verbatim, errors included.
pub const RAW_PREFIX: &str = "__raw/";

/// Browser cache busters and the explicit session key never go upstream.
const STRIPPED_QUERY_ARGS: &[&str] = &["_", "oid"];

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub struct ProxyRequest {
    pub method: Method,
    /// Path after `/splunkd/`.
    pub path: String,
    pub query: Params,
    pub headers: HeaderMap,
    pub body: Bytes,
}

fn split_raw(path: &str) -> (&str, bool) {
    let path = path.trim_start_matches('/');
    match path.strip_prefix(RAW_PREFIX) {
        Some(rest) => (rest, true),
        None => (path, false),
    }
}

/// Bare whitelisted paths live under the daemon's `services/` tree.
fn upstream_path(path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("services/") || lower.starts_with("servicesns/") {
        path.to_string()
    } else {
        format!("services/{path}")
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE))
}

/// Checks the whitelist and CSRF, then forwards the request exactly once.
pub async fn forward(state: &ProxyState, request: ProxyRequest) -> Result<Response> {
    let (path, raw) = split_raw(&request.path);
    let entry = match whitelist::lookup(path, &request.method, state.config.enable_proxy_write) {
        Lookup::Allowed(entry) => entry,
        Lookup::NotWhitelisted => {
            tracing::debug!(method = %request.method, path, "proxy path is not whitelisted");
            return Err(ProxyError::not_found(format!(
                "{} {path} is not an allowed endpoint",
                request.method
            )));
        }
        Lookup::WriteDisabled => {
            return Err(ProxyError::Forbidden(
                "writes through the proxy are disabled".to_string(),
            ));
        }
    };

    let form_body = is_form(&request.headers) || request.body.is_empty();
    let form = form_body.then(|| Params::parse(&String::from_utf8_lossy(&request.body)));
    if !entry.flags.skip_csrf {
        let presented = request
            .query
            .get(FORM_KEY_FIELD)
            .or_else(|| form.as_ref().and_then(|form| form.get(FORM_KEY_FIELD)));
        state.verify_csrf(&request.headers, presented)?;
    }

    let oid = entry
        .flags
        .oid_enabled
        .then(|| request.query.get("oid"))
        .flatten()
        .filter(|oid| !oid.is_empty())
        .map(str::to_string);
    let session_key = match oid {
        Some(oid) => Some(oid),
        None => state.snapshot(&request.headers).await.session_key,
    };

    let mut query = request
        .query
        .without(&[FORM_KEY_FIELD])
        .without(STRIPPED_QUERY_ARGS);
    if !raw {
        query.set_default("output_mode", "json");
    }
    let body = match form {
        Some(form) if form.is_empty() => RequestBody::Empty,
        Some(form) => RequestBody::Form(form.without(&[FORM_KEY_FIELD])),
        None => RequestBody::Raw {
            content_type: request
                .headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            bytes: request.body,
        },
    };
    let upstream = UpstreamRequest {
        method: request.method,
        path: upstream_path(path),
        query,
        body,
        session_key,
        timeout: entry.timeout(),
    };

    let response = if raw {
        state.client.send(upstream).await?
    } else {
        state.client.send_checked(upstream).await?
    };
    let mut builder = Response::builder().status(response.status());
    if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
        builder = builder.header(CONTENT_TYPE, content_type.clone());
    }
    builder
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(ProxyError::internal)
}
