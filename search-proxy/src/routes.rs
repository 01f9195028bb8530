use crate::assets;
use crate::assets::Asset;
use crate::assets::AssetRequest;
use crate::assets::MODULE_HEADER;
use crate::auth;
use crate::csrf::FORM_KEY_FIELD;
use crate::error::ApiError;
use crate::error::ProxyError;
use crate::error::Result;
use crate::export;
use crate::jobs;
use crate::jobs::JobAction;
use crate::params::Params;
use crate::proxy;
use crate::proxy::ProxyRequest;
use crate::session::SessionSnapshot;
use crate::state::ProxyState;
use crate::typeahead;
use crate::whitelist;
use crate::whitelist::Lookup;
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::CACHE_CONTROL;
use axum::http::header::ETAG;
use axum::http::header::IF_NONE_MATCH;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::any;
use axum::routing::get;
use axum::routing::post;
use serde_json::json;

const TYPEAHEAD_ROUTE: &str = "search/typeahead";

/// All façade endpoints, ready to be merged into the application router.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/search/jobs", get(list_jobs_handler).post(dispatch_handler))
        .route("/search/jobs/control", post(batch_control_handler))
        .route("/search/jobs/{sid}/control", post(control_handler))
        .route("/search/jobs/{sid}/{asset}", get(asset_handler))
        .route("/search/typeahead", get(typeahead_handler))
        .route("/splunkd/{*path}", any(proxy_handler))
        .route("/config", get(config_handler))
        .route("/config/reload", post(config_reload_handler))
        .route("/account/login", post(login_handler))
        .route("/account/passwordchange", post(password_change_handler))
        .with_state(state)
}

fn query_params(query: Option<String>) -> Params {
    Params::parse(query.as_deref().unwrap_or_default())
}

/// Query arguments followed by the urlencoded body.
fn request_params(query: Option<String>, body: &Bytes) -> Params {
    let mut pairs = query_params(query).into_pairs();
    pairs.extend(Params::parse(&String::from_utf8_lossy(body)).into_pairs());
    Params::new(pairs)
}

fn sids(params: &Params, key: &str) -> Vec<String> {
    params
        .get_all(key)
        .into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|sid| !sid.is_empty())
        .map(str::to_string)
        .collect()
}

fn not_modified(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| candidate == etag || candidate == "*")
}

fn action(params: &Params) -> Result<JobAction> {
    let action = params
        .get("action")
        .filter(|action| !action.is_empty())
        .ok_or_else(|| ProxyError::invalid("action is required"))?;
    JobAction::parse(action)
}

/// The caller's session, with `oid` standing in for the session key when
/// given.
async fn session_for(state: &ProxyState, headers: &HeaderMap, params: &Params) -> SessionSnapshot {
    let session = state.snapshot(headers).await;
    match params.get("oid").filter(|oid| !oid.is_empty()) {
        Some(oid) => SessionSnapshot {
            session_key: Some(oid.to_string()),
            ..session
        },
        None => session,
    }
}

async fn list_jobs_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> std::result::Result<Response, ApiError> {
    let params = query_params(query);
    let format = params.error_format();
    list_jobs(&state, &headers, &params)
        .await
        .map_err(|err| err.in_format(format))
}

async fn list_jobs(state: &ProxyState, headers: &HeaderMap, params: &Params) -> Result<Response> {
    let sids = sids(params, "s");
    if sids.is_empty() {
        return Err(ProxyError::invalid("at least one s argument is required"));
    }
    let session = state.snapshot(headers).await;
    let listing = jobs::list_jobs(&state.client, &session, &sids, params.flag("wait")).await?;
    let etag = if params.flag("nocache") {
        None
    } else {
        listing.etag()
    };
    if let Some(etag) = etag.as_deref().filter(|etag| not_modified(headers, etag)) {
        let etag = HeaderValue::from_str(etag).map_err(ProxyError::internal)?;
        return Ok((StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response());
    }

    let body = json!({ "success": true, "messages": [], "data": listing.jobs });
    let mut response = Json(body).into_response();
    match etag {
        Some(etag) => {
            let etag = HeaderValue::from_str(&etag).map_err(ProxyError::internal)?;
            response.headers_mut().insert(ETAG, etag);
        }
        None => {
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }
    }
    Ok(response)
}

async fn dispatch_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let params = request_params(query, &body);
    let format = params.error_format();
    dispatch(&state, &headers, params)
        .await
        .map_err(|err| err.in_format(format))
}

async fn dispatch(state: &ProxyState, headers: &HeaderMap, params: Params) -> Result<Response> {
    state.verify_csrf(headers, params.get(FORM_KEY_FIELD))?;
    let session = state.snapshot(headers).await;
    let sid = jobs::dispatch(&state.client, &state.config, &session, params).await?;
    Ok(Json(json!({ "success": true, "messages": [], "data": sid })).into_response())
}

async fn control_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    Path(sid): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let params = request_params(query, &body);
    let format = params.error_format();
    control(&state, &headers, &sid, &params)
        .await
        .map_err(|err| err.in_format(format))
}

async fn control(
    state: &ProxyState,
    headers: &HeaderMap,
    sid: &str,
    params: &Params,
) -> Result<Response> {
    state.verify_csrf(headers, params.get(FORM_KEY_FIELD))?;
    let action = action(params)?;
    let session = state.snapshot(headers).await;
    let messages =
        jobs::control_job(&state.client, &session, sid, action, params.get("ttl")).await?;
    Ok(Json(json!({ "success": true, "messages": messages })).into_response())
}

async fn batch_control_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let params = request_params(query, &body);
    let format = params.error_format();
    batch_control(&state, &headers, &params)
        .await
        .map_err(|err| err.in_format(format))
}

async fn batch_control(state: &ProxyState, headers: &HeaderMap, params: &Params) -> Result<Response> {
    state.verify_csrf(headers, params.get(FORM_KEY_FIELD))?;
    let action = action(params)?;
    let sids = sids(params, "sid");
    if sids.is_empty() {
        return Err(ProxyError::invalid("at least one sid is required"));
    }
    let session = state.snapshot(headers).await;
    let items =
        jobs::batch_control(&state.client, &session, &sids, action, params.get("ttl")).await;
    let success = items.iter().all(|item| item.success);
    Ok(Json(json!({ "success": success, "messages": [], "data": items })).into_response())
}

async fn asset_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    Path((sid, asset)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> std::result::Result<Response, ApiError> {
    let params = query_params(query);
    let format = params.error_format();
    job_asset(&state, &headers, &sid, &asset, &params)
        .await
        .map_err(|err| err.in_format(format))
}

async fn job_asset(
    state: &ProxyState,
    headers: &HeaderMap,
    sid: &str,
    asset: &str,
    params: &Params,
) -> Result<Response> {
    let asset = Asset::parse(asset)?;
    let session = session_for(state, headers, params).await;
    if params.flag("isDownload") {
        return export::export(&state.client, &state.config, &session, sid, asset, params).await;
    }
    let module = headers
        .get(MODULE_HEADER)
        .and_then(|value| value.to_str().ok());
    let request = AssetRequest {
        sid,
        asset,
        params,
        module,
        session_key: session.session_key,
    };
    assets::fetch_asset(&state.client, &state.config, state.xsl.as_deref(), request).await
}

async fn typeahead_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> std::result::Result<Response, ApiError> {
    let params = query_params(query);
    let format = params.error_format();
    let timeout = match whitelist::lookup(TYPEAHEAD_ROUTE, &Method::GET, false) {
        Lookup::Allowed(entry) => entry.timeout(),
        Lookup::NotWhitelisted | Lookup::WriteDisabled => None,
    };
    let session = state.snapshot(&headers).await;
    typeahead::typeahead(&state.client, &session, &params, timeout)
        .await
        .map(|suggestions| Json(suggestions).into_response())
        .map_err(|err| err.in_format(format))
}

async fn proxy_handler(
    State(state): State<ProxyState>,
    method: Method,
    headers: HeaderMap,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let query = query_params(query);
    let format = query.error_format();
    let request = ProxyRequest {
        method,
        path,
        query,
        headers,
        body,
    };
    proxy::forward(&state, request)
        .await
        .map_err(|err| err.in_format(format))
}

async fn config_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
) -> std::result::Result<Response, ApiError> {
    let session = state.snapshot(&headers).await;
    let merged = state
        .config_cache
        .get(&state.client, &state.config, session.session_key)
        .await?;
    Ok(Json(merged.as_ref()).into_response())
}

async fn config_reload_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let form = Params::parse(&String::from_utf8_lossy(&body));
    state.verify_csrf(&headers, form.get(FORM_KEY_FIELD))?;
    state.config_cache.reload().await;
    Ok(Json(json!({ "success": true, "messages": [] })).into_response())
}

async fn login_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let form = Params::parse(&String::from_utf8_lossy(&body));
    Ok(auth::login(&state, &headers, &form).await?)
}

async fn password_change_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let form = Params::parse(&String::from_utf8_lossy(&body));
    Ok(auth::change_password(&state, &headers, &form).await?)
}
