//! Login and the forced password change that may follow it.

use crate::credentials::Credentials;
use crate::csrf::FORM_KEY_FIELD;
use crate::csrf::new_form_key;
use crate::error::ProxyError;
use crate::error::Result;
use crate::params::Params;
use crate::params::is_truthy;
use crate::session::SessionData;
use crate::state::ProxyState;
use crate::upstream::UpstreamRequest;
use axum::Json;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::AppendHeaders;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use serde_json::Value;

const LOGIN_PATH: &str = "services/auth/login";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginReply {
    success: bool,
    password_change_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

fn required<'a>(form: &'a Params, name: &str) -> Result<&'a str> {
    form.get(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProxyError::invalid(format!("{name} is required")))
}

/// Posts to the back end's login endpoint; a 401 there is a failed login,
/// never an upstream error.
async fn authenticate(state: &ProxyState, form: Params) -> Result<Value> {
    match state.client.json(UpstreamRequest::post(LOGIN_PATH, form)).await {
        Err(ProxyError::Upstream { status, .. }) if status == StatusCode::UNAUTHORIZED => {
            Err(ProxyError::AuthFailed)
        }
        other => other,
    }
}

fn password_change_required(reply: &Value) -> bool {
    match reply.get("passwordChangeRequired") {
        Some(Value::Bool(required)) => *required,
        Some(Value::String(text)) => is_truthy(text),
        _ => false,
    }
}

fn session_key(reply: &Value) -> Result<String> {
    reply
        .get("sessionKey")
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProxyError::internal("login reply did not include a session key"))
}

fn session_cookies(state: &ProxyState, id: &str, form_key: &str) -> [(HeaderName, String); 2] {
    let config = &state.session_config;
    [
        (
            SET_COOKIE,
            format!("{}={id}; Path=/; HttpOnly; SameSite=Strict", config.cookie_name),
        ),
        (
            SET_COOKIE,
            format!("{}={form_key}; Path=/; SameSite=Strict", config.form_key_cookie),
        ),
    ]
}

/// Starts a fresh session for `user`. The previous session id is dropped
/// before anything is stored under the new one.
async fn establish(
    state: &ProxyState,
    previous: Option<&str>,
    data: SessionData,
) -> (String, String) {
    let (id, handle) = state.sessions.regenerate(previous);
    let form_key = new_form_key();
    *handle.write().await = SessionData {
        form_key: Some(form_key.clone()),
        ..data
    };
    (id, form_key)
}

pub async fn login(state: &ProxyState, headers: &HeaderMap, form: &Params) -> Result<Response> {
    let username = required(form, "username")?.to_string();
    let password = required(form, "password")?.to_string();

    let mut upstream = Params::default();
    upstream.push("username", username.as_str());
    upstream.push("password", password.as_str());
    let reply = authenticate(state, upstream).await.inspect_err(|err| {
        if matches!(err, ProxyError::AuthFailed) {
            tracing::info!(user = %username, "login rejected");
        }
    })?;

    let previous = state.session_id(headers);
    if password_change_required(&reply) {
        let (id, form_key) = establish(state, previous.as_deref(), SessionData::default()).await;
        state.credentials.insert(
            &id,
            Credentials {
                username: username.clone(),
                password,
            },
        );
        tracing::info!(user = %username, "login requires a password change");
        let body = LoginReply {
            success: false,
            password_change_required: true,
            user: Some(username),
        };
        return Ok((
            AppendHeaders(session_cookies(state, &id, &form_key)),
            Json(body),
        )
            .into_response());
    }

    let data = SessionData {
        session_key: Some(session_key(&reply)?),
        user: Some(username.clone()),
        form_key: None,
    };
    let (id, form_key) = establish(state, previous.as_deref(), data).await;
    tracing::info!(user = %username, "login succeeded");
    let body = LoginReply {
        success: true,
        password_change_required: false,
        user: Some(username),
    };
    Ok((
        AppendHeaders(session_cookies(state, &id, &form_key)),
        Json(body),
    )
        .into_response())
}

/// Completes a forced password change using the credentials cached at
/// login. They are evicted on entry and put back if the change fails.
pub async fn change_password(
    state: &ProxyState,
    headers: &HeaderMap,
    form: &Params,
) -> Result<Response> {
    state.verify_csrf(headers, form.get(FORM_KEY_FIELD))?;
    let id = state.session_id(headers).ok_or(ProxyError::AuthFailed)?;
    let new_password = required(form, "newpassword")?.to_string();
    if form
        .get("confirmpassword")
        .is_some_and(|confirm| confirm != new_password)
    {
        return Err(ProxyError::invalid("passwords do not match"));
    }
    let credentials = state
        .credentials
        .take(&id)
        .ok_or_else(|| ProxyError::invalid("no password change is pending for this session"))?;

    let mut upstream = Params::default();
    upstream.push("username", credentials.username.as_str());
    upstream.push("password", credentials.password.as_str());
    upstream.push("new_password", new_password);
    let reply = match authenticate(state, upstream).await {
        Ok(reply) => reply,
        Err(err) => {
            state.credentials.insert(&id, credentials);
            return Err(err);
        }
    };
    let session_key = match session_key(&reply) {
        Ok(key) => key,
        Err(err) => {
            state.credentials.insert(&id, credentials);
            return Err(err);
        }
    };

    let data = SessionData {
        session_key: Some(session_key),
        user: Some(credentials.username.clone()),
        form_key: None,
    };
    let (new_id, form_key) = establish(state, Some(&id), data).await;
    tracing::info!(user = %credentials.username, "password changed");
    let body = LoginReply {
        success: true,
        password_change_required: false,
        user: Some(credentials.username),
    };
    Ok((
        AppendHeaders(session_cookies(state, &new_id, &form_key)),
        Json(body),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn password_change_flag_accepts_bool_or_string() {
        assert!(password_change_required(&json!({"passwordChangeRequired": true})));
        assert!(password_change_required(&json!({"passwordChangeRequired": "1"})));
        assert!(!password_change_required(&json!({"sessionKey": "abc"})));
    }

    #[test]
    fn missing_session_key_is_internal() {
        assert!(matches!(
            session_key(&json!({"sessionKey": ""})),
            Err(ProxyError::Internal(_))
        ));
        assert!(matches!(session_key(&json!({"sessionKey": "k"})), Ok(key) if key == "k"));
    }
}
