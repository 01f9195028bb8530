use axum::body::Body;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use logweb_search_proxy::SessionStore;
use pretty_assertions::assert_eq;
use pretty_assertions::assert_ne;
use search_proxy_test_support::SESSION_ID;
use search_proxy_test_support::TestProxy;
use search_proxy_test_support::TestResponse;
use search_proxy_test_support::encode_form;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_string_contains;
use wiremock::matchers::method;
use wiremock::matchers::path;

/// `name=value` pairs from the response's Set-Cookie headers.
fn issued_cookies(response: &TestResponse) -> Vec<(String, String)> {
    response
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn cookie(cookies: &[(String, String)], name: &str) -> String {
    cookies
        .iter()
        .find(|(candidate, _)| candidate == name)
        .map(|(_, value)| value.clone())
        .unwrap()
}

fn form_post(uri: &str, cookie_header: Option<&str>, form: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(cookie_header) = cookie_header {
        builder = builder.header("cookie", cookie_header);
    }
    builder.body(Body::from(encode_form(form))).unwrap()
}

#[tokio::test]
async fn login_regenerates_the_session() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .and(body_string_contains("username=alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionKey": "fresh-key"})))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(form_post(
            "/account/login",
            Some(&format!("session_id={SESSION_ID}")),
            &[("username", "alice"), ("password", "secret")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"success": true, "passwordChangeRequired": false, "user": "alice"})
    );

    let cookies = issued_cookies(&response);
    let id = cookie(&cookies, "session_id");
    assert_ne!(id, SESSION_ID);
    assert!(proxy.sessions.get(SESSION_ID).is_none());
    let session = proxy.sessions.get(&id).unwrap();
    let data = session.read().await;
    assert_eq!(data.session_key.as_deref(), Some("fresh-key"));
    assert_eq!(data.user.as_deref(), Some("alice"));
    assert_eq!(
        data.form_key.clone(),
        Some(cookie(&cookies, "splunkweb_csrf_token"))
    );
}

#[tokio::test]
async fn rejected_login_is_unauthorized() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "messages": [{"type": "WARN", "text": "Login failed"}]
        })))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(form_post(
            "/account/login",
            None,
            &[("username", "alice"), ("password", "wrong")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json()["messages"],
        json!([{"type": "ERROR", "text": "Authentication failed"}])
    );
    assert!(issued_cookies(&response).is_empty());
}

#[tokio::test]
async fn login_needs_a_username() {
    let proxy = TestProxy::start().await;
    let response = proxy
        .send(form_post("/account/login", None, &[("password", "secret")]))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forced_password_change_uses_the_cached_credentials() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .and(body_string_contains("new_password=n3w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionKey": "after-change"})))
        .expect(1)
        .mount(&proxy.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"passwordChangeRequired": true})),
        )
        .expect(1)
        .mount(&proxy.server)
        .await;

    let login = proxy
        .send(form_post(
            "/account/login",
            None,
            &[("username", "alice"), ("password", "changeme")],
        ))
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.json()["passwordChangeRequired"], json!(true));
    assert_eq!(proxy.state.credentials.len(), 1);

    let cookies = issued_cookies(&login);
    let id = cookie(&cookies, "session_id");
    let form_key = cookie(&cookies, "splunkweb_csrf_token");
    let cookie_header = format!("session_id={id}; splunkweb_csrf_token={form_key}");
    let changed = proxy
        .send(form_post(
            "/account/passwordchange",
            Some(&cookie_header),
            &[
                ("newpassword", "n3w"),
                ("confirmpassword", "n3w"),
                ("splunk_form_key", &form_key),
            ],
        ))
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_eq!(changed.json()["success"], json!(true));
    assert!(proxy.state.credentials.is_empty());

    let new_id = cookie(&issued_cookies(&changed), "session_id");
    let session = proxy.sessions.get(&new_id).unwrap();
    assert_eq!(
        session.read().await.session_key.as_deref(),
        Some("after-change")
    );
}

#[tokio::test]
async fn failed_password_change_keeps_the_credentials() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .and(body_string_contains("new_password"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "messages": [{"type": "ERROR", "text": "Password is too short"}]
        })))
        .expect(1)
        .mount(&proxy.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"passwordChangeRequired": true})),
        )
        .mount(&proxy.server)
        .await;

    let login = proxy
        .send(form_post(
            "/account/login",
            None,
            &[("username", "alice"), ("password", "changeme")],
        ))
        .await;
    let cookies = issued_cookies(&login);
    let id = cookie(&cookies, "session_id");
    let form_key = cookie(&cookies, "splunkweb_csrf_token");
    let cookie_header = format!("session_id={id}; splunkweb_csrf_token={form_key}");

    let changed = proxy
        .send(form_post(
            "/account/passwordchange?output_mode=json",
            Some(&cookie_header),
            &[("newpassword", "x"), ("splunk_form_key", &form_key)],
        ))
        .await;
    assert_eq!(changed.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        changed.json()["messages"][0]["text"],
        json!("Password is too short")
    );
    assert_eq!(proxy.state.credentials.len(), 1);
}

#[tokio::test]
async fn mismatched_confirmation_is_rejected() {
    let proxy = TestProxy::start().await;
    let response = proxy
        .send(proxy.post_form(
            "/account/passwordchange",
            &[("newpassword", "a"), ("confirmpassword", "b")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
