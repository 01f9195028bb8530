use axum::body::Body;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use search_proxy_test_support::TestProxy;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::any;
use wiremock::matchers::body_string;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;
use wiremock::matchers::query_param_is_missing;

async fn expect_no_upstream_calls(proxy: &TestProxy) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy.server)
        .await;
}

#[tokio::test]
async fn write_to_read_only_endpoint_is_not_found() {
    let proxy = TestProxy::start_with(|config| config.enable_proxy_write = true).await;
    expect_no_upstream_calls(&proxy).await;

    let response = proxy
        .send(proxy.post_form("/splunkd/services/server/info", &[]))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_endpoint_is_not_found() {
    let proxy = TestProxy::start().await;
    expect_no_upstream_calls(&proxy).await;

    let response = proxy
        .send(proxy.get("/splunkd/not/a/real/endpoint?output_mode=json"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["success"], json!(false));
}

#[tokio::test]
async fn dot_segments_cannot_escape_a_whitelisted_prefix() {
    let proxy = TestProxy::start().await;
    expect_no_upstream_calls(&proxy).await;

    for uri in [
        "/splunkd/services/search/jobs/../results?output_mode=json",
        "/splunkd/services/search/jobs/%2e%2e/results?output_mode=json",
        "/splunkd/__raw/services/search/jobs/./results",
    ] {
        let response = proxy.send(proxy.get(uri)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn whitelisted_read_is_forwarded_exactly_once() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/services/server/info"))
        .and(header("authorization", "Splunk test-session-key"))
        .and(query_param("output_mode", "json"))
        .and(query_param_is_missing("_"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"entry": [{"content": {"version": "9.1"}}]})),
        )
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get("/splunkd/services/server/info?_=1700000000"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["entry"][0]["content"]["version"], json!("9.1"));
}

#[tokio::test]
async fn namespaced_path_is_whitelisted() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/servicesNS/admin/search/saved/searches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entry": []})))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get("/splunkd/servicesNS/admin/search/saved/searches"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn writes_are_refused_unless_enabled() {
    let proxy = TestProxy::start().await;
    expect_no_upstream_calls(&proxy).await;

    let request = proxy
        .request(Method::DELETE, "/splunkd/services/messages/restart_required")
        .body(Body::empty())
        .unwrap();
    let response = proxy.send(request).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn enabled_writes_forward_the_form_body() {
    let proxy = TestProxy::start_with(|config| config.enable_proxy_write = true).await;
    Mock::given(method("POST"))
        .and(path("/services/saved/searches/errors"))
        .and(body_string("search=error&cron_schedule=*%2F5+*+*+*+*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entry": []})))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.post_form(
            "/splunkd/services/saved/searches/errors",
            &[
                ("search", "error"),
                ("cron_schedule", "*/5 * * * *"),
                ("splunk_form_key", "1234567890"),
            ],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn missing_form_key_is_unauthorized_and_not_forwarded() {
    let proxy = TestProxy::start().await;
    expect_no_upstream_calls(&proxy).await;

    let request = Request::builder()
        .uri("/splunkd/services/server/info?output_mode=json")
        .header("cookie", "session_id=test-session; splunkweb_csrf_token=1234567890")
        .body(Body::empty())
        .unwrap();
    let response = proxy.send(request).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json()["messages"],
        json!([{"type": "ERROR", "text": "Authentication failed"}])
    );
}

#[tokio::test]
async fn login_is_exempt_from_the_form_key() {
    let proxy = TestProxy::start_with(|config| config.enable_proxy_write = true).await;
    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionKey": "k"})))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/splunkd/services/auth/login")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("username=admin&password=changeme"))
        .unwrap();
    let response = proxy.send(request).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn raw_prefix_passes_upstream_errors_through() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/services/server/info"))
        .and(query_param_is_missing("output_mode"))
        .respond_with(ResponseTemplate::new(503).set_body_string("daemon restarting"))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get("/splunkd/__raw/services/server/info"))
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text(), "daemon restarting");
}

#[tokio::test]
async fn oid_replaces_the_session_key_on_asset_routes() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/services/search/jobs/1234.5/results"))
        .and(header("authorization", "Splunk shared-key"))
        .and(query_param_is_missing("oid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get("/splunkd/services/search/jobs/1234.5/results?oid=shared-key"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn typeahead_route_is_whitelisted_for_reads_only() {
    let proxy = TestProxy::start_with(|config| config.enable_proxy_write = true).await;
    expect_no_upstream_calls(&proxy).await;

    let response = proxy
        .send(proxy.post_form("/splunkd/services/search/typeahead", &[("prefix", "x")]))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
