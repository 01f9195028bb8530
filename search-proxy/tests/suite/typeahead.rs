use axum::http::StatusCode;
use axum::response::IntoResponse;
use logweb_search_proxy::error::ErrorFormat;
use logweb_search_proxy::params::Params;
use logweb_search_proxy::typeahead::typeahead;
use pretty_assertions::assert_eq;
use search_proxy_test_support::TestProxy;
use serde_json::json;
use std::time::Duration;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

#[tokio::test]
async fn no_content_means_no_suggestions() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/services/search/typeahead"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy.send(proxy.get("/search/typeahead?q=sourc")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!([]));
}

#[tokio::test]
async fn suggestions_are_rewritten_for_the_search_bar() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/services/search/typeahead"))
        .and(query_param("prefix", "index=main sourcetype"))
        .and(query_param("count", "50"))
        .and(query_param("earliest_time", "-24h"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"content": "index=main sourcetype=syslog", "count": 12345}]
        })))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get(
            "/search/typeahead?q=sourcetype&index=main&earliest_time=-24h",
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!([{
            "count": "12,345",
            "result": "index=main sourcetype=syslog",
            "value": "index=main sourcetype=syslog (12,345)",
            "data": ["index=main sourcetype=syslog (12,345)"]
        }])
    );
}

#[tokio::test]
async fn missing_query_is_a_bad_request() {
    let proxy = TestProxy::start().await;
    let response = proxy
        .send(proxy.get("/search/typeahead?output_mode=json"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["success"], json!(false));
}

#[tokio::test]
async fn slow_daemon_is_a_gateway_timeout_in_either_format() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/services/search/typeahead"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&proxy.server)
        .await;
    let session = proxy.state.snapshot(proxy.get("/").headers()).await;
    let mut params = Params::default();
    params.push("q", "sourc");

    for (format, expected_type) in [
        (ErrorFormat::Json, "application/json"),
        (ErrorFormat::Xml, "text/xml; charset=utf-8"),
    ] {
        let err = typeahead(
            &proxy.state.client,
            &session,
            &params,
            Some(Duration::from_millis(100)),
        )
        .await
        .expect_err("the daemon is slower than the timeout");
        let response = err.in_format(format).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok()),
            Some(expected_type)
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let body = String::from_utf8_lossy(&body);
        assert!(
            body.contains("The search daemon did not respond in time. Try again later."),
            "{body}"
        );
    }
}
