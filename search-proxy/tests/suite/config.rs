use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use search_proxy_test_support::TestProxy;
use serde_json::json;
use std::time::Duration;
use std::time::Instant;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn settings() -> serde_json::Value {
    json!({"entry": [{"name": "settings", "content": {
        "max_view_cache_size": "300",
        "sslPassword": "changeme"
    }}]})
}

#[tokio::test]
async fn merged_config_hides_private_settings() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/services/configs/conf-web/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings()))
        .expect(1)
        .mount(&proxy.server)
        .await;

    for _ in 0..2 {
        let response = proxy.send(proxy.get("/config")).await;
        assert_eq!(response.status, StatusCode::OK);
        let body = response.json();
        assert_eq!(body["max_view_cache_size"], json!("300"));
        assert_eq!(body.get("sslPassword"), None);
    }
}

#[tokio::test]
async fn reload_does_not_wait_for_a_slow_fetch() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path("/services/configs/conf-web/settings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(settings())
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&proxy.server)
        .await;

    let slow_get = proxy.send(proxy.get("/config"));
    let reload = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let started = Instant::now();
        let response = proxy.send(proxy.post_form("/config/reload", &[])).await;
        (response, started.elapsed())
    };
    let (fetched, (reloaded, elapsed)) = tokio::join!(slow_get, reload);
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(reloaded.json()["success"], json!(true));
    assert!(elapsed < Duration::from_millis(500), "reload waited {elapsed:?}");
}
