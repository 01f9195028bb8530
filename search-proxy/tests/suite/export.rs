use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use search_proxy_test_support::TestProxy;
use search_proxy_test_support::done_job;
use search_proxy_test_support::encode_form;
use search_proxy_test_support::mount_job;
use search_proxy_test_support::mount_missing_job;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

const SID: &str = "1700000000.7";
const CSV: &str = "_time,_raw\n2024-01-01T00:00:00.000000+00:00,hello\n";

#[tokio::test]
async fn hostile_filename_is_sanitised_and_body_streamed() {
    let proxy = TestProxy::start().await;
    mount_job(&proxy.server, SID, done_job(SID)).await;
    Mock::given(method("GET"))
        .and(path(format!("/services/search/jobs/{SID}/events/export")))
        .and(query_param("output_mode", "csv"))
        .and(query_param("time_format", "%Y-%m-%dT%H:%M:%S.%6N%:z"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CSV))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let query = encode_form(&[
        ("isDownload", "1"),
        ("outputMode", "csv"),
        ("filename", "\"../etc/passwd; rm -rf\""),
    ]);
    let response = proxy
        .send(proxy.get(&format!("/search/jobs/{SID}/events?{query}")))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"..etc_passwd_rm_-rf\"")
    );
    assert_eq!(response.header("content-type"), Some("text/csv; charset=utf-8"));
    assert_eq!(response.header("cache-control"), Some("no-store"));
    assert_eq!(response.text(), CSV);
}

#[tokio::test]
async fn unfinished_job_is_rerun_with_a_head_limit() {
    let proxy = TestProxy::start().await;
    let mut running = done_job(SID);
    running["isDone"] = json!("0");
    running["dispatchState"] = json!("RUNNING");
    mount_job(&proxy.server, SID, running).await;
    Mock::given(method("GET"))
        .and(path("/services/search/jobs/export"))
        .and(query_param("search", "search index=main | stats count | head 5"))
        .and(query_param("output_mode", "raw"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello\n"))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get(&format!(
            "/search/jobs/{SID}/events?isDownload=true&outputMode=raw&count=5"
        )))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-disposition"),
        Some(format!("attachment; filename=\"{SID}.txt\"").as_str())
    );
    assert_eq!(response.text(), "hello\n");
}

#[tokio::test]
async fn xml_exports_ask_for_the_wrapper() {
    let proxy = TestProxy::start().await;
    mount_job(&proxy.server, SID, done_job(SID)).await;
    Mock::given(method("GET"))
        .and(path(format!("/services/search/jobs/{SID}/results/export")))
        .and(query_param("export_xml_with_wrapper", "1"))
        .and(query_param("f", "_raw"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<results/>"))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get(&format!("/search/jobs/{SID}/results?isDownload=1")))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-disposition"),
        Some(format!("attachment; filename=\"{SID}.xml\"").as_str())
    );
}

#[tokio::test]
async fn export_of_unknown_job_is_not_found() {
    let proxy = TestProxy::start().await;
    mount_missing_job(&proxy.server, "gone").await;

    let response = proxy
        .send(proxy.get("/search/jobs/gone/events?isDownload=1&output_mode=json"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.json()["messages"][0]["text"],
        json!("job gone not found")
    );
}

#[tokio::test]
async fn plain_asset_fetch_streams_the_upstream_body() {
    let proxy = TestProxy::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/services/search/jobs/{SID}/results_preview")))
        .and(query_param("output_mode", "json"))
        .and(query_param("count", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{"count": "3"}]})))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get(&format!(
            "/search/jobs/{SID}/results_preview?outputMode=json&count=10"
        )))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"results": [{"count": "3"}]}));
}

#[tokio::test]
async fn compat_mode_flattens_json_assets() {
    let proxy = TestProxy::start_with(|config| config.compat_mode = true).await;
    Mock::given(method("GET"))
        .and(path(format!("/services/search/jobs/{SID}/results")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "preview": false,
            "results": [{"count": "3"}]
        })))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.get(&format!("/search/jobs/{SID}/results?outputMode=json")))
        .await;
    assert_eq!(response.json(), json!([{"count": "3"}]));
}

#[tokio::test]
async fn unknown_asset_is_not_found() {
    let proxy = TestProxy::start().await;
    let response = proxy
        .send(proxy.get(&format!("/search/jobs/{SID}/secrets")))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
