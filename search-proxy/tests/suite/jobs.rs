use axum::body::Body;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::IF_NONE_MATCH;
use pretty_assertions::assert_eq;
use search_proxy_test_support::TestProxy;
use search_proxy_test_support::done_job;
use search_proxy_test_support::job_envelope;
use search_proxy_test_support::mount_dispatch;
use search_proxy_test_support::mount_job;
use search_proxy_test_support::mount_missing_job;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_string_contains;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

const SID: &str = "1700000000.42";

#[tokio::test]
async fn dispatch_then_list() {
    let proxy = TestProxy::start().await;
    mount_dispatch(&proxy.server, SID).await;
    mount_job(&proxy.server, SID, done_job(SID)).await;

    let dispatched = proxy
        .send(proxy.post_form(
            "/search/jobs",
            &[
                ("search", "search index=main | stats count"),
                ("status_buckets", "300"),
                ("earliest_time", "-1h"),
                ("latest_time", "now"),
            ],
        ))
        .await;
    assert_eq!(dispatched.status, StatusCode::OK);
    assert_eq!(
        dispatched.json(),
        json!({"success": true, "messages": [], "data": SID})
    );

    let listed = proxy.send(proxy.get(&format!("/search/jobs?s={SID}"))).await;
    assert_eq!(listed.status, StatusCode::OK);
    let body = listed.json();
    let jobs = body["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["sid"], json!(SID));
    assert_eq!(jobs[0]["eventCount"], json!(42));
    assert_eq!(jobs[0]["isDone"], json!(true));
    assert_eq!(jobs[0]["doneProgress"], json!(1.0));
    assert!(listed.header("etag").is_some());
}

#[tokio::test]
async fn dispatch_sends_session_key_and_renamed_limits() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .and(path("/servicesNS/admin/search/search/jobs"))
        .and(header("authorization", "Splunk test-session-key"))
        .and(body_string_contains("max_count=500"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": SID})))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.post_form(
            "/search/jobs",
            &[
                ("search", "search *"),
                ("status_buckets", "0"),
                ("earliest_time", "-1h"),
                ("latest_time", "now"),
                ("maxEvents", "500"),
            ],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn dispatch_without_required_arguments_never_reaches_the_daemon() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.post_form(
            "/search/jobs?output_mode=json",
            &[("search", "search *")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["success"], json!(false));
}

#[tokio::test]
async fn dispatch_without_form_key_is_unauthorized() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&proxy.server)
        .await;

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/search/jobs?output_mode=json")
        .header("cookie", "session_id=test-session")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(
            "search=search+*&status_buckets=0&earliest_time=-1h&latest_time=now",
        ))
        .unwrap();
    let response = proxy.send(request).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json(),
        json!({"success": false, "messages": [{"type": "ERROR", "text": "Authentication failed"}]})
    );
}

#[tokio::test]
async fn unknown_sid_is_stubbed_and_not_cached() {
    let proxy = TestProxy::start().await;
    mount_missing_job(&proxy.server, "nope").await;

    let response = proxy.send(proxy.get("/search/jobs?s=nope")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json()["data"],
        json!([{"sid": "nope", "__notfound__": true}])
    );
    assert_eq!(response.header("etag"), None);
    assert_eq!(response.header("cache-control"), Some("no-store"));
}

#[tokio::test]
async fn listing_keeps_caller_order() {
    let proxy = TestProxy::start().await;
    mount_job(&proxy.server, "b", done_job("b")).await;
    mount_missing_job(&proxy.server, "missing").await;
    mount_job(&proxy.server, "a", done_job("a")).await;

    let response = proxy
        .send(proxy.get("/search/jobs?s=b&s=missing&s=a"))
        .await;
    let body = response.json();
    let sids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["sid"].as_str().unwrap())
        .collect();
    assert_eq!(sids, vec!["b", "missing", "a"]);
}

#[tokio::test]
async fn matching_etag_is_not_modified() {
    let proxy = TestProxy::start().await;
    mount_job(&proxy.server, SID, done_job(SID)).await;

    let first = proxy.send(proxy.get(&format!("/search/jobs?s={SID}"))).await;
    let etag = first.header("etag").unwrap().to_string();

    let request = proxy
        .request(Method::GET, &format!("/search/jobs?s={SID}"))
        .header(IF_NONE_MATCH, etag.as_str())
        .body(Body::empty())
        .unwrap();
    let second = proxy.send(request).await;
    assert_eq!(second.status, StatusCode::NOT_MODIFIED);
    assert_eq!(second.header("etag"), Some(etag.as_str()));
    assert!(second.body.is_empty());
}

#[tokio::test]
async fn ttl_countdown_keeps_the_etag() {
    let proxy = TestProxy::start().await;
    let mut older = done_job(SID);
    older["ttl"] = json!("599");
    Mock::given(method("GET"))
        .and(path(format!("/services/search/jobs/{SID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_envelope(SID, done_job(SID))))
        .up_to_n_times(1)
        .mount(&proxy.server)
        .await;
    mount_job(&proxy.server, SID, older).await;

    let first = proxy.send(proxy.get(&format!("/search/jobs?s={SID}"))).await;
    let second = proxy.send(proxy.get(&format!("/search/jobs?s={SID}"))).await;
    assert_eq!(first.json()["data"][0]["ttl"], json!(600));
    assert_eq!(second.json()["data"][0]["ttl"], json!(599));
    assert_eq!(first.header("etag"), second.header("etag"));
}

#[tokio::test]
async fn nocache_suppresses_the_etag() {
    let proxy = TestProxy::start().await;
    mount_job(&proxy.server, SID, done_job(SID)).await;

    let response = proxy
        .send(proxy.get(&format!("/search/jobs?s={SID}&nocache=1")))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("etag"), None);
}

#[tokio::test]
async fn control_forwards_the_action() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/services/search/jobs/{SID}/control")))
        .and(body_string_contains("action=cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"type": "INFO", "text": "Search job cancelled."}]
        })))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.post_form(
            &format!("/search/jobs/{SID}/control"),
            &[("action", "cancel")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"success": true, "messages": [{"type": "INFO", "text": "Search job cancelled."}]})
    );
}

#[tokio::test]
async fn unknown_action_is_rejected_before_forwarding() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.post_form(
            &format!("/search/jobs/{SID}/control?output_mode=json"),
            &[("action", "explode")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dot_segment_sid_never_reaches_the_daemon() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.post_form(
            "/search/jobs/%2E%2E/control?output_mode=json",
            &[("action", "cancel")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["success"], json!(false));
}

#[tokio::test]
async fn world_readable_rewrites_the_acl() {
    let proxy = TestProxy::start().await;
    mount_job(&proxy.server, SID, done_job(SID)).await;
    Mock::given(method("POST"))
        .and(path(format!("/services/search/jobs/{SID}/acl")))
        .and(body_string_contains("sharing=global"))
        .and(body_string_contains("perms.read=*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.post_form(
            &format!("/search/jobs/{SID}/control"),
            &[("action", "makeWorldReadable")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn batch_control_reports_each_sid() {
    let proxy = TestProxy::start().await;
    Mock::given(method("POST"))
        .and(path("/services/search/jobs/good/control"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .expect(1)
        .mount(&proxy.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/services/search/jobs/gone/control"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "messages": [{"type": "ERROR", "text": "Unknown sid."}]
        })))
        .expect(1)
        .mount(&proxy.server)
        .await;

    let response = proxy
        .send(proxy.post_form(
            "/search/jobs/control",
            &[("sid", "good"), ("sid", "gone"), ("action", "touch")],
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["data"][0], json!({"sid": "good", "success": true, "messages": []}));
    assert_eq!(body["data"][1]["sid"], json!("gone"));
    assert_eq!(body["data"][1]["success"], json!(false));
    assert_eq!(
        body["data"][1]["messages"][0]["text"],
        json!("job gone not found")
    );
}
