use app_test_support::DASHBOARD;
use app_test_support::SESSION_KEY;
use app_test_support::TestApp;
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

#[tokio::test]
async fn simple_xml_view_is_served_as_html() {
    let app = TestApp::start().await;
    app.mount_view("search", "overview", "pages/dashboard.html", DASHBOARD)
        .await;

    let response = app.send(app.get("/app/search/overview")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-type"),
        Some("text/html; charset=utf-8")
    );
    let page = response.text();
    assert!(page.contains("<h1>Hello</h1>"), "{page}");
    assert!(page.contains("id=\"element1\""), "{page}");
}

#[tokio::test]
async fn module_system_view_returns_the_compiled_model() {
    let app = TestApp::start().await;
    app.mount_view(
        "search",
        "flashtimeline",
        "pages/flashtimeline.html",
        "<dashboard><row><event/></row></dashboard>",
    )
    .await;

    let response = app.send(app.get("/app/search/flashtimeline")).await;
    assert_eq!(response.status, StatusCode::OK);
    let compiled = response.json();
    assert_eq!(compiled["bypass_module_system"], json!(false));
    assert_eq!(compiled["render_path"], json!("module_system"));
}

#[tokio::test]
async fn view_is_fetched_with_the_session_key() {
    let app = TestApp::start().await;
    Mock::given(method("GET"))
        .and(path("/servicesNS/-/ops/data/ui/views/health"))
        .and(header("authorization", format!("Splunk {SESSION_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entry": [{"name": "health", "content": {"eai:data": DASHBOARD}}]
        })))
        .expect(1)
        .mount(&app.proxy.server)
        .await;

    let response = app.send(app.get("/app/ops/health")).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_view_renders_an_escaped_error_page() {
    let app = TestApp::start().await;
    app.mount_view(
        "search",
        "broken",
        "pages/dashboard.html",
        r#"<dashboard><row><single id="a&lt;b"/><single id="a&lt;b"/></row></dashboard>"#,
    )
    .await;

    let response = app.send(app.get("/app/search/broken")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let page = response.text();
    assert!(page.contains("Invalid view"), "{page}");
    assert!(!page.contains("a<b"), "{page}");
}

#[tokio::test]
async fn unknown_view_is_not_found() {
    let app = TestApp::start().await;
    Mock::given(method("GET"))
        .and(path("/servicesNS/-/search/data/ui/views/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "messages": [{"type": "ERROR", "text": "Could not find object id=missing"}]
        })))
        .expect(1)
        .mount(&app.proxy.server)
        .await;

    let response = app.send(app.get("/app/search/missing")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.json()["messages"][0]["text"],
        json!("view search/missing not found")
    );
}

#[tokio::test]
async fn dot_segment_view_name_is_not_found() {
    let app = TestApp::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.proxy.server)
        .await;

    let response = app.send(app.get("/app/search/%2E%2E")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
