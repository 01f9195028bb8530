use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::header::CONTENT_TYPE;
use logweb_view::ViewSettings;
use search_proxy_test_support::TestProxy;
use search_proxy_test_support::TestResponse;
use serde_json::Value;
use serde_json::json;
use tower::ServiceExt as _;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

pub use search_proxy_test_support::SESSION_KEY;

pub const DASHBOARD: &str = "<dashboard><label>Hello</label><row><panel><single>\
    <title>One</title><searchString>| metadata type=sources | stats count</searchString>\
    </single></panel></row></dashboard>";

/// The whole application router over a mock search daemon.
pub struct TestApp {
    pub proxy: TestProxy,
    app: Router,
}

impl TestApp {
    pub async fn start() -> Self {
        let proxy = TestProxy::start().await;
        let app = logweb_app_server::app(proxy.state.clone(), ViewSettings::default());
        Self { proxy, app }
    }

    pub fn get(&self, uri: &str) -> Request<Body> {
        self.proxy.get(uri)
    }

    pub fn post_json(&self, uri: &str, body: &Value) -> Request<Body> {
        self.proxy
            .request(axum::http::Method::POST, uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("build POST request")
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Serves `source` as the stored view `app/view` registered for
    /// `template`.
    pub async fn mount_view(&self, app: &str, view: &str, template: &str, source: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/servicesNS/-/{app}/data/ui/views/{view}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entry": [{
                    "name": view,
                    "content": {"eai:data": source, "template": template},
                    "links": {},
                    "acl": {"app": app, "owner": "nobody"}
                }],
                "messages": []
            })))
            .expect(1)
            .mount(&self.proxy.server)
            .await;
    }
}
