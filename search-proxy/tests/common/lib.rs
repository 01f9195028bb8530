use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::COOKIE;
use logweb_search_proxy::InMemorySessionStore;
use logweb_search_proxy::ProxyConfig;
use logweb_search_proxy::ProxyState;
use logweb_search_proxy::SessionConfig;
use logweb_search_proxy::router;
use logweb_search_proxy::session::SessionData;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt as _;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

pub const SESSION_ID: &str = "test-session";
pub const SESSION_KEY: &str = "test-session-key";
pub const FORM_KEY: &str = "1234567890";
pub const USER: &str = "admin";

/// A façade wired to a mock search daemon, with one logged-in session.
pub struct TestProxy {
    pub server: MockServer,
    pub state: ProxyState,
    pub sessions: Arc<InMemorySessionStore>,
    app: Router,
}

impl TestProxy {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut ProxyConfig)) -> Self {
        let server = MockServer::start().await;
        let mut config = ProxyConfig {
            splunkd_uri: server.uri(),
            ..ProxyConfig::default()
        };
        configure(&mut config);
        let sessions = Arc::new(InMemorySessionStore::new());
        sessions.insert(
            SESSION_ID,
            SessionData {
                session_key: Some(SESSION_KEY.to_string()),
                user: Some(USER.to_string()),
                form_key: Some(FORM_KEY.to_string()),
            },
        );
        let state = ProxyState::new(config, SessionConfig::default(), sessions.clone())
            .expect("build proxy state");
        let app = router(state.clone());
        Self {
            server,
            state,
            sessions,
            app,
        }
    }

    fn cookies(&self) -> String {
        let config = &self.state.session_config;
        format!(
            "{}={SESSION_ID}; {}={FORM_KEY}",
            config.cookie_name, config.form_key_cookie
        )
    }

    /// Request from the logged-in browser, form key header included.
    pub fn request(&self, method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(COOKIE, self.cookies())
            .header(self.state.session_config.form_key_header.as_str(), FORM_KEY)
    }

    pub fn get(&self, uri: &str) -> Request<Body> {
        self.request(Method::GET, uri)
            .body(Body::empty())
            .expect("build GET request")
    }

    pub fn post_form(&self, uri: &str, form: &[(&str, &str)]) -> Request<Body> {
        self.request(Method::POST, uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(encode_form(form)))
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
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

pub fn encode_form(form: &[(&str, &str)]) -> String {
    form.iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Envelope the daemon returns for `services/search/jobs/{sid}`.
pub fn job_envelope(sid: &str, content: Value) -> Value {
    json!({
        "entry": [{
            "name": sid,
            "content": content,
            "links": {},
            "acl": {
                "owner": USER,
                "app": "search",
                "sharing": "global",
                "perms": {"read": [USER], "write": [USER]}
            }
        }],
        "messages": []
    })
}

/// String-typed job fields, the way the daemon reports them.
pub fn done_job(sid: &str) -> Value {
    json!({
        "sid": sid,
        "dispatchState": "DONE",
        "isDone": "1",
        "isFailed": "0",
        "eventIsTruncated": "0",
        "eventCount": "42",
        "eventAvailableCount": "42",
        "resultCount": "1",
        "doneProgress": "1.0",
        "ttl": "600",
        "request": {"search": "search index=main | stats count"}
    })
}

pub async fn mount_job(server: &MockServer, sid: &str, content: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/services/search/jobs/{sid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_envelope(sid, content)))
        .mount(server)
        .await;
}

pub async fn mount_missing_job(server: &MockServer, sid: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/services/search/jobs/{sid}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "messages": [{"type": "ERROR", "text": "Unknown sid."}]
        })))
        .mount(server)
        .await;
}

pub async fn mount_dispatch(server: &MockServer, sid: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/servicesNS/{USER}/search/search/jobs")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sid": sid })))
        .expect(1)
        .mount(server)
        .await;
}
