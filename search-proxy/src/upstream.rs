//! HTTP client for the back-end search daemon.

use crate::config::ProxyConfig;
use crate::error::Message;
use crate::error::ProxyError;
use crate::error::Result;
use crate::params::Params;
use axum::http::Method;
use bytes::Bytes;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use std::time::Duration;

/// `{entry: [{content, links, acl}], messages: [{type, text}]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub entry: Vec<Entry>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: Map<String, Value>,
    #[serde(default)]
    pub links: Map<String, Value>,
    #[serde(default)]
    pub acl: Map<String, Value>,
}

impl Envelope {
    pub fn first(&self) -> Option<&Entry> {
        self.entry.first()
    }
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Form(Params),
    Raw {
        content_type: Option<String>,
        bytes: Bytes,
    },
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Relative to the daemon root, e.g. `services/search/jobs`.
    pub path: String,
    pub query: Params,
    pub body: RequestBody,
    pub session_key: Option<String>,
    pub timeout: Option<Duration>,
}

impl UpstreamRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Params::default(),
            body: RequestBody::Empty,
            session_key: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, form: Params) -> Self {
        Self {
            body: RequestBody::Form(form),
            ..Self::new(Method::POST, path)
        }
    }

    pub fn query(mut self, query: Params) -> Self {
        self.query = query;
        self
    }

    pub fn session_key(mut self, key: Option<String>) -> Self {
        self.session_key = key;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn json_output(mut self) -> Self {
        self.query.set("output_mode", "json");
        self
    }
}

/// False when URL normalisation would rewrite `path` before it reaches the
/// daemon: empty, `.` or `..` segments (percent-encoded dots included),
/// backslashes, or query and fragment delimiters. One trailing `/` is fine.
pub fn is_plain_path(path: &str) -> bool {
    let path = path.trim_start_matches('/');
    let path = path.strip_suffix('/').unwrap_or(path);
    !path.contains(['\\', '?', '#'])
        && path.split('/').all(|segment| {
            let dots = segment.to_ascii_lowercase().replace("%2e", ".");
            !segment.is_empty() && dots != "." && dots != ".."
        })
}

#[derive(Clone)]
pub struct SplunkdClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SplunkdClient {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let timeout = config.connection_timeout();
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(ProxyError::internal)?;
        Ok(Self {
            http,
            base_url: config.splunkd_uri.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues the request once and returns whatever came back.
    pub async fn send(&self, request: UpstreamRequest) -> Result<reqwest::Response> {
        if !is_plain_path(&request.path) {
            tracing::warn!(path = %request.path, "refusing upstream path with dot segments");
            return Err(ProxyError::not_found(format!(
                "{} is not a valid endpoint path",
                request.path
            )));
        }
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .timeout(request.timeout.unwrap_or(self.timeout));
        if !request.query.is_empty() {
            builder = builder.query(request.query.pairs());
        }
        match &request.session_key {
            Some(key) => builder = builder.header(AUTHORIZATION, format!("Splunk {key}")),
            None => tracing::warn!(
                method = %request.method,
                path = %request.path,
                "forwarding request without a session key"
            ),
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(form) => builder.form(form.pairs()),
            RequestBody::Raw {
                content_type,
                bytes,
            } => {
                let builder = match content_type {
                    Some(content_type) => builder.header(CONTENT_TYPE, content_type),
                    None => builder,
                };
                builder.body(bytes)
            }
        };
        tracing::debug!(method = %request.method, path = %request.path, "upstream request");
        Ok(builder.send().await?)
    }

    /// Like [`send`](Self::send), but non-2xx becomes [`ProxyError::Upstream`].
    pub async fn send_checked(&self, request: UpstreamRequest) -> Result<reqwest::Response> {
        let response = self.send(request).await?;
        ensure_success(response).await
    }

    /// JSON body of a successful call; `Null` for 204.
    pub async fn json(&self, request: UpstreamRequest) -> Result<Value> {
        let response = self.send_checked(request.json_output()).await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| ProxyError::internal(format!("malformed search daemon reply: {err}")))
    }

    pub async fn envelope(&self, request: UpstreamRequest) -> Result<Envelope> {
        match self.json(request).await? {
            Value::Null => Ok(Envelope::default()),
            value => serde_json::from_value(value).map_err(|err| {
                ProxyError::internal(format!("unexpected search daemon reply: {err}"))
            }),
        }
    }
}

pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let messages = parse_messages(&body);
    tracing::debug!(%status, "search daemon rejected request");
    Err(ProxyError::Upstream { status, messages })
}

/// Message list from an error body; falls back to the body text.
pub fn parse_messages(body: &[u8]) -> Vec<Message> {
    #[derive(Deserialize)]
    struct Messages {
        #[serde(default)]
        messages: Vec<Message>,
    }

    if let Ok(parsed) = serde_json::from_slice::<Messages>(body) {
        return parsed.messages;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Message::error(text.chars().take(512).collect::<String>())]
    }
}
