use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Upstream calls never time out faster than this, whatever the file says.
pub const MIN_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// ISO-8601 with microseconds, in the back end's strftime dialect.
pub const EXPORT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%6N%:z";

/// Settings for the search façade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Base URI of the back-end search daemon
    #[serde(default = "default_splunkd_uri")]
    pub splunkd_uri: String,

    /// Allow POST/DELETE through the generic proxy
    #[serde(default)]
    pub enable_proxy_write: bool,

    /// Seconds; values below the floor are raised to it
    #[serde(default = "default_connection_timeout")]
    pub splunkd_connection_timeout: u64,

    /// Seconds an export stream may stay open
    #[serde(default = "default_export_timeout")]
    pub export_timeout: u64,

    #[serde(default = "default_dispatch_time_format")]
    pub dispatch_time_format: String,

    /// Namespace used when a dispatch does not name one
    #[serde(default = "default_app")]
    pub default_app: String,

    #[serde(default = "default_max_events")]
    pub default_max_events: u64,

    /// Root under which module stylesheets must live
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,

    /// Flatten JSON assets into the older result-list shape
    #[serde(default)]
    pub compat_mode: bool,

    /// Accept self-signed daemon certificates; off unless set
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_splunkd_uri() -> String {
    "https://127.0.0.1:8089".to_string()
}

fn default_connection_timeout() -> u64 {
    MIN_CONNECTION_TIMEOUT_SECS
}

fn default_export_timeout() -> u64 {
    3600
}

fn default_dispatch_time_format() -> String {
    "%s.%Q".to_string()
}

fn default_app() -> String {
    "search".to_string()
}

fn default_max_events() -> u64 {
    10_000
}

fn default_install_root() -> PathBuf {
    PathBuf::from("/opt/logweb")
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            splunkd_uri: default_splunkd_uri(),
            enable_proxy_write: false,
            splunkd_connection_timeout: default_connection_timeout(),
            export_timeout: default_export_timeout(),
            dispatch_time_format: default_dispatch_time_format(),
            default_app: default_app(),
            default_max_events: default_max_events(),
            install_root: default_install_root(),
            compat_mode: false,
            accept_invalid_certs: false,
        }
    }
}

impl ProxyConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(
            self.splunkd_connection_timeout
                .max(MIN_CONNECTION_TIMEOUT_SECS),
        )
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout)
    }

    pub fn validate(&self) -> Result<(), String> {
        let uri = Url::parse(&self.splunkd_uri)
            .map_err(|err| format!("splunkd_uri {:?} is not a URL: {err}", self.splunkd_uri))?;
        if !matches!(uri.scheme(), "http" | "https") {
            return Err(format!(
                "splunkd_uri must use http or https, got {}",
                uri.scheme()
            ));
        }

        if self.export_timeout == 0 {
            return Err("export_timeout must be > 0".to_string());
        }

        if self.default_max_events == 0 {
            return Err("default_max_events must be > 0".to_string());
        }

        if self.dispatch_time_format.trim().is_empty() {
            return Err("dispatch_time_format must not be empty".to_string());
        }

        if self.default_app.trim().is_empty() {
            return Err("default_app must not be empty".to_string());
        }

        Ok(())
    }
}

/// Cookie and header names the façade reads on every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default = "default_form_key_cookie")]
    pub form_key_cookie: String,

    #[serde(default = "default_form_key_header")]
    pub form_key_header: String,
}

fn default_cookie_name() -> String {
    "session_id".to_string()
}

fn default_form_key_cookie() -> String {
    "splunkweb_csrf_token".to_string()
}

fn default_form_key_header() -> String {
    "X-Splunk-Form-Key".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            form_key_cookie: default_form_key_cookie(),
            form_key_header: default_form_key_header(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (key, value) in [
            ("cookie_name", &self.cookie_name),
            ("form_key_cookie", &self.form_key_cookie),
            ("form_key_header", &self.form_key_header),
        ] {
            if value.trim().is_empty() {
                return Err(format!("session.{key} must not be empty"));
            }
        }
        if axum::http::HeaderName::from_bytes(self.form_key_header.as_bytes()).is_err() {
            return Err(format!(
                "session.form_key_header {:?} is not a valid header name",
                self.form_key_header
            ));
        }
        Ok(())
    }
}
