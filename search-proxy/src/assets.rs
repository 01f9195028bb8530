//! Job assets: events, results, preview, summary, timeline and the search log.

use crate::config::ProxyConfig;
use crate::csrf::FORM_KEY_FIELD;
use crate::error::ProxyError;
use crate::error::Result;
use crate::jobs::job_path;
use crate::jobs::with_job_context;
use crate::params::Params;
use crate::upstream::SplunkdClient;
use crate::upstream::UpstreamRequest;
use axum::Json;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::Value;
use std::path::Path;
use std::path::PathBuf;

/// Header naming the UI module whose stylesheet an `xsl` argument refers to.
pub const MODULE_HEADER: &str = "X-Splunk-Module";

/// Module stylesheets live below this directory of the install root.
pub const MODULES_DIR: &str = "share/logweb/modules";

/// Arguments consumed by the façade rather than forwarded.
const LOCAL_ARGS: &[&str] = &[
    "outputMode",
    "output_mode",
    "isDownload",
    "xsl",
    "oid",
    "_",
    "filename",
    FORM_KEY_FIELD,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Events,
    Results,
    ResultsPreview,
    Summary,
    Timeline,
    SearchLog,
}

impl Asset {
    pub const ALL: [Asset; 6] = [
        Asset::Events,
        Asset::Results,
        Asset::ResultsPreview,
        Asset::Summary,
        Asset::Timeline,
        Asset::SearchLog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Asset::Events => "events",
            Asset::Results => "results",
            Asset::ResultsPreview => "results_preview",
            Asset::Summary => "summary",
            Asset::Timeline => "timeline",
            Asset::SearchLog => "search.log",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|asset| asset.as_str() == name)
            .ok_or_else(|| ProxyError::not_found(format!("unknown job asset \"{name}\"")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Xml,
    Json,
    Csv,
    Raw,
}

impl OutputMode {
    pub fn parse(mode: Option<&str>) -> Result<Self> {
        match mode.map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("xml") => Ok(OutputMode::Xml),
            Some("json") => Ok(OutputMode::Json),
            Some("csv") => Ok(OutputMode::Csv),
            Some("raw") => Ok(OutputMode::Raw),
            Some(other) => Err(ProxyError::invalid(format!("unsupported output mode \"{other}\""))),
        }
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::parse(params.first_of(&["outputMode", "output_mode"]))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::Xml => "xml",
            OutputMode::Json => "json",
            OutputMode::Csv => "csv",
            OutputMode::Raw => "raw",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputMode::Xml => "text/xml; charset=utf-8",
            OutputMode::Json => "application/json",
            OutputMode::Csv => "text/csv; charset=utf-8",
            OutputMode::Raw => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputMode::Raw => "txt",
            other => other.as_str(),
        }
    }
}

/// XSLT engine used for module stylesheets. The façade only locates the
/// stylesheet and feeds it the asset XML.
pub trait XslTransform: Send + Sync {
    fn transform(&self, stylesheet: &Path, xml: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// Resolves `<install_root>/share/logweb/modules/<module>/<xsl>` and refuses
/// anything that ends up outside the install root.
pub async fn resolve_stylesheet(install_root: &Path, module: &str, xsl: &str) -> Result<PathBuf> {
    let root = tokio::fs::canonicalize(install_root).await.map_err(|err| {
        ProxyError::internal(format!(
            "install root {} is not accessible: {err}",
            install_root.display()
        ))
    })?;
    let candidate = root.join(MODULES_DIR).join(module).join(xsl);
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|err| ProxyError::internal(format!("stylesheet {xsl} cannot be read: {err}")))?;
    if !resolved.starts_with(&root) {
        tracing::warn!(module, xsl, "stylesheet resolves outside the install root");
        return Err(ProxyError::internal(format!(
            "stylesheet {xsl} is outside the install root"
        )));
    }
    Ok(resolved)
}

/// Keeps only the `results` list of a JSON asset, the shape older clients
/// expect.
pub fn flatten_compat(value: Value) -> Value {
    match value {
        Value::Object(mut fields) => match fields.remove("results") {
            Some(results @ Value::Array(_)) => results,
            Some(other) => {
                fields.insert("results".to_string(), other);
                Value::Object(fields)
            }
            None => Value::Object(fields),
        },
        other => other,
    }
}

pub struct AssetRequest<'a> {
    pub sid: &'a str,
    pub asset: Asset,
    pub params: &'a Params,
    pub module: Option<&'a str>,
    pub session_key: Option<String>,
}

pub async fn fetch_asset(
    client: &SplunkdClient,
    config: &ProxyConfig,
    xsl: Option<&dyn XslTransform>,
    request: AssetRequest<'_>,
) -> Result<Response> {
    let mode = OutputMode::from_params(request.params)?;
    let mut query = request.params.clone().without(LOCAL_ARGS);
    query.set("output_mode", mode.as_str());
    let path = format!("{}/{}", job_path(request.sid), request.asset.as_str());
    let sid = request.sid;

    if let Some(stylesheet) = request.params.get("xsl").filter(|xsl| !xsl.is_empty()) {
        let module = request
            .module
            .filter(|module| !module.is_empty())
            .ok_or_else(|| {
                ProxyError::invalid(format!("xsl requires the {MODULE_HEADER} header"))
            })?;
        let stylesheet = resolve_stylesheet(&config.install_root, module, stylesheet).await?;
        let transformer =
            xsl.ok_or_else(|| ProxyError::internal("no XSL transformer is configured"))?;
        query.set("output_mode", OutputMode::Xml.as_str());
        let upstream = UpstreamRequest::get(path)
            .query(query)
            .session_key(request.session_key);
        let xml = client
            .send_checked(upstream)
            .await
            .map_err(|err| with_job_context(err, sid))?
            .bytes()
            .await?;
        let html = transformer
            .transform(&stylesheet, &xml)
            .map_err(|err| ProxyError::internal(format!("{err:#}")))?;
        return Ok(([(CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response());
    }

    let upstream = UpstreamRequest::get(path)
        .query(query)
        .session_key(request.session_key);
    if mode == OutputMode::Json && config.compat_mode {
        let value = client
            .json(upstream)
            .await
            .map_err(|err| with_job_context(err, sid))?;
        return Ok(Json(flatten_compat(value)).into_response());
    }

    let response = client
        .send_checked(upstream)
        .await
        .map_err(|err| with_job_context(err, sid))?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(mode.content_type())
        .to_string();
    Response::builder()
        .status(response.status())
        .header(CONTENT_TYPE, content_type)
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(ProxyError::internal)
}
