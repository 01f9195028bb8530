//! Download of job output as a file, streamed straight from the back end.

use crate::assets::Asset;
use crate::assets::OutputMode;
use crate::config::EXPORT_TIME_FORMAT;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::error::Result;
use crate::jobs::fetch_job;
use crate::jobs::job_path;
use crate::jobs::with_job_context;
use crate::params::Params;
use crate::session::SessionSnapshot;
use crate::upstream::SplunkdClient;
use crate::upstream::UpstreamRequest;
use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header::CACHE_CONTROL;
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use bytes::Bytes;
use futures::Stream;
use serde_json::Map;
use serde_json::Value;
use tokio::time::Instant;

/// Every field not starting with an underscore, plus these two.
pub const DEFAULT_FIELD_LIST: &[&str] = &["*", "_time", "_raw"];

pub const MAX_FILENAME_BYTES: usize = 255;

/// Dispatch arguments that must not leak into a re-run export.
const RERUN_STRIPPED_ARGS: &[&str] = &["auto_cancel", "max_count", "output_mode"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportEndpoint {
    /// `search/jobs/export`: runs the search again from scratch.
    Rerun,
    Events,
    Results,
}

fn flag(job: &Map<String, Value>, name: &str) -> bool {
    job.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// The stored output is only good enough when it is complete. Otherwise,
/// unless the job is a report, the search is run again.
pub fn choose_endpoint(job: &Map<String, Value>, asset: Asset, count: Option<u64>) -> ExportEndpoint {
    let has_report_search = job
        .get("reportSearch")
        .and_then(Value::as_str)
        .is_some_and(|search| !search.trim().is_empty());
    let available = job
        .get("eventAvailableCount")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let incomplete = flag(job, "eventIsTruncated")
        || count.is_some_and(|count| count > available)
        || flag(job, "isRemoteTimeline")
        || !flag(job, "isDone");
    if !has_report_search && incomplete {
        ExportEndpoint::Rerun
    } else if asset == Asset::Events {
        ExportEndpoint::Events
    } else {
        ExportEndpoint::Results
    }
}

/// Makes a caller-supplied name safe for a `Content-Disposition` header:
/// no line breaks, quotes or shell separators; whitespace becomes `_`; a
/// slash after a dot is dropped and any other slash becomes `_`; at most
/// 255 bytes.
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\r' | '\n' | '"' | '\'' | ';' | '|' | '&' | '$' | '`' | '<' | '>' => {}
            '/' | '\\' => {
                if !out.ends_with('.') {
                    out.push('_');
                }
            }
            c if c.is_whitespace() => out.push('_'),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    truncate_bytes(&mut out, MAX_FILENAME_BYTES);
    out
}

fn truncate_bytes(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

/// Caller's name when it has one, `<sid>.<ext>` otherwise. Names without
/// an extension get the output mode's.
pub fn export_filename(requested: Option<&str>, sid: &str, mode: OutputMode) -> String {
    let base = requested
        .map(sanitize_filename)
        .filter(|name| !name.is_empty());
    let mut name = match base {
        Some(name) if name.contains('.') => name,
        Some(name) => format!("{name}.{}", mode.extension()),
        None => format!("{}.{}", sanitize_filename(sid), mode.extension()),
    };
    truncate_bytes(&mut name, MAX_FILENAME_BYTES);
    name
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub endpoint: ExportEndpoint,
    pub path: String,
    pub query: Params,
    pub filename: String,
}

pub fn plan_export(
    job: &Map<String, Value>,
    sid: &str,
    asset: Asset,
    mode: OutputMode,
    params: &Params,
) -> Result<ExportPlan> {
    let count = match params.get("count").map(str::trim).filter(|count| !count.is_empty()) {
        Some(count) => Some(
            count
                .parse::<u64>()
                .map_err(|_| ProxyError::invalid(format!("count must be a number, got \"{count}\"")))?,
        ),
        None => None,
    };
    let endpoint = choose_endpoint(job, asset, count);
    let mut query = Params::default();
    let path = match endpoint {
        ExportEndpoint::Rerun => {
            let request = job
                .get("request")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            for (key, value) in request {
                if RERUN_STRIPPED_ARGS.contains(&key.as_str()) {
                    continue;
                }
                let value = match value {
                    Value::String(text) => text,
                    Value::Null => continue,
                    other => other.to_string(),
                };
                query.push(&key, value);
            }
            let search = query
                .get("search")
                .filter(|search| !search.trim().is_empty())
                .ok_or_else(|| ProxyError::internal(format!("job {sid} has no search to re-run")))?
                .to_string();
            if let Some(count) = count {
                query.set("search", format!("{search} | head {count}"));
            }
            "services/search/jobs/export".to_string()
        }
        ExportEndpoint::Events => {
            push_count(&mut query, count);
            format!("{}/events/export", job_path(sid))
        }
        ExportEndpoint::Results => {
            push_count(&mut query, count);
            format!("{}/results/export", job_path(sid))
        }
    };

    match params.get("field_list").filter(|fields| !fields.trim().is_empty()) {
        Some(fields) => {
            for field in fields.split(',').map(str::trim).filter(|field| !field.is_empty()) {
                query.push("f", field);
            }
        }
        None => {
            for field in DEFAULT_FIELD_LIST {
                query.push("f", *field);
            }
        }
    }
    query.set("output_mode", mode.as_str());
    if mode == OutputMode::Xml {
        query.set("export_xml_with_wrapper", "1");
    }
    query.set(
        "time_format",
        params.get("time_format").unwrap_or(EXPORT_TIME_FORMAT),
    );

    Ok(ExportPlan {
        endpoint,
        path,
        query,
        filename: export_filename(params.get("filename"), sid, mode),
    })
}

fn push_count(query: &mut Params, count: Option<u64>) {
    if let Some(count) = count {
        query.set("count", count.to_string());
    }
}

/// Reads the upstream body chunk by chunk until it ends, fails, or the
/// deadline passes. Nothing is buffered beyond the chunk in hand.
pub fn pull_stream(
    response: reqwest::Response,
    deadline: Instant,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send {
    futures::stream::unfold(Some(response), move |state| async move {
        let mut response = state?;
        match tokio::time::timeout_at(deadline, response.chunk()).await {
            Ok(Ok(Some(chunk))) => Some((Ok(chunk), Some(response))),
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "export stream failed");
                Some((Err(std::io::Error::other(err)), None))
            }
            Err(_) => {
                tracing::warn!("export stream hit export_timeout");
                Some((
                    Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "export timed out",
                    )),
                    None,
                ))
            }
        }
    })
}

/// Streams a job asset as an attachment. The caller's session has already
/// been copied out, so no lock is held while the transfer runs.
pub async fn export(
    client: &SplunkdClient,
    config: &ProxyConfig,
    session: &SessionSnapshot,
    sid: &str,
    asset: Asset,
    params: &Params,
) -> Result<Response> {
    let mode = OutputMode::from_params(params)?;
    let job = fetch_job(client, session.session_key.clone(), sid)
        .await?
        .ok_or_else(|| ProxyError::not_found(format!("job {sid} not found")))?;
    let plan = plan_export(&job, sid, asset, mode, params)?;
    tracing::info!(sid, endpoint = ?plan.endpoint, filename = %plan.filename, "starting export");

    let deadline = Instant::now() + config.export_timeout();
    let request = UpstreamRequest::get(plan.path)
        .query(plan.query)
        .session_key(session.session_key.clone())
        .timeout(Some(config.export_timeout()));
    let response = client
        .send_checked(request)
        .await
        .map_err(|err| with_job_context(err, sid))?;
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, mode.content_type())
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", plan.filename),
        )
        .header(CACHE_CONTROL, "no-store")
        .body(Body::from_stream(pull_stream(response, deadline)))
        .map_err(ProxyError::internal)
}
