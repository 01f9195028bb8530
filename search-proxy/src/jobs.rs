//! Dispatch, polling and control of search jobs.

use crate::config::ProxyConfig;
use crate::csrf::FORM_KEY_FIELD;
use crate::error::Message;
use crate::error::ProxyError;
use crate::error::Result;
use crate::params::Params;
use crate::session::SessionSnapshot;
use crate::upstream::SplunkdClient;
use crate::upstream::UpstreamRequest;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use sha2::Digest;
use sha2::Sha256;
use std::time::Duration;

pub const REQUIRED_DISPATCH_ARGS: &[&str] =
    &["search", "status_buckets", "earliest_time", "latest_time"];

/// Marker key on listing entries for sids the back end does not know.
pub const NOT_FOUND_MARKER: &str = "__notfound__";

const BOOL_FIELDS: &[&str] = &[
    "eventIsStreaming",
    "eventIsTruncated",
    "isBatchModeSearch",
    "isDone",
    "isFailed",
    "isFinalized",
    "isPaused",
    "isPreviewEnabled",
    "isRealTimeSearch",
    "isRemoteTimeline",
    "isSaved",
    "isSavedSearch",
    "isZombie",
    "resultIsStreaming",
];

const INT_FIELDS: &[&str] = &[
    "diskUsage",
    "eventAvailableCount",
    "eventCount",
    "eventFieldCount",
    "priority",
    "resultCount",
    "resultPreviewCount",
    "scanCount",
    "statusBuckets",
    "ttl",
];

const FLOAT_FIELDS: &[&str] = &["doneProgress", "runDuration"];

const PERFORMANCE_INT_FIELDS: &[&str] = &["invocations", "input_count", "output_count"];

/// States in which a freshly dispatched job has no useful counters yet.
const STARTING_STATES: &[&str] = &["QUEUED", "PARSING"];
const WAIT_ATTEMPTS: usize = 20;
const WAIT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Cancel,
    Pause,
    Unpause,
    Finalize,
    Save,
    Touch,
    Ttl,
    MakeWorldReadable,
    UndoWorldReadable,
}

impl JobAction {
    pub const ALL: [JobAction; 9] = [
        JobAction::Cancel,
        JobAction::Pause,
        JobAction::Unpause,
        JobAction::Finalize,
        JobAction::Save,
        JobAction::Touch,
        JobAction::Ttl,
        JobAction::MakeWorldReadable,
        JobAction::UndoWorldReadable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobAction::Cancel => "cancel",
            JobAction::Pause => "pause",
            JobAction::Unpause => "unpause",
            JobAction::Finalize => "finalize",
            JobAction::Save => "save",
            JobAction::Touch => "touch",
            JobAction::Ttl => "ttl",
            JobAction::MakeWorldReadable => "makeWorldReadable",
            JobAction::UndoWorldReadable => "undoWorldReadable",
        }
    }

    pub fn parse(action: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == action)
            .ok_or_else(|| ProxyError::invalid(format!("unknown job action \"{action}\"")))
    }
}

pub fn job_path(sid: &str) -> String {
    format!("services/search/jobs/{}", urlencoding::encode(sid))
}

pub(crate) fn with_job_context(err: ProxyError, sid: &str) -> ProxyError {
    match err {
        ProxyError::Upstream { status, .. } if status == StatusCode::NOT_FOUND => {
            ProxyError::not_found(format!("job {sid} not found"))
        }
        other => other,
    }
}

/// Starts a search and returns its sid.
pub async fn dispatch(
    client: &SplunkdClient,
    config: &ProxyConfig,
    session: &SessionSnapshot,
    args: Params,
) -> Result<String> {
    for name in REQUIRED_DISPATCH_ARGS {
        if args.get(name).is_none_or(|value| value.trim().is_empty()) {
            return Err(ProxyError::invalid(format!(
                "missing required dispatch argument: {name}"
            )));
        }
    }
    let mut args = args.without(&[FORM_KEY_FIELD, "output_mode", "outputMode"]);
    let owner = args
        .remove("owner")
        .filter(|owner| !owner.is_empty())
        .unwrap_or_else(|| session.owner().to_string());
    let namespace = args
        .remove("namespace")
        .filter(|namespace| !namespace.is_empty())
        .unwrap_or_else(|| config.default_app.clone());
    let max_events = args
        .remove("maxEvents")
        .unwrap_or_else(|| config.default_max_events.to_string());
    args.set_default("max_count", max_events);
    args.set_default("time_format", config.dispatch_time_format.as_str());

    let path = format!(
        "servicesNS/{}/{}/search/jobs",
        urlencoding::encode(&owner),
        urlencoding::encode(&namespace)
    );
    let reply = client
        .json(UpstreamRequest::post(path, args).session_key(session.session_key.clone()))
        .await?;
    let sid = reply
        .get("sid")
        .and_then(Value::as_str)
        .ok_or_else(|| ProxyError::internal("dispatch reply did not include a sid"))?;
    tracing::info!(sid, owner = %owner, namespace = %namespace, "dispatched search");
    Ok(sid.to_string())
}

/// One job as the front end sees it, with native field types, or `None`
/// when the back end does not know the sid.
pub async fn fetch_job(
    client: &SplunkdClient,
    session_key: Option<String>,
    sid: &str,
) -> Result<Option<Map<String, Value>>> {
    let result = client
        .envelope(UpstreamRequest::get(job_path(sid)).session_key(session_key))
        .await;
    let envelope = match result {
        Ok(envelope) => envelope,
        Err(ProxyError::Upstream { status, .. }) if status == StatusCode::NOT_FOUND => {
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let Some(entry) = envelope.first() else {
        return Ok(None);
    };
    let mut job = entry.content.clone();
    coerce_job_fields(&mut job);
    job.insert("sid".to_string(), Value::String(sid.to_string()));
    if !entry.acl.is_empty() {
        job.insert("eaiacl".to_string(), Value::Object(entry.acl.clone()));
    }
    Ok(Some(job))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobListing {
    pub jobs: Vec<Value>,
    /// False when any sid was unknown; such listings carry no ETag.
    pub cacheable: bool,
}

impl JobListing {
    /// Quoted SHA-256 over the listing with `ttl` removed, so the tag only
    /// changes when something other than the countdown does.
    pub fn etag(&self) -> Option<String> {
        if !self.cacheable {
            return None;
        }
        let stripped: Vec<Value> = self
            .jobs
            .iter()
            .map(|job| {
                let mut job = job.clone();
                if let Some(fields) = job.as_object_mut() {
                    fields.remove("ttl");
                }
                job
            })
            .collect();
        let encoded = serde_json::to_vec(&stripped).ok()?;
        let digest = Sha256::digest(&encoded);
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        Some(format!("\"{hex}\""))
    }
}

/// Fetches `sids` in the order given. With `wait`, jobs that are still
/// queued or parsing are polled briefly before being reported.
pub async fn list_jobs(
    client: &SplunkdClient,
    session: &SessionSnapshot,
    sids: &[String],
    wait: bool,
) -> Result<JobListing> {
    let mut jobs = Vec::with_capacity(sids.len());
    let mut cacheable = true;
    for sid in sids {
        let mut job = fetch_job(client, session.session_key.clone(), sid).await?;
        if wait {
            let mut attempts = 0;
            while attempts < WAIT_ATTEMPTS && job.as_ref().is_some_and(is_starting) {
                tokio::time::sleep(WAIT_INTERVAL).await;
                job = fetch_job(client, session.session_key.clone(), sid).await?;
                attempts += 1;
            }
        }
        match job {
            Some(job) => jobs.push(Value::Object(job)),
            None => {
                cacheable = false;
                jobs.push(json!({ "sid": sid, NOT_FOUND_MARKER: true }));
            }
        }
    }
    Ok(JobListing { jobs, cacheable })
}

fn is_starting(job: &Map<String, Value>) -> bool {
    job.get("dispatchState")
        .and_then(Value::as_str)
        .is_some_and(|state| STARTING_STATES.contains(&state))
}

/// Runs one control action against a job and returns the back end's messages.
pub async fn control_job(
    client: &SplunkdClient,
    session: &SessionSnapshot,
    sid: &str,
    action: JobAction,
    ttl: Option<&str>,
) -> Result<Vec<Message>> {
    let result = match action {
        JobAction::MakeWorldReadable => set_world_readable(client, session, sid, true).await,
        JobAction::UndoWorldReadable => set_world_readable(client, session, sid, false).await,
        _ => {
            let mut form = Params::default();
            form.push("action", action.as_str());
            if action == JobAction::Ttl {
                let ttl = ttl
                    .map(str::trim)
                    .filter(|ttl| ttl.parse::<u64>().is_ok())
                    .ok_or_else(|| {
                        ProxyError::invalid("the ttl action needs a whole number of seconds")
                    })?;
                form.push("ttl", ttl);
            }
            let path = format!("{}/control", job_path(sid));
            client
                .json(UpstreamRequest::post(path, form).session_key(session.session_key.clone()))
                .await
                .map(|reply| messages_of(&reply))
        }
    };
    let messages = result.map_err(|err| with_job_context(err, sid))?;
    tracing::info!(sid, action = action.as_str(), "job control");
    Ok(messages)
}

/// Rewrites the job ACL so everyone (or only the owner) may read it.
async fn set_world_readable(
    client: &SplunkdClient,
    session: &SessionSnapshot,
    sid: &str,
    readable: bool,
) -> Result<Vec<Message>> {
    let job = fetch_job(client, session.session_key.clone(), sid)
        .await?
        .ok_or_else(|| ProxyError::not_found(format!("job {sid} not found")))?;
    let acl = job.get("eaiacl").and_then(Value::as_object);
    let owner = acl
        .and_then(|acl| acl.get("owner"))
        .and_then(Value::as_str)
        .unwrap_or_else(|| session.owner())
        .to_string();
    let write = acl
        .and_then(|acl| acl.get("perms"))
        .and_then(|perms| perms.get("write"))
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(",")
        })
        .filter(|roles| !roles.is_empty())
        .unwrap_or_else(|| owner.clone());

    let mut form = Params::default();
    form.push("sharing", "global");
    form.push("owner", owner.as_str());
    form.push("perms.read", if readable { "*" } else { owner.as_str() });
    form.push("perms.write", write);
    let path = format!("{}/acl", job_path(sid));
    let reply = client
        .json(UpstreamRequest::post(path, form).session_key(session.session_key.clone()))
        .await?;
    Ok(messages_of(&reply))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub sid: String,
    pub success: bool,
    pub messages: Vec<Message>,
}

/// Applies one action to many jobs; failures are reported per sid.
pub async fn batch_control(
    client: &SplunkdClient,
    session: &SessionSnapshot,
    sids: &[String],
    action: JobAction,
    ttl: Option<&str>,
) -> Vec<BatchItem> {
    let mut items = Vec::with_capacity(sids.len());
    for sid in sids {
        let item = match control_job(client, session, sid, action, ttl).await {
            Ok(messages) => BatchItem {
                sid: sid.clone(),
                success: true,
                messages,
            },
            Err(err) => BatchItem {
                sid: sid.clone(),
                success: false,
                messages: err.messages(),
            },
        };
        items.push(item);
    }
    items
}

fn messages_of(reply: &Value) -> Vec<Message> {
    reply
        .get("messages")
        .cloned()
        .and_then(|messages| serde_json::from_value(messages).ok())
        .unwrap_or_default()
}

/// Converts the string-typed fields the back end reports into JSON bools and
/// numbers.
pub fn coerce_job_fields(job: &mut Map<String, Value>) {
    coerce(job, BOOL_FIELDS, as_bool);
    coerce(job, INT_FIELDS, as_int);
    coerce(job, FLOAT_FIELDS, as_float);
    if let Some(Value::Object(components)) = job.get_mut("performance") {
        for stats in components.values_mut().filter_map(Value::as_object_mut) {
            coerce(stats, PERFORMANCE_INT_FIELDS, as_int);
            coerce(stats, &["duration_secs"], as_float);
        }
    }
}

fn coerce<T: Into<Value>>(
    fields: &mut Map<String, Value>,
    names: &[&str],
    convert: fn(&Value) -> Option<T>,
) {
    for name in names {
        if let Some(coerced) = fields.get(*name).and_then(convert) {
            fields.insert((*name).to_string(), coerced.into());
        }
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" => Some(true),
            "0" | "false" | "f" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|n| n as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(|n| n as i64))
        }
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}
