use crate::error::ProxyError;
use crate::error::Result;
use crate::params::Params;
use crate::session::SessionSnapshot;
use crate::upstream::SplunkdClient;
use crate::upstream::UpstreamRequest;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_COUNT: &str = "50";
const FORWARDED_ARGS: &[&str] = &["count", "max_time", "earliest_time", "latest_time"];

/// One completion, in the shape the search bar consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub count: String,
    pub result: String,
    pub value: String,
    pub data: Vec<String>,
}

impl Suggestion {
    pub fn new(content: &str, count: i64) -> Self {
        let count = format_count(count);
        let value = format!("{content} ({count})");
        Self {
            data: vec![value.clone()],
            value,
            result: content.to_string(),
            count,
        }
    }
}

/// en-US grouping: `1234567` → `1,234,567`.
pub fn format_count(count: i64) -> String {
    let digits = count.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if count < 0 {
        out.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

fn upstream_path(namespace: Option<&str>) -> String {
    match namespace {
        Some(namespace) => format!(
            "servicesNS/-/{}/search/typeahead",
            urlencoding::encode(namespace)
        ),
        None => "services/search/typeahead".to_string(),
    }
}

pub async fn typeahead(
    client: &SplunkdClient,
    session: &SessionSnapshot,
    params: &Params,
    timeout: Option<Duration>,
) -> Result<Vec<Suggestion>> {
    let prefix = params
        .get("q")
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ProxyError::invalid("typeahead needs a q argument"))?;
    let prefix = match params.get("index").filter(|index| !index.is_empty()) {
        Some(index) if !prefix.contains("index=") => format!("index={index} {prefix}"),
        _ => prefix.to_string(),
    };

    let mut query = Params::default();
    query.push("prefix", prefix);
    for name in FORWARDED_ARGS {
        if let Some(value) = params.get(name).filter(|value| !value.is_empty()) {
            query.push(name, value);
        }
    }
    query.set_default("count", DEFAULT_COUNT);

    let namespace = params.get("namespace").filter(|namespace| !namespace.is_empty());
    let request = UpstreamRequest::get(upstream_path(namespace))
        .query(query)
        .session_key(session.session_key.clone())
        .timeout(timeout);
    let reply = client.json(request).await?;
    Ok(suggestions(&reply))
}

/// An empty (204) reply means no suggestions.
pub fn suggestions(reply: &Value) -> Vec<Suggestion> {
    reply
        .get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|result| {
                    let content = result.get("content").and_then(Value::as_str)?;
                    let count = match result.get("count") {
                        Some(Value::Number(number)) => number.as_i64().unwrap_or(0),
                        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
                        _ => 0,
                    };
                    Some(Suggestion::new(content, count))
                })
                .collect()
        })
        .unwrap_or_default()
}
