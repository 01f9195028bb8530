use crate::config::SessionConfig;
use crate::error::ProxyError;
use crate::error::Result;
use crate::session::cookie;
use axum::http::HeaderMap;
use rand::Rng as _;

/// Form field that may carry the key instead of the header.
pub const FORM_KEY_FIELD: &str = "splunk_form_key";

/// Compares in time proportional to the expected key only.
pub fn keys_match(expected: &str, presented: &str) -> bool {
    let expected = expected.as_bytes();
    let presented = presented.as_bytes();
    let mut diff = expected.len() ^ presented.len();
    for (index, byte) in expected.iter().enumerate() {
        let other = presented.get(index).copied().unwrap_or(0);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}

/// The form-key cookie must be present and equal to the key sent in the
/// header or, failing that, in the `splunk_form_key` field.
pub fn verify(headers: &HeaderMap, form_key_field: Option<&str>, config: &SessionConfig) -> Result<()> {
    let Some(expected) = cookie(headers, &config.form_key_cookie).filter(|key| !key.is_empty())
    else {
        tracing::debug!("request carries no form key cookie");
        return Err(ProxyError::AuthFailed);
    };
    let presented = headers
        .get(config.form_key_header.as_str())
        .and_then(|value| value.to_str().ok())
        .or(form_key_field);
    match presented {
        Some(presented) if keys_match(&expected, presented) => Ok(()),
        _ => {
            tracing::debug!("form key mismatch");
            Err(ProxyError::AuthFailed)
        }
    }
}

pub fn new_form_key() -> String {
    let value: u128 = rand::rng().random();
    value.to_string()
}
