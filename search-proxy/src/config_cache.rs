use crate::config::ProxyConfig;
use crate::error::Result;
use crate::upstream::SplunkdClient;
use crate::upstream::UpstreamRequest;
use serde_json::Map;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

const WEB_SETTINGS_PATH: &str = "services/configs/conf-web/settings";

/// Key fragments marking settings that never leave the server.
const PRIVATE_KEY_MARKERS: &[&str] = &["password", "pass4symmkey", "secret", "privkey", "token"];

/// Merged web configuration handed to the front end. Filled on first use,
/// then served from memory until [`reload`](Self::reload).
///
/// `conf-web/settings` is read from the global `services/` tree, so every
/// session gets the same copy. Only non-sensitive settings are kept; keys
/// naming passwords, secrets, private keys or tokens are dropped before
/// caching. The lock is never held across the upstream fetch.
#[derive(Default)]
pub struct MergedConfigCache {
    merged: RwLock<Option<Arc<Map<String, Value>>>>,
}

impl MergedConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &self,
        client: &SplunkdClient,
        config: &ProxyConfig,
        session_key: Option<String>,
    ) -> Result<Arc<Map<String, Value>>> {
        if let Some(merged) = self.merged.read().await.as_ref() {
            return Ok(Arc::clone(merged));
        }
        let settings = client
            .envelope(UpstreamRequest::get(WEB_SETTINGS_PATH).session_key(session_key))
            .await?;
        let content = settings
            .first()
            .map(|entry| entry.content.clone())
            .unwrap_or_default();
        let merged = Arc::new(merge(content, config));
        let mut slot = self.merged.write().await;
        if let Some(current) = slot.as_ref() {
            return Ok(Arc::clone(current));
        }
        tracing::info!(keys = merged.len(), "loaded merged web configuration");
        *slot = Some(Arc::clone(&merged));
        Ok(merged)
    }

    /// Forgets the cached copy; the next `get` fetches again.
    pub async fn reload(&self) {
        self.merged.write().await.take();
        tracing::info!("merged web configuration cleared");
    }

    pub async fn is_loaded(&self) -> bool {
        self.merged.read().await.is_some()
    }
}

fn is_private(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    PRIVATE_KEY_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Back-end settings, with the façade's own switches layered on top.
/// `eai:` bookkeeping keys and private settings are dropped.
fn merge(mut settings: Map<String, Value>, config: &ProxyConfig) -> Map<String, Value> {
    settings.retain(|key, _| !key.starts_with("eai:") && !is_private(key));
    settings.insert(
        "enable_proxy_write".to_string(),
        Value::Bool(config.enable_proxy_write),
    );
    settings.insert(
        "default_namespace".to_string(),
        Value::String(config.default_app.clone()),
    );
    settings.insert("compat_mode".to_string(), Value::Bool(config.compat_mode));
    settings.insert(
        "export_timeout".to_string(),
        Value::from(config.export_timeout),
    );
    settings
}
