use crate::assets::XslTransform;
use crate::config::ProxyConfig;
use crate::config::SessionConfig;
use crate::config_cache::MergedConfigCache;
use crate::credentials::CredentialCache;
use crate::csrf;
use crate::error::Result;
use crate::session::SessionSnapshot;
use crate::session::SessionStore;
use crate::session::cookie;
use crate::upstream::SplunkdClient;
use axum::http::HeaderMap;
use std::sync::Arc;

/// Everything a façade handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<ProxyConfig>,
    pub session_config: Arc<SessionConfig>,
    pub client: SplunkdClient,
    pub sessions: Arc<dyn SessionStore>,
    pub credentials: Arc<CredentialCache>,
    pub config_cache: Arc<MergedConfigCache>,
    pub xsl: Option<Arc<dyn XslTransform>>,
}

impl ProxyState {
    pub fn new(
        config: ProxyConfig,
        session_config: SessionConfig,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let client = SplunkdClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            session_config: Arc::new(session_config),
            client,
            sessions,
            credentials: Arc::new(CredentialCache::new()),
            config_cache: Arc::new(MergedConfigCache::new()),
            xsl: None,
        })
    }

    pub fn with_xsl_transform(mut self, transform: Arc<dyn XslTransform>) -> Self {
        self.xsl = Some(transform);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<CredentialCache>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        cookie(headers, &self.session_config.cookie_name).filter(|id| !id.is_empty())
    }

    pub async fn snapshot(&self, headers: &HeaderMap) -> SessionSnapshot {
        SessionSnapshot::capture(self.sessions.as_ref(), self.session_id(headers)).await
    }

    pub fn verify_csrf(&self, headers: &HeaderMap, form_key: Option<&str>) -> Result<()> {
        csrf::verify(headers, form_key, &self.session_config)
    }
}
