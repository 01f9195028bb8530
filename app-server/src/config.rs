use anyhow::Context;
use logweb_search_proxy::ProxyConfig;
use logweb_search_proxy::SessionConfig;
use logweb_view::ViewSettings;
use serde::Deserialize;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::Path;

/// Contents of the server's TOML configuration file. Every table is
/// optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub session: SessionConfig,
    pub view: ViewSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directives; `RUST_LOG` takes precedence.
    #[serde(default)]
    pub filter: Option<String>,
}

impl WebConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: WebConfig = toml::from_str(text).context("invalid configuration")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.proxy.validate()?;
        self.session.validate()?;
        if self.view.dashboard_template.trim().is_empty() {
            return Err("view.dashboard_template must not be empty".to_string());
        }
        if self
            .logging
            .filter
            .as_deref()
            .is_some_and(|filter| filter.trim().is_empty())
        {
            return Err("logging.filter must not be empty when set".to_string());
        }
        Ok(())
    }
}
