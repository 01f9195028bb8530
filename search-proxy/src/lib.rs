//! Search façade in front of the back-end search daemon: request whitelist,
//! CSRF checks, job dispatch and control, asset streaming and exports.

pub mod assets;
pub mod auth;
pub mod config;
pub mod config_cache;
pub mod credentials;
pub mod csrf;
pub mod error;
pub mod export;
pub mod jobs;
pub mod params;
pub mod proxy;
pub mod routes;
pub mod session;
pub mod state;
pub mod typeahead;
pub mod upstream;
pub mod whitelist;

pub use assets::XslTransform;
pub use config::ProxyConfig;
pub use config::SessionConfig;
pub use error::ApiError;
pub use error::ProxyError;
pub use routes::router;
pub use session::InMemorySessionStore;
pub use session::SessionStore;
pub use state::ProxyState;
