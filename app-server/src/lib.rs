//! HTTP server hosting the search façade, the dashboard view endpoint, and
//! the forecasting endpoint behind one listener.

pub mod config;
pub mod forecast;
pub mod logging;
pub mod server;
pub mod views;

pub use config::WebConfig;
pub use server::AppState;
pub use server::app;
pub use server::run;
