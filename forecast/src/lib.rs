//! State-space forecasting: local level, local linear trend and seasonal
//! Kalman-filter models, plus inverse-variance mixing between them.

mod algorithm;
mod error;
mod local_level;
mod local_trend;
mod mixed;
mod model;
mod optimize;
mod periodic;
pub mod stats;

pub use algorithm::Algorithm;
pub use algorithm::build_model;
pub use error::ForecastError;
pub use error::Result;
pub use local_level::LocalLevel;
pub use local_trend::LocalLinearTrend;
pub use mixed::Estimate;
pub use mixed::Mixed;
pub use mixed::mix;
pub use model::ForecastModel;
pub use model::MAX_FORECAST_LEN;
pub use model::z_score;
pub use optimize::Minimum;
pub use optimize::bfgs;
pub use periodic::Periodic;
pub use stats::find_period;
