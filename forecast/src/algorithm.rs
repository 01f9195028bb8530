use crate::error::ForecastError;
use crate::error::Result;
use crate::local_level::LocalLevel;
use crate::local_trend::LocalLinearTrend;
use crate::mixed::Mixed;
use crate::model::ForecastModel;
use crate::periodic::Periodic;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Local level.
    #[serde(rename = "LL")]
    Ll,
    /// Local linear trend.
    #[serde(rename = "LLT")]
    Llt,
    /// Seasonal local level.
    #[serde(rename = "LLP")]
    Llp,
    /// Local level mixed with the seasonal model once it has enough data.
    #[serde(rename = "LLP2")]
    Llp2,
    /// Local linear trend mixed with the seasonal model.
    #[serde(rename = "LLP5")]
    Llp5,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Ll,
        Algorithm::Llt,
        Algorithm::Llp,
        Algorithm::Llp2,
        Algorithm::Llp5,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Ll => "LL",
            Algorithm::Llt => "LLT",
            Algorithm::Llp => "LLP",
            Algorithm::Llp2 => "LLP2",
            Algorithm::Llp5 => "LLP5",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ForecastError;

    fn from_str(value: &str) -> Result<Self> {
        let upper = value.trim().to_ascii_uppercase();
        Algorithm::ALL
            .into_iter()
            .find(|alg| alg.as_str() == upper)
            .ok_or_else(|| ForecastError::UnknownAlgorithm(value.to_string()))
    }
}

/// Builds and fits the model for `algorithm`.
///
/// The mixed algorithms fall back to their non-seasonal half when no period
/// is found or the series is too short for the seasonal model.
pub fn build_model(
    algorithm: Algorithm,
    data: &[f64],
    forecast_len: usize,
    period: Option<usize>,
) -> Result<Box<dyn ForecastModel>> {
    match algorithm {
        Algorithm::Ll => Ok(Box::new(LocalLevel::new(data, forecast_len)?)),
        Algorithm::Llt => Ok(Box::new(LocalLinearTrend::new(data, forecast_len)?)),
        Algorithm::Llp => Ok(Box::new(Periodic::new(data, forecast_len, period)?)),
        Algorithm::Llp2 => {
            let level: Box<dyn ForecastModel> = Box::new(LocalLevel::new(data, forecast_len)?);
            with_seasonal("LLP2", level, data, forecast_len, period)
        }
        Algorithm::Llp5 => {
            let trend: Box<dyn ForecastModel> =
                Box::new(LocalLinearTrend::new(data, forecast_len)?);
            with_seasonal("LLP5", trend, data, forecast_len, period)
        }
    }
}

fn with_seasonal(
    name: &'static str,
    base: Box<dyn ForecastModel>,
    data: &[f64],
    forecast_len: usize,
    period: Option<usize>,
) -> Result<Box<dyn ForecastModel>> {
    match Periodic::new(data, forecast_len, period) {
        Ok(seasonal) => Ok(Box::new(Mixed::new(name, base, Box::new(seasonal))?)),
        Err(ForecastError::NoPeriod | ForecastError::InsufficientData { .. }) => {
            tracing::debug!(algorithm = name, "seasonal model unavailable; using base model");
            Ok(base)
        }
        Err(err) => Err(err),
    }
}
