use axum::Json;
use axum::extract::Query;
use logweb_forecast::Algorithm;
use logweb_forecast::ForecastError;
use logweb_forecast::ForecastModel;
use logweb_forecast::build_model;
use logweb_search_proxy::ApiError;
use logweb_search_proxy::ProxyError;
use logweb_search_proxy::error::ErrorFormat;
use serde::Deserialize;
use serde::Serialize;

const DEFAULT_CONFIDENCE: f64 = 95.0;
/// Longest series `/forecast` will fit.
pub const MAX_DATA_POINTS: usize = 10_000;
/// Furthest horizon `/forecast` will extend to.
pub const MAX_REQUEST_FORECAST_LEN: usize = 1_000;

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastRequest {
    pub algorithm: String,
    pub data: Vec<f64>,
    #[serde(default)]
    pub forecast_len: usize,
    #[serde(default)]
    pub period: Option<usize>,
    /// Percent, in (0, 100).
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Per-index series. Entries the model leaves undefined are `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResponse {
    pub algorithm: Algorithm,
    pub fc: Vec<Option<f64>>,
    pub p: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub period: Option<usize>,
    pub first_forecast_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    output_mode: Option<String>,
}

fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl ForecastRequest {
    fn check_limits(&self) -> Result<(), String> {
        if self.data.len() > MAX_DATA_POINTS {
            return Err(format!(
                "data has {} points; at most {MAX_DATA_POINTS} are accepted",
                self.data.len()
            ));
        }
        if self.forecast_len > MAX_REQUEST_FORECAST_LEN {
            return Err(format!(
                "forecast_len {} exceeds the limit of {MAX_REQUEST_FORECAST_LEN}",
                self.forecast_len
            ));
        }
        Ok(())
    }
}

pub fn run_forecast(request: &ForecastRequest) -> Result<ForecastResponse, ForecastError> {
    let algorithm: Algorithm = request.algorithm.parse()?;
    let confidence = request.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    logweb_forecast::z_score(confidence)?;
    let model = build_model(algorithm, &request.data, request.forecast_len, request.period)?;
    summarize(algorithm, model.as_ref(), confidence)
}

fn summarize(
    algorithm: Algorithm,
    model: &dyn ForecastModel,
    confidence: f64,
) -> Result<ForecastResponse, ForecastError> {
    let first = model.first_forecast_index();
    let mut lower = Vec::with_capacity(model.len());
    let mut upper = Vec::with_capacity(model.len());
    for index in 0..model.len() {
        if index < first || !model.states()[index].is_finite() {
            lower.push(None);
            upper.push(None);
            continue;
        }
        let (low, high) = model.confidence_interval(index, confidence)?;
        lower.push(defined(low));
        upper.push(defined(high));
    }
    Ok(ForecastResponse {
        algorithm,
        fc: model.states().iter().copied().map(defined).collect(),
        p: model.variances().iter().copied().map(defined).collect(),
        lower,
        upper,
        period: model.period(),
        first_forecast_index: first,
    })
}

/// `POST /forecast`. Fitting is CPU-bound, so it runs off the async workers.
pub async fn forecast_handler(
    Query(query): Query<ForecastQuery>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let format = ErrorFormat::from_output_mode(query.output_mode.as_deref());
    if let Err(message) = request.check_limits() {
        tracing::debug!("forecast rejected: {message}");
        return Err(ProxyError::invalid(message).in_format(format));
    }
    let result = tokio::task::spawn_blocking(move || run_forecast(&request))
        .await
        .map_err(|err| ProxyError::internal(err).in_format(format))?;
    match result {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            tracing::debug!("forecast rejected: {err}");
            Err(ProxyError::invalid(err.to_string()).in_format(format))
        }
    }
}
