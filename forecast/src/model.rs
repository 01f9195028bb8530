use crate::error::ForecastError;
use crate::error::Result;
use crate::stats::normal_quantile;

/// Common surface of every forecasting model.
///
/// `states()` and `variances()` always have `data_len() + forecast_len()`
/// entries. Entries before `first_forecast_index()` are undefined and hold
/// `NaN`; use [`ForecastModel::state`] / [`ForecastModel::variance`] for
/// checked access.
pub trait ForecastModel: Send {
    fn name(&self) -> &'static str;

    fn data_len(&self) -> usize;

    fn forecast_len(&self) -> usize;

    fn first_forecast_index(&self) -> usize;

    fn least_num_data(&self) -> usize;

    fn states(&self) -> &[f64];

    fn variances(&self) -> &[f64];

    /// Extends the forecast horizon to `horizon` steps past the data. A
    /// horizon at or below the current one leaves the model untouched;
    /// one above [`MAX_FORECAST_LEN`] fails with `HorizonTooLong`.
    fn predict(&mut self, horizon: usize) -> Result<()>;

    /// Season length in use, for the seasonal models.
    fn period(&self) -> Option<usize> {
        None
    }

    fn len(&self) -> usize {
        self.data_len() + self.forecast_len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self, index: usize) -> Result<f64> {
        self.check_index(index)?;
        Ok(self.states()[index])
    }

    fn variance(&self, index: usize) -> Result<f64> {
        self.check_index(index)?;
        Ok(self.variances()[index])
    }

    /// Two-sided interval `fc ± z·√p` for a confidence `level` in percent.
    fn confidence_interval(&self, index: usize, level: f64) -> Result<(f64, f64)> {
        let z = z_score(level)?;
        let center = self.state(index)?;
        let spread = z * self.variance(index)?.max(0.0).sqrt();
        Ok((center - spread, center + spread))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let first = self.first_forecast_index();
        let len = self.len();
        if index < first || index >= len {
            return Err(ForecastError::OutOfRange { index, first, len });
        }
        Ok(())
    }
}

/// Longest horizon any model will extend to.
pub const MAX_FORECAST_LEN: usize = 100_000;

/// Total series length for `horizon` steps past `data_len` values.
pub(crate) fn checked_total(data_len: usize, horizon: usize) -> Result<usize> {
    let too_long = ForecastError::HorizonTooLong {
        requested: horizon,
        max: MAX_FORECAST_LEN,
    };
    if horizon > MAX_FORECAST_LEN {
        return Err(too_long);
    }
    data_len.checked_add(horizon).ok_or(too_long)
}

pub fn z_score(level: f64) -> Result<f64> {
    if !(level > 0.0 && level < 100.0) {
        return Err(ForecastError::InvalidConfidence(level));
    }
    Ok(normal_quantile(0.5 + level / 200.0))
}

pub(crate) fn validate_input(data: &[f64], required: usize) -> Result<()> {
    if data.len() < required {
        return Err(ForecastError::InsufficientData {
            required,
            actual: data.len(),
        });
    }
    if let Some(index) = data.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::NonFinite(index));
    }
    Ok(())
}

/// Keeps a log-space hyperparameter inside a range where `exp` stays finite
/// and the filters stay numerically stable.
pub(crate) fn clamp_log_param(psi: f64) -> f64 {
    if psi.is_nan() {
        return 0.0;
    }
    psi.clamp(-20.0, 20.0)
}
