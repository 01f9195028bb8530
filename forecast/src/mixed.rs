//! Inverse-variance combination of two models.

use crate::error::ForecastError;
use crate::error::Result;
use crate::model::ForecastModel;

/// A point estimate and the variance of its prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub variance: f64,
}

impl Estimate {
    pub fn new(value: f64, variance: f64) -> Self {
        Self { value, variance }
    }

    /// `None` for the undefined (`NaN`) slots models leave before their
    /// first forecast index.
    pub fn defined(value: f64, variance: f64) -> Option<Self> {
        if value.is_nan() || variance.is_nan() {
            None
        } else {
            Some(Self { value, variance })
        }
    }
}

/// Combines two Gaussian estimates, each weighted by the other's variance.
pub fn mix(a: Option<Estimate>, b: Option<Estimate>) -> Option<Estimate> {
    match (a, b) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only),
        (Some(a), Some(b)) => {
            if a.variance == 0.0 && b.variance == 0.0 {
                return Some(Estimate::new((a.value + b.value) / 2.0, 0.0));
            }
            let gain = a.variance / (a.variance + b.variance);
            Some(Estimate::new(
                a.value + gain * (b.value - a.value),
                (1.0 - gain) * a.variance,
            ))
        }
    }
}

/// Two models over the same data, mixed index by index.
pub struct Mixed {
    name: &'static str,
    first: Box<dyn ForecastModel>,
    second: Box<dyn ForecastModel>,
    fc: Vec<f64>,
    p: Vec<f64>,
}

impl Mixed {
    pub fn new(
        name: &'static str,
        mut first: Box<dyn ForecastModel>,
        mut second: Box<dyn ForecastModel>,
    ) -> Result<Self> {
        if first.data_len() != second.data_len() {
            return Err(ForecastError::LengthMismatch {
                left: first.data_len(),
                right: second.data_len(),
            });
        }
        let horizon = first.forecast_len().max(second.forecast_len());
        first.predict(horizon)?;
        second.predict(horizon)?;
        let mut model = Self {
            name,
            first,
            second,
            fc: Vec::new(),
            p: Vec::new(),
        };
        model.recompute_from(0);
        Ok(model)
    }

    fn recompute_from(&mut self, start: usize) {
        let len = self.first.len();
        self.fc.truncate(start);
        self.p.truncate(start);
        for index in start..len {
            let a = Estimate::defined(self.first.states()[index], self.first.variances()[index]);
            let b = Estimate::defined(self.second.states()[index], self.second.variances()[index]);
            match mix(a, b) {
                Some(estimate) => {
                    self.fc.push(estimate.value);
                    self.p.push(estimate.variance);
                }
                None => {
                    self.fc.push(f64::NAN);
                    self.p.push(f64::NAN);
                }
            }
        }
    }
}

impl ForecastModel for Mixed {
    fn name(&self) -> &'static str {
        self.name
    }

    fn data_len(&self) -> usize {
        self.first.data_len()
    }

    fn forecast_len(&self) -> usize {
        self.first.forecast_len()
    }

    fn first_forecast_index(&self) -> usize {
        self.first
            .first_forecast_index()
            .min(self.second.first_forecast_index())
    }

    fn least_num_data(&self) -> usize {
        self.first.least_num_data().min(self.second.least_num_data())
    }

    fn period(&self) -> Option<usize> {
        self.first.period().or_else(|| self.second.period())
    }

    fn states(&self) -> &[f64] {
        &self.fc
    }

    fn variances(&self) -> &[f64] {
        &self.p
    }

    fn predict(&mut self, horizon: usize) -> Result<()> {
        if horizon <= self.forecast_len() {
            return Ok(());
        }
        let previous = self.len();
        self.first.predict(horizon)?;
        self.second.predict(horizon)?;
        self.recompute_from(previous);
        Ok(())
    }
}
