//! Seasonal model: one independent local level per phase of the period.

use crate::error::ForecastError;
use crate::error::Result;
use crate::local_level::LocalLevel;
use crate::model::ForecastModel;
use crate::model::checked_total;
use crate::model::validate_input;
use crate::stats::find_period;

#[derive(Debug, Clone)]
pub struct Periodic {
    data_len: usize,
    forecast_len: usize,
    period: usize,
    phases: Vec<LocalLevel>,
    fc: Vec<f64>,
    p: Vec<f64>,
}

impl Periodic {
    /// Builds the model with `period`, or the period detected from the
    /// correlogram when `None`.
    pub fn new(data: &[f64], forecast_len: usize, period: Option<usize>) -> Result<Self> {
        validate_input(data, LocalLevel::LEAST_NUM_DATA)?;
        let period = match period {
            Some(value) => value,
            None => find_period(data).ok_or(ForecastError::NoPeriod)?,
        };
        if period < 2 {
            return Err(ForecastError::InvalidPeriod(period));
        }
        let required = Self::least_num_data_for(period);
        if data.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: data.len(),
            });
        }

        let n = data.len();
        let total = checked_total(n, forecast_len)?;
        let mut phases = Vec::with_capacity(period);
        for phase in 0..period {
            let series: Vec<f64> = data.iter().skip(phase).step_by(period).copied().collect();
            let horizon = phase_count(total, phase, period) - series.len();
            phases.push(LocalLevel::new(&series, horizon)?);
        }

        let mut model = Self {
            data_len: n,
            forecast_len,
            period,
            phases,
            fc: Vec::new(),
            p: Vec::new(),
        };
        model.interleave();
        Ok(model)
    }

    pub fn least_num_data_for(period: usize) -> usize {
        period * LocalLevel::LEAST_NUM_DATA
    }

    pub fn period(&self) -> usize {
        self.period
    }

    fn interleave(&mut self) {
        let total = self.data_len + self.forecast_len;
        self.fc.clear();
        self.p.clear();
        for index in 0..total {
            let phase = &self.phases[index % self.period];
            let local = index / self.period;
            self.fc.push(phase.states()[local]);
            self.p.push(phase.variances()[local]);
        }
    }
}

/// Number of indices below `total` that fall on `phase`.
fn phase_count(total: usize, phase: usize, period: usize) -> usize {
    if total <= phase {
        0
    } else {
        (total - phase).div_ceil(period)
    }
}

impl ForecastModel for Periodic {
    fn name(&self) -> &'static str {
        "LLP"
    }

    fn period(&self) -> Option<usize> {
        Some(self.period)
    }

    fn data_len(&self) -> usize {
        self.data_len
    }

    fn forecast_len(&self) -> usize {
        self.forecast_len
    }

    fn first_forecast_index(&self) -> usize {
        self.period
    }

    fn least_num_data(&self) -> usize {
        Self::least_num_data_for(self.period)
    }

    fn states(&self) -> &[f64] {
        &self.fc
    }

    fn variances(&self) -> &[f64] {
        &self.p
    }

    fn predict(&mut self, horizon: usize) -> Result<()> {
        if horizon <= self.forecast_len {
            return Ok(());
        }
        let total = checked_total(self.data_len, horizon)?;
        for (phase, model) in self.phases.iter_mut().enumerate() {
            let needed = phase_count(total, phase, self.period);
            model.predict(needed.saturating_sub(model.data_len()))?;
        }
        self.forecast_len = horizon;
        self.interleave();
        Ok(())
    }
}
