//! Local level (random walk plus noise) model.
//!
//! `y_t = μ_t + ε_t`, `μ_{t+1} = μ_t + η_t` with `Var(η) = q·Var(ε)`. The
//! observation variance is concentrated out of the likelihood, leaving the
//! signal-to-noise ratio `q` as the only hyperparameter.

use crate::error::Result;
use crate::model::ForecastModel;
use crate::model::checked_total;
use crate::model::clamp_log_param;
use crate::model::validate_input;
use crate::optimize::bfgs;

const STEADY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct LocalLevel {
    data: Vec<f64>,
    forecast_len: usize,
    fc: Vec<f64>,
    p: Vec<f64>,
    q: f64,
    sigma2: f64,
}

impl LocalLevel {
    pub const LEAST_NUM_DATA: usize = 2;

    pub fn new(data: &[f64], forecast_len: usize) -> Result<Self> {
        validate_input(data, Self::LEAST_NUM_DATA)?;
        checked_total(data.len(), forecast_len)?;
        let n = data.len();
        let mut fc = vec![f64::NAN; n];
        let mut p = vec![f64::NAN; n];
        let mut psi = 0.0;
        let mut q = 1.0;
        let mut sigma2 = 0.0;

        for k in 1..n {
            let window = &data[..=k];
            let fit = bfgs(|x| negative_log_likelihood(window, x[0]), &[psi]);
            psi = clamp_log_param(fit.x[0]);
            q = psi.exp();
            let run = run_filter(window, q);
            sigma2 = run.sum_sq / k as f64;
            fc[k] = run.level;
            p[k] = sigma2 * run.filtered_var;
        }

        tracing::trace!(q, sigma2, n, "fitted local level model");
        let mut model = Self {
            data: data.to_vec(),
            forecast_len: 0,
            fc,
            p,
            q,
            sigma2,
        };
        model.predict(forecast_len)?;
        Ok(model)
    }

    /// Fitted signal-to-noise ratio.
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Concentrated observation variance from the final fit.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

impl ForecastModel for LocalLevel {
    fn name(&self) -> &'static str {
        "LL"
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }

    fn forecast_len(&self) -> usize {
        self.forecast_len
    }

    fn first_forecast_index(&self) -> usize {
        1
    }

    fn least_num_data(&self) -> usize {
        Self::LEAST_NUM_DATA
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
        let n = self.data.len();
        let total = checked_total(n, horizon)?;
        self.fc.reserve(total - self.fc.len());
        self.p.reserve(total - self.p.len());
        let level = self.fc[n - 1];
        let step = self.sigma2 * self.q;
        for _ in self.forecast_len..horizon {
            let last = self.p[self.p.len() - 1];
            self.fc.push(level);
            self.p.push(last + step);
        }
        self.forecast_len = horizon;
        Ok(())
    }
}

struct FilterRun {
    level: f64,
    filtered_var: f64,
    sum_sq: f64,
    sum_log_f: f64,
}

/// Runs the scaled filter over `data` starting from the diffuse prior. Once
/// the predicted variance stops moving the gain is frozen.
fn run_filter(data: &[f64], q: f64) -> FilterRun {
    let mut level = data[0];
    let mut filtered_var = 1.0;
    let mut predicted_var = 1.0 + q;
    let mut sum_sq = 0.0;
    let mut sum_log_f = 0.0;
    let mut steady = false;

    for &y in &data[1..] {
        let f = predicted_var + 1.0;
        let gain = predicted_var / f;
        let innovation = y - level;
        sum_sq += innovation * innovation / f;
        sum_log_f += f.ln();
        level += gain * innovation;
        if !steady {
            filtered_var = predicted_var * (1.0 - gain);
            let next = filtered_var + q;
            steady = (next - predicted_var).abs() < STEADY_TOLERANCE * next.max(1.0);
            predicted_var = next;
        }
    }

    FilterRun {
        level,
        filtered_var,
        sum_sq,
        sum_log_f,
    }
}

fn negative_log_likelihood(data: &[f64], psi: f64) -> f64 {
    let innovations = data.len().saturating_sub(1);
    if innovations == 0 {
        return 0.0;
    }
    let run = run_filter(data, clamp_log_param(psi).exp());
    let sigma2 = (run.sum_sq / innovations as f64).max(f64::MIN_POSITIVE);
    0.5 * innovations as f64 * sigma2.ln() + 0.5 * run.sum_log_f
}
