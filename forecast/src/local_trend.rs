//! Local linear trend model with a (level, slope) state.
//!
//! Both state components receive noise with variance `ζ·σ²`. After the
//! scaled covariance settles (L1 change below [`STEADY_L1`]) the filter
//! switches to a fixed-gain recursion.

use crate::error::Result;
use crate::model::ForecastModel;
use crate::model::checked_total;
use crate::model::clamp_log_param;
use crate::model::validate_input;
use crate::optimize::bfgs;

pub const STEADY_L1: f64 = 0.001;

type Vec2 = [f64; 2];
type Mat2 = [[f64; 2]; 2];

#[derive(Debug, Clone)]
pub struct LocalLinearTrend {
    data: Vec<f64>,
    forecast_len: usize,
    fc: Vec<f64>,
    p: Vec<f64>,
    zeta: f64,
    sigma2: f64,
    tail_state: Vec2,
    tail_cov: Mat2,
}

impl LocalLinearTrend {
    pub const LEAST_NUM_DATA: usize = 3;

    pub fn new(data: &[f64], forecast_len: usize) -> Result<Self> {
        validate_input(data, Self::LEAST_NUM_DATA)?;
        checked_total(data.len(), forecast_len)?;
        let n = data.len();
        let mut fc = vec![f64::NAN; n];
        let mut p = vec![f64::NAN; n];
        let mut psi = 0.0;
        let mut zeta = 1.0;
        let mut sigma2 = 0.0;
        let mut tail_state = [0.0; 2];
        let mut tail_cov = [[0.0; 2]; 2];

        for k in 2..n {
            let window = &data[..=k];
            let fit = bfgs(|x| negative_log_likelihood(window, x[0]), &[psi]);
            psi = clamp_log_param(fit.x[0]);
            zeta = psi.exp();
            let run = run_filter(window, zeta);
            sigma2 = run.sum_sq / (k - 1) as f64;
            fc[k] = run.state[0];
            p[k] = sigma2 * run.cov[0][0];
            tail_state = run.state;
            tail_cov = run.cov;
        }

        tracing::trace!(zeta, sigma2, n, "fitted local linear trend model");
        let mut model = Self {
            data: data.to_vec(),
            forecast_len: 0,
            fc,
            p,
            zeta,
            sigma2,
            tail_state,
            tail_cov,
        };
        model.predict(forecast_len)?;
        Ok(model)
    }

    pub fn zeta(&self) -> f64 {
        self.zeta
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Slope estimate at the end of the data.
    pub fn slope(&self) -> f64 {
        self.tail_state[1]
    }
}

impl ForecastModel for LocalLinearTrend {
    fn name(&self) -> &'static str {
        "LLT"
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }

    fn forecast_len(&self) -> usize {
        self.forecast_len
    }

    fn first_forecast_index(&self) -> usize {
        2
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
        let total = checked_total(self.data.len(), horizon)?;
        self.fc.reserve(total - self.fc.len());
        self.p.reserve(total - self.p.len());
        for _ in self.forecast_len..horizon {
            let (state, cov) = time_update(self.tail_state, self.tail_cov, self.zeta);
            self.fc.push(state[0]);
            self.p.push(self.sigma2 * cov[0][0]);
            self.tail_state = state;
            self.tail_cov = cov;
        }
        self.forecast_len = horizon;
        Ok(())
    }
}

struct FilterRun {
    state: Vec2,
    cov: Mat2,
    sum_sq: f64,
}

/// `T a` and `T P Tᵀ + ζ I` for `T = [[1, 1], [0, 1]]`.
fn time_update(state: Vec2, cov: Mat2, zeta: f64) -> (Vec2, Mat2) {
    let next_state = [state[0] + state[1], state[1]];
    let next_cov = [
        [
            cov[0][0] + cov[0][1] + cov[1][0] + cov[1][1] + zeta,
            cov[0][1] + cov[1][1],
        ],
        [cov[1][0] + cov[1][1], cov[1][1] + zeta],
    ];
    (next_state, next_cov)
}

fn l1_distance(a: &Mat2, b: &Mat2) -> f64 {
    let mut total = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            total += (a[i][j] - b[i][j]).abs();
        }
    }
    total
}

/// Filters `data` (at least two values). The first two observations
/// initialise the state exactly; the likelihood terms start at index 2.
fn run_filter_with_likelihood(data: &[f64], zeta: f64) -> (FilterRun, f64) {
    let mut filtered_state = [data[1], data[1] - data[0]];
    let mut filtered_cov = [[1.0, 1.0], [1.0, 2.0]];
    let (mut state, mut cov) = time_update(filtered_state, filtered_cov, zeta);
    let mut sum_sq = 0.0;
    let mut sum_log_f = 0.0;
    let mut steady = false;
    let mut f = cov[0][0] + 1.0;
    let mut gain = [cov[0][0] / f, cov[1][0] / f];

    for &y in &data[2..] {
        if !steady {
            f = cov[0][0] + 1.0;
            gain = [cov[0][0] / f, cov[1][0] / f];
            for i in 0..2 {
                for j in 0..2 {
                    filtered_cov[i][j] = cov[i][j] - cov[i][0] * cov[0][j] / f;
                }
            }
        }
        let innovation = y - state[0];
        sum_sq += innovation * innovation / f;
        sum_log_f += f.ln();
        filtered_state = [
            state[0] + gain[0] * innovation,
            state[1] + gain[1] * innovation,
        ];
        if steady {
            state = [filtered_state[0] + filtered_state[1], filtered_state[1]];
        } else {
            let (next_state, next_cov) = time_update(filtered_state, filtered_cov, zeta);
            steady = l1_distance(&next_cov, &cov) < STEADY_L1;
            state = next_state;
            cov = next_cov;
        }
    }

    (
        FilterRun {
            state: filtered_state,
            cov: filtered_cov,
            sum_sq,
        },
        sum_log_f,
    )
}

fn run_filter(data: &[f64], zeta: f64) -> FilterRun {
    run_filter_with_likelihood(data, zeta).0
}

fn negative_log_likelihood(data: &[f64], psi: f64) -> f64 {
    let innovations = data.len().saturating_sub(2);
    if innovations == 0 {
        return 0.0;
    }
    let (run, sum_log_f) = run_filter_with_likelihood(data, clamp_log_param(psi).exp());
    let sigma2 = (run.sum_sq / innovations as f64).max(f64::MIN_POSITIVE);
    0.5 * innovations as f64 * sigma2.ln() + 0.5 * sum_log_f
}
