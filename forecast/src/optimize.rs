//! Quasi-Newton minimisation for the likelihood fits.
//!
//! The objective is only available as a function value, so gradients are
//! central finite differences. Non-convergence is reported through
//! [`Minimum::converged`] and callers keep the best point found.

const GRADIENT_STEP: f64 = 1e-5;
const GRADIENT_TOLERANCE: f64 = 1e-6;
const MAX_ITERATIONS: usize = 100;
const MAX_LINE_SEARCH_STEPS: usize = 40;
const ARMIJO: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimises `f` starting from `x0` with BFGS updates of the inverse Hessian.
pub fn bfgs<F>(f: F, x0: &[f64]) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let dim = x0.len();
    let mut x = x0.to_vec();
    let mut fx = f(&x);
    let mut grad = gradient(&f, &x);
    let mut h = identity(dim);

    for iteration in 0..MAX_ITERATIONS {
        if !fx.is_finite() {
            return Minimum {
                x,
                value: fx,
                iterations: iteration,
                converged: false,
            };
        }
        if norm(&grad) < GRADIENT_TOLERANCE {
            return Minimum {
                x,
                value: fx,
                iterations: iteration,
                converged: true,
            };
        }

        let mut direction: Vec<f64> = mat_vec(&h, &grad).into_iter().map(|v| -v).collect();
        let mut slope = dot(&grad, &direction);
        if slope >= 0.0 {
            // Curvature information went bad; restart from steepest descent.
            h = identity(dim);
            direction = grad.iter().map(|g| -g).collect();
            slope = dot(&grad, &direction);
        }

        let Some((step, next_x, next_fx)) = line_search(&f, &x, fx, &direction, slope) else {
            return Minimum {
                x,
                value: fx,
                iterations: iteration,
                converged: false,
            };
        };

        let next_grad = gradient(&f, &next_x);
        let s: Vec<f64> = direction.iter().map(|d| d * step).collect();
        let y: Vec<f64> = next_grad.iter().zip(&grad).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if sy > 1e-12 {
            h = bfgs_update(&h, &s, &y, sy);
        }

        let improvement = (fx - next_fx).abs();
        x = next_x;
        fx = next_fx;
        grad = next_grad;
        if improvement < 1e-12 * (1.0 + fx.abs()) {
            return Minimum {
                x,
                value: fx,
                iterations: iteration + 1,
                converged: true,
            };
        }
    }

    Minimum {
        x,
        value: fx,
        iterations: MAX_ITERATIONS,
        converged: false,
    }
}

fn line_search<F>(
    f: &F,
    x: &[f64],
    fx: f64,
    direction: &[f64],
    slope: f64,
) -> Option<(f64, Vec<f64>, f64)>
where
    F: Fn(&[f64]) -> f64,
{
    let mut step = 1.0;
    for _ in 0..MAX_LINE_SEARCH_STEPS {
        let candidate: Vec<f64> = x
            .iter()
            .zip(direction)
            .map(|(xi, di)| xi + step * di)
            .collect();
        let value = f(&candidate);
        if value.is_finite() && value <= fx + ARMIJO * step * slope {
            return Some((step, candidate, value));
        }
        step *= 0.5;
    }
    None
}

fn gradient<F>(f: &F, x: &[f64]) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut probe = x.to_vec();
    (0..x.len())
        .map(|i| {
            let original = probe[i];
            probe[i] = original + GRADIENT_STEP;
            let forward = f(&probe);
            probe[i] = original - GRADIENT_STEP;
            let backward = f(&probe);
            probe[i] = original;
            (forward - backward) / (2.0 * GRADIENT_STEP)
        })
        .collect()
}

fn bfgs_update(h: &[Vec<f64>], s: &[f64], y: &[f64], sy: f64) -> Vec<Vec<f64>> {
    let dim = s.len();
    let rho = 1.0 / sy;
    let hy = mat_vec(h, y);
    let yhy = dot(y, &hy);
    let mut next = h.to_vec();
    for i in 0..dim {
        for j in 0..dim {
            next[i][j] += (1.0 + rho * yhy) * rho * s[i] * s[j] - rho * (hy[i] * s[j] + s[i] * hy[j]);
        }
    }
    next
}

fn identity(dim: usize) -> Vec<Vec<f64>> {
    (0..dim)
        .map(|i| (0..dim).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}
