//! Sample statistics used by the state-space models.

/// Lowest autocorrelation a lag must reach to count as a seasonal peak.
pub const PERIOD_THRESHOLD: f64 = 0.01;

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample autocovariance `c_k` for lags `0..n`, normalised by `n`.
pub fn autocovariance(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    let m = mean(data);
    (0..n)
        .map(|lag| {
            let sum: f64 = data[..n - lag]
                .iter()
                .zip(&data[lag..])
                .map(|(a, b)| (a - m) * (b - m))
                .sum();
            sum / n as f64
        })
        .collect()
}

/// Autocorrelation function up to lag `n - 1`. Returns `None` when the
/// correlogram is degenerate (zero variance).
pub fn autocorrelation(data: &[f64]) -> Option<Vec<f64>> {
    let acov = autocovariance(data);
    let c0 = *acov.first()?;
    if c0 == 0.0 || !c0.is_finite() {
        return None;
    }
    Some(acov.into_iter().map(|c| c / c0).collect())
}

/// Smallest lag that is a strict local maximum of the correlogram above
/// [`PERIOD_THRESHOLD`].
pub fn find_period(data: &[f64]) -> Option<usize> {
    if data.len() < 3 {
        return None;
    }
    let acf = autocorrelation(data)?;
    (1..acf.len() - 1).find(|&lag| {
        let r = acf[lag];
        r > PERIOD_THRESHOLD && r > acf[lag - 1] && r > acf[lag + 1]
    })
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -normal_quantile(1.0 - p)
    }
}
