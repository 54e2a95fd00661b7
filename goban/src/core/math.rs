//! Small statistics helpers for the analysis output.

/// Mean and sample variance in one pass.
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Abramowitz-Stegun style approximation of the standard normal cdf.
/// Max error on the order of 1e-7, far below what move selection can notice.
pub fn normal_cdf(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let poly = t
        * (0.319381530 + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));
    let pdf = (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt();
    let upper = pdf * poly;
    if x >= 0.0 { 1.0 - upper } else { upper }
}

/// Radius of a one-sided confidence bound on a winrate estimated from
/// `visits` samples: `z * sqrt(p(1-p)/visits)`, clamped away from the
/// degenerate zero-variance case so few-visit children still get a wide bound.
pub fn winrate_lcb_radius(winrate: f64, visits: f64, z: f64) -> f64 {
    if visits < 1.0 {
        return 1.0;
    }
    let p = winrate.clamp(0.0, 1.0);
    let var = (p * (1.0 - p)).max(0.0625);
    z * (var / visits).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdf_matches_known_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-4);
    }

    #[test]
    fn lcb_radius_shrinks_with_visits() {
        let wide = winrate_lcb_radius(0.5, 4.0, 2.0);
        let narrow = winrate_lcb_radius(0.5, 400.0, 2.0);
        assert!(wide > narrow);
        assert!(narrow > 0.0);
    }

    #[test]
    fn mean_variance_basic() {
        let (m, v) = mean_and_variance(&[1.0, 2.0, 3.0]);
        assert!((m - 2.0).abs() < 1e-12);
        assert!((v - 1.0).abs() < 1e-12);
    }
}
