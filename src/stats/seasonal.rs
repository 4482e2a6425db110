use crate::error::{ModelError, ModelResult};

/// Classical additive decomposition `observed = trend + seasonal + resid`.
///
/// Trend and residual are undefined at the edges of the series, where the
/// centred moving average has no full window.
#[derive(Debug, Clone)]
pub struct SeasonalDecomposition {
    pub observed: Vec<f64>,
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub resid: Vec<Option<f64>>,
    pub period: usize,
}

/// Centred moving average. Even periods use the `2 x period` filter with
/// half weights at both ends.
fn centred_moving_average(x: &[f64], period: usize) -> Vec<Option<f64>> {
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] = 0.5 / period as f64;
        w[period] = 0.5 / period as f64;
        w
    } else {
        vec![1.0 / period as f64; period]
    };
    let half = weights.len() / 2;

    (0..x.len())
        .map(|t| {
            if t < half || t + half >= x.len() {
                return None;
            }
            let window = &x[t - half..=t + half];
            Some(window.iter().zip(&weights).map(|(v, w)| v * w).sum())
        })
        .collect()
}

/// Decompose `x` with a seasonal cycle of `period` observations.
pub fn seasonal_decompose(x: &[f64], period: usize) -> ModelResult<SeasonalDecomposition> {
    if period < 2 {
        return Err(ModelError::Distribution {
            message: format!("seasonal period must be at least 2, got {}", period),
        });
    }
    if x.len() < 2 * period {
        return Err(ModelError::InsufficientObservations {
            observations: x.len(),
            required: 2 * period,
            context: format!("seasonal decomposition with period {}", period),
        });
    }

    let trend = centred_moving_average(x, period);
    let detrended: Vec<Option<f64>> = x
        .iter()
        .zip(&trend)
        .map(|(v, t)| t.map(|t| v - t))
        .collect();

    let mut pattern: Vec<f64> = (0..period)
        .map(|phase| {
            let values: Vec<f64> = detrended
                .iter()
                .skip(phase)
                .step_by(period)
                .flatten()
                .copied()
                .collect();
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        })
        .collect();
    let level = pattern.iter().sum::<f64>() / period as f64;
    pattern.iter_mut().for_each(|p| *p -= level);

    let seasonal: Vec<f64> = (0..x.len()).map(|t| pattern[t % period]).collect();
    let resid = detrended
        .iter()
        .zip(&seasonal)
        .map(|(d, s)| d.map(|d| d - s))
        .collect();

    Ok(SeasonalDecomposition {
        observed: x.to_vec(),
        trend,
        seasonal,
        resid,
        period,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_recovers_pure_seasonal_pattern() {
        let pattern = [3.0, -1.0, -2.0, 0.0];
        let x: Vec<f64> = (0..16).map(|t| 10.0 + pattern[t % 4]).collect();

        let result = seasonal_decompose(&x, 4).unwrap();
        for t in 0..16 {
            assert_abs_diff_eq!(result.seasonal[t], pattern[t % 4], epsilon = 1e-12);
        }
        assert_eq!(result.trend[0], None);
        assert_eq!(result.trend[1], None);
        assert_abs_diff_eq!(result.trend[2].unwrap(), 10.0, epsilon = 1e-12);
        assert_eq!(result.trend[14], None);
        assert_abs_diff_eq!(result.resid[5].unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_odd_period_uses_uniform_window() {
        let x: Vec<f64> = (0..9).map(|t| t as f64).collect();
        let result = seasonal_decompose(&x, 3).unwrap();

        assert_eq!(result.trend[0], None);
        assert_abs_diff_eq!(result.trend[1].unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result.trend[7].unwrap(), 7.0, epsilon = 1e-12);
        assert_eq!(result.trend[8], None);
    }

    #[test]
    fn test_seasonal_component_is_centred() {
        let x: Vec<f64> = (0..24).map(|t| (t * t % 7) as f64).collect();
        let result = seasonal_decompose(&x, 6).unwrap();
        let cycle: f64 = result.seasonal[..6].iter().sum();
        assert_abs_diff_eq!(cycle, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_requires_two_full_cycles() {
        let x = vec![1.0; 30];
        assert!(matches!(
            seasonal_decompose(&x, 52),
            Err(ModelError::InsufficientObservations { required: 104, .. })
        ));
    }
}
