use crate::config::EngineConfig;
use crate::utils::weights_to_percentages;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveSource {
    /// Percentages copied from a caller-supplied spend pattern.
    Historical,
    /// Percentages from the synthesised logistic S-curve.
    SCurve,
}

/// Per-period percentages (summing to 100) for the curve strategy.
///
/// A usable history (same length as the periods, finite, non-negative, with a
/// positive sum) is treated as a template and rescaled. Anything else falls
/// back to the S-curve.
pub fn curve_percentages(
    count: usize,
    history: Option<&[f64]>,
    config: &EngineConfig,
) -> (Vec<f64>, CurveSource) {
    if let Some(pattern) = history {
        if is_usable_history(pattern, count) {
            return (weights_to_percentages(pattern), CurveSource::Historical);
        }
        debug!(
            "Ignoring historical pattern of length {} for {} periods",
            pattern.len(),
            count
        );
    }

    let weights = s_curve_weights(count, config.curve_steepness, config.curve_midpoint);
    (weights_to_percentages(&weights), CurveSource::SCurve)
}

/// First differences of a logistic curve sampled at the `count + 1` period
/// boundaries `i / count`. Each difference approximates the share of spend
/// falling inside one period.
pub fn s_curve_weights(count: usize, steepness: f64, midpoint: f64) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }

    let logistic = |x: f64| 1.0 / (1.0 + (-steepness * (x - midpoint)).exp());
    let samples: Vec<f64> = (0..=count)
        .map(|i| logistic(i as f64 / count as f64))
        .collect();

    samples.windows(2).map(|w| w[1] - w[0]).collect()
}

fn is_usable_history(pattern: &[f64], count: usize) -> bool {
    if pattern.len() != count || count == 0 {
        return false;
    }
    if pattern.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return false;
    }
    pattern.iter().sum::<f64>() > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s_curve_sums_to_100() {
        let config = EngineConfig::default();
        for count in 1..=24 {
            let (pct, source) = curve_percentages(count, None, &config);
            assert_eq!(source, CurveSource::SCurve);
            assert_eq!(pct.len(), count);
            let sum: f64 = pct.iter().sum();
            assert!((sum - 100.0).abs() < 1e-9, "count {} sums to {}", count, sum);
        }
    }

    #[test]
    fn test_s_curve_is_bell_shaped() {
        let weights = s_curve_weights(6, 10.0, 0.5);
        assert!(weights.iter().all(|w| *w > 0.0));
        assert!((weights[0] - weights[5]).abs() < 1e-12);
        assert!((weights[1] - weights[4]).abs() < 1e-12);
        assert!(weights[2] > weights[1]);
        assert!(weights[1] > weights[0]);
    }

    #[test]
    fn test_single_period_gets_everything() {
        let (pct, _) = curve_percentages(1, None, &EngineConfig::default());
        assert!((pct[0] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_used_as_template() {
        let history = [10.0, 30.0, 60.0];
        let (pct, source) = curve_percentages(3, Some(&history), &EngineConfig::default());
        assert_eq!(source, CurveSource::Historical);
        assert!((pct[0] - 10.0).abs() < 1e-9);
        assert!((pct[1] - 30.0).abs() < 1e-9);
        assert!((pct[2] - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_unusable_history_falls_back() {
        let config = EngineConfig::default();
        let wrong_length = [1.0, 2.0];
        let (_, source) = curve_percentages(3, Some(&wrong_length), &config);
        assert_eq!(source, CurveSource::SCurve);

        let all_zero = [0.0, 0.0, 0.0];
        let (_, source) = curve_percentages(3, Some(&all_zero), &config);
        assert_eq!(source, CurveSource::SCurve);

        let negative = [5.0, -1.0, 2.0];
        let (_, source) = curve_percentages(3, Some(&negative), &config);
        assert_eq!(source, CurveSource::SCurve);
    }

    #[test]
    fn test_zero_count() {
        assert!(s_curve_weights(0, 10.0, 0.5).is_empty());
    }
}
