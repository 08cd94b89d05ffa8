//! Descriptive statistics over a row of historical values.

use std::cmp::Ordering;

use crate::config::Statistic;

/// Sorts a copy of `values`, ignoring NaNs.
fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Percentile of an already sorted slice, linearly interpolated between
/// closest ranks. `p` is clamped to `0..=100`.
fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Linearly interpolated percentile. Returns `None` for an empty slice.
///
/// # Example
///
/// ```
/// use shortage_engine::calculation::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), Some(2.5));
/// assert_eq!(percentile(&[], 50.0), None);
/// ```
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    percentile_sorted(&sorted(values), p)
}

/// Median. Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Arithmetic mean. Returns `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().sum::<f64>() / finite.len() as f64)
}

/// Applies a [`Statistic`] to `values`.
pub fn summarize(values: &[f64], statistic: Statistic) -> Option<f64> {
    match statistic {
        Statistic::Median => median(values),
        Statistic::Mean => mean(values),
        Statistic::Percentile(p) => percentile(values, p),
    }
}

/// Discards values outside the Tukey fences `[Q1 - k·IQR, Q3 + k·IQR]`.
///
/// Order of the surviving values is preserved.
///
/// # Example
///
/// ```
/// use shortage_engine::calculation::remove_outliers_iqr;
///
/// let kept = remove_outliers_iqr(&[3.0, 4.0, 3.0, 5.0, 4.0, 40.0], 1.5);
/// assert_eq!(kept, vec![3.0, 4.0, 3.0, 5.0, 4.0]);
/// ```
pub fn remove_outliers_iqr(values: &[f64], multiplier: f64) -> Vec<f64> {
    let sorted = sorted(values);
    let (Some(q1), Some(q3)) = (percentile_sorted(&sorted, 25.0), percentile_sorted(&sorted, 75.0))
    else {
        return Vec::new();
    };
    let iqr = q3 - q1;
    let low = q1 - multiplier * iqr;
    let high = q3 + multiplier * iqr;

    values
        .iter()
        .copied()
        .filter(|v| *v >= low && *v <= high)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_percentile_endpoints() {
        let values = [5.0, 1.0, 9.0, 3.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(9.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        // ranks: 0 -> 10, 1 -> 20, 2 -> 30, 3 -> 40; p75 sits at rank 2.25
        assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0], 75.0), Some(32.5));
    }

    #[test]
    fn test_single_value_is_every_statistic() {
        for statistic in [Statistic::Median, Statistic::Mean, Statistic::Percentile(90.0)] {
            assert_eq!(summarize(&[7.0], statistic), Some(7.0));
        }
    }

    #[test]
    fn test_empty_summarises_to_none() {
        assert_eq!(summarize(&[], Statistic::Median), None);
        assert_eq!(summarize(&[], Statistic::Percentile(10.0)), None);
    }

    #[test]
    fn test_nan_values_are_ignored() {
        assert_eq!(median(&[f64::NAN, 2.0, 4.0]), Some(3.0));
        assert_eq!(mean(&[f64::NAN]), None);
    }

    #[test]
    fn test_outlier_removal_drops_both_tails() {
        let values = [-50.0, 10.0, 11.0, 12.0, 10.0, 11.0, 90.0];
        let kept = remove_outliers_iqr(&values, 1.5);
        assert_eq!(kept, vec![10.0, 11.0, 12.0, 10.0, 11.0]);
    }

    #[test]
    fn test_outlier_removal_keeps_constant_rows() {
        let values = [2.0; 10];
        assert_eq!(remove_outliers_iqr(&values, 1.5), values.to_vec());
    }

    #[test]
    fn test_outlier_removal_never_trims_three_values() {
        let values = [1.0, 100.0, 2.0];
        assert_eq!(remove_outliers_iqr(&values, 1.5), values.to_vec());
    }
}
