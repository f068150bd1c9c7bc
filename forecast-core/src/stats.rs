//! Robust statistics over bare numeric samples.
//!
//! Every function here is pure and accepts empty or single-element input
//! without panicking.

const HALF_WEIGHT_TOLERANCE: f64 = 1e-9;

/// Default fraction trimmed from each end by [`trimmed_mean`].
pub const DEFAULT_TRIM_FRACTION: f64 = 0.1;

/// Default confidence level for [`confidence_interval`].
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Arithmetic mean. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median, averaging the two middle values for even-length input.
/// Returns 0.0 for empty input.
pub fn median(values: &[f64]) -> f64 {
    let v = sorted(values);
    let n = v.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => v[n / 2],
        _ => (v[n / 2 - 1] + v[n / 2]) / 2.0,
    }
}

/// Population standard deviation. Returns 0.0 for fewer than two values.
pub fn population_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Sample (n - 1) standard deviation. Returns 0.0 for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Linear-interpolated quantile of already sorted, non-empty input.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Tukey fences `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`.
///
/// `None` when there are fewer than three values or the IQR is zero, in
/// which case nothing counts as an outlier.
pub fn iqr_bounds(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 3 {
        return None;
    }
    let v = sorted(values);
    let q1 = quantile(&v, 0.25);
    let q3 = quantile(&v, 0.75);
    let iqr = q3 - q1;
    if iqr == 0.0 {
        return None;
    }
    Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

/// Drops values outside the IQR fences, preserving input order.
pub fn remove_outliers(values: &[f64]) -> Vec<f64> {
    match iqr_bounds(values) {
        Some((low, high)) => values.iter().copied().filter(|v| (low..=high).contains(v)).collect(),
        None => values.to_vec(),
    }
}

/// Mean after dropping `max(1, floor(n · trim_fraction))` values from each end.
///
/// Falls back to the plain mean for fewer than three values or when
/// trimming would leave nothing.
pub fn trimmed_mean(values: &[f64], trim_fraction: f64) -> f64 {
    let n = values.len();
    if n < 3 {
        return mean(values);
    }
    let k = ((n as f64 * trim_fraction).floor() as usize).max(1);
    if 2 * k >= n {
        return mean(values);
    }
    mean(&sorted(values)[k..n - k])
}

/// Value at which the cumulative normalized weight first reaches one half.
///
/// When the cumulative weight lands exactly on one half the next weighted
/// value is averaged in, so equal weights reproduce [`median`]. Falls back
/// to the unweighted median on a length mismatch or a non-positive total.
pub fn weighted_median(values: &[f64], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if values.is_empty() || values.len() != weights.len() || total <= 0.0 || !total.is_finite() {
        return median(values);
    }

    let mut pairs: Vec<(f64, f64)> =
        values.iter().copied().zip(weights.iter().map(|w| w / total)).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut cumulative = 0.0;
    for (i, &(value, weight)) in pairs.iter().enumerate() {
        cumulative += weight;
        if cumulative >= 0.5 - HALF_WEIGHT_TOLERANCE {
            if (cumulative - 0.5).abs() <= HALF_WEIGHT_TOLERANCE {
                if let Some(&(next, _)) = pairs[i + 1..].iter().find(|(_, w)| *w > 0.0) {
                    return (value + next) / 2.0;
                }
            }
            return value;
        }
    }
    pairs.last().map(|&(v, _)| v).unwrap_or_default()
}

/// Weighted arithmetic mean, falling back to [`mean`] like [`weighted_median`].
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if values.len() != weights.len() || total <= 0.0 || !total.is_finite() {
        return mean(values);
    }
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total
}

fn z_score(confidence: f64) -> f64 {
    match confidence {
        c if c >= 0.99 => 2.576,
        c if c >= 0.98 => 2.326,
        c if c >= 0.95 => 1.96,
        c if c >= 0.90 => 1.645,
        _ => 1.282,
    }
}

/// `mean ± multiplier · stdev / √n`.
///
/// The multiplier is a small-sample band rather than a t-table: 1.96 for
/// n ≥ 30, 2.0 for n ≥ 10, 2.5 otherwise, rescaled when `confidence` is
/// not 0.95. Fewer than two values give a degenerate interval.
pub fn confidence_interval(values: &[f64], confidence: f64) -> (f64, f64) {
    match values {
        [] => (0.0, 0.0),
        [only] => (*only, *only),
        _ => {
            let n = values.len();
            let band = match n {
                n if n >= 30 => 1.96,
                n if n >= 10 => 2.0,
                _ => 2.5,
            };
            let multiplier = band * z_score(confidence) / z_score(DEFAULT_CONFIDENCE);
            let m = mean(values);
            let margin = multiplier * sample_stdev(values) / (n as f64).sqrt();
            (m - margin, m + margin)
        }
    }
}

/// Most frequent item; ties go to whichever appeared first.
pub fn most_frequent<'a, I>(items: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| *seen == item) {
            Some((_, count)) => *count += 1,
            None => counts.push((item, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (item, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((item, count));
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_and_singleton_inputs_do_not_panic() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(trimmed_mean(&[], DEFAULT_TRIM_FRACTION), 0.0);
        assert_eq!(weighted_median(&[], &[]), 0.0);
        assert_eq!(weighted_mean(&[], &[]), 0.0);
        assert_eq!(population_stdev(&[4.0]), 0.0);
        assert_eq!(remove_outliers(&[]), Vec::<f64>::new());
        assert_eq!(remove_outliers(&[7.0]), vec![7.0]);
        assert_eq!(confidence_interval(&[], DEFAULT_CONFIDENCE), (0.0, 0.0));
        assert_eq!(confidence_interval(&[3.5], DEFAULT_CONFIDENCE), (3.5, 3.5));
    }

    #[test]
    fn remove_outliers_drops_sensor_glitch() {
        let cleaned = remove_outliers(&[10.0, 12.0, 11.0, 50.0]);
        assert_eq!(cleaned, vec![10.0, 12.0, 11.0]);
    }

    #[test]
    fn remove_outliers_keeps_everything_without_spread() {
        let values = [5.0, 5.0, 5.0, 5.0, 40.0];
        assert_eq!(remove_outliers(&values), values.to_vec());
    }

    #[test]
    fn remove_outliers_never_grows_input() {
        let samples: [&[f64]; 4] = [
            &[1.0, 2.0],
            &[1.0, 2.0, 3.0, 4.0, 100.0],
            &[-30.0, 0.0, 0.1, 0.2, 0.3, 45.0],
            &[2.0, 2.0, 2.0],
        ];
        for values in samples {
            assert!(remove_outliers(values).len() <= values.len());
        }
        assert_eq!(remove_outliers(&[1.0, 2.0, 3.0, 4.0, 100.0]), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn trimmed_mean_resists_a_single_extreme() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let trimmed = trimmed_mean(&values, DEFAULT_TRIM_FRACTION);
        assert!(close(trimmed, 3.5));
        assert!((trimmed - 3.0).abs() < 1.0);
        assert!(mean(&values) - trimmed > 10.0);
    }

    #[test]
    fn trimmed_mean_falls_back_for_short_input() {
        assert!(close(trimmed_mean(&[2.0, 4.0], DEFAULT_TRIM_FRACTION), 3.0));
        assert!(close(trimmed_mean(&[1.0, 2.0, 9.0], DEFAULT_TRIM_FRACTION), 2.0));
        // Trimming 2 from each end of 4 values would leave nothing.
        assert!(close(trimmed_mean(&[1.0, 2.0, 3.0, 10.0], 0.5), 4.0));
    }

    #[test]
    fn weighted_median_with_equal_weights_is_the_median() {
        let odd = [7.0, 1.0, 4.0, 9.0, 3.0];
        assert!(close(weighted_median(&odd, &[2.0; 5]), median(&odd)));

        let even = [10.0, 12.0, 11.0, 14.0];
        assert!(close(weighted_median(&even, &[0.3; 4]), median(&even)));
        assert!(close(median(&even), 11.5));
    }

    #[test]
    fn weighted_median_follows_heavy_weight() {
        let values = [10.0, 20.0, 30.0];
        assert_eq!(weighted_median(&values, &[0.1, 0.1, 5.0]), 30.0);
        assert_eq!(weighted_median(&values, &[5.0, 0.1, 0.1]), 10.0);
    }

    #[test]
    fn weighted_median_falls_back_on_bad_weights() {
        let values = [1.0, 3.0, 2.0];
        assert_eq!(weighted_median(&values, &[1.0, 1.0]), 2.0);
        assert_eq!(weighted_median(&values, &[0.0, 0.0, 0.0]), 2.0);
    }

    #[test]
    fn weighted_mean_weights_values() {
        assert!(close(weighted_mean(&[10.0, 20.0], &[3.0, 1.0]), 12.5));
        assert!(close(weighted_mean(&[10.0, 20.0], &[0.0, 0.0]), 15.0));
    }

    #[test]
    fn confidence_interval_uses_sample_size_bands() {
        let small = [10.0, 12.0, 14.0];
        let (low, high) = confidence_interval(&small, DEFAULT_CONFIDENCE);
        let margin = 2.5 * 2.0 / 3f64.sqrt();
        assert!(close(low, 12.0 - margin));
        assert!(close(high, 12.0 + margin));

        let ten: Vec<f64> = (0..10).map(f64::from).collect();
        let (low, high) = confidence_interval(&ten, DEFAULT_CONFIDENCE);
        let margin = 2.0 * sample_stdev(&ten) / 10f64.sqrt();
        assert!(close(high - low, 2.0 * margin));
    }

    #[test]
    fn higher_confidence_widens_interval() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let (l95, h95) = confidence_interval(&values, 0.95);
        let (l99, h99) = confidence_interval(&values, 0.99);
        assert!(h99 - l99 > h95 - l95);
    }

    #[test]
    fn stdev_variants() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(population_stdev(&values), 2.0));
        assert!(sample_stdev(&values) > 2.0);
    }

    #[test]
    fn most_frequent_breaks_ties_by_first_seen() {
        assert_eq!(most_frequent(["rain", "sun", "sun", "rain"]), Some("rain"));
        assert_eq!(most_frequent(["fog", "sun", "sun"]), Some("sun"));
        assert_eq!(most_frequent(Vec::<&str>::new()), None);
    }

    #[test]
    fn round_to_decimals() {
        assert_eq!(round_to(11.04999, 1), 11.0);
        assert_eq!(round_to(0.125, 2), 0.13);
    }
}
