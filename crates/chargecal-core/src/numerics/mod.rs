//! Shared numeric helpers for the calibration kernels.

pub mod kde;
pub mod rootfind;

pub(crate) fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

/// Compensated summation; resilient to order-of-magnitude spread between
/// the terms.
pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

/// Median of the values, averaging the two central elements for even
/// counts. Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Unbiased sample variance (n - 1 denominator). Requires at least two
/// values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let count = values.len() as f64;
    let mean = stable_sum(values) / count;
    let mut sum = 0.0;
    let mut correction = 0.0;
    for &value in values {
        let deviation = value - mean;
        kahan_add(&mut sum, &mut correction, deviation * deviation);
    }

    Some(sum / (count - 1.0))
}

/// Unbiased sample standard deviation. Requires at least two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}
