//! Descriptive statistics helpers
//!
//! Population statistics over `f64` slices. Every function returns `None` when the
//! statistic is undefined for its input instead of producing NaN.

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by n)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Coefficient of variation `std_dev / mean`; `None` for an empty or zero-mean input
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    if mean == 0.0 {
        return None;
    }
    Some(std_dev(values)? / mean)
}

/// Pearson correlation coefficient.
///
/// `None` if the series differ in length, have fewer than two points, or either
/// series is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Percentile (0-100) of ascending-sorted values using linear interpolation
/// between closest ranks.
///
/// # Panics
/// Panics in debug builds if `sorted_values` is not sorted.
pub fn percentile(sorted_values: &[f64], percentile: f64) -> Option<f64> {
    debug_assert!(
        sorted_values.windows(2).all(|w| w[0] <= w[1]),
        "values must be sorted in ascending order"
    );
    let last = sorted_values.len().checked_sub(1)?;
    let rank = (percentile.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * fraction)
}
