//! Filtering of data arrays before they are plotted or reported.
use num::Float;

/// Minimum and maximum of `values`, ignoring non-finite entries.
///
/// Returns `None` if there is no finite entry.
#[must_use]
pub fn get_min_max_filter_nonfinite<T: Float>(values: &[T]) -> Option<(T, T)> {
    let (min, max) = values.iter().copied().filter(|x| x.is_finite()).fold(
        (T::infinity(), T::neg_infinity()),
        |(current_min, current_max), val| (current_min.min(val), current_max.max(val)),
    );
    if min.is_finite() && max.is_finite() {
        Some((min, max))
    } else {
        None
    }
}

/// Axis limits for plotting `values`, widened by `margin` (relative) on both sides.
///
/// A constant curve gets a symmetric range of `±0.5` (or `±10 %` of its value) around it.
#[must_use]
pub fn axis_limits(values: &[f64], margin: f64) -> Option<(f64, f64)> {
    let (min, max) = get_min_max_filter_nonfinite(values)?;
    let span = max - min;
    if span <= f64::EPSILON * max.abs().max(1.0) {
        let half = if min == 0.0 { 0.5 } else { 0.1 * min.abs() };
        return Some((min - half, max + half));
    }
    Some((min - margin * span, max + margin * span))
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    #[test]
    fn min_max() {
        assert_eq!(get_min_max_filter_nonfinite::<f64>(&[]), None);
        assert_eq!(get_min_max_filter_nonfinite(&[f64::NAN]), None);
        assert_eq!(
            get_min_max_filter_nonfinite(&[0.3, f64::NEG_INFINITY, -1.0, 2.0]),
            Some((-1.0, 2.0))
        );
    }
    #[test]
    fn limits() {
        let (min, max) = axis_limits(&[0.0, 1.0], 0.05).unwrap();
        assert_abs_diff_eq!(min, -0.05);
        assert_abs_diff_eq!(max, 1.05);
        assert_eq!(axis_limits(&[0.0, 0.0], 0.05), Some((-0.5, 0.5)));
        let (min, max) = axis_limits(&[2.0, 2.0], 0.05).unwrap();
        assert_abs_diff_eq!(min, 1.8);
        assert_abs_diff_eq!(max, 2.2);
    }
}
