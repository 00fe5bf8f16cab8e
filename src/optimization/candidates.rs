//! Detection and selection of insertion points for needles and steps.
use itertools::Itertools;

use super::model::TargetSensitivity;
use crate::{abeles::CharacteristicMatrix, error::FilmResult, utils::usize_to_f64};

/// A possible insertion point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<K> {
    /// front layer hosting the insertion
    pub layer: usize,
    /// depth inside the layer, measured from its bottom (nm)
    pub depth: f64,
    /// predicted derivative of the merit function
    pub value: f64,
    /// what is inserted
    pub kind: K,
}

/// `nb` evenly spaced depths covering `[0, thickness]`, at most `spacing` apart and at least
/// `min_points` of them.
pub(crate) fn depths(thickness: f64, spacing: f64, min_points: usize) -> Vec<f64> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nb = ((thickness / spacing).ceil().max(0.0) as usize + 1).max(min_points);
    let last = usize_to_f64(nb - 1);
    (0..nb).map(|k| thickness * usize_to_f64(k) / last).collect()
}

/// Vertex of the parabola through three points, if it opens upwards.
///
/// The parabola is built with Newton's divided differences.
pub(crate) fn parabola_minimum(z: [f64; 3], v: [f64; 3]) -> Option<(f64, f64)> {
    let d_01 = (v[1] - v[0]) / (z[1] - z[0]);
    let d_12 = (v[2] - v[1]) / (z[2] - z[1]);
    let a = (d_12 - d_01) / (z[2] - z[0]);
    if !(a > 0.0) {
        return None;
    }
    // v(x) = v0 + d01 (x - z0) + a (x - z0)(x - z1)
    let b = a.mul_add(-(z[0] + z[1]), d_01);
    let vertex = -b / (2.0 * a);
    let value = a.mul_add((vertex - z[0]) * (vertex - z[1]), d_01.mul_add(vertex - z[0], v[0]));
    Some((vertex, value))
}

/// Negative minima of a sampled track.
///
/// Windows of three consecutive samples are centered on the samples `skip..len-skip`. A vertex is
/// kept if it lies inside its window and strictly inside the layer, and is not within `spacing`
/// of a vertex already kept.
pub(crate) fn negative_minima(
    depths: &[f64],
    values: &[f64],
    skip: usize,
    spacing: f64,
) -> Vec<(f64, f64)> {
    let mut minima: Vec<(f64, f64)> = Vec::new();
    let (Some(first), Some(last)) = (depths.first(), depths.last()) else {
        return minima;
    };
    let skip = skip.max(1);
    if depths.len() < 2 * skip + 1 {
        return minima;
    }
    for center in skip..depths.len() - skip {
        let z = [depths[center - 1], depths[center], depths[center + 1]];
        let v = [values[center - 1], values[center], values[center + 1]];
        let Some((vertex, value)) = parabola_minimum(z, v) else {
            continue;
        };
        if value < 0.0
            && vertex >= z[0]
            && vertex <= z[2]
            && vertex > *first
            && vertex < *last
            && minima.iter().all(|(z, _)| (vertex - z).abs() > spacing)
        {
            minima.push((vertex, value));
        }
    }
    minima
}

/// The `nb` most negative candidates whose value is within `min_ratio` of the best one.
pub(crate) fn select<K: Copy>(
    mut candidates: Vec<Candidate<K>>,
    nb: usize,
    min_ratio: f64,
) -> Vec<Candidate<K>> {
    candidates.sort_by(|a, b| a.value.total_cmp(&b.value));
    let Some(best) = candidates.first().map(|c| c.value) else {
        return candidates;
    };
    candidates
        .into_iter()
        .take(nb)
        .take_while(|c| c.value <= min_ratio * best)
        .collect()
}

/// Merge two lists sorted by value, taking the better head first. Ties go to `first`.
pub(crate) fn interleave<K: Copy>(
    first: Vec<Candidate<K>>,
    second: Vec<Candidate<K>>,
) -> Vec<Candidate<K>> {
    first
        .into_iter()
        .merge_by(second, |a, b| a.value <= b.value)
        .collect()
}

/// `dMF`, the derivative of the merit function, for a perturbation `local` of front layer
/// `layer`. `nb_values` is the total number of target values.
pub(crate) fn merit_slope(
    sensitivities: &[TargetSensitivity],
    layer: usize,
    local: &[CharacteristicMatrix],
    nb_values: usize,
) -> FilmResult<f64> {
    let mut sum = 0.0;
    for (sensitivity, local) in sensitivities.iter().zip(local) {
        sum += sensitivity.merit_derivative(layer, local)?;
    }
    Ok(2.0 * sum / usize_to_f64(nb_values.max(1)))
}
