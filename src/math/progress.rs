use crate::dataset::DataArray;
use crate::error::PrepError;
use crate::time_utils::{AVG_DAY_PER_YEAR, SEC_PER_DAY};
use ndarray::{ArrayD, ArrayView1, ArrayViewD, Dimension, IxDyn};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Wrap into [0, 1) and narrow to f32
fn unit_interval(value: f64) -> f32 {
    let wrapped = value.rem_euclid(1.0) as f32;
    // narrowing can round 0.99999999.. up to exactly one
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

/// Fraction of the mean tropical year elapsed, in [0, 1), for each time.
///
/// The division is done in f64 before wrapping; large epoch values would
/// otherwise lose the fractional part.
pub fn year_progress(seconds_since_epoch: ArrayViewD<i64>) -> ArrayD<f32> {
    seconds_since_epoch.mapv(|seconds| {
        let years_since_epoch = seconds as f64 / SEC_PER_DAY as f64 / AVG_DAY_PER_YEAR;
        unit_interval(years_since_epoch)
    })
}

/// Fraction of the UTC day elapsed at Greenwich, in [0, 1)
pub fn day_progress_greenwich(seconds_since_epoch: ArrayViewD<i64>) -> ArrayD<f64> {
    seconds_since_epoch.mapv(|seconds| seconds.rem_euclid(SEC_PER_DAY) as f64 / SEC_PER_DAY as f64)
}

/// Local day progress for each time at each longitude.
///
/// The output has the shape of `seconds_since_epoch` with a trailing
/// longitude axis appended.
pub fn day_progress(
    seconds_since_epoch: ArrayViewD<i64>,
    longitude: ArrayView1<f64>,
) -> ArrayD<f32> {
    let greenwich = day_progress_greenwich(seconds_since_epoch);
    let offsets = longitude.mapv(|lon| lon.to_radians() / (2.0 * PI));

    let mut shape = greenwich.shape().to_vec();
    shape.push(offsets.len());
    ArrayD::from_shape_fn(IxDyn(&shape), |index| {
        let (time_index, lon_index) = index.slice().split_at(index.ndim() - 1);
        unit_interval(greenwich[time_index] + offsets[lon_index[0]])
    })
}

/// Expand a progress array into `name`, `name_sin` and `name_cos` variables.
pub fn featurize_progress(
    name: &str,
    dims: &[&str],
    progress: ArrayD<f32>,
) -> Result<BTreeMap<String, DataArray>, PrepError> {
    if dims.len() != progress.ndim() {
        return Err(PrepError::DimensionMismatch {
            expected: dims.len(),
            actual: progress.ndim(),
        });
    }

    let phase = progress.mapv(|p| p as f64 * (2.0 * PI));
    let sin = phase.mapv(|p| p.sin() as f32);
    let cos = phase.mapv(|p| p.cos() as f32);

    let mut features = BTreeMap::new();
    features.insert(name.to_string(), DataArray::new(dims, progress)?);
    features.insert(format!("{}_sin", name), DataArray::new(dims, sin)?);
    features.insert(format!("{}_cos", name), DataArray::new(dims, cos)?);
    Ok(features)
}
