//! Extending a dataset with placeholder future timesteps.

use crate::dataset::tree::{map_structure, map_structure_pair};
use crate::dataset::{
    CoordValues, Coordinate, DataArray, Dataset, LazyArray, BATCH, DATETIME, TIME,
};
use crate::error::PrepError;
use crate::features::{add_derived_vars, DAY_PROGRESS, PROGRESS_FORCING_VARS, YEAR_PROGRESS};
use crate::time_utils::format_timedelta;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info};
use ndarray::{Array2, ArrayD, Axis, Ix2};
use std::collections::BTreeSet;

/// Check that exactly the progress sin/cos forcings were requested.
fn check_forcing_variables<S: AsRef<str>>(forcing_variables: &[S]) -> Result<(), PrepError> {
    let given: BTreeSet<&str> = forcing_variables.iter().map(|v| v.as_ref()).collect();
    let supported: BTreeSet<&str> = PROGRESS_FORCING_VARS.into_iter().collect();
    if given == supported {
        return Ok(());
    }
    Err(PrepError::UnsupportedForcingVariables {
        unexpected: given.difference(&supported).map(|v| v.to_string()).collect(),
        missing: supported.difference(&given).map(|v| v.to_string()).collect(),
    })
}

/// The constant spacing of `time`. Needs at least two labels.
fn regular_timestep(time: &[TimeDelta]) -> Result<TimeDelta, PrepError> {
    if time.len() < 2 {
        return Err(PrepError::InsufficientTimesteps {
            required: 2,
            available: time.len(),
        });
    }
    let timestep = time[1] - time[0];
    for (index, pair) in time.windows(2).enumerate() {
        let interval = pair[1] - pair[0];
        if interval != timestep {
            return Err(PrepError::IrregularTimeAxis {
                index,
                expected: format_timedelta(timestep),
                actual: format_timedelta(interval),
            });
        }
    }
    Ok(timestep)
}

/// `timestep * k`, or `None` past the range of `TimeDelta`
fn step_offset(timestep: TimeDelta, k: usize) -> Option<TimeDelta> {
    i32::try_from(k).ok().and_then(|k| timestep.checked_mul(k))
}

fn time_overflow(required_steps: usize, timestep: TimeDelta) -> PrepError {
    PrepError::TimeOverflow {
        required: required_steps,
        timestep: format_timedelta(timestep),
    }
}

/// Extend each row of `datetime` from its first timestamp and verify the
/// existing timestamps are reproduced exactly.
///
/// `datetime` is `(time)` or `(batch, time)`; the result keeps its layout.
fn extend_datetime(
    coord: &Coordinate,
    required_steps: usize,
    timestep: TimeDelta,
) -> Result<Coordinate, PrepError> {
    let values = match &coord.values {
        CoordValues::Datetime(values) => values,
        _ => return Err(PrepError::UnextendableCoordinate(DATETIME.to_string())),
    };
    let rows: Array2<DateTime<Utc>> = match coord.dims.as_slice() {
        [time] if time == TIME => values.clone().insert_axis(Axis(0)),
        [batch, time] if batch == BATCH && time == TIME => values.clone(),
        _ => return Err(PrepError::UnextendableCoordinate(DATETIME.to_string())),
    }
    .into_dimensionality::<Ix2>()
    .map_err(|_| PrepError::UnextendableCoordinate(DATETIME.to_string()))?;

    let (num_rows, steps) = rows.dim();
    let mut extended = Array2::from_elem((num_rows, required_steps), DateTime::<Utc>::UNIX_EPOCH);
    for (b, row) in rows.outer_iter().enumerate() {
        let anchor = row[0];
        for k in 0..required_steps {
            extended[[b, k]] = step_offset(timestep, k)
                .and_then(|offset| anchor.checked_add_signed(offset))
                .ok_or_else(|| time_overflow(required_steps, timestep))?;
        }
        if let Some(step) = (0..steps).find(|&k| extended[[b, k]] != row[k]) {
            return Err(PrepError::DatetimeMismatch { batch: b, step });
        }
    }

    let extended: ArrayD<DateTime<Utc>> = if coord.dims.len() == 1 {
        extended.index_axis_move(Axis(0), 0).into_dyn()
    } else {
        extended.into_dyn()
    };
    let dims: Vec<&str> = coord.dims.iter().map(String::as_str).collect();
    Ok(Coordinate::new(&dims, CoordValues::Datetime(extended))?)
}

/// Deferred zero array with the time axis resized
fn empty_like(var: &DataArray, required_steps: usize) -> DataArray {
    match var.axis_of(TIME) {
        Some(axis) => {
            let mut shape = var.shape();
            shape[axis] = required_steps;
            DataArray {
                dims: var.dims.clone(),
                data: LazyArray::zeros(&shape),
            }
        }
        None => var.clone(),
    }
}

/// Place `original` into the start of `empty` along the time axis.
///
/// Falls back to `empty` when the two differ outside the time axis.
fn copy_data(empty: &DataArray, original: &DataArray) -> DataArray {
    let empty_shape = empty.shape();
    let shape = original.shape();
    if empty_shape == shape {
        return original.clone();
    }
    let axis = match empty.axis_of(TIME) {
        Some(axis) if empty.dims == original.dims => axis,
        _ => return empty.clone(),
    };
    let same_elsewhere = empty_shape
        .iter()
        .zip(&shape)
        .enumerate()
        .all(|(i, (a, b))| i == axis || a == b);
    if !same_elsewhere || shape[axis] > empty_shape[axis] {
        return empty.clone();
    }
    let data = match &original.data {
        LazyArray::Zeros(_) => empty.data.clone(),
        data => LazyArray::Padded {
            prefix: data.materialize(),
            axis,
            len: empty_shape[axis],
        },
    };
    DataArray {
        dims: empty.dims.clone(),
        data,
    }
}

/// Extend `dataset` to `required_steps` timesteps.
///
/// The time axis continues with the existing spacing from the first label.
/// Existing values are kept as a prefix and the new steps hold deferred
/// zeros, not NaN; consumers have to treat them as unknown. Variables
/// without a time dimension pass through unchanged. The progress forcings,
/// which must be exactly the four sin/cos features, are recomputed for the
/// whole extended range.
pub fn extend_dataset_in_time<S: AsRef<str>>(
    dataset: &Dataset,
    required_steps: usize,
    forcing_variables: &[S],
) -> Result<Dataset, PrepError> {
    check_forcing_variables(forcing_variables)?;

    let time = dataset.time()?;
    if required_steps < time.len() {
        return Err(PrepError::ShorterExtension {
            required: required_steps,
            available: time.len(),
        });
    }
    let timestep = regular_timestep(time)?;
    let extended_time = (0..required_steps)
        .map(|k| {
            step_offset(timestep, k)
                .and_then(|offset| time[0].checked_add(&offset))
                .ok_or_else(|| time_overflow(required_steps, timestep))
        })
        .collect::<Result<Vec<TimeDelta>, PrepError>>()?;

    let extended_datetime = match dataset.coord(DATETIME) {
        Ok(coord) => Some(extend_datetime(coord, required_steps, timestep)?),
        Err(_) => None,
    };

    if let Some((name, _)) = dataset
        .coords()
        .iter()
        .find(|(name, c)| c.dims.iter().any(|d| d == TIME) && *name != TIME && *name != DATETIME)
    {
        return Err(PrepError::UnextendableCoordinate(name.clone()));
    }

    let original = dataset.drop_vars(&[TIME, DATETIME]);
    let mut empty = map_structure::<PrepError, _>(&original, |_, var| {
        Ok(empty_like(var, required_steps))
    })?;
    empty.set_coord(TIME, Coordinate::timedelta(extended_time))?;
    if let Some(coord) = extended_datetime {
        empty.set_coord(DATETIME, coord)?;
    }
    debug!(
        "Built placeholder dataset with {} variables over {} steps of {}",
        empty.data_vars().len(),
        required_steps,
        format_timedelta(timestep)
    );

    let extended = map_structure_pair::<PrepError, _>(&empty, &original, |_, empty, original| {
        Ok(copy_data(empty, original))
    })?;

    let mut stale: Vec<&str> = PROGRESS_FORCING_VARS.to_vec();
    stale.extend([DAY_PROGRESS, YEAR_PROGRESS]);
    let extended = add_derived_vars(extended.drop_vars(&stale))?;

    info!(
        "Extended dataset from {} to {} timesteps",
        time.len(),
        required_steps
    );
    Ok(extended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{SyntheticGrid, LAND_SEA_MASK};

    fn grid(steps: usize) -> Dataset {
        let data = SyntheticGrid::default()
            .with_steps(steps, TimeDelta::hours(12))
            .build()
            .unwrap();
        add_derived_vars(data).unwrap()
    }

    #[test]
    fn test_rejects_other_forcing_sets() {
        let data = grid(4);
        let err = extend_dataset_in_time(
            &data,
            6,
            &["year_progress_sin", "toa_incident_solar_radiation"],
        )
        .unwrap_err();
        match err {
            PrepError::UnsupportedForcingVariables { unexpected, missing } => {
                assert_eq!(unexpected, vec!["toa_incident_solar_radiation"]);
                assert_eq!(missing.len(), 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_irregular_time_axis_rejected() {
        let data = grid(4);
        let skewed = data
            .assign_time(vec![
                TimeDelta::zero(),
                TimeDelta::hours(12),
                TimeDelta::hours(25),
                TimeDelta::hours(36),
            ])
            .unwrap();
        let err = extend_dataset_in_time(&skewed, 6, &PROGRESS_FORCING_VARS).unwrap_err();
        assert!(matches!(err, PrepError::IrregularTimeAxis { index: 1, .. }));
        assert!(err.is_consistency_violation());
    }

    #[test]
    fn test_single_step_cannot_be_extended() {
        let data = grid(1);
        let err = extend_dataset_in_time(&data, 3, &PROGRESS_FORCING_VARS).unwrap_err();
        assert_eq!(
            err,
            PrepError::InsufficientTimesteps {
                required: 2,
                available: 1
            }
        );
    }

    #[test]
    fn test_extension_past_datetime_range_is_an_error() {
        let data = SyntheticGrid::default()
            .with_steps(2, TimeDelta::days(365_000))
            .build()
            .unwrap();
        let err = extend_dataset_in_time(&data, 400, &PROGRESS_FORCING_VARS).unwrap_err();
        assert!(matches!(err, PrepError::TimeOverflow { required: 400, .. }));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_step_offset_bounds() {
        assert_eq!(step_offset(TimeDelta::hours(6), 4), Some(TimeDelta::hours(24)));
        assert_eq!(step_offset(TimeDelta::hours(6), i32::MAX as usize + 1), None);
        assert_eq!(step_offset(TimeDelta::days(100_000_000_000), 2), None);
    }

    #[test]
    fn test_shrinking_is_rejected() {
        let err = extend_dataset_in_time(&grid(4), 3, &PROGRESS_FORCING_VARS).unwrap_err();
        assert!(matches!(err, PrepError::ShorterExtension { .. }));
    }

    #[test]
    fn test_prefix_kept_and_tail_deferred() {
        let data = grid(3);
        let extended = extend_dataset_in_time(&data, 5, &PROGRESS_FORCING_VARS).unwrap();

        let temperature = extended.var("temperature").unwrap();
        assert_eq!(temperature.shape(), vec![1, 5, 3, 5, 4]);
        assert!(matches!(temperature.data, LazyArray::Padded { axis: 1, len: 5, .. }));

        let tail = extended.isel(TIME, &[3, 4]).unwrap();
        assert!(tail.var("temperature").unwrap().data.is_deferred());
        assert!(!tail.var("day_progress_cos").unwrap().data.is_deferred());

        // static fields are shared, not rebuilt
        assert!(!extended.var(LAND_SEA_MASK).unwrap().has_dim(TIME));
        assert_eq!(
            extended.var(LAND_SEA_MASK).unwrap().values(),
            data.var(LAND_SEA_MASK).unwrap().values()
        );
    }

    #[test]
    fn test_negative_start_offset_and_unbatched_datetime() {
        let data = SyntheticGrid::default()
            .with_batch(None)
            .with_steps(2, TimeDelta::hours(6))
            .with_start_offset(TimeDelta::hours(-6))
            .build()
            .unwrap();
        let data = add_derived_vars(data).unwrap();
        let extended = extend_dataset_in_time(&data, 4, &PROGRESS_FORCING_VARS).unwrap();

        let expected: Vec<_> = (-1..3).map(|k| TimeDelta::hours(6 * k)).collect();
        assert_eq!(extended.time().unwrap(), expected.as_slice());
        let datetime = extended.datetime().unwrap();
        assert_eq!(datetime.shape(), &[4]);
        assert_eq!(datetime[[0]], data.datetime().unwrap()[[0]]);
        assert_eq!(datetime[[3]] - datetime[[0]], TimeDelta::hours(18));
        assert_eq!(extended.var("year_progress_sin").unwrap().dims, vec![TIME]);
    }

    #[test]
    fn test_extension_rejects_time_varying_coordinate() {
        let mut data = grid(3);
        data.set_coord(
            "valid_hour",
            Coordinate::new(&[TIME], CoordValues::Float(ndarray::array![0.0, 12.0, 24.0])).unwrap(),
        )
        .unwrap();
        let err = extend_dataset_in_time(&data, 4, &PROGRESS_FORCING_VARS).unwrap_err();
        assert_eq!(err, PrepError::UnextendableCoordinate("valid_hour".to_string()));
    }
}
