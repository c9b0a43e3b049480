//! Input and target window extraction along the time axis.

use crate::dataset::{Dataset, TIME};
use crate::error::PrepError;
use crate::lead_times::{LeadTimeSelection, TargetLeadTimes};
use crate::time_utils::{epsilon, format_timedelta};
use chrono::TimeDelta;
use log::{debug, warn};

/// Number of leading timesteps used as inputs in climate mode
pub const CLIMATE_INPUT_STEPS: usize = 2;
/// Timesteps a climate-mode dataset must hold: two inputs and one target
pub const CLIMATE_REQUIRED_STEPS: usize = CLIMATE_INPUT_STEPS + 1;

/// How the input and target windows are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    /// Windows follow `input_duration` and the requested lead times
    #[default]
    Duration,
    /// The first two timesteps are inputs and the third is the target.
    ///
    /// Requested lead times and the input duration are ignored in this mode,
    /// and the time coordinate is not recentred.
    Climate,
}

/// Split `dataset` into input and target windows.
///
/// In [`WindowMode::Duration`] the time coordinate is shifted so that the
/// last timestep sits at the largest requested lead time; zero is then the
/// final input step. Inputs cover `(-input_duration, 0]` and targets cover
/// the requested lead times.
pub fn extract_input_target_times(
    dataset: &Dataset,
    input_duration: TimeDelta,
    target_lead_times: &TargetLeadTimes,
    mode: WindowMode,
) -> Result<(Dataset, Dataset), PrepError> {
    let normalized = target_lead_times.normalize()?;

    if mode == WindowMode::Climate {
        return climate_windows(dataset, target_lead_times);
    }

    let time = dataset.time()?;
    let last = *time.last().ok_or(PrepError::InsufficientTimesteps {
        required: 1,
        available: 0,
    })?;
    let shift = normalized.target_duration - last;
    let recentred = dataset.assign_time(time.iter().map(|t| *t + shift).collect())?;

    let targets = match &normalized.selection {
        LeadTimeSelection::Labels(labels) => recentred.sel_time(labels)?,
        LeadTimeSelection::Range { start, stop, step } => {
            recentred.sel_time_range(*start, *stop, *step)?
        }
    };

    // Both ends of a label range are inclusive, so the start is nudged past
    // -input_duration to keep exactly input_duration worth of steps.
    let inputs = recentred.sel_time_range(-input_duration + epsilon(), TimeDelta::zero(), None)?;

    debug!(
        "Windowed {} steps into {} inputs and {} targets (input duration {}, lead times {})",
        time.len(),
        inputs.time_len(),
        targets.time_len(),
        format_timedelta(input_duration),
        target_lead_times
    );
    Ok((inputs, targets))
}

fn climate_windows(
    dataset: &Dataset,
    target_lead_times: &TargetLeadTimes,
) -> Result<(Dataset, Dataset), PrepError> {
    let available = dataset.time_len();
    if available < CLIMATE_REQUIRED_STEPS {
        return Err(PrepError::InsufficientTimesteps {
            required: CLIMATE_REQUIRED_STEPS,
            available,
        });
    }
    warn!(
        "Climate mode ignores target lead times {}: using steps 0-1 as inputs and step 2 as target",
        target_lead_times
    );

    let inputs = dataset.isel(TIME, &[0, 1])?;
    let targets = dataset.isel(TIME, &[2])?;
    Ok((inputs, targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Coordinate, DataArray, LAT};
    use ndarray::Array;

    fn hourly(steps: i64) -> Dataset {
        let values = Array::from_shape_fn((steps as usize, 2), |(t, j)| (t * 10 + j) as f32);
        Dataset::new()
            .with_coord(TIME, Coordinate::timedelta((0..steps).map(TimeDelta::hours).collect()))
            .unwrap()
            .with_coord(LAT, Coordinate::float(LAT, vec![0.0, 1.0]))
            .unwrap()
            .with_var("t2m", DataArray::new(&[TIME, LAT], values.into_dyn()).unwrap())
            .unwrap()
    }

    #[test]
    fn test_windows_relative_to_reference_time() {
        let data = hourly(24);
        let (inputs, targets) = extract_input_target_times(
            &data,
            TimeDelta::hours(6),
            &TargetLeadTimes::from(vec![TimeDelta::hours(3), TimeDelta::hours(1)]),
            WindowMode::Duration,
        )
        .unwrap();

        let expected: Vec<_> = (-5..=0).map(TimeDelta::hours).collect();
        assert_eq!(inputs.time().unwrap(), expected.as_slice());
        assert_eq!(targets.time().unwrap(), &[TimeDelta::hours(1), TimeDelta::hours(3)]);

        // the last step of the dataset is lead time 3h, so input 0h is index 20
        assert_eq!(inputs.var("t2m").unwrap().values()[[5, 1]], 201.0);
        assert_eq!(targets.var("t2m").unwrap().values()[[1, 0]], 230.0);
    }

    #[test]
    fn test_range_targets_exclude_lead_time_zero() {
        let data = hourly(12);
        let (_, targets) = extract_input_target_times(
            &data,
            TimeDelta::hours(2),
            &TargetLeadTimes::from(..=TimeDelta::hours(4)),
            WindowMode::Duration,
        )
        .unwrap();
        let expected: Vec<_> = (1..=4).map(TimeDelta::hours).collect();
        assert_eq!(targets.time().unwrap(), expected.as_slice());
    }

    #[test]
    fn test_missing_target_label_is_an_error() {
        let data = hourly(12);
        let result = extract_input_target_times(
            &data,
            TimeDelta::hours(2),
            &TargetLeadTimes::from(vec![TimeDelta::minutes(90), TimeDelta::hours(4)]),
            WindowMode::Duration,
        );
        assert!(matches!(result, Err(PrepError::Dataset(_))));
    }

    #[test]
    fn test_climate_mode_fixed_arity() {
        let data = hourly(5);
        let (inputs, targets) = extract_input_target_times(
            &data,
            TimeDelta::hours(12),
            &TargetLeadTimes::from(TimeDelta::days(30)),
            WindowMode::Climate,
        )
        .unwrap();
        assert_eq!(inputs.time().unwrap(), &[TimeDelta::hours(0), TimeDelta::hours(1)]);
        assert_eq!(targets.time().unwrap(), &[TimeDelta::hours(2)]);
    }

    #[test]
    fn test_climate_mode_needs_three_steps() {
        let err = extract_input_target_times(
            &hourly(2),
            TimeDelta::hours(1),
            &TargetLeadTimes::from(TimeDelta::hours(1)),
            WindowMode::Climate,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PrepError::InsufficientTimesteps {
                required: 3,
                available: 2
            }
        );
        assert!(err.is_precondition());
    }
}
