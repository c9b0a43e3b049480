//! Assembling (inputs, targets, forcings) for a model request.

use crate::dataset::{Dataset, DATETIME};
use crate::error::PrepError;
use crate::extend::extend_dataset_in_time;
use crate::features::{add_derived_vars, add_solar_var, DERIVED_VARS, TISR};
use crate::lead_times::TargetLeadTimes;
use crate::math::SolarRadiation;
use crate::time_utils::format_timedelta;
use crate::windows::{
    extract_input_target_times, WindowMode, CLIMATE_INPUT_STEPS, CLIMATE_REQUIRED_STEPS,
};
use chrono::TimeDelta;
use log::{debug, info};
use std::collections::BTreeSet;

/// Variables, levels and windows one model expects
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub input_variables: Vec<String>,
    pub target_variables: Vec<String>,
    pub forcing_variables: Vec<String>,
    pub pressure_levels: Vec<i32>,
    pub input_duration: TimeDelta,
    pub target_lead_times: TargetLeadTimes,
}

impl ExtractionRequest {
    fn forcing_set(&self) -> BTreeSet<&str> {
        self.forcing_variables.iter().map(String::as_str).collect()
    }

    fn wants_derived_vars(&self) -> bool {
        let forcings = self.forcing_set();
        DERIVED_VARS.iter().any(|name| forcings.contains(name))
    }

    fn wants_solar(&self) -> bool {
        self.forcing_set().contains(TISR)
    }

    fn check_disjoint(&self) -> Result<(), PrepError> {
        let forcings = self.forcing_set();
        if self
            .target_variables
            .iter()
            .any(|name| forcings.contains(name.as_str()))
        {
            return Err(PrepError::OverlappingVariables {
                forcing: self.forcing_variables.clone(),
                target: self.target_variables.clone(),
            });
        }
        Ok(())
    }
}

/// The three datasets handed to a model
#[derive(Debug, Clone)]
pub struct WindowedData {
    pub inputs: Dataset,
    pub targets: Dataset,
    /// Forcings share the targets' time coordinate
    pub forcings: Dataset,
}

/// Select levels, derive forcings, window the time axis and project each
/// window onto the requested variables.
///
/// The `datetime` coordinate is only needed to derive forcings and is dropped
/// before windowing, so the outputs can be fed back autoregressively.
pub fn extract_inputs_targets_forcings(
    dataset: &Dataset,
    request: &ExtractionRequest,
    solar: &dyn SolarRadiation,
    mode: WindowMode,
) -> Result<WindowedData, PrepError> {
    let levels: Vec<f64> = request.pressure_levels.iter().map(|&l| l as f64).collect();
    let mut data = dataset.sel_levels(&levels)?;

    if request.wants_derived_vars() {
        data = add_derived_vars(data)?;
    }
    if request.wants_solar() {
        data = add_solar_var(data, solar)?;
    }
    let data = data.drop_vars(&[DATETIME]);

    let (inputs, targets) = extract_input_target_times(
        &data,
        request.input_duration,
        &request.target_lead_times,
        mode,
    )?;

    request.check_disjoint()?;

    let windowed = WindowedData {
        inputs: inputs.project(&request.input_variables)?,
        forcings: targets.project(&request.forcing_variables)?,
        targets: targets.project(&request.target_variables)?,
    };
    debug!(
        "Extracted {} input, {} target and {} forcing steps",
        windowed.inputs.time_len(),
        windowed.targets.time_len(),
        windowed.forcings.time_len()
    );
    Ok(windowed)
}

/// Climate-rollout variant: two input steps and one target step.
///
/// A dataset with fewer than three timesteps is first extended with
/// [`extend_dataset_in_time`], which only supports the four progress sin/cos
/// forcings. The requested lead times are validated but do not influence the
/// windows; see [`WindowMode::Climate`].
pub fn extract_inputs_targets_forcings_climate(
    dataset: &Dataset,
    request: &ExtractionRequest,
    solar: &dyn SolarRadiation,
) -> Result<WindowedData, PrepError> {
    let normalized = request.target_lead_times.normalize()?;
    debug!(
        "Climate extraction for lead times up to {}",
        format_timedelta(normalized.target_duration)
    );

    let available = dataset.time_len();
    if available >= CLIMATE_REQUIRED_STEPS {
        return extract_inputs_targets_forcings(dataset, request, solar, WindowMode::Climate);
    }

    info!(
        "Dataset has {} timesteps, extending to {} for climate rollout",
        available, CLIMATE_REQUIRED_STEPS
    );
    let extended =
        extend_dataset_in_time(dataset, CLIMATE_REQUIRED_STEPS, &request.forcing_variables)?;
    let windowed = extract_inputs_targets_forcings(&extended, request, solar, WindowMode::Climate)?;

    let input_steps = windowed.inputs.time_len();
    if input_steps != CLIMATE_INPUT_STEPS {
        return Err(PrepError::InputWindowLength {
            expected: CLIMATE_INPUT_STEPS,
            actual: input_steps,
        });
    }
    Ok(windowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::PROGRESS_FORCING_VARS;
    use crate::math::ToaIncidentRadiation;
    use crate::synthetic::SyntheticGrid;

    fn request(forcing: &[&str], target: &[&str]) -> ExtractionRequest {
        ExtractionRequest {
            input_variables: vec!["2m_temperature".to_string(), "temperature".to_string()],
            target_variables: target.iter().map(|s| s.to_string()).collect(),
            forcing_variables: forcing.iter().map(|s| s.to_string()).collect(),
            pressure_levels: vec![500, 1000],
            input_duration: TimeDelta::hours(12),
            target_lead_times: TargetLeadTimes::from(TimeDelta::hours(6)),
        }
    }

    #[test]
    fn test_levels_selected_and_datetime_dropped() {
        let data = SyntheticGrid::default().with_steps(4, TimeDelta::hours(6)).build().unwrap();
        let windowed = extract_inputs_targets_forcings(
            &data,
            &request(&[TISR, "year_progress_sin"], &["temperature"]),
            &ToaIncidentRadiation::default(),
            WindowMode::Duration,
        )
        .unwrap();

        assert_eq!(windowed.inputs.time_len(), 2);
        assert_eq!(windowed.targets.time_len(), 1);
        assert_eq!(windowed.targets.var("temperature").unwrap().shape()[2], 2);
        assert!(!windowed.inputs.has_coord(DATETIME));
        assert!(windowed.forcings.contains_var(TISR));
        assert_eq!(
            windowed.forcings.time().unwrap(),
            windowed.targets.time().unwrap()
        );
    }

    #[test]
    fn test_overlap_rejected() {
        let data = SyntheticGrid::default().build().unwrap();
        let err = extract_inputs_targets_forcings(
            &data,
            &request(&["2m_temperature"], &["2m_temperature"]),
            &ToaIncidentRadiation::default(),
            WindowMode::Duration,
        )
        .unwrap_err();
        assert!(matches!(err, PrepError::OverlappingVariables { .. }));
    }

    #[test]
    fn test_climate_extends_short_dataset() {
        let data = SyntheticGrid::default().with_steps(2, TimeDelta::hours(12)).build().unwrap();
        let windowed = extract_inputs_targets_forcings_climate(
            &data,
            &request(&PROGRESS_FORCING_VARS, &["2m_temperature"]),
            &ToaIncidentRadiation::default(),
        )
        .unwrap();
        assert_eq!(windowed.inputs.time_len(), 2);
        assert_eq!(windowed.targets.time().unwrap(), &[TimeDelta::hours(24)]);
        // the synthesized target step is a zero placeholder
        let target = windowed.targets.var("2m_temperature").unwrap();
        assert!(target.data.is_deferred());
        assert!(target.values().iter().all(|&v| v == 0.0));
        assert_eq!(windowed.forcings.var("day_progress_sin").unwrap().shape(), vec![1, 1, 4]);
    }
}
