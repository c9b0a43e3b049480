//! Derived forcing variables: day/year progress features and solar radiation.
//!
//! Both injectors take the dataset by value and return it with the missing
//! variables added, so callers rebind the result instead of relying on
//! in-place mutation.

use crate::dataset::{Dataset, BATCH, DATETIME, LAT, LON, TIME};
use crate::error::PrepError;
use crate::math::{day_progress, featurize_progress, year_progress, SolarRadiation};
use crate::time_utils::seconds_since_epoch;
use log::{debug, info};

pub const DAY_PROGRESS: &str = "day_progress";
pub const YEAR_PROGRESS: &str = "year_progress";
pub const DAY_PROGRESS_SIN: &str = "day_progress_sin";
pub const DAY_PROGRESS_COS: &str = "day_progress_cos";
pub const YEAR_PROGRESS_SIN: &str = "year_progress_sin";
pub const YEAR_PROGRESS_COS: &str = "year_progress_cos";

/// Top-of-atmosphere incident solar radiation
pub const TISR: &str = "toa_incident_solar_radiation";

/// Every variable produced by [`add_derived_vars`]
pub const DERIVED_VARS: [&str; 6] = [
    DAY_PROGRESS,
    DAY_PROGRESS_SIN,
    DAY_PROGRESS_COS,
    YEAR_PROGRESS,
    YEAR_PROGRESS_SIN,
    YEAR_PROGRESS_COS,
];

/// The periodic forcings regenerated when a dataset is extended in time
pub const PROGRESS_FORCING_VARS: [&str; 4] = [
    YEAR_PROGRESS_SIN,
    YEAR_PROGRESS_COS,
    DAY_PROGRESS_SIN,
    DAY_PROGRESS_COS,
];

fn require_coords(data: &Dataset, names: &[&str]) -> Result<(), PrepError> {
    match names.iter().find(|name| !data.has_coord(name)) {
        Some(missing) => Err(PrepError::MissingCoordinate(missing.to_string())),
        None => Ok(()),
    }
}

/// Add year and day progress features that are not already present.
///
/// Requires `datetime` and `lon` coordinates. Times are taken at second
/// resolution.
pub fn add_derived_vars(mut data: Dataset) -> Result<Dataset, PrepError> {
    require_coords(&data, &[DATETIME, LON])?;

    let seconds = data.datetime()?.mapv(|dt| seconds_since_epoch(&dt));
    let mut dims = Vec::new();
    if data.has_dim(BATCH) {
        dims.push(BATCH);
    }
    dims.push(TIME);

    if !data.contains_var(YEAR_PROGRESS) {
        let progress = year_progress(seconds.view());
        data.update(featurize_progress(YEAR_PROGRESS, &dims, progress)?)?;
        debug!("Added {} features", YEAR_PROGRESS);
    }

    if !data.contains_var(DAY_PROGRESS) {
        let lon_coord = data.coord(LON)?;
        let lon_dims: Vec<String> = lon_coord.dims.clone();
        let progress = day_progress(seconds.view(), data.float_coord(LON)?.view());
        let mut day_dims = dims.clone();
        day_dims.extend(lon_dims.iter().map(String::as_str));
        data.update(featurize_progress(DAY_PROGRESS, &day_dims, progress)?)?;
        debug!("Added {} features", DAY_PROGRESS);
    }

    Ok(data)
}

/// Add solar radiation if it is not already present.
///
/// Requires `datetime`, `lat` and `lon`. A `batch` dimension must have size
/// one; it is removed for the radiation computation and restored afterwards.
pub fn add_solar_var(
    mut data: Dataset,
    solar: &dyn SolarRadiation,
) -> Result<Dataset, PrepError> {
    if data.contains_var(TISR) {
        return Ok(data);
    }
    require_coords(&data, &[DATETIME, LAT, LON])?;

    let batched = match data.dim_size(BATCH) {
        Some(1) => true,
        Some(size) => return Err(PrepError::BatchSize(size)),
        None => false,
    };

    let radiation = if batched {
        let unbatched = data.squeeze(BATCH)?;
        solar
            .toa_incident_solar_radiation(&unbatched)?
            .expand_dims(BATCH, 0)
    } else {
        solar.toa_incident_solar_radiation(&data)?
    };

    info!("Added {} with dims {:?}", TISR, radiation.dims);
    data.insert_var(TISR, radiation)?;
    Ok(data)
}
