//! Seeded synthetic datasets on a regular grid.
//!
//! Used by the `synthetic` subcommand and as test fixtures; the layout
//! mirrors a batched ERA5-style sample with surface fields, fields on
//! pressure levels and a static land-sea mask.

use crate::dataset::{
    CoordValues, Coordinate, DataArray, Dataset, BATCH, DATETIME, LAT, LEVEL, LON, TIME,
};
use crate::error::PrepError;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use ndarray::{Array, Array2, ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Static field without a time dimension
pub const LAND_SEA_MASK: &str = "land_sea_mask";

#[derive(Debug, Clone)]
pub struct SyntheticGrid {
    /// Size of the leading batch dimension; `None` leaves it out
    pub batch: Option<usize>,
    pub steps: usize,
    pub timestep: TimeDelta,
    /// Offset of the first time label
    pub start_offset: TimeDelta,
    /// Timestamp of the first step of batch row 0
    pub start: DateTime<Utc>,
    /// Shift between the first timestamps of consecutive batch rows
    pub batch_spacing: TimeDelta,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub levels: Vec<f64>,
    /// Variables with dims `(batch?, time, lat, lon)`
    pub surface_variables: Vec<String>,
    /// Variables with dims `(batch?, time, level, lat, lon)`
    pub level_variables: Vec<String>,
    pub seed: u64,
}

impl Default for SyntheticGrid {
    fn default() -> Self {
        Self {
            batch: Some(1),
            steps: 4,
            timestep: TimeDelta::hours(6),
            start_offset: TimeDelta::zero(),
            start: Utc
                .with_ymd_and_hms(2016, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
            batch_spacing: TimeDelta::days(1),
            lat: vec![-90.0, -45.0, 0.0, 45.0, 90.0],
            lon: vec![0.0, 90.0, 180.0, 270.0],
            levels: vec![500.0, 850.0, 1000.0],
            surface_variables: vec![
                "2m_temperature".to_string(),
                "mean_sea_level_pressure".to_string(),
            ],
            level_variables: vec!["temperature".to_string(), "geopotential".to_string()],
            seed: 0,
        }
    }
}

impl SyntheticGrid {
    pub fn with_steps(mut self, steps: usize, timestep: TimeDelta) -> Self {
        self.steps = steps;
        self.timestep = timestep;
        self
    }

    pub fn with_batch(mut self, batch: Option<usize>) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_start_offset(mut self, start_offset: TimeDelta) -> Self {
        self.start_offset = start_offset;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Time labels `start_offset + k * timestep`
    pub fn time_labels(&self) -> Vec<TimeDelta> {
        (0..self.steps)
            .map(|k| self.start_offset + self.timestep * k as i32)
            .collect()
    }

    fn leading_shape(&self) -> (Vec<&'static str>, Vec<usize>) {
        match self.batch {
            Some(n) => (vec![BATCH, TIME], vec![n, self.steps]),
            None => (vec![TIME], vec![self.steps]),
        }
    }

    fn random_var(
        &self,
        rng: &mut StdRng,
        dims: &[&str],
        shape: &[usize],
    ) -> Result<DataArray, PrepError> {
        let values = ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.random_range(-1.0_f32..1.0));
        Ok(DataArray::new(dims, values)?)
    }

    pub fn build(&self) -> Result<Dataset, PrepError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let (leading_dims, leading_shape) = self.leading_shape();

        let rows = self.batch.unwrap_or(1);
        let datetime = Array2::from_shape_fn((rows, self.steps), |(b, k)| {
            self.start + self.batch_spacing * b as i32 + self.timestep * k as i32
        });
        let datetime = match self.batch {
            Some(_) => datetime.into_dyn(),
            None => datetime.into_dyn().index_axis_move(ndarray::Axis(0), 0),
        };

        let mut data = Dataset::new()
            .with_coord(TIME, Coordinate::timedelta(self.time_labels()))?
            .with_coord(
                DATETIME,
                Coordinate::new(&leading_dims, CoordValues::Datetime(datetime))?,
            )?
            .with_coord(LAT, Coordinate::float(LAT, self.lat.clone()))?
            .with_coord(LON, Coordinate::float(LON, self.lon.clone()))?
            .with_coord(LEVEL, Coordinate::float(LEVEL, self.levels.clone()))?;

        let mut surface_dims = leading_dims.clone();
        surface_dims.extend([LAT, LON]);
        let mut surface_shape = leading_shape.clone();
        surface_shape.extend([self.lat.len(), self.lon.len()]);
        for name in &self.surface_variables {
            let var = self.random_var(&mut rng, &surface_dims, &surface_shape)?;
            data.insert_var(name, var)?;
        }

        let mut level_dims = leading_dims;
        level_dims.extend([LEVEL, LAT, LON]);
        let mut level_shape = leading_shape;
        level_shape.extend([self.levels.len(), self.lat.len(), self.lon.len()]);
        for name in &self.level_variables {
            let var = self.random_var(&mut rng, &level_dims, &level_shape)?;
            data.insert_var(name, var)?;
        }

        let mask = Array::from_shape_fn((self.lat.len(), self.lon.len()), |_| {
            if rng.random_bool(0.3) {
                1.0_f32
            } else {
                0.0
            }
        });
        data.insert_var(LAND_SEA_MASK, DataArray::new(&[LAT, LON], mask.into_dyn())?)?;

        Ok(data)
    }
}
