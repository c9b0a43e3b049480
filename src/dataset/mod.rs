//! Labeled, multi-dimensional dataset used throughout the windowing code.
//!
//! A [`Dataset`] is a set of named [`DataArray`]s sharing named dimensions,
//! plus coordinates labelling those dimensions. Every transforming operation
//! returns a new dataset; array storage is reference counted, so untouched
//! variables are shared rather than copied.

pub mod lazy;
pub mod tree;

pub use lazy::LazyArray;

use crate::time_utils::format_timedelta;
use chrono::{DateTime, TimeDelta, Utc};
use ndarray::{Array1, ArrayD, Axis};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Standard dimension and coordinate names
pub const TIME: &str = "time";
pub const BATCH: &str = "batch";
pub const LAT: &str = "lat";
pub const LON: &str = "lon";
pub const LEVEL: &str = "level";
pub const DATETIME: &str = "datetime";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("Variable not found: {0}")]
    MissingVariable(String),

    #[error("Coordinate not found: {0}")]
    MissingCoordinate(String),

    #[error("Dimension not found: {0}")]
    MissingDimension(String),

    #[error("Label {label} not found along dimension '{dim}'")]
    LabelNotFound { dim: String, label: String },

    #[error("'{name}' has size {found} along '{dim}', dataset has {existing}")]
    SizeConflict {
        name: String,
        dim: String,
        existing: usize,
        found: usize,
    },

    #[error("Dimensions {dims:?} do not match array rank {ndim}")]
    RankMismatch { dims: Vec<String>, ndim: usize },

    #[error("Cannot squeeze dimension '{dim}' of size {size}")]
    NonSingletonSqueeze { dim: String, size: usize },

    #[error("Coordinate '{0}' has an unexpected value type")]
    CoordinateType(String),

    #[error("Invalid slice: {0}")]
    InvalidSlice(String),
}

/// Coordinate labels
#[derive(Debug, Clone, PartialEq)]
pub enum CoordValues {
    /// Numeric labels such as latitude, longitude or pressure level
    Float(Array1<f64>),
    /// Offsets from a reference instant
    Timedelta(Vec<TimeDelta>),
    /// Absolute timestamps, `(time)` or `(batch, time)`
    Datetime(ArrayD<DateTime<Utc>>),
}

impl CoordValues {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            CoordValues::Float(values) => vec![values.len()],
            CoordValues::Timedelta(values) => vec![values.len()],
            CoordValues::Datetime(values) => values.shape().to_vec(),
        }
    }

    fn select(&self, axis: usize, indices: &[usize]) -> CoordValues {
        match self {
            CoordValues::Float(values) => CoordValues::Float(values.select(Axis(axis), indices)),
            CoordValues::Timedelta(values) => {
                CoordValues::Timedelta(indices.iter().map(|&i| values[i]).collect())
            }
            CoordValues::Datetime(values) => {
                CoordValues::Datetime(values.select(Axis(axis), indices))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub dims: Vec<String>,
    pub values: CoordValues,
}

impl Coordinate {
    pub fn new(dims: &[&str], values: CoordValues) -> Result<Self, DatasetError> {
        let ndim = values.shape().len();
        if dims.len() != ndim {
            return Err(DatasetError::RankMismatch {
                dims: dims.iter().map(|d| d.to_string()).collect(),
                ndim,
            });
        }
        Ok(Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            values,
        })
    }

    /// One-dimensional numeric coordinate labelling its own dimension
    pub fn float(dim: &str, values: Vec<f64>) -> Self {
        Self {
            dims: vec![dim.to_string()],
            values: CoordValues::Float(Array1::from(values)),
        }
    }

    /// The `time` coordinate
    pub fn timedelta(values: Vec<TimeDelta>) -> Self {
        Self {
            dims: vec![TIME.to_string()],
            values: CoordValues::Timedelta(values),
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        self.values.shape()
    }

    fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }
}

/// A named-dimension array
#[derive(Debug, Clone)]
pub struct DataArray {
    pub dims: Vec<String>,
    pub data: LazyArray,
}

impl DataArray {
    pub fn new(dims: &[&str], data: impl Into<LazyArray>) -> Result<Self, DatasetError> {
        let data = data.into();
        if dims.len() != data.ndim() {
            return Err(DatasetError::RankMismatch {
                dims: dims.iter().map(|d| d.to_string()).collect(),
                ndim: data.ndim(),
            });
        }
        Ok(Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data,
        })
    }

    pub fn shape(&self) -> Vec<usize> {
        self.data.shape()
    }

    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.axis_of(dim).is_some()
    }

    /// Materialized values
    pub fn values(&self) -> ArrayD<f32> {
        self.data.materialize().to_owned()
    }

    /// Add a length-one dimension named `dim` at `axis`.
    pub fn expand_dims(&self, dim: &str, axis: usize) -> DataArray {
        let mut dims = self.dims.clone();
        dims.insert(axis, dim.to_string());
        DataArray {
            dims,
            data: self.data.insert_axis(axis),
        }
    }

    /// Remove the length-one dimension `dim`.
    pub fn squeeze(&self, dim: &str) -> Result<DataArray, DatasetError> {
        let axis = self
            .axis_of(dim)
            .ok_or_else(|| DatasetError::MissingDimension(dim.to_string()))?;
        let size = self.shape()[axis];
        if size != 1 {
            return Err(DatasetError::NonSingletonSqueeze {
                dim: dim.to_string(),
                size,
            });
        }
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(DataArray {
            dims,
            data: self.data.remove_axis(axis),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    data_vars: BTreeMap<String, DataArray>,
    coords: BTreeMap<String, Coordinate>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_vars(&self) -> &BTreeMap<String, DataArray> {
        &self.data_vars
    }

    pub fn coords(&self) -> &BTreeMap<String, Coordinate> {
        &self.coords
    }

    pub fn var(&self, name: &str) -> Result<&DataArray, DatasetError> {
        self.data_vars
            .get(name)
            .ok_or_else(|| DatasetError::MissingVariable(name.to_string()))
    }

    pub fn contains_var(&self, name: &str) -> bool {
        self.data_vars.contains_key(name)
    }

    pub fn coord(&self, name: &str) -> Result<&Coordinate, DatasetError> {
        self.coords
            .get(name)
            .ok_or_else(|| DatasetError::MissingCoordinate(name.to_string()))
    }

    pub fn has_coord(&self, name: &str) -> bool {
        self.coords.contains_key(name)
    }

    /// Sizes of every dimension used by a coordinate or variable
    pub fn dims(&self) -> BTreeMap<String, usize> {
        self.dim_sizes(None)
    }

    /// Dimension sizes ignoring the coordinate and variable named `skip`
    fn dim_sizes(&self, skip: Option<&str>) -> BTreeMap<String, usize> {
        let kept = |name: &String| skip != Some(name.as_str());
        let mut sizes = BTreeMap::new();
        let coord_dims = self
            .coords
            .iter()
            .filter(|(name, _)| kept(name))
            .map(|(_, c)| (&c.dims, c.shape()));
        let var_dims = self
            .data_vars
            .iter()
            .filter(|(name, _)| kept(name))
            .map(|(_, v)| (&v.dims, v.shape()));
        for (dims, shape) in coord_dims.chain(var_dims) {
            for (dim, size) in dims.iter().zip(shape) {
                sizes.entry(dim.clone()).or_insert(size);
            }
        }
        sizes
    }

    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.dims().get(dim).copied()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dim_size(dim).is_some()
    }

    /// The `time` coordinate labels
    pub fn time(&self) -> Result<&[TimeDelta], DatasetError> {
        match &self.coord(TIME)?.values {
            CoordValues::Timedelta(values) => Ok(values),
            _ => Err(DatasetError::CoordinateType(TIME.to_string())),
        }
    }

    /// Number of timesteps, zero if there is no time coordinate
    pub fn time_len(&self) -> usize {
        self.dim_size(TIME).unwrap_or(0)
    }

    pub fn datetime(&self) -> Result<&ArrayD<DateTime<Utc>>, DatasetError> {
        match &self.coord(DATETIME)?.values {
            CoordValues::Datetime(values) => Ok(values),
            _ => Err(DatasetError::CoordinateType(DATETIME.to_string())),
        }
    }

    pub fn float_coord(&self, name: &str) -> Result<&Array1<f64>, DatasetError> {
        match &self.coord(name)?.values {
            CoordValues::Float(values) => Ok(values),
            _ => Err(DatasetError::CoordinateType(name.to_string())),
        }
    }

    fn check_sizes(
        &self,
        name: &str,
        dims: &[String],
        shape: &[usize],
        replacing: Option<&str>,
    ) -> Result<(), DatasetError> {
        let sizes = self.dim_sizes(replacing);
        for (dim, &found) in dims.iter().zip(shape) {
            if let Some(&size) = sizes.get(dim) {
                if size != found {
                    return Err(DatasetError::SizeConflict {
                        name: name.to_string(),
                        dim: dim.clone(),
                        existing: size,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    /// Add or replace a coordinate.
    pub fn set_coord(&mut self, name: &str, coord: Coordinate) -> Result<(), DatasetError> {
        self.check_sizes(name, &coord.dims, &coord.shape(), Some(name))?;
        self.coords.insert(name.to_string(), coord);
        Ok(())
    }

    pub fn with_coord(mut self, name: &str, coord: Coordinate) -> Result<Self, DatasetError> {
        self.set_coord(name, coord)?;
        Ok(self)
    }

    /// Add or replace a data variable.
    pub fn insert_var(&mut self, name: &str, var: DataArray) -> Result<(), DatasetError> {
        self.check_sizes(name, &var.dims, &var.shape(), Some(name))?;
        self.data_vars.insert(name.to_string(), var);
        Ok(())
    }

    pub fn with_var(mut self, name: &str, var: DataArray) -> Result<Self, DatasetError> {
        self.insert_var(name, var)?;
        Ok(self)
    }

    /// Insert every variable of `vars`.
    pub fn update(&mut self, vars: BTreeMap<String, DataArray>) -> Result<(), DatasetError> {
        for (name, var) in vars {
            self.insert_var(&name, var)?;
        }
        Ok(())
    }

    /// Remove variables and coordinates by name; absent names are ignored.
    pub fn drop_vars(&self, names: &[&str]) -> Dataset {
        let mut out = self.clone();
        for name in names {
            out.data_vars.remove(*name);
            out.coords.remove(*name);
        }
        out
    }

    /// Keep only the named variables, along with the coordinates they use.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset, DatasetError> {
        let mut data_vars = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            data_vars.insert(name.to_string(), self.var(name)?.clone());
        }
        let used: BTreeSet<&String> = data_vars.values().flat_map(|v| v.dims.iter()).collect();
        let coords = self
            .coords
            .iter()
            .filter(|(_, c)| c.dims.iter().all(|d| used.contains(d)))
            .map(|(n, c)| (n.clone(), c.clone()))
            .collect();
        Ok(Dataset { data_vars, coords })
    }

    /// Positional selection along `dim`.
    pub fn isel(&self, dim: &str, indices: &[usize]) -> Result<Dataset, DatasetError> {
        let size = self
            .dim_size(dim)
            .ok_or_else(|| DatasetError::MissingDimension(dim.to_string()))?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= size) {
            return Err(DatasetError::InvalidSlice(format!(
                "index {} out of bounds for dimension '{}' of size {}",
                bad, dim, size
            )));
        }

        let data_vars = self
            .data_vars
            .iter()
            .map(|(name, var)| {
                let var = match var.axis_of(dim) {
                    Some(axis) => DataArray {
                        dims: var.dims.clone(),
                        data: var.data.select(axis, indices),
                    },
                    None => var.clone(),
                };
                (name.clone(), var)
            })
            .collect();
        let coords = self
            .coords
            .iter()
            .map(|(name, coord)| {
                let coord = match coord.axis_of(dim) {
                    Some(axis) => Coordinate {
                        dims: coord.dims.clone(),
                        values: coord.values.select(axis, indices),
                    },
                    None => coord.clone(),
                };
                (name.clone(), coord)
            })
            .collect();
        Ok(Dataset { data_vars, coords })
    }

    /// Select exact time labels, in the order given.
    pub fn sel_time(&self, labels: &[TimeDelta]) -> Result<Dataset, DatasetError> {
        let time = self.time()?;
        let indices = labels
            .iter()
            .map(|label| {
                time.iter()
                    .position(|t| t == label)
                    .ok_or_else(|| DatasetError::LabelNotFound {
                        dim: TIME.to_string(),
                        label: format_timedelta(*label),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.isel(TIME, &indices)
    }

    /// Select time labels in `[start, stop]`, both ends inclusive.
    ///
    /// With a step, only labels whose offset from the first selected label is
    /// a whole multiple of the step are kept.
    pub fn sel_time_range(
        &self,
        start: TimeDelta,
        stop: TimeDelta,
        step: Option<TimeDelta>,
    ) -> Result<Dataset, DatasetError> {
        let time = self.time()?;
        let mut indices: Vec<usize> = time
            .iter()
            .enumerate()
            .filter(|(_, t)| **t >= start && **t <= stop)
            .map(|(i, _)| i)
            .collect();

        if let Some(step) = step {
            if step <= TimeDelta::zero() {
                return Err(DatasetError::InvalidSlice(format!(
                    "step must be positive, got {}",
                    format_timedelta(step)
                )));
            }
            if let Some(&first) = indices.first() {
                let origin = time[first];
                let step_ns = step.num_nanoseconds().unwrap_or(i64::MAX);
                indices.retain(|&i| {
                    (time[i] - origin)
                        .num_nanoseconds()
                        .map_or(false, |ns| ns % step_ns == 0)
                });
            }
        }
        self.isel(TIME, &indices)
    }

    /// Select pressure levels by label, in the order given.
    pub fn sel_levels(&self, levels: &[f64]) -> Result<Dataset, DatasetError> {
        let values = self.float_coord(LEVEL)?;
        let indices = levels
            .iter()
            .map(|level| {
                values
                    .iter()
                    .position(|v| v == level)
                    .ok_or_else(|| DatasetError::LabelNotFound {
                        dim: LEVEL.to_string(),
                        label: level.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.isel(LEVEL, &indices)
    }

    /// Replace the time labels, keeping the number of timesteps.
    pub fn assign_time(&self, time: Vec<TimeDelta>) -> Result<Dataset, DatasetError> {
        let mut out = self.clone();
        out.set_coord(TIME, Coordinate::timedelta(time))?;
        Ok(out)
    }

    /// Drop the length-one dimension `dim` from every variable and coordinate.
    ///
    /// A coordinate labelling only `dim` is removed.
    pub fn squeeze(&self, dim: &str) -> Result<Dataset, DatasetError> {
        let size = self
            .dim_size(dim)
            .ok_or_else(|| DatasetError::MissingDimension(dim.to_string()))?;
        if size != 1 {
            return Err(DatasetError::NonSingletonSqueeze {
                dim: dim.to_string(),
                size,
            });
        }

        let mut out = Dataset::new();
        for (name, coord) in &self.coords {
            match coord.axis_of(dim) {
                None => {
                    out.coords.insert(name.clone(), coord.clone());
                }
                Some(_) if coord.dims.len() == 1 => {}
                Some(axis) => {
                    let values = match &coord.values {
                        CoordValues::Datetime(values) => {
                            CoordValues::Datetime(values.index_axis(Axis(axis), 0).to_owned())
                        }
                        _ => return Err(DatasetError::CoordinateType(name.clone())),
                    };
                    let mut dims = coord.dims.clone();
                    dims.remove(axis);
                    out.coords.insert(name.clone(), Coordinate { dims, values });
                }
            }
        }
        for (name, var) in &self.data_vars {
            let var = if var.has_dim(dim) {
                var.squeeze(dim)?
            } else {
                var.clone()
            };
            out.data_vars.insert(name.clone(), var);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array3};

    fn hours(h: i64) -> TimeDelta {
        TimeDelta::hours(h)
    }

    fn sample() -> Dataset {
        let data = Array::from_shape_fn((4, 2, 3), |(t, j, i)| (t * 100 + j * 10 + i) as f32);
        Dataset::new()
            .with_coord(TIME, Coordinate::timedelta((0..4).map(|t| hours(6 * t)).collect()))
            .unwrap()
            .with_coord(LAT, Coordinate::float(LAT, vec![-10.0, 10.0]))
            .unwrap()
            .with_coord(LON, Coordinate::float(LON, vec![0.0, 120.0, 240.0]))
            .unwrap()
            .with_var("t2m", DataArray::new(&[TIME, LAT, LON], data.into_dyn()).unwrap())
            .unwrap()
    }

    #[test]
    fn test_dims_and_size_conflict() {
        let mut ds = sample();
        assert_eq!(ds.dim_size(TIME), Some(4));
        assert_eq!(ds.dim_size(LON), Some(3));

        let wrong = DataArray::new(&[TIME, LAT], Array3::<f32>::zeros((5, 2, 1)).into_dyn());
        assert!(wrong.is_err());

        let wrong = DataArray::new(&[TIME], ndarray::Array1::<f32>::zeros(5).into_dyn()).unwrap();
        assert!(matches!(
            ds.insert_var("bad", wrong),
            Err(DatasetError::SizeConflict { .. })
        ));
    }

    #[test]
    fn test_replacing_skips_only_the_replaced_entry() {
        let mut ds = sample();
        let mask = DataArray::new(&["cell"], ndarray::Array1::<f32>::zeros(2).into_dyn());
        ds.insert_var("mask", mask.unwrap()).unwrap();
        let wider = DataArray::new(&["cell"], ndarray::Array1::<f32>::ones(5).into_dyn()).unwrap();
        ds.insert_var("mask", wider).unwrap();
        assert_eq!(ds.dim_size("cell"), Some(5));

        // lat is still pinned by its coordinate
        let resized = DataArray::new(&[TIME, LAT, LON], Array3::<f32>::zeros((4, 3, 3)).into_dyn());
        assert!(matches!(
            ds.insert_var("t2m", resized.unwrap()),
            Err(DatasetError::SizeConflict { existing: 2, found: 3, .. })
        ));
        assert_eq!(ds.var("t2m").unwrap().shape(), vec![4, 2, 3]);
    }

    #[test]
    fn test_sel_time_exact_labels() {
        let ds = sample();
        let picked = ds.sel_time(&[hours(18), hours(6)]).unwrap();
        assert_eq!(picked.time().unwrap(), &[hours(18), hours(6)]);
        let values = picked.var("t2m").unwrap().values();
        assert_eq!(values[[0, 0, 0]], 300.0);
        assert_eq!(values[[1, 1, 2]], 112.0);

        let missing = ds.sel_time(&[hours(5)]);
        assert!(matches!(missing, Err(DatasetError::LabelNotFound { .. })));
    }

    #[test]
    fn test_sel_time_range_inclusive_with_step() {
        let ds = sample();
        let picked = ds.sel_time_range(hours(6), hours(18), None).unwrap();
        assert_eq!(picked.time().unwrap(), &[hours(6), hours(12), hours(18)]);

        let stepped = ds.sel_time_range(hours(0), hours(18), Some(hours(12))).unwrap();
        assert_eq!(stepped.time().unwrap(), &[hours(0), hours(12)]);

        let empty = ds.sel_time_range(hours(19), hours(30), None).unwrap();
        assert_eq!(empty.time_len(), 0);
    }

    #[test]
    fn test_project_and_drop() {
        let ds = sample();
        let projected = ds.project(&["t2m"]).unwrap();
        assert!(projected.has_coord(LAT));
        assert!(ds.project(&["missing"]).is_err());

        let dropped = ds.drop_vars(&["t2m", "not_there"]);
        assert!(!dropped.contains_var("t2m"));
        assert!(dropped.has_coord(TIME));
    }

    #[test]
    fn test_squeeze_batch() {
        let ds = sample();
        let batched = ds.var("t2m").unwrap().expand_dims(BATCH, 0);
        let mut with_batch = Dataset::new();
        with_batch.insert_var("t2m", batched).unwrap();
        assert_eq!(with_batch.dim_size(BATCH), Some(1));

        let squeezed = with_batch.squeeze(BATCH).unwrap();
        assert_eq!(squeezed.var("t2m").unwrap().dims, vec![TIME, LAT, LON]);
        assert!(ds.squeeze(LAT).is_err());
    }
}
