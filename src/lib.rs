pub mod config;
pub mod dataset;
pub mod error;
pub mod extend;
pub mod features;
pub mod lead_times;
pub mod math;
pub mod pipeline;
pub mod synthetic;
pub mod time_utils;
pub mod windows;

pub use dataset::{DataArray, Dataset};
pub use error::PrepError;
pub use extend::extend_dataset_in_time;
pub use features::{add_derived_vars, add_solar_var};
pub use lead_times::{process_target_lead_times, TargetLeadTimes};
pub use pipeline::{
    extract_inputs_targets_forcings, extract_inputs_targets_forcings_climate, ExtractionRequest,
    WindowedData,
};
pub use windows::{extract_input_target_times, WindowMode};
