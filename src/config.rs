use crate::features::{
    DAY_PROGRESS_COS, DAY_PROGRESS_SIN, TISR, YEAR_PROGRESS_COS, YEAR_PROGRESS_SIN,
};
use crate::lead_times::TargetLeadTimes;
use crate::math::ToaIncidentRadiation;
use crate::pipeline::ExtractionRequest;
use crate::synthetic::{SyntheticGrid, LAND_SEA_MASK};
use crate::time_utils::{format_timedelta, parse_timedelta};
use crate::windows::WindowMode;
use chrono::TimeDelta;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::collections::BTreeSet;

/// The 13 pressure levels (hPa) of the WeatherBench ERA5 subset
pub const ERA5_PRESSURE_LEVELS: [i32; 13] =
    [50, 100, 150, 200, 250, 300, 400, 500, 600, 700, 850, 925, 1000];

#[derive(Clone, Debug)]
pub struct PrepConfig {
    // Model contract
    pub input_variables: Vec<String>,
    pub target_variables: Vec<String>,
    pub forcing_variables: Vec<String>,
    pub pressure_levels: Vec<i32>,

    // Windows
    pub input_duration: TimeDelta,
    pub target_lead_times: TargetLeadTimes,
    pub mode: WindowMode,

    // Solar radiation
    /// Accumulation period ending at each timestamp; zero for instantaneous
    pub solar_integration_period: TimeDelta,
    pub solar_integration_bins: usize,

    /// Grid used by the `synthetic` subcommand
    pub grid: SyntheticGrid,
    pub verbose: bool,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for PrepConfig {
    fn default() -> Self {
        let target_variables = strings(&[
            "2m_temperature",
            "mean_sea_level_pressure",
            "temperature",
            "geopotential",
        ]);
        let forcing_variables = strings(&[
            TISR,
            YEAR_PROGRESS_SIN,
            YEAR_PROGRESS_COS,
            DAY_PROGRESS_SIN,
            DAY_PROGRESS_COS,
        ]);
        let mut input_variables = target_variables.clone();
        input_variables.extend(forcing_variables.iter().cloned());
        input_variables.push(LAND_SEA_MASK.to_string());

        let grid = SyntheticGrid {
            levels: ERA5_PRESSURE_LEVELS.iter().map(|&l| l as f64).collect(),
            surface_variables: target_variables[..2].to_vec(),
            level_variables: target_variables[2..].to_vec(),
            ..SyntheticGrid::default()
        };

        Self {
            input_variables,
            target_variables,
            forcing_variables,
            pressure_levels: ERA5_PRESSURE_LEVELS.to_vec(),
            input_duration: TimeDelta::hours(12),
            target_lead_times: TargetLeadTimes::Single(TimeDelta::hours(6)),
            mode: WindowMode::Duration,
            solar_integration_period: TimeDelta::hours(1),
            solar_integration_bins: 12,
            grid,
            verbose: false,
        }
    }
}

impl PrepConfig {
    /// Build from the arguments of the `synthetic` subcommand
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, String> {
        let defaults = Self::default();

        let input_duration = parse_timedelta(string_arg(matches, "input-duration")?)?;
        let target_lead_times: TargetLeadTimes = string_arg(matches, "lead-times")?
            .parse()
            .map_err(|e: crate::error::PrepError| e.to_string())?;
        let mode = match string_arg(matches, "mode")?.as_str() {
            "duration" => WindowMode::Duration,
            "climate" => WindowMode::Climate,
            other => return Err(format!("Invalid window mode: {}", other)),
        };

        let pressure_levels = string_arg(matches, "levels")?
            .split(',')
            .map(|level| {
                level
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| format!("Invalid pressure level: {}", level))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let forcing_variables = match matches.get_one::<String>("forcing-variables") {
            Some(list) => list
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            None => defaults.forcing_variables.clone(),
        };

        let steps = *matches
            .get_one::<usize>("steps")
            .ok_or("Missing argument: steps")?;
        let timestep = parse_timedelta(string_arg(matches, "timestep")?)?;
        let batch = if matches.get_flag("no-batch") {
            None
        } else {
            matches.get_one::<usize>("batch").copied()
        };
        let seed = matches.get_one::<u64>("seed").copied().unwrap_or(0);

        let solar_integration_period = parse_timedelta(string_arg(matches, "solar-period")?)?;
        let solar_integration_bins = matches
            .get_one::<usize>("solar-bins")
            .copied()
            .unwrap_or(defaults.solar_integration_bins);

        let grid = SyntheticGrid {
            levels: pressure_levels.iter().map(|&l| l as f64).collect(),
            ..defaults.grid.clone()
        }
        .with_steps(steps, timestep)
        .with_batch(batch)
        .with_seed(seed);

        let config = Self {
            forcing_variables,
            pressure_levels,
            input_duration,
            target_lead_times,
            mode,
            solar_integration_period,
            solar_integration_bins,
            grid,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.input_variables.is_empty() {
            return Err("At least one input variable is required".to_string());
        }
        if self.target_variables.is_empty() {
            return Err("At least one target variable is required".to_string());
        }
        if self.input_duration <= TimeDelta::zero() {
            return Err(format!(
                "Input duration must be positive, got {}",
                format_timedelta(self.input_duration)
            ));
        }
        if self.grid.timestep <= TimeDelta::zero() {
            return Err(format!(
                "Timestep must be positive, got {}",
                format_timedelta(self.grid.timestep)
            ));
        }
        if self.solar_integration_period < TimeDelta::zero() {
            return Err("Solar integration period cannot be negative".to_string());
        }

        let mut seen = BTreeSet::new();
        if let Some(level) = self.pressure_levels.iter().find(|&&l| !seen.insert(l)) {
            return Err(format!("Duplicate pressure level: {}", level));
        }

        self.target_lead_times
            .normalize()
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn to_request(&self) -> ExtractionRequest {
        ExtractionRequest {
            input_variables: self.input_variables.clone(),
            target_variables: self.target_variables.clone(),
            forcing_variables: self.forcing_variables.clone(),
            pressure_levels: self.pressure_levels.clone(),
            input_duration: self.input_duration,
            target_lead_times: self.target_lead_times.clone(),
        }
    }

    pub fn solar(&self) -> ToaIncidentRadiation {
        ToaIncidentRadiation::new(self.solar_integration_period, self.solar_integration_bins)
    }

    #[cfg(test)]
    pub fn for_testing(steps: usize, timestep: TimeDelta) -> Result<Self, String> {
        let defaults = Self::default();
        let config = Self {
            grid: defaults.grid.clone().with_steps(steps, timestep),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }
}

fn string_arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String, String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| format!("Missing argument: {}", name))
}

pub fn build_cli() -> Command {
    Command::new("forecast_windows")
        .version("0.1.0")
        .about("Input, target and forcing windows for gridded weather datasets")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("lead-times")
                .about("Normalize a target lead-time specification")
                .arg(
                    Arg::new("lead_times")
                        .value_name("LEAD_TIMES")
                        .help("Lead times: 3d | 3d,5d | 6h..24h | ..24h | 6h..24h/6h")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("synthetic")
                .about("Window a seeded synthetic dataset and print the resulting shapes")
                .arg(
                    Arg::new("input-duration")
                        .short('d')
                        .long("input-duration")
                        .value_name("DURATION")
                        .help("Length of the input window")
                        .default_value("12h"),
                )
                .arg(
                    Arg::new("lead-times")
                        .short('l')
                        .long("lead-times")
                        .value_name("LEAD_TIMES")
                        .help("Target lead times")
                        .default_value("6h"),
                )
                .arg(
                    Arg::new("mode")
                        .short('m')
                        .long("mode")
                        .value_name("MODE")
                        .help("Window mode")
                        .value_parser(["duration", "climate"])
                        .default_value("duration"),
                )
                .arg(
                    Arg::new("levels")
                        .long("levels")
                        .value_name("HPA")
                        .help("Comma-separated pressure levels")
                        .default_value("50,100,150,200,250,300,400,500,600,700,850,925,1000"),
                )
                .arg(
                    Arg::new("forcing-variables")
                        .long("forcing-variables")
                        .value_name("NAMES")
                        .help("Comma-separated forcing variables"),
                )
                .arg(
                    Arg::new("steps")
                        .short('n')
                        .long("steps")
                        .value_name("COUNT")
                        .help("Number of timesteps in the synthetic dataset")
                        .default_value("4")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("timestep")
                        .short('t')
                        .long("timestep")
                        .value_name("DURATION")
                        .help("Spacing of the synthetic time axis")
                        .default_value("6h"),
                )
                .arg(
                    Arg::new("batch")
                        .long("batch")
                        .value_name("COUNT")
                        .help("Size of the batch dimension")
                        .default_value("1")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("no-batch")
                        .long("no-batch")
                        .help("Build the dataset without a batch dimension")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_name("SEED")
                        .help("Random seed for the synthetic fields")
                        .default_value("0")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("solar-period")
                        .long("solar-period")
                        .value_name("DURATION")
                        .help("Solar radiation accumulation period (0s for instantaneous)")
                        .default_value("1h"),
                )
                .arg(
                    Arg::new("solar-bins")
                        .long("solar-bins")
                        .value_name("COUNT")
                        .help("Integration bins per accumulation period")
                        .default_value("12")
                        .value_parser(value_parser!(usize)),
                ),
        )
}
