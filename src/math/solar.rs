use crate::dataset::{DataArray, Dataset, DATETIME, LAT, LON, TIME};
use crate::error::PrepError;
use crate::time_utils::{julian_day, SEC_PER_DAY};
use chrono::TimeDelta;
use log::debug;
use ndarray::Array3;

/// Solar constant at 1 AU (W/m²)
pub const SOLAR_CONSTANT: f64 = 1361.0;

/// Julian day of the J2000.0 epoch
const J2000: f64 = 2451545.0;

/// Source of top-of-atmosphere incident solar radiation.
pub trait SolarRadiation {
    /// Radiation for a dataset with a one-dimensional `datetime (time)`
    /// coordinate plus `lat` and `lon`. The result has dims `(time, lat, lon)`.
    fn toa_incident_solar_radiation(&self, data: &Dataset) -> Result<DataArray, PrepError>;
}

/// Low precision solar ephemeris (Astronomical Almanac), good to ~0.01°
#[derive(Debug, Clone, Copy)]
pub struct SunPosition {
    /// Declination (radians)
    pub declination: f64,
    /// Right ascension (radians)
    pub right_ascension: f64,
    /// Greenwich mean sidereal time (radians)
    pub sidereal_time: f64,
    /// Earth-Sun distance (AU)
    pub distance: f64,
}

impl SunPosition {
    pub fn at(julian_day: f64) -> Self {
        let n = julian_day - J2000;
        let mean_longitude = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
        let mean_anomaly = (357.528 + 0.985_600_3 * n).rem_euclid(360.0).to_radians();
        let ecliptic_longitude = (mean_longitude
            + 1.915 * mean_anomaly.sin()
            + 0.020 * (2.0 * mean_anomaly).sin())
        .to_radians();
        let obliquity = (23.439 - 0.000_000_4 * n).to_radians();

        let declination = (obliquity.sin() * ecliptic_longitude.sin()).asin();
        let right_ascension =
            (obliquity.cos() * ecliptic_longitude.sin()).atan2(ecliptic_longitude.cos());
        let sidereal_time = (280.460_618_37 + 360.985_647_366_29 * n)
            .rem_euclid(360.0)
            .to_radians();
        let distance =
            1.000_14 - 0.016_71 * mean_anomaly.cos() - 0.000_14 * (2.0 * mean_anomaly).cos();

        Self {
            declination,
            right_ascension,
            sidereal_time,
            distance,
        }
    }

    /// Cosine of the solar zenith angle at a location (degrees)
    pub fn cos_zenith(&self, lat: f64, lon: f64) -> f64 {
        let lat = lat.to_radians();
        let hour_angle = self.sidereal_time + lon.to_radians() - self.right_ascension;
        lat.sin() * self.declination.sin() + lat.cos() * self.declination.cos() * hour_angle.cos()
    }

    /// Irradiance on a horizontal surface at the top of the atmosphere (W/m²)
    pub fn irradiance(&self, lat: f64, lon: f64, solar_constant: f64) -> f64 {
        solar_constant / (self.distance * self.distance) * self.cos_zenith(lat, lon).max(0.0)
    }
}

/// Top-of-atmosphere incident solar radiation accumulated over the period
/// ending at each timestamp (J/m²).
///
/// A zero period or zero bins gives instantaneous irradiance (W/m²) instead.
#[derive(Debug, Clone)]
pub struct ToaIncidentRadiation {
    pub integration_period: TimeDelta,
    pub num_integration_bins: usize,
    pub solar_constant: f64,
}

impl Default for ToaIncidentRadiation {
    fn default() -> Self {
        Self {
            integration_period: TimeDelta::hours(1),
            num_integration_bins: 12,
            solar_constant: SOLAR_CONSTANT,
        }
    }
}

impl ToaIncidentRadiation {
    pub fn new(integration_period: TimeDelta, num_integration_bins: usize) -> Self {
        Self {
            integration_period,
            num_integration_bins,
            ..Self::default()
        }
    }

    /// Sample instants (Julian days) and trapezoid weights (seconds)
    fn quadrature(&self, end: f64) -> Vec<(f64, f64)> {
        let period_seconds = self.integration_period.num_milliseconds() as f64 / 1000.0;
        if self.num_integration_bins == 0 || period_seconds <= 0.0 {
            return vec![(end, 1.0)];
        }
        let bins = self.num_integration_bins;
        let step_seconds = period_seconds / bins as f64;
        let start = end - period_seconds / SEC_PER_DAY as f64;
        (0..=bins)
            .map(|k| {
                let weight = if k == 0 || k == bins {
                    0.5 * step_seconds
                } else {
                    step_seconds
                };
                (start + k as f64 * step_seconds / SEC_PER_DAY as f64, weight)
            })
            .collect()
    }

    /// Radiation at one location for the period ending at `julian_day`
    pub fn at(&self, julian_day: f64, lat: f64, lon: f64) -> f64 {
        self.quadrature(julian_day)
            .into_iter()
            .map(|(jd, weight)| {
                weight * SunPosition::at(jd).irradiance(lat, lon, self.solar_constant)
            })
            .sum()
    }
}

impl SolarRadiation for ToaIncidentRadiation {
    fn toa_incident_solar_radiation(&self, data: &Dataset) -> Result<DataArray, PrepError> {
        let datetime_coord = data.coord(DATETIME)?;
        if datetime_coord.dims != [TIME] {
            return Err(PrepError::Solar(format!(
                "datetime must have dims (time), got {:?}",
                datetime_coord.dims
            )));
        }
        let datetime = data.datetime()?;
        let lat = data.float_coord(LAT)?;
        let lon = data.float_coord(LON)?;
        debug!(
            "Computing solar radiation for {} times on a {}x{} grid",
            datetime.len(),
            lat.len(),
            lon.len()
        );

        let mut radiation = Array3::<f32>::zeros((datetime.len(), lat.len(), lon.len()));
        for (t, instant) in datetime.iter().enumerate() {
            let samples: Vec<(SunPosition, f64)> = self
                .quadrature(julian_day(instant))
                .into_iter()
                .map(|(jd, weight)| (SunPosition::at(jd), weight))
                .collect();
            for (j, &la) in lat.iter().enumerate() {
                for (i, &lo) in lon.iter().enumerate() {
                    let total: f64 = samples
                        .iter()
                        .map(|(sun, weight)| weight * sun.irradiance(la, lo, self.solar_constant))
                        .sum();
                    radiation[[t, j, i]] = total as f32;
                }
            }
        }

        Ok(DataArray::new(&[TIME, LAT, LON], radiation.into_dyn())?)
    }
}
