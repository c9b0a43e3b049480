//! Target lead-time specifications and their normalization.

use crate::error::PrepError;
use crate::time_utils::{epsilon, format_timedelta, parse_timedelta};
use chrono::TimeDelta;
use std::fmt;
use std::ops::{RangeInclusive, RangeToInclusive};
use std::str::FromStr;

/// Lead times requested as targets, relative to the final input step.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetLeadTimes {
    /// One lead time; the target keeps a time dimension of length one
    Single(TimeDelta),
    /// Arbitrary, not necessarily contiguous lead times
    Many(Vec<TimeDelta>),
    /// Every available lead time in `[start, stop]`
    Range {
        start: Option<TimeDelta>,
        stop: TimeDelta,
        step: Option<TimeDelta>,
    },
}

/// How targets are picked from the recentred time axis
#[derive(Debug, Clone, PartialEq)]
pub enum LeadTimeSelection {
    /// Exact labels, ascending
    Labels(Vec<TimeDelta>),
    /// Inclusive label range
    Range {
        start: TimeDelta,
        stop: TimeDelta,
        step: Option<TimeDelta>,
    },
}

/// Normalized lead times plus the horizon they need
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLeadTimes {
    pub selection: LeadTimeSelection,
    /// Largest requested lead time
    pub target_duration: TimeDelta,
}

impl TargetLeadTimes {
    /// Resolve into a selection and the target duration.
    ///
    /// A range without a start begins one nanosecond after zero, since lead
    /// time zero is the final input step. Collections are sorted but not
    /// deduplicated.
    pub fn normalize(&self) -> Result<NormalizedLeadTimes, PrepError> {
        match self {
            TargetLeadTimes::Range { start, stop, step } => {
                if let Some(step) = step {
                    if *step <= TimeDelta::zero() {
                        return Err(PrepError::InvalidLeadTimes(format!(
                            "range step must be positive, got {}",
                            format_timedelta(*step)
                        )));
                    }
                }
                Ok(NormalizedLeadTimes {
                    selection: LeadTimeSelection::Range {
                        start: start.unwrap_or_else(epsilon),
                        stop: *stop,
                        step: *step,
                    },
                    target_duration: *stop,
                })
            }
            TargetLeadTimes::Single(lead_time) => Ok(NormalizedLeadTimes {
                selection: LeadTimeSelection::Labels(vec![*lead_time]),
                target_duration: *lead_time,
            }),
            TargetLeadTimes::Many(lead_times) => {
                let mut sorted = lead_times.clone();
                sorted.sort();
                let target_duration = *sorted.last().ok_or_else(|| {
                    PrepError::InvalidLeadTimes("at least one lead time is required".to_string())
                })?;
                Ok(NormalizedLeadTimes {
                    selection: LeadTimeSelection::Labels(sorted),
                    target_duration,
                })
            }
        }
    }
}

/// Shorthand for [`TargetLeadTimes::normalize`]
pub fn process_target_lead_times(
    lead_times: &TargetLeadTimes,
) -> Result<NormalizedLeadTimes, PrepError> {
    lead_times.normalize()
}

impl From<TimeDelta> for TargetLeadTimes {
    fn from(lead_time: TimeDelta) -> Self {
        TargetLeadTimes::Single(lead_time)
    }
}

impl From<Vec<TimeDelta>> for TargetLeadTimes {
    fn from(lead_times: Vec<TimeDelta>) -> Self {
        TargetLeadTimes::Many(lead_times)
    }
}

impl From<RangeInclusive<TimeDelta>> for TargetLeadTimes {
    fn from(range: RangeInclusive<TimeDelta>) -> Self {
        let (start, stop) = range.into_inner();
        TargetLeadTimes::Range {
            start: Some(start),
            stop,
            step: None,
        }
    }
}

impl From<RangeToInclusive<TimeDelta>> for TargetLeadTimes {
    fn from(range: RangeToInclusive<TimeDelta>) -> Self {
        TargetLeadTimes::Range {
            start: None,
            stop: range.end,
            step: None,
        }
    }
}

/// Parses `3d`, `3d,5d`, `6h..24h`, `..24h` and `6h..24h/6h`.
impl FromStr for TargetLeadTimes {
    type Err = PrepError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |msg: String| PrepError::InvalidLeadTimes(msg);
        let text = text.trim();

        if let Some((start, rest)) = text.split_once("..") {
            let (stop, step) = match rest.split_once('/') {
                Some((stop, step)) => (stop, Some(parse_timedelta(step).map_err(invalid)?)),
                None => (rest, None),
            };
            let start = if start.trim().is_empty() {
                None
            } else {
                Some(parse_timedelta(start).map_err(invalid)?)
            };
            return Ok(TargetLeadTimes::Range {
                start,
                stop: parse_timedelta(stop).map_err(invalid)?,
                step,
            });
        }

        if text.contains(',') {
            let lead_times = text
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(parse_timedelta)
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?;
            return Ok(TargetLeadTimes::Many(lead_times));
        }

        Ok(TargetLeadTimes::Single(parse_timedelta(text).map_err(invalid)?))
    }
}

impl fmt::Display for TargetLeadTimes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TargetLeadTimes::Single(lead_time) => write!(f, "{}", format_timedelta(*lead_time)),
            TargetLeadTimes::Many(lead_times) => {
                let parts: Vec<String> = lead_times.iter().map(|t| format_timedelta(*t)).collect();
                write!(f, "{}", parts.join(","))
            }
            TargetLeadTimes::Range { start, stop, step } => {
                if let Some(start) = start {
                    write!(f, "{}", format_timedelta(*start))?;
                }
                write!(f, "..{}", format_timedelta(*stop))?;
                if let Some(step) = step {
                    write!(f, "/{}", format_timedelta(*step))?;
                }
                Ok(())
            }
        }
    }
}
