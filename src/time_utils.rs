use chrono::{DateTime, TimeDelta, Utc};

pub const SEC_PER_HOUR: i64 = 3600;
pub const HOUR_PER_DAY: i64 = 24;
pub const SEC_PER_DAY: i64 = SEC_PER_HOUR * HOUR_PER_DAY;
/// Mean tropical year length in days
pub const AVG_DAY_PER_YEAR: f64 = 365.24219;
pub const AVG_SEC_PER_YEAR: f64 = SEC_PER_DAY as f64 * AVG_DAY_PER_YEAR;

/// Julian day of the Unix epoch (1970-01-01 00:00:00 UTC)
pub const UNIX_EPOCH_JULIAN_DAY: f64 = 2440587.5;

const NANOS_PER_MICRO: i128 = 1_000;
const NANOS_PER_MILLI: i128 = 1_000_000;
const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_MINUTE: i128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i128 = 24 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: i128 = 7 * NANOS_PER_DAY;

/// Julian day number of a calendar date (integer, noon based)
pub fn julian(year: i64, month: i64, day: i64) -> i64 {
    day - 32075
        + 1461 * (year + 4800 + (month - 14) / 12) / 4
        + 367 * (month - 2 - (month - 14) / 12 * 12) / 12
        - 3 * ((year + 4900 + (month - 14) / 12) / 100) / 4
}

/// Whole seconds since the Unix epoch, rounded towards negative infinity
pub fn seconds_since_epoch(datetime: &DateTime<Utc>) -> i64 {
    datetime.timestamp()
}

/// Fractional Julian day of an instant
pub fn julian_day(datetime: &DateTime<Utc>) -> f64 {
    let seconds =
        datetime.timestamp() as f64 + datetime.timestamp_subsec_nanos() as f64 * 1e-9;
    UNIX_EPOCH_JULIAN_DAY + seconds / SEC_PER_DAY as f64
}

/// One nanosecond, the smallest representable offset
pub fn epsilon() -> TimeDelta {
    TimeDelta::nanoseconds(1)
}

fn unit_nanos(unit: &str) -> Option<i128> {
    let nanos = match unit.to_ascii_lowercase().as_str() {
        "ns" | "nanosecond" | "nanoseconds" => 1,
        "us" | "µs" | "microsecond" | "microseconds" => NANOS_PER_MICRO,
        "ms" | "millisecond" | "milliseconds" => NANOS_PER_MILLI,
        "s" | "sec" | "secs" | "second" | "seconds" => NANOS_PER_SECOND,
        "m" | "min" | "mins" | "minute" | "minutes" => NANOS_PER_MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => NANOS_PER_HOUR,
        "d" | "day" | "days" => NANOS_PER_DAY,
        "w" | "week" | "weeks" => NANOS_PER_WEEK,
        _ => return None,
    };
    Some(nanos)
}

/// Parse a duration string such as `6h`, `5d12h`, `90min` or `1 day`.
pub fn parse_timedelta(text: &str) -> Result<TimeDelta, String> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    if body.is_empty() {
        return Err(format!("Could not parse duration: '{}'", text));
    }

    let mut total: i128 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("Expected a number in duration '{}'", text));
        }
        let (number, after) = rest.split_at(number_len);
        let after = after.trim_start();
        let unit_len = after
            .find(|c: char| !c.is_alphabetic())
            .unwrap_or(after.len());
        if unit_len == 0 {
            return Err(format!("Missing unit in duration '{}'", text));
        }
        let (unit, remainder) = after.split_at(unit_len);
        let scale = unit_nanos(unit)
            .ok_or_else(|| format!("Unknown unit '{}' in duration '{}'", unit, text))?;

        let nanos = if number.contains('.') {
            let value: f64 = number
                .parse()
                .map_err(|_| format!("Invalid number '{}' in duration '{}'", number, text))?;
            (value * scale as f64).round() as i128
        } else {
            let value: i128 = number
                .parse()
                .map_err(|_| format!("Invalid number '{}' in duration '{}'", number, text))?;
            value
                .checked_mul(scale)
                .ok_or_else(|| format!("Duration '{}' is out of range", text))?
        };
        total = total
            .checked_add(nanos)
            .ok_or_else(|| format!("Duration '{}' is out of range", text))?;
        rest = remainder.trim_start();
    }

    if negative {
        total = -total;
    }
    let nanos = i64::try_from(total).map_err(|_| format!("Duration '{}' is out of range", text))?;
    Ok(TimeDelta::nanoseconds(nanos))
}

/// Compact rendering of an offset, e.g. `1d6h` or `-18h`
pub fn format_timedelta(delta: TimeDelta) -> String {
    let Some(nanos) = delta.num_nanoseconds() else {
        return format!("{}", delta);
    };
    if nanos == 0 {
        return "0s".to_string();
    }

    let mut remaining = (nanos as i128).abs();
    let mut out = String::new();
    if nanos < 0 {
        out.push('-');
    }
    for (scale, suffix) in [
        (NANOS_PER_DAY, "d"),
        (NANOS_PER_HOUR, "h"),
        (NANOS_PER_MINUTE, "m"),
        (NANOS_PER_SECOND, "s"),
        (NANOS_PER_MILLI, "ms"),
        (NANOS_PER_MICRO, "us"),
        (1, "ns"),
    ] {
        let count = remaining / scale;
        if count > 0 {
            out.push_str(&format!("{}{}", count, suffix));
            remaining -= count * scale;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_shorthand() {
        assert_eq!(parse_timedelta("6h").unwrap(), TimeDelta::hours(6));
        assert_eq!(
            parse_timedelta("5d12h").unwrap(),
            TimeDelta::days(5) + TimeDelta::hours(12)
        );
        assert_eq!(parse_timedelta("90min").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_timedelta("1ns").unwrap(), TimeDelta::nanoseconds(1));
        assert_eq!(parse_timedelta("1.5h").unwrap(), TimeDelta::minutes(90));
    }

    #[test]
    fn test_parse_spelled_units() {
        assert_eq!(parse_timedelta("1 day").unwrap(), TimeDelta::days(1));
        assert_eq!(parse_timedelta("24 hours").unwrap(), TimeDelta::hours(24));
        assert_eq!(parse_timedelta(" 6 hours ").unwrap(), TimeDelta::hours(6));
        assert_eq!(parse_timedelta("-18h").unwrap(), TimeDelta::hours(-18));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_timedelta("").is_err());
        assert!(parse_timedelta("12").is_err());
        assert!(parse_timedelta("h").is_err());
        assert!(parse_timedelta("3 fortnights").is_err());
    }

    #[test]
    fn test_huge_durations_are_errors() {
        let err = parse_timedelta("100000000000000000000000000000d").unwrap_err();
        assert!(err.contains("out of range"), "{}", err);
        assert!(parse_timedelta("99999999999999999999999999999999999999w").is_err());
        assert!(parse_timedelta("170141183460469231731687303715884105727ns1ns").is_err());
        assert!(parse_timedelta("99999999999999999999999999999999999999999.5d").is_err());
    }

    #[test]
    fn test_format_timedelta() {
        assert_eq!(format_timedelta(TimeDelta::zero()), "0s");
        assert_eq!(format_timedelta(TimeDelta::hours(30)), "1d6h");
        assert_eq!(format_timedelta(TimeDelta::hours(-18)), "-18h");
        assert_eq!(format_timedelta(epsilon()), "1ns");
    }

    #[test]
    fn test_julian_day_matches_calendar_julian() {
        let noon = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(julian_day(&noon), julian(2000, 1, 1) as f64);

        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(julian_day(&epoch), UNIX_EPOCH_JULIAN_DAY);
        assert_eq!(seconds_since_epoch(&epoch), 0);
    }

    #[test]
    fn test_seconds_since_epoch_floors() {
        let before_epoch = Utc.timestamp_opt(-1, 500_000_000).unwrap();
        assert_eq!(seconds_since_epoch(&before_epoch), -1);
    }
}
