use chrono::{TimeDelta, TimeZone, Utc};
use forecast_windows::time_utils::{
    format_timedelta, julian, julian_day, parse_timedelta, seconds_since_epoch,
    UNIX_EPOCH_JULIAN_DAY,
};

#[test]
fn test_specific_julian_dates() {
    // Y2K
    assert_eq!(julian(2000, 1, 1), 2451545);
    // Unix epoch
    assert_eq!(julian(1970, 1, 1) as f64, UNIX_EPOCH_JULIAN_DAY + 0.5);
    // leap day follows Feb 28
    assert_eq!(julian(2024, 2, 29) - julian(2024, 2, 28), 1);
    assert_eq!(julian(2024, 3, 1) - julian(2024, 2, 29), 1);
}

#[test]
fn test_julian_day_is_fractional() {
    let six_pm = Utc.with_ymd_and_hms(2000, 1, 1, 18, 0, 0).unwrap();
    assert_eq!(julian_day(&six_pm), 2451545.25);

    let midnight = Utc.with_ymd_and_hms(2023, 7, 4, 0, 0, 0).unwrap();
    assert_eq!(julian_day(&midnight), julian(2023, 7, 4) as f64 - 0.5);
}

#[test]
fn test_seconds_since_epoch() {
    let instant = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(seconds_since_epoch(&instant), 1_640_995_200);
}

#[test]
fn test_lead_time_strings() {
    for (text, expected) in [
        ("18h", TimeDelta::hours(18)),
        ("3d", TimeDelta::days(3)),
        ("5d12h", TimeDelta::hours(132)),
        ("1 week", TimeDelta::days(7)),
        ("30 s", TimeDelta::seconds(30)),
        ("250ms", TimeDelta::milliseconds(250)),
    ] {
        assert_eq!(parse_timedelta(text).unwrap(), expected, "parsing {}", text);
    }
    assert_eq!(format_timedelta(TimeDelta::hours(132)), "5d12h");
    assert_eq!(format_timedelta(TimeDelta::minutes(-90)), "-1h30m");
}
