use chrono::{DateTime, Utc};

/// Converts a timestamp to float epoch seconds, preserving microseconds.
///
/// This is the storage representation of every timestamp in the monitor
/// table; whole-second resolution would corrupt metrics for short-lived
/// messages.
pub fn to_epoch_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

/// Rebuilds a timestamp from float epoch seconds as stored in the database.
pub fn from_epoch_seconds(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64).unwrap_or_default()
}

/// Rounds a duration in seconds to microsecond precision.
pub fn round_seconds(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn epoch_seconds_roundtrip_keeps_microseconds() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 1).unwrap()
            + chrono::Duration::microseconds(123_456);

        assert_eq!(from_epoch_seconds(to_epoch_seconds(ts)), ts);
    }

    #[test]
    fn round_seconds_keeps_six_decimals() {
        assert_eq!(round_seconds(1.123_456_789), 1.123_457);
        assert_eq!(round_seconds(0.999_999_9), 1.0);
    }
}
