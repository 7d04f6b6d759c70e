use std::time::SystemTime;

/// Format `t` as ISO-8601 UTC with milliseconds (`2024-05-01T03:00:00.123Z`)
/// without any external datetime dependency. Times before the epoch clamp
/// to the epoch.
pub fn iso8601(t: SystemTime) -> String {
    let dur = t.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = dur.as_secs();
    let millis = dur.subsec_millis();

    let days = (secs / 86400) as i64;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}.{millis:03}Z")
}

// Howard Hinnant's civil_from_days.
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn at(millis: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(millis)
    }

    #[test]
    fn epoch() {
        assert_eq!(iso8601(SystemTime::UNIX_EPOCH), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn leap_day() {
        // 2024-02-29T23:59:59.999Z
        assert_eq!(iso8601(at(1_709_251_199_999)), "2024-02-29T23:59:59.999Z");
    }

    #[test]
    fn year_boundary() {
        assert_eq!(iso8601(at(1_704_067_200_000)), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn before_epoch_clamps() {
        let t = SystemTime::UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(iso8601(t), "1970-01-01T00:00:00.000Z");
    }
}
