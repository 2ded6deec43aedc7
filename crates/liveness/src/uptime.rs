//! Elapsed-time rendering for status listings.

use std::time::SystemTime;

/// Render the time elapsed since `since` as `HH:MM:SS`, or `Nd HH:MM:SS`
/// once a day or more has passed.
///
/// A `since` in the future (clock skew) renders its absolute distance.
pub fn format_uptime(since: SystemTime) -> String {
    let secs = match SystemTime::now().duration_since(since) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    };
    format_delta(secs)
}

/// Render a signed number of seconds the way [`format_uptime`] does.
pub fn format_delta(secs: i64) -> String {
    let mut rest = secs.unsigned_abs();
    let s = rest % 60;
    rest /= 60;
    let m = rest % 60;
    rest /= 60;
    let h = rest % 24;
    let days = rest / 24;

    if days == 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}d {:02}:{:02}:{:02}", days, h, m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(0), "00:00:00");
        assert_eq!(format_delta(65), "00:01:05");
        assert_eq!(format_delta(3600), "01:00:00");
        assert_eq!(format_delta(86_399), "23:59:59");
        assert_eq!(format_delta(86_400), "1d 00:00:00");
        assert_eq!(format_delta(90_125), "1d 01:02:05");
        assert_eq!(format_delta(10 * 86_400 + 5), "10d 00:00:05");
    }

    #[test]
    fn test_negative_delta_uses_absolute_value() {
        assert_eq!(format_delta(-65), "00:01:05");
        assert_eq!(format_delta(-90_125), "1d 01:02:05");
    }

    #[test]
    fn test_format_uptime_in_past() {
        let since = SystemTime::now() - Duration::from_secs(90_125);
        assert_eq!(format_uptime(since), "1d 01:02:05");

        let since = SystemTime::now() - Duration::from_secs(65);
        assert_eq!(format_uptime(since), "00:01:05");
    }

    #[test]
    fn test_format_uptime_in_future() {
        let since = SystemTime::now() + Duration::from_secs(3725);
        // Sub-second drift between the two clock reads may shave one second.
        let rendered = format_uptime(since);
        assert!(rendered == "01:02:05" || rendered == "01:02:04", "{rendered}");
    }
}
