//! Japanese relative timestamps ("3分前") for rendering posts and comments.

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Render an elapsed duration in seconds as a Japanese relative time.
///
/// Months are 30 days and years 365 days. The month and year buckets never
/// render as zero: the gap between four weeks and thirty days reads as one
/// month, and the gap between twelve 30-day months and a full year reads as
/// one year.
pub fn format_relative(elapsed_secs: u64) -> String {
    if elapsed_secs < MINUTE {
        return "たった今".to_string();
    }

    let minutes = elapsed_secs / MINUTE;
    if minutes < 60 {
        return format!("{}分前", minutes);
    }

    let hours = elapsed_secs / HOUR;
    if hours < 24 {
        return format!("{}時間前", hours);
    }

    let days = elapsed_secs / DAY;
    if days < 7 {
        return format!("{}日前", days);
    }

    let weeks = days / 7;
    if weeks < 4 {
        return format!("{}週間前", weeks);
    }

    let months = days / 30;
    if months < 12 {
        return format!("{}ヶ月前", months.max(1));
    }

    format!("{}年前", (days / 365).max(1))
}

/// Relative time between two unix timestamps (seconds). Timestamps in the
/// future render as "たった今".
pub fn format_between(then_secs: u64, now_secs: u64) -> String {
    format_relative(now_secs.saturating_sub(then_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets() {
        assert_eq!(format_relative(0), "たった今");
        assert_eq!(format_relative(59), "たった今");
        assert_eq!(format_relative(60), "1分前");
        assert_eq!(format_relative(59 * MINUTE), "59分前");
        assert_eq!(format_relative(HOUR), "1時間前");
        assert_eq!(format_relative(23 * HOUR), "23時間前");
        assert_eq!(format_relative(DAY), "1日前");
        assert_eq!(format_relative(6 * DAY), "6日前");
        assert_eq!(format_relative(7 * DAY), "1週間前");
        assert_eq!(format_relative(27 * DAY), "3週間前");
        assert_eq!(format_relative(60 * DAY), "2ヶ月前");
        assert_eq!(format_relative(365 * DAY), "1年前");
        assert_eq!(format_relative(800 * DAY), "2年前");
    }

    #[test]
    fn never_zero_months_or_years() {
        assert_eq!(format_relative(28 * DAY), "1ヶ月前");
        assert_eq!(format_relative(29 * DAY), "1ヶ月前");
        assert_eq!(format_relative(362 * DAY), "1年前");
    }

    #[test]
    fn future_is_now() {
        assert_eq!(format_between(1_000, 900), "たった今");
        assert_eq!(format_between(1_000, 1_000 + 2 * HOUR), "2時間前");
    }
}
