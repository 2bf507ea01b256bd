//! Human-readable duration formatting for call logs

/// Durations at or above one hour switch to the H:MM:SS format
const HOUR_FORMAT_MIN: i64 = 3600;

/// Format a call duration in seconds.
///
/// - Under one hour: `M:SS`
/// - One hour or more: `H:MM:SS`
///
/// Negative values (clock skew between caller and backend) display as zero.
///
/// # Examples
///
/// ```
/// use crm_common::human_time::format_duration;
///
/// assert_eq!(format_duration(45), "0:45");
/// assert_eq!(format_duration(330), "5:30");
/// assert_eq!(format_duration(3661), "1:01:01");
/// ```
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);

    if seconds < HOUR_FORMAT_MIN {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Average duration over the calls that have one, rounded to whole seconds
pub fn average_duration(durations: impl IntoIterator<Item = i64>) -> Option<i64> {
    let (total, count) = durations
        .into_iter()
        .fold((0i64, 0i64), |(total, count), d| (total + d.max(0), count + 1));
    if count == 0 {
        None
    } else {
        Some((total as f64 / count as f64).round() as i64)
    }
}
