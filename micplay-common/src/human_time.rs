//! Clock formatting for progress display
//!
//! Elapsed time renders as `M:SS`, remaining time as `-M:SS`. Minutes are
//! not wrapped into hours; a 75 minute recording shows `75:00`.

/// Format a position in seconds as `M:SS`.
///
/// Fractional seconds are truncated so the display never runs ahead of the
/// audio. Negative and non-finite input renders as `0:00`.
///
/// # Examples
///
/// ```
/// use micplay_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0.0), "0:00");
/// assert_eq!(format_clock(65.9), "1:05");
/// assert_eq!(format_clock(600.0), "10:00");
/// ```
pub fn format_clock(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format the time left until `duration` as `-M:SS`.
///
/// Remaining time is rounded up so the display reaches `-0:00` only at the end.
///
/// ```
/// use micplay_common::human_time::format_remaining;
///
/// assert_eq!(format_remaining(10.0, 70.0), "-1:00");
/// assert_eq!(format_remaining(10.5, 70.0), "-1:00");
/// assert_eq!(format_remaining(70.0, 70.0), "-0:00");
/// ```
pub fn format_remaining(position: f64, duration: f64) -> String {
    let left = (duration - position).max(0.0);
    let total = if left.is_finite() { left.ceil() as u64 } else { 0 };
    format!("-{}:{:02}", total / 60, total % 60)
}

/// `M:SS / M:SS` progress line
pub fn format_progress(position: f64, duration: f64) -> String {
    format!("{} / {}", format_clock(position), format_clock(duration))
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    }
}
