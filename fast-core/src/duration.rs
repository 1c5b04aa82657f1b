//! Duration display helpers.

const SECOND: i64 = 1_000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;

/// Whole hours in `millis` (negative counts as zero).
pub fn whole_hours(millis: i64) -> i64 {
    millis.max(0) / HOUR
}

/// Format a duration as `HH:MM:SS`.
///
/// Hours are not wrapped at 24, so a 30 hour fast reads `30:00:00`.
pub fn format_duration(millis: i64) -> String {
    let millis = millis.max(0);
    let seconds = (millis / SECOND) % 60;
    let minutes = (millis / MINUTE) % 60;
    format!("{:02}:{:02}:{:02}", whole_hours(millis), minutes, seconds)
}
