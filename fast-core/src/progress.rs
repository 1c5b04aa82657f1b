//! Progress of an elapsed duration against a goal.

/// Fraction of the goal completed, in `[0.0, 1.0]`.
///
/// Returns 0 for a zero goal. Negative elapsed counts as zero and anything
/// past the goal saturates at 1.
pub fn fraction(elapsed_millis: i64, goal_millis: i64) -> f64 {
    if goal_millis == 0 {
        return 0.0;
    }
    (elapsed_millis as f64 / goal_millis as f64).clamp(0.0, 1.0)
}

/// Whole percent of the goal completed, in `[0, 100]`. Truncates.
pub fn percentage(elapsed_millis: i64, goal_millis: i64) -> u8 {
    // fraction is already clamped so the cast cannot overflow
    (fraction(elapsed_millis, goal_millis) * 100.0).floor() as u8
}
