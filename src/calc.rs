/// 2-decimal rounding used for displayed and stored averages:
/// `Int(100*x + 0.5) / 100`
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Arithmetic mean of a ratings sequence, rounded to 2 decimals.
///
/// An empty sequence has no average; callers render the "No ratings yet"
/// sentinel instead of a number.
pub fn rating_average(ratings: &[i64]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().sum();
    Some(round_off_2_decimals(sum as f64 / ratings.len() as f64))
}
