/// Share of solves dropped from each end of a sorted window (5%)
pub const TRIM_DIVISOR: usize = 20;

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Number of entries removed from each end of a window of `len` values.
///
/// `ceil(len * 5%)`, computed in integers. Falls back to zero when trimming
/// both ends would leave nothing to average.
pub fn trim_count(len: usize) -> usize {
    let trim = len.div_ceil(TRIM_DIVISOR);
    if 2 * trim >= len {
        0
    } else {
        trim
    }
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Mean of an already sorted slice after dropping the best and worst 5%
pub fn trimmed_mean_sorted(sorted: &[f64]) -> Option<f64> {
    let trim = trim_count(sorted.len());
    mean(&sorted[trim..sorted.len() - trim]).map(round3)
}

pub fn trimmed_mean(data: &[f64]) -> Option<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    trimmed_mean_sorted(&sorted)
}

/// Seconds with millisecond precision, the way times are shown everywhere
pub fn format_secs(secs: f64) -> String {
    format!("{secs:.3}")
}

pub fn format_millis(ms: u64) -> String {
    format_secs(ms as f64 / 1000.0)
}
