//! Retry window policy for batch item dispatch.
//!
//! Every failed attempt waits a fresh uniformly random delay drawn from
//! `[0, window)`. There is no attempt counter and no growth of the window.

use std::time::Duration;

use rand::Rng;

/// Retry window used when a batch request supplies none (one hour).
pub const DEFAULT_RETRY_WINDOW_SECS: u64 = 60 * 60;

/// Parse a caller-supplied retry window in seconds.
///
/// Absent, non-numeric, zero or negative values fall back to `default_secs`.
pub fn parse_retry_window(raw: Option<&str>, default_secs: u64) -> u64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .map(|secs| secs as u64)
        .unwrap_or(default_secs)
}

/// Draw the delay before the next attempt, uniform in `[0, window_secs)`.
pub fn random_delay(window_secs: u64) -> Duration {
    if window_secs == 0 {
        return Duration::ZERO;
    }
    let secs = rand::rng().random_range(0.0..window_secs as f64);
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_window_uses_default() {
        assert_eq!(parse_retry_window(None, DEFAULT_RETRY_WINDOW_SECS), 3600);
    }

    #[test]
    fn invalid_windows_use_default() {
        for raw in ["", "abc", "0", "-5", "1.5"] {
            assert_eq!(parse_retry_window(Some(raw), 42), 42, "input {raw:?}");
        }
    }

    #[test]
    fn positive_window_is_kept() {
        assert_eq!(parse_retry_window(Some("10"), 3600), 10);
        assert_eq!(parse_retry_window(Some(" 90 "), 3600), 90);
    }

    #[test]
    fn delay_stays_inside_window() {
        for _ in 0..1000 {
            let d = random_delay(3);
            assert!(d <= Duration::from_secs(3), "{d:?}");
        }
    }

    #[test]
    fn zero_window_means_no_delay() {
        assert_eq!(random_delay(0), Duration::ZERO);
    }
}
