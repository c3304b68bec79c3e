//! Wall-clock arithmetic for focus and break windows.
//!
//! Nothing here keeps a counter: every reading is recomputed from the
//! anchor timestamp, so a reading taken after the process slept or was
//! restarted is as accurate as one taken every second.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub elapsed: Duration,
    pub remaining: Duration,
    pub is_expired: bool,
}

impl ClockReading {
    pub fn window(&self) -> Duration {
        self.elapsed + self.remaining
    }
}

pub fn window(minutes: u32) -> Duration {
    Duration::minutes(i64::from(minutes))
}

pub fn measure(now: DateTime<Utc>, anchor: DateTime<Utc>, window_minutes: u32) -> ClockReading {
    let end = anchor + window(window_minutes);
    let elapsed = (now - anchor).max(Duration::zero());
    let remaining = (end - now).max(Duration::zero());
    ClockReading {
        elapsed,
        remaining,
        is_expired: now >= end,
    }
}

/// Fraction of the window already used, in `[0, 1]`.
pub fn progress(reading: &ClockReading) -> f64 {
    let total = reading.window().num_milliseconds() as f64;
    if total > 0.0 {
        (reading.elapsed.num_milliseconds() as f64 / total).min(1.0)
    } else {
        1.0
    }
}

/// `HH:MM:SS`, hours not wrapped at 24.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// `MM:SS`, used for the break countdown.
pub fn format_ms(seconds: i64) -> String {
    let secs = seconds.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn one_minute_before_the_end() {
        let reading = measure(t0() + Duration::minutes(24), t0(), 25);
        assert!(!reading.is_expired);
        assert_eq!(reading.remaining.num_milliseconds(), 60_000);
        assert_eq!(reading.elapsed, Duration::minutes(24));
    }

    #[test]
    fn expired_at_and_after_the_end() {
        for late in [0, 1, 59, 3_600] {
            let now = t0() + Duration::minutes(25) + Duration::seconds(late);
            let reading = measure(now, t0(), 25);
            assert!(reading.is_expired, "late by {late}s");
            assert_eq!(reading.remaining, Duration::zero());
        }
    }

    #[test]
    fn clock_skew_before_anchor_reads_as_nothing_elapsed() {
        let reading = measure(t0() - Duration::seconds(5), t0(), 10);
        assert_eq!(reading.elapsed, Duration::zero());
        assert_eq!(reading.remaining, Duration::minutes(10) + Duration::seconds(5));
        assert!(!reading.is_expired);
    }

    #[test]
    fn progress_is_capped() {
        let half = measure(t0() + Duration::minutes(30), t0(), 60);
        assert!((progress(&half) - 0.5).abs() < f64::EPSILON);
        let over = measure(t0() + Duration::minutes(90), t0(), 60);
        assert!((progress(&over) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_hms(Duration::seconds(3_725)), "01:02:05");
        assert_eq!(format_hms(Duration::hours(26)), "26:00:00");
        assert_eq!(format_hms(Duration::seconds(-4)), "00:00:00");
        assert_eq!(format_ms(299), "04:59");
    }
}
