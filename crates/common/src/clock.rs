//! Wall-clock access for stamping overlays.
//!
//! Overlay text carries the time processing started, not the time the clip
//! was recorded. Taking the clock as a trait object lets tests pin it.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Format used for the overlay timestamp (`YYYY-MM-DD HH:mm:ss`).
pub const OVERLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the current local time.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Local>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Local>) -> Self {
        Self { instant }
    }

    /// Build a clock from a naive local timestamp.
    ///
    /// Returns `None` when the time does not exist in the local zone
    /// (e.g. inside a DST gap).
    pub fn from_local(naive: NaiveDateTime) -> Option<Self> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(Self::new)
    }
}

impl WallClock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.instant
    }
}

/// Format a timestamp the way overlays display it.
pub fn format_overlay_timestamp(instant: &DateTime<Local>) -> String {
    instant.format(OVERLAY_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_fixed_clock_formats_seconds_precision() {
        let naive = NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        let clock = FixedClock::from_local(naive).unwrap();
        assert_eq!(
            format_overlay_timestamp(&clock.now()),
            "2026-02-10 09:05:07"
        );
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
