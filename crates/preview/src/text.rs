//! Overlay text stamping.

use epicshot_common::clock::{format_overlay_timestamp, WallClock};

/// `"<prefix> • <YYYY-MM-DD HH:mm:ss>"`, stamped with the clock's local time.
pub fn overlay_text(prefix: &str, clock: &dyn WallClock) -> String {
    format!("{prefix} • {}", format_overlay_timestamp(&clock.now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use epicshot_common::clock::FixedClock;

    #[test]
    fn test_text_uses_prefix_and_local_timestamp() {
        let naive = NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        let clock = FixedClock::from_local(naive).unwrap();
        assert_eq!(
            overlay_text("EpicShot Demo", &clock),
            "EpicShot Demo • 2026-02-10 09:05:07"
        );
    }
}
