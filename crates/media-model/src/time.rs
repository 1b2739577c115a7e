//! Rational media time.
//!
//! Media timestamps are `value / timescale` seconds. Keeping them rational
//! avoids drift when a duration read from a container is copied into a
//! composition and then into a render instruction.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Default timescale for values derived from floating-point seconds.
pub const DEFAULT_TIMESCALE: i32 = 600;

/// A point in media time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: DEFAULT_TIMESCALE,
    };

    /// Create a time value. A non-positive timescale is replaced with 1.
    pub fn new(value: i64, timescale: i32) -> Self {
        Self {
            value,
            timescale: timescale.max(1),
        }
    }

    /// Nearest representable time for `secs` at the given timescale.
    pub fn from_seconds(secs: f64, timescale: i32) -> Self {
        let timescale = timescale.max(1);
        let value = if secs.is_finite() {
            (secs * timescale as f64).round() as i64
        } else {
            0
        };
        Self { value, timescale }
    }

    pub fn seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn is_positive(&self) -> bool {
        self.value > 0
    }

    /// Re-express at another timescale, rounding to nearest.
    pub fn convert_scale(&self, timescale: i32) -> Self {
        let timescale = timescale.max(1);
        if timescale == self.timescale {
            return *self;
        }
        let scaled = self.value as i128 * timescale as i128;
        let den = self.timescale as i128;
        let rounded = (scaled + den.signum() * den / 2).div_euclid(den);
        Self {
            value: rounded as i64,
            timescale,
        }
    }

    fn common_scale(a: MediaTime, b: MediaTime) -> (i64, i64, i32) {
        if a.timescale == b.timescale {
            return (a.value, b.value, a.timescale);
        }
        let scale = a.timescale.max(b.timescale);
        (
            a.convert_scale(scale).value,
            b.convert_scale(scale).value,
            scale,
        )
    }

    pub fn checked_add(self, other: MediaTime) -> Option<MediaTime> {
        let (a, b, scale) = Self::common_scale(self, other);
        Some(MediaTime::new(a.checked_add(b)?, scale))
    }

    pub fn checked_sub(self, other: MediaTime) -> Option<MediaTime> {
        let (a, b, scale) = Self::common_scale(self, other);
        Some(MediaTime::new(a.checked_sub(b)?, scale))
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as i128 * other.timescale as i128;
        let rhs = other.value as i128 * self.timescale as i128;
        lhs.cmp(&rhs)
    }
}

impl std::fmt::Display for MediaTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.seconds())
    }
}

/// Half-open range `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: MediaTime,
    pub duration: MediaTime,
}

impl TimeRange {
    pub fn new(start: MediaTime, duration: MediaTime) -> Self {
        Self { start, duration }
    }

    /// `[0, duration)`.
    pub fn from_zero(duration: MediaTime) -> Self {
        Self::new(MediaTime::new(0, duration.timescale), duration)
    }

    pub fn end(&self) -> MediaTime {
        self.start
            .checked_add(self.duration)
            .unwrap_or(self.start)
    }

    pub fn is_empty(&self) -> bool {
        !self.duration.is_positive()
    }

    pub fn contains(&self, t: MediaTime) -> bool {
        t >= self.start && t < self.end()
    }
}
