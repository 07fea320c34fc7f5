use std::fmt::{Display, Formatter};
use std::ops::Add;

use serde::Serialize;

/// Timestamp or duration in nanoseconds on the pipeline clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ClockTime(u64);

impl ClockTime {
    pub const ZERO: Self = Self(0);
    pub const SECOND: Self = Self(media_ffmpeg::NANOS_PER_SECOND);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Converts probed seconds; negative or non-finite input yields `None`.
    pub fn from_seconds_f64(seconds: f64) -> Option<Self> {
        media_ffmpeg::seconds_to_nanos(seconds).map(Self)
    }

    pub const fn nanos(self) -> u64 {
        self.0
    }

    pub fn seconds_f64(self) -> f64 {
        self.0 as f64 / media_ffmpeg::NANOS_PER_SECOND as f64
    }
}

impl Add for ClockTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for ClockTime {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Formats as `H:MM:SS.NNNNNNNNN`.
///
/// # Example
/// ```
/// use engine::ClockTime;
///
/// let t = ClockTime::from_nanos(3_723_000_000_001);
/// assert_eq!(t.to_string(), "1:02:03.000000001");
/// ```
impl Display for ClockTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let nanos_per_second = media_ffmpeg::NANOS_PER_SECOND;
        let total_seconds = self.0 / nanos_per_second;
        let fraction = self.0 % nanos_per_second;
        write!(
            f,
            "{}:{:02}:{:02}.{:09}",
            total_seconds / 3_600,
            (total_seconds / 60) % 60,
            total_seconds % 60,
            fraction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ClockTime;

    #[test]
    fn sum_of_clip_durations_saturates() {
        let total: ClockTime = [ClockTime::from_nanos(u64::MAX), ClockTime::SECOND]
            .into_iter()
            .sum();
        assert_eq!(total.nanos(), u64::MAX);
    }

    #[test]
    fn from_seconds_rounds_to_nanoseconds() {
        assert_eq!(
            ClockTime::from_seconds_f64(0.5),
            Some(ClockTime::from_nanos(500_000_000))
        );
        assert_eq!(ClockTime::from_seconds_f64(f64::INFINITY), None);
    }
}
