/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Converts a non-negative, finite seconds value into nanoseconds.
///
/// # Example
/// ```
/// use media_ffmpeg::seconds_to_nanos;
///
/// assert_eq!(seconds_to_nanos(1.5), Some(1_500_000_000));
/// assert_eq!(seconds_to_nanos(-0.1), None);
/// ```
pub fn seconds_to_nanos(seconds: f64) -> Option<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let nanos = (seconds * NANOS_PER_SECOND as f64).round();
    if nanos > u64::MAX as f64 {
        return None;
    }
    Some(nanos as u64)
}

/// Converts microseconds reported by `ffmpeg -progress` into nanoseconds.
///
/// Negative values show up before the first frame is muxed and are rejected.
pub fn micros_to_nanos(micros: i64) -> Option<u64> {
    u64::try_from(micros).ok()?.checked_mul(1_000)
}
