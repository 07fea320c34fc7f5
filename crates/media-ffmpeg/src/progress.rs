/// Parses one `key=value` line emitted by `ffmpeg -progress` and returns the
/// output timestamp in microseconds.
///
/// `out_time_ms` is accepted as a fallback because FFmpeg has historically
/// reported microseconds under that key as well. Values such as `N/A` and
/// every other key yield `None`.
///
/// # Example
/// ```
/// use media_ffmpeg::parse_progress_line;
///
/// assert_eq!(parse_progress_line("out_time_us=1500000"), Some(1_500_000));
/// assert_eq!(parse_progress_line("fps=25.0"), None);
/// ```
pub fn parse_progress_line(line: &str) -> Option<i64> {
    let (key, value) = line.trim().split_once('=')?;
    match key.trim() {
        "out_time_us" | "out_time_ms" => value.trim().parse::<i64>().ok(),
        _ => None,
    }
}
