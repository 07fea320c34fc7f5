use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{MediaFfmpegError, Result};

/// Stream kind discovered by probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/// Stream metadata read from `ffprobe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: u32,
    pub kind: StreamKind,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Media probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub streams: Vec<StreamInfo>,
    pub duration_seconds: Option<f64>,
}

impl MediaInfo {
    /// Returns the first video stream.
    pub fn first_video(&self) -> Option<&StreamInfo> {
        self.first_of(StreamKind::Video)
    }

    /// Returns the first audio stream.
    pub fn first_audio(&self) -> Option<&StreamInfo> {
        self.first_of(StreamKind::Audio)
    }

    fn first_of(&self, kind: StreamKind) -> Option<&StreamInfo> {
        self.streams.iter().find(|stream| stream.kind == kind)
    }
}

/// Probes streams and container duration of a media file via `ffprobe`.
///
/// # Example
/// ```no_run
/// use media_ffmpeg::probe_media;
///
/// let info = probe_media("sample.mp4").expect("probe should succeed");
/// assert!(!info.streams.is_empty());
/// ```
pub fn probe_media(path: impl AsRef<Path>) -> Result<MediaInfo> {
    let path = path.as_ref();

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "stream=index,codec_type,codec_name,width,height,sample_rate,channels:format=duration",
            "-of",
            "compact=nk=0",
        ])
        .arg(path)
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffprobe {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8(output.stdout)?;
    let info = parse_probe_output(path, &stdout)?;
    debug!(
        path = %path.display(),
        streams = info.streams.len(),
        duration_seconds = ?info.duration_seconds,
        "probed media"
    );
    Ok(info)
}

fn parse_probe_output(path: &Path, stdout: &str) -> Result<MediaInfo> {
    let mut streams = Vec::new();
    let mut duration_seconds = None;

    for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (section, fields) = line.split_once('|').unwrap_or((line, ""));
        let map = parse_fields(fields)?;
        match section {
            "stream" => streams.push(parse_stream(line, &map)?),
            "format" => duration_seconds = parse_optional_f64(map.get("duration").copied())?,
            _ => {}
        }
    }

    if streams.is_empty() {
        return Err(MediaFfmpegError::NoStreams(path.to_path_buf()));
    }

    Ok(MediaInfo {
        path: path.to_path_buf(),
        streams,
        duration_seconds,
    })
}

fn parse_fields(fields: &str) -> Result<HashMap<&str, &str>> {
    let mut map = HashMap::new();
    for field in fields.split('|').filter(|field| !field.is_empty()) {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| MediaFfmpegError::Parse {
                context: "probe field",
                value: field.to_string(),
            })?;
        map.insert(key.trim(), value.trim().trim_matches('"'));
    }
    Ok(map)
}

fn parse_stream(line: &str, map: &HashMap<&str, &str>) -> Result<StreamInfo> {
    let kind = match map.get("codec_type").copied() {
        Some("video") => StreamKind::Video,
        Some("audio") => StreamKind::Audio,
        Some(_) => StreamKind::Other,
        None => {
            return Err(MediaFfmpegError::Parse {
                context: "codec_type",
                value: line.to_string(),
            });
        }
    };

    let index = parse_optional(map.get("index").copied(), "stream index", str::parse::<u32>)?
        .ok_or_else(|| MediaFfmpegError::Parse {
            context: "stream index",
            value: line.to_string(),
        })?;

    Ok(StreamInfo {
        index,
        kind,
        codec_name: map
            .get("codec_name")
            .filter(|value| !value.is_empty() && **value != "N/A")
            .map(|value| value.to_string()),
        width: parse_optional(map.get("width").copied(), "width", str::parse::<u32>)?,
        height: parse_optional(map.get("height").copied(), "height", str::parse::<u32>)?,
        sample_rate: parse_optional(
            map.get("sample_rate").copied(),
            "sample_rate",
            str::parse::<u32>,
        )?,
        channels: parse_optional(map.get("channels").copied(), "channels", str::parse::<u16>)?,
    })
}

fn parse_optional_f64(value: Option<&str>) -> Result<Option<f64>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    if raw.is_empty() || raw == "N/A" {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| MediaFfmpegError::Parse {
            context: "format duration seconds",
            value: raw.to_string(),
        })
}

fn parse_optional<T, F>(value: Option<&str>, context: &'static str, parse: F) -> Result<Option<T>>
where
    F: Fn(&str) -> std::result::Result<T, std::num::ParseIntError>,
{
    let Some(raw) = value else {
        return Ok(None);
    };
    if raw.is_empty() || raw == "N/A" {
        return Ok(None);
    }

    parse(raw).map(Some).map_err(|_| MediaFfmpegError::Parse {
        context,
        value: raw.to_string(),
    })
}
