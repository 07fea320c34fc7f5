use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by timeline and pipeline operations.
#[derive(Debug)]
pub enum EngineError {
    InvalidUri {
        uri: String,
    },
    UnsupportedUriScheme {
        uri: String,
    },
    ClipIndexOutOfRange {
        index: usize,
        len: usize,
    },
    InvalidEncodingProfile {
        reason: &'static str,
    },
    ResolvePath {
        path: PathBuf,
        source: std::io::Error,
    },
    MissingVideoStream(PathBuf),
    MissingAudioStream(PathBuf),
    MissingRenderSettings,
    EmptyTimeline,
    PreviewUnsupported,
    Media(media_ffmpeg::MediaFfmpegError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUri { uri } => write!(f, "invalid uri: {uri}"),
            Self::UnsupportedUriScheme { uri } => {
                write!(f, "only file:// uris are supported: {uri}")
            }
            Self::ClipIndexOutOfRange { index, len } => {
                write!(f, "clip index {index} out of range for layer of {len} clips")
            }
            Self::InvalidEncodingProfile { reason } => {
                write!(f, "invalid encoding profile: {reason}")
            }
            Self::ResolvePath { path, source } => {
                write!(f, "failed to resolve {}: {source}", path.display())
            }
            Self::MissingVideoStream(path) => {
                write!(f, "media has no video stream: {}", path.display())
            }
            Self::MissingAudioStream(path) => {
                write!(f, "profile requires audio but clip has none: {}", path.display())
            }
            Self::MissingRenderSettings => write!(f, "render settings are not set"),
            Self::EmptyTimeline => write!(f, "timeline has no clips"),
            Self::PreviewUnsupported => write!(f, "preview playback is not supported"),
            Self::Media(err) => write!(f, "media backend error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Media(err) => Some(err),
            Self::ResolvePath { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<media_ffmpeg::MediaFfmpegError> for EngineError {
    fn from(value: media_ffmpeg::MediaFfmpegError) -> Self {
        Self::Media(value)
    }
}
