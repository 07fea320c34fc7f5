use serde::Serialize;

use crate::error::{EngineError, Result};

/// Output container formats understood by the render backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContainerFormat {
    /// ISO base media file (`video/quicktime, variant=iso`).
    Mp4Iso,
}

impl ContainerFormat {
    pub fn muxer(self) -> &'static str {
        match self {
            Self::Mp4Iso => "mp4",
        }
    }

    /// File extension of rendered outputs, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4Iso => "mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VideoCodec {
    /// MPEG-4 part 2 (`video/mpeg, mpegversion=4`).
    Mpeg4Part2,
}

impl VideoCodec {
    pub fn encoder(self) -> &'static str {
        match self {
            Self::Mpeg4Part2 => "mpeg4",
        }
    }

    /// Codec name as reported by `ffprobe`.
    pub fn probe_name(self) -> &'static str {
        match self {
            Self::Mpeg4Part2 => "mpeg4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioCodec {
    /// MPEG-4 AAC (`audio/mpeg, mpegversion=4`).
    Aac,
}

impl AudioCodec {
    pub fn encoder(self) -> &'static str {
        match self {
            Self::Aac => "aac",
        }
    }

    pub fn probe_name(self) -> &'static str {
        match self {
            Self::Aac => "aac",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoProfile {
    pub codec: VideoCodec,
    pub quality: Option<u8>,
    /// Required number of video streams in the output: 0 means optional, 1 required.
    pub presence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioProfile {
    pub codec: AudioCodec,
    pub bitrate_kbps: Option<u32>,
    /// Required number of audio streams: 0 renders audio only when every clip has some.
    pub presence: u32,
}

impl StreamProfile {
    fn presence(&self) -> u32 {
        match self {
            Self::Video(video) => video.presence,
            Self::Audio(audio) => audio.presence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamProfile {
    Video(VideoProfile),
    Audio(AudioProfile),
}

/// Container profile with its stream profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingProfile {
    pub name: String,
    pub container: ContainerFormat,
    streams: Vec<StreamProfile>,
}

impl EncodingProfile {
    pub fn new(name: impl Into<String>, container: ContainerFormat) -> Self {
        Self {
            name: name.into(),
            container,
            streams: Vec::new(),
        }
    }

    /// Adds a stream profile, builder style.
    pub fn with_stream(mut self, stream: StreamProfile) -> Self {
        self.streams.push(stream);
        self
    }

    pub fn streams(&self) -> &[StreamProfile] {
        &self.streams
    }

    pub fn video(&self) -> Option<&VideoProfile> {
        self.streams.iter().find_map(|stream| match stream {
            StreamProfile::Video(video) => Some(video),
            StreamProfile::Audio(_) => None,
        })
    }

    pub fn audio(&self) -> Option<&AudioProfile> {
        self.streams.iter().find_map(|stream| match stream {
            StreamProfile::Audio(audio) => Some(audio),
            StreamProfile::Video(_) => None,
        })
    }

    /// Checks the profile can drive a render: one video stream, at most one
    /// audio stream, and no stream asking for more than one output stream.
    pub fn validate(&self) -> Result<()> {
        if self.streams.iter().any(|stream| stream.presence() > 1) {
            return Err(EngineError::InvalidEncodingProfile {
                reason: "stream presence above one is not supported",
            });
        }
        let videos = self
            .streams
            .iter()
            .filter(|stream| matches!(stream, StreamProfile::Video(_)))
            .count();
        let audios = self.streams.len() - videos;
        match (videos, audios) {
            (0, _) => Err(EngineError::InvalidEncodingProfile {
                reason: "profile has no video stream",
            }),
            (1, 0 | 1) => Ok(()),
            (1, _) => Err(EngineError::InvalidEncodingProfile {
                reason: "profile has more than one audio stream",
            }),
            _ => Err(EngineError::InvalidEncodingProfile {
                reason: "profile has more than one video stream",
            }),
        }
    }
}
