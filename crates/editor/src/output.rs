use std::path::Path;

use chrono::{DateTime, TimeZone};
use engine::{
    AudioCodec, AudioProfile, ContainerFormat, EncodingProfile, StreamProfile, VideoCodec,
    VideoProfile, path_to_uri,
};

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// `file://` uri of the render output named after `now`, with the container's extension.
pub fn output_uri<Tz>(output_dir: &Path, container: ContainerFormat, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let file_name = format!(
        "{}.{}",
        now.format(TIMESTAMP_FORMAT),
        container.extension()
    );
    path_to_uri(&output_dir.join(file_name))
}

/// MP4 container with one MPEG-4 part 2 video stream and AAC audio.
pub fn render_profile() -> EncodingProfile {
    EncodingProfile::new("mp4", ContainerFormat::Mp4Iso)
        .with_stream(StreamProfile::Video(VideoProfile {
            codec: VideoCodec::Mpeg4Part2,
            quality: Some(3),
            presence: 1,
        }))
        .with_stream(StreamProfile::Audio(AudioProfile {
            codec: AudioCodec::Aac,
            bitrate_kbps: Some(128),
            presence: 0,
        }))
}
