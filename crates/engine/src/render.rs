use std::path::{Path, PathBuf};

use media_ffmpeg::RenderStrategy;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::pipeline::PipelineMode;
use crate::profile::EncodingProfile;
use crate::timeline::{FileSource, Timeline};

/// Everything a media backend needs to render the timeline into one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPlan {
    pub inputs: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub profile: EncodingProfile,
    pub strategy: RenderStrategy,
    /// False when the profile has no audio stream, or its audio is optional and
    /// some clip carries none.
    pub include_audio: bool,
}

/// Plans the render of `timeline` for `mode`.
///
/// Smart render copies packets only when every clip already matches the
/// profile codecs; anything else is re-encoded.
pub fn build_render_plan(
    timeline: &Timeline,
    output_path: &Path,
    profile: &EncodingProfile,
    mode: PipelineMode,
) -> Result<RenderPlan> {
    let clips = timeline.layer().clips();
    if clips.is_empty() {
        return Err(EngineError::EmptyTimeline);
    }
    if mode == PipelineMode::Preview {
        return Err(EngineError::PreviewUnsupported);
    }
    profile.validate()?;

    let silent_clip = clips.iter().find(|clip| clip.audio_codec.is_none());
    let include_audio = match (profile.audio(), silent_clip) {
        (None, _) => false,
        (Some(audio), Some(clip)) if audio.presence > 0 => {
            return Err(EngineError::MissingAudioStream(clip.path.clone()));
        }
        (Some(_), silent_clip) => silent_clip.is_none(),
    };
    let strategy = if mode == PipelineMode::SmartRender && clips_match_profile(clips, profile) {
        RenderStrategy::StreamCopy
    } else {
        RenderStrategy::Reencode
    };
    debug!(clips = clips.len(), ?strategy, include_audio, "render planned");

    Ok(RenderPlan {
        inputs: clips.iter().map(|clip| clip.path.clone()).collect(),
        output_path: output_path.to_path_buf(),
        profile: profile.clone(),
        strategy,
        include_audio,
    })
}

fn clips_match_profile(clips: &[FileSource], profile: &EncodingProfile) -> bool {
    let Some(video) = profile.video() else {
        return false;
    };
    clips.iter().all(|clip| {
        let video_matches = clip.video_codec.as_deref() == Some(video.codec.probe_name());
        let audio_matches = match profile.audio() {
            Some(audio) => clip.audio_codec.as_deref() == Some(audio.codec.probe_name()),
            None => true,
        };
        video_matches && audio_matches
    })
}
