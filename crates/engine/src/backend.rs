use std::path::{Path, PathBuf};

use media_ffmpeg::{RenderOutcome, RenderProcess, RenderRequest};
use tracing::{info, warn};

use crate::bus::{Bus, BusMessage};
use crate::error::{EngineError, Result};
use crate::render::RenderPlan;
use crate::time::ClockTime;

/// Result of probing one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedMedia {
    pub path: PathBuf,
    pub duration: Option<ClockTime>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

/// A render started by a [`MediaBackend`].
pub trait RenderJob {
    /// Output position reached so far.
    fn position(&self) -> ClockTime;

    /// Stops the render without posting bus messages.
    fn stop(&mut self) -> Result<()>;
}

/// Media operations required by the pipeline.
pub trait MediaBackend {
    /// Probes a clip before it joins the timeline.
    fn probe(&self, path: &Path) -> Result<ProbedMedia>;

    /// Starts rendering `plan`; completion is reported on `bus` as `Eos` or `Error`.
    fn start_render(&self, plan: &RenderPlan, bus: Bus) -> Result<Box<dyn RenderJob>>;
}

/// FFmpeg CLI-backed backend used by production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegMediaBackend;

impl MediaBackend for FfmpegMediaBackend {
    fn probe(&self, path: &Path) -> Result<ProbedMedia> {
        let info = media_ffmpeg::probe_media(path)?;
        let video = info
            .first_video()
            .ok_or_else(|| EngineError::MissingVideoStream(path.to_path_buf()))?;

        Ok(ProbedMedia {
            duration: info.duration_seconds.and_then(ClockTime::from_seconds_f64),
            video_codec: video.codec_name.clone(),
            audio_codec: info
                .first_audio()
                .and_then(|stream| stream.codec_name.clone()),
            path: info.path,
        })
    }

    fn start_render(&self, plan: &RenderPlan, bus: Bus) -> Result<Box<dyn RenderJob>> {
        let request = render_request(plan)?;
        let process = media_ffmpeg::spawn_render(&request, move |outcome| {
            post_outcome(&bus, outcome)
        })?;
        Ok(Box::new(FfmpegRenderJob { process }))
    }
}

struct FfmpegRenderJob {
    process: RenderProcess,
}

impl RenderJob for FfmpegRenderJob {
    fn position(&self) -> ClockTime {
        ClockTime::from_nanos(self.process.position_nanos())
    }

    fn stop(&mut self) -> Result<()> {
        self.process.kill()?;
        Ok(())
    }
}

fn render_request(plan: &RenderPlan) -> Result<RenderRequest> {
    let video = plan
        .profile
        .video()
        .ok_or(EngineError::InvalidEncodingProfile {
            reason: "profile has no video stream",
        })?;
    let audio = plan.profile.audio().filter(|_| plan.include_audio);

    Ok(RenderRequest {
        inputs: plan.inputs.clone(),
        output_path: plan.output_path.clone(),
        container: plan.profile.container.muxer().to_string(),
        video_codec: video.codec.encoder().to_string(),
        audio_codec: audio.map(|audio| audio.codec.encoder().to_string()),
        video_quality: video.quality,
        audio_bitrate_kbps: audio.and_then(|audio| audio.bitrate_kbps),
        strategy: plan.strategy,
    })
}

fn post_outcome(bus: &Bus, outcome: RenderOutcome) {
    match outcome {
        RenderOutcome::Finished => {
            info!("render finished");
            bus.post(BusMessage::Eos);
        }
        RenderOutcome::Failed { status, stderr } => {
            let message = failure_message(status, &stderr);
            warn!(?status, %message, "render failed");
            bus.post(BusMessage::Error {
                message,
                debug: (!stderr.is_empty()).then_some(stderr),
            });
        }
        RenderOutcome::Cancelled => info!("render cancelled"),
    }
}

/// Last non-empty stderr line, or a generic exit status message.
fn failure_message(status: Option<i32>, stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match status {
            Some(code) => format!("ffmpeg exited with status {code}"),
            None => "ffmpeg terminated by signal".to_string(),
        })
}
