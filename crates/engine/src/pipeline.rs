use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{FfmpegMediaBackend, MediaBackend, RenderJob};
use crate::bus::{Bus, BusMessage};
use crate::error::{EngineError, Result};
use crate::profile::EncodingProfile;
use crate::render::build_render_plan;
use crate::time::ClockTime;
use crate::timeline::{FileSource, Timeline};
use crate::uri::uri_to_path;

/// What the pipeline does with the timeline when playing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PipelineMode {
    #[default]
    Preview,
    Render,
    /// Render, reusing already encoded media where possible.
    SmartRender,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    #[default]
    Null,
    Playing,
}

/// Engine operations consumed by the editor model.
pub trait TimelineEngine {
    /// Appends the media at `uri` to the end of the layer.
    fn add_clip(&mut self, uri: &str) -> Result<()>;

    fn remove_clip(&mut self, index: usize) -> Result<FileSource>;

    fn clip(&self, index: usize) -> Option<&FileSource>;

    fn clip_count(&self) -> usize;

    fn set_render_settings(&mut self, output_uri: &str, profile: &EncodingProfile) -> Result<()>;

    fn set_mode(&mut self, mode: PipelineMode) -> Result<()>;

    fn query_duration(&self) -> Option<ClockTime>;

    fn query_position(&self) -> Option<ClockTime>;

    fn set_state(&mut self, state: PipelineState) -> Result<()>;

    fn bus(&self) -> Bus;
}

#[derive(Debug, Clone)]
struct RenderSettings {
    output_path: PathBuf,
    profile: EncodingProfile,
}

/// Timeline pipeline rendering through a [`MediaBackend`].
pub struct Pipeline<M: MediaBackend> {
    media: M,
    timeline: Timeline,
    bus: Bus,
    mode: PipelineMode,
    state: PipelineState,
    settings: Option<RenderSettings>,
    job: Option<Box<dyn RenderJob>>,
}

impl<M: MediaBackend> Pipeline<M> {
    pub fn new(media: M) -> Self {
        Self {
            media,
            timeline: Timeline::new(),
            bus: Bus::new(),
            mode: PipelineMode::default(),
            state: PipelineState::default(),
            settings: None,
            job: None,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn start(&mut self) -> Result<()> {
        if self.mode == PipelineMode::Preview {
            return Err(EngineError::PreviewUnsupported);
        }
        let settings = self
            .settings
            .as_ref()
            .ok_or(EngineError::MissingRenderSettings)?;
        let plan = build_render_plan(
            &self.timeline,
            &settings.output_path,
            &settings.profile,
            self.mode,
        )?;
        let job = self.media.start_render(&plan, self.bus.clone())?;
        info!(
            output = %plan.output_path.display(),
            strategy = ?plan.strategy,
            "pipeline playing"
        );
        self.job = Some(job);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        match self.job.take() {
            Some(mut job) => {
                debug!("stopping render job");
                job.stop()
            }
            None => Ok(()),
        }
    }
}

impl<M: MediaBackend> TimelineEngine for Pipeline<M> {
    fn add_clip(&mut self, uri: &str) -> Result<()> {
        // Concat playlists resolve relative entries against their own directory.
        let path = uri_to_path(uri)?;
        let path = std::path::absolute(&path)
            .map_err(|source| EngineError::ResolvePath { path, source })?;
        let probed = self.media.probe(&path)?;
        self.timeline.layer_mut().push(FileSource {
            uri: uri.to_string(),
            path: probed.path,
            duration: probed.duration,
            video_codec: probed.video_codec,
            audio_codec: probed.audio_codec,
        });
        Ok(())
    }

    fn remove_clip(&mut self, index: usize) -> Result<FileSource> {
        self.timeline.layer_mut().remove(index)
    }

    fn clip(&self, index: usize) -> Option<&FileSource> {
        self.timeline.layer().nth(index)
    }

    fn clip_count(&self) -> usize {
        self.timeline.layer().len()
    }

    fn set_render_settings(&mut self, output_uri: &str, profile: &EncodingProfile) -> Result<()> {
        if !output_uri.starts_with("file://") {
            return Err(EngineError::UnsupportedUriScheme {
                uri: output_uri.to_string(),
            });
        }
        profile.validate()?;
        let output_path = uri_to_path(output_uri)?;
        debug!(output = %output_path.display(), profile = %profile.name, "render settings applied");
        self.settings = Some(RenderSettings {
            output_path,
            profile: profile.clone(),
        });
        Ok(())
    }

    fn set_mode(&mut self, mode: PipelineMode) -> Result<()> {
        if mode != PipelineMode::Preview && self.settings.is_none() {
            return Err(EngineError::MissingRenderSettings);
        }
        debug!(?mode, "pipeline mode set");
        self.mode = mode;
        Ok(())
    }

    fn query_duration(&self) -> Option<ClockTime> {
        self.timeline.duration()
    }

    fn query_position(&self) -> Option<ClockTime> {
        match self.state {
            PipelineState::Playing => self.job.as_ref().map(|job| job.position()),
            PipelineState::Null => None,
        }
    }

    fn set_state(&mut self, state: PipelineState) -> Result<()> {
        let old = self.state;
        if old == state {
            return Ok(());
        }
        match state {
            PipelineState::Playing => self.start()?,
            PipelineState::Null => {
                self.state = PipelineState::Null;
                self.stop()?;
            }
        }
        self.state = state;
        self.bus.post(BusMessage::StateChanged { old, new: state });
        Ok(())
    }

    fn bus(&self) -> Bus {
        self.bus.clone()
    }
}

impl<M: MediaBackend> Drop for Pipeline<M> {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            warn!(%error, "failed to stop pipeline on drop");
        }
    }
}

impl Pipeline<FfmpegMediaBackend> {
    /// Creates a pipeline wired to the FFmpeg backend.
    pub fn with_ffmpeg() -> Self {
        Self::new(FfmpegMediaBackend)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use media_ffmpeg::RenderStrategy;

    use super::{Pipeline, PipelineMode, PipelineState, TimelineEngine};
    use crate::backend::{MediaBackend, ProbedMedia, RenderJob};
    use crate::bus::{Bus, BusMessage};
    use crate::error::EngineError;
    use crate::profile::{
        AudioCodec, AudioProfile, ContainerFormat, EncodingProfile, StreamProfile, VideoCodec,
        VideoProfile,
    };
    use crate::render::RenderPlan;
    use crate::time::ClockTime;

    #[test]
    fn add_clip_probes_decoded_path_and_keeps_uri() {
        let backend = MockBackend::new();
        let probes = backend.probe_calls();
        let mut pipeline = Pipeline::new(backend);

        pipeline
            .add_clip("file:///media/My%20Clip.mp4")
            .expect("add clip");

        assert_eq!(
            *probes.lock().expect("lock probes"),
            vec![PathBuf::from("/media/My Clip.mp4")]
        );
        let clip = pipeline.clip(0).expect("clip");
        assert_eq!(clip.uri, "file:///media/My%20Clip.mp4");
        assert_eq!(clip.display_name(), "My%20Clip.mp4");
        assert_eq!(pipeline.clip_count(), 1);
    }

    #[test]
    fn relative_clip_paths_are_made_absolute() {
        let backend = MockBackend::new();
        let probes = backend.probe_calls();
        let plans = backend.render_calls();
        let mut pipeline = Pipeline::new(backend);
        let expected = std::env::current_dir()
            .expect("current dir")
            .join("clips/a.mp4");

        pipeline.add_clip("clips/a.mp4").expect("add clip");
        pipeline
            .set_render_settings("file:///out/render.mp4", &mp4_profile())
            .expect("settings");
        pipeline
            .set_mode(PipelineMode::SmartRender)
            .expect("mode");
        pipeline
            .set_state(PipelineState::Playing)
            .expect("playing");

        assert_eq!(*probes.lock().expect("lock probes"), vec![expected.clone()]);
        assert_eq!(pipeline.clip(0).map(|clip| clip.uri.as_str()), Some("clips/a.mp4"));
        let plans = plans.lock().expect("lock plans");
        assert_eq!(plans[0].strategy, RenderStrategy::StreamCopy);
        assert_eq!(plans[0].inputs, vec![expected]);
    }

    #[test]
    fn add_clip_rejects_non_file_uris() {
        let mut pipeline = Pipeline::new(MockBackend::new());

        let result = pipeline.add_clip("https://example.com/a.mp4");

        assert!(matches!(result, Err(EngineError::UnsupportedUriScheme { .. })));
        assert_eq!(pipeline.clip_count(), 0);
    }

    #[test]
    fn duration_is_sum_of_clip_durations() {
        let mut pipeline = Pipeline::new(MockBackend::new());
        assert_eq!(pipeline.query_duration(), None);

        pipeline.add_clip("/media/a.mp4").expect("add a");
        pipeline.add_clip("/media/b.mp4").expect("add b");

        assert_eq!(
            pipeline.query_duration(),
            Some(ClockTime::from_nanos(4_000_000_000))
        );
    }

    #[test]
    fn render_settings_require_file_output_uri() {
        let mut pipeline = Pipeline::new(MockBackend::new());

        let result = pipeline.set_render_settings("/out/render.mp4", &mp4_profile());

        assert!(matches!(result, Err(EngineError::UnsupportedUriScheme { .. })));
        assert!(matches!(
            pipeline.set_mode(PipelineMode::SmartRender),
            Err(EngineError::MissingRenderSettings)
        ));
    }

    #[test]
    fn playing_in_preview_mode_fails() {
        let mut pipeline = Pipeline::new(MockBackend::new());
        pipeline.add_clip("/media/a.mp4").expect("add clip");

        let result = pipeline.set_state(PipelineState::Playing);

        assert!(matches!(result, Err(EngineError::PreviewUnsupported)));
        assert_eq!(pipeline.state(), PipelineState::Null);
    }

    #[test]
    fn smart_render_starts_job_and_reports_position() {
        let backend = MockBackend::new();
        let plans = backend.render_calls();
        let position = backend.position();
        let mut pipeline = Pipeline::new(backend);
        let watch = pipeline.bus().add_watch();
        pipeline.add_clip("/media/a.mp4").expect("add clip");
        pipeline
            .set_render_settings("file:///out/render.mp4", &mp4_profile())
            .expect("settings");
        pipeline
            .set_mode(PipelineMode::SmartRender)
            .expect("mode");

        pipeline
            .set_state(PipelineState::Playing)
            .expect("playing");
        position.store(1_500_000_000, Ordering::Relaxed);

        let plans = plans.lock().expect("lock plans");
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].strategy, RenderStrategy::StreamCopy);
        assert_eq!(plans[0].output_path, PathBuf::from("/out/render.mp4"));
        assert_eq!(
            pipeline.query_position(),
            Some(ClockTime::from_nanos(1_500_000_000))
        );
        assert_eq!(
            watch.try_recv().expect("state change"),
            BusMessage::StateChanged {
                old: PipelineState::Null,
                new: PipelineState::Playing,
            }
        );
    }

    #[test]
    fn null_state_stops_job_and_clears_position() {
        let backend = MockBackend::new();
        let stopped = backend.stopped();
        let mut pipeline = Pipeline::new(backend);
        pipeline.add_clip("/media/a.mp4").expect("add clip");
        pipeline
            .set_render_settings("file:///out/render.mp4", &mp4_profile())
            .expect("settings");
        pipeline.set_mode(PipelineMode::Render).expect("mode");
        pipeline
            .set_state(PipelineState::Playing)
            .expect("playing");

        pipeline.set_state(PipelineState::Null).expect("null");

        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(pipeline.query_position(), None);
        assert_eq!(pipeline.state(), PipelineState::Null);
    }

    #[test]
    fn dropping_pipeline_stops_running_job() {
        let backend = MockBackend::new();
        let stopped = backend.stopped();
        let mut pipeline = Pipeline::new(backend);
        pipeline.add_clip("/media/a.mp4").expect("add clip");
        pipeline
            .set_render_settings("file:///out/render.mp4", &mp4_profile())
            .expect("settings");
        pipeline.set_mode(PipelineMode::Render).expect("mode");
        pipeline
            .set_state(PipelineState::Playing)
            .expect("playing");

        drop(pipeline);

        assert!(stopped.load(Ordering::SeqCst));
    }

    fn mp4_profile() -> EncodingProfile {
        EncodingProfile::new("mp4", ContainerFormat::Mp4Iso)
            .with_stream(StreamProfile::Video(VideoProfile {
                codec: VideoCodec::Mpeg4Part2,
                quality: None,
                presence: 1,
            }))
            .with_stream(StreamProfile::Audio(AudioProfile {
                codec: AudioCodec::Aac,
                bitrate_kbps: None,
                presence: 0,
            }))
    }

    struct MockBackend {
        probe_calls: Arc<Mutex<Vec<PathBuf>>>,
        render_calls: Arc<Mutex<Vec<RenderPlan>>>,
        position: Arc<AtomicU64>,
        stopped: Arc<AtomicBool>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                probe_calls: Arc::new(Mutex::new(Vec::new())),
                render_calls: Arc::new(Mutex::new(Vec::new())),
                position: Arc::new(AtomicU64::new(0)),
                stopped: Arc::new(AtomicBool::new(false)),
            }
        }

        fn probe_calls(&self) -> Arc<Mutex<Vec<PathBuf>>> {
            Arc::clone(&self.probe_calls)
        }

        fn render_calls(&self) -> Arc<Mutex<Vec<RenderPlan>>> {
            Arc::clone(&self.render_calls)
        }

        fn position(&self) -> Arc<AtomicU64> {
            Arc::clone(&self.position)
        }

        fn stopped(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.stopped)
        }
    }

    impl MediaBackend for MockBackend {
        fn probe(&self, path: &Path) -> crate::Result<ProbedMedia> {
            self.probe_calls
                .lock()
                .expect("lock probe calls")
                .push(path.to_path_buf());
            Ok(ProbedMedia {
                path: path.to_path_buf(),
                duration: Some(ClockTime::from_nanos(2_000_000_000)),
                video_codec: Some("mpeg4".to_string()),
                audio_codec: Some("aac".to_string()),
            })
        }

        fn start_render(&self, plan: &RenderPlan, _bus: Bus) -> crate::Result<Box<dyn RenderJob>> {
            self.render_calls
                .lock()
                .expect("lock render calls")
                .push(plan.clone());
            Ok(Box::new(MockJob {
                position: Arc::clone(&self.position),
                stopped: Arc::clone(&self.stopped),
            }))
        }
    }

    struct MockJob {
        position: Arc<AtomicU64>,
        stopped: Arc<AtomicBool>,
    }

    impl RenderJob for MockJob {
        fn position(&self) -> ClockTime {
            ClockTime::from_nanos(self.position.load(Ordering::Relaxed))
        }

        fn stop(&mut self) -> crate::Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
