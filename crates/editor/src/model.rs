use std::ops::ControlFlow;

use chrono::Local;
use engine::{
    BusMessage, ClockTime, LoopHandle, PipelineMode, PipelineState, SourceId, TimelineEngine,
};
use tracing::{debug, info, trace, warn};

use crate::config::EditorConfig;
use crate::events::{EditorErrorEvent, EditorErrorKind, ModelEvent};
use crate::output::{output_uri, render_profile};
use crate::roles::{Role, role_names};

/// Progress value while no render is in flight.
pub const PROGRESS_INACTIVE: f64 = -1.0;

type Observer = Box<dyn FnMut(&ModelEvent)>;

/// List model of the clips on the timeline, with asynchronous render.
///
/// Bus messages and progress ticks are dispatched by the [`engine::MainLoop`]
/// whose handle the model was created with.
pub struct VideoEditorModel<E: TimelineEngine + 'static> {
    engine: E,
    config: EditorConfig,
    main_loop: LoopHandle<Self>,
    clip_count: usize,
    duration: Option<ClockTime>,
    progress: f64,
    bus_watch: Option<SourceId>,
    observers: Vec<Observer>,
}

impl<E: TimelineEngine + 'static> VideoEditorModel<E> {
    pub fn new(engine: E, config: EditorConfig, main_loop: LoopHandle<Self>) -> Self {
        Self {
            engine,
            config,
            main_loop,
            clip_count: 0,
            duration: None,
            progress: 0.0,
            bus_watch: None,
            observers: Vec::new(),
        }
    }

    /// Registers an observer called for every [`ModelEvent`].
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ModelEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn row_count(&self) -> usize {
        self.clip_count
    }

    pub fn role_names(&self) -> Vec<(i32, &'static str)> {
        role_names()
    }

    /// Value of `role_id` for `row`; `None` for rows past the end or unknown roles.
    pub fn data(&self, row: usize, role_id: i32) -> Option<String> {
        if row >= self.clip_count {
            return None;
        }
        let Some(role) = Role::from_id(role_id) else {
            warn!(role_id, row, "unknown role requested");
            return None;
        };
        let clip = self.engine.clip(row)?;
        Some(match role {
            Role::Uri => clip.uri.clone(),
            Role::FileName => clip.display_name().to_string(),
        })
    }

    /// Appends the media at `uri` as the last row.
    pub fn append(&mut self, uri: &str) -> bool {
        let row = self.clip_count;
        self.emit(ModelEvent::RowsAboutToBeInserted(row..row + 1));
        let added = match self.engine.add_clip(uri) {
            Ok(()) => {
                self.clip_count += 1;
                debug!(uri, row, "clip appended");
                true
            }
            Err(error) => {
                warn!(uri, %error, "failed to append clip");
                false
            }
        };
        self.emit(ModelEvent::RowsInserted(row..self.clip_count));
        added
    }

    /// Removes every clip, last one first.
    pub fn remove_all(&mut self) {
        let count = self.clip_count;
        self.emit(ModelEvent::RowsAboutToBeRemoved(0..count));
        while self.clip_count > 0 {
            let index = self.clip_count - 1;
            if let Err(error) = self.engine.remove_clip(index) {
                warn!(index, %error, "failed to remove clip");
            }
            self.clip_count -= 1;
        }
        self.emit(ModelEvent::RowsRemoved(0..count));
    }

    /// Starts rendering the timeline to a timestamped file in the output directory.
    ///
    /// Returns false after emitting an error event when the render cannot start.
    pub fn render(&mut self) -> bool {
        if self.clip_count < 1 {
            self.emit_error(EditorErrorKind::NoMedia, "No media added to the timeline");
            return false;
        }
        debug!(clips = self.clip_count, "render preparations started");

        let profile = render_profile();
        let output_uri = output_uri(&self.config.output_dir, profile.container, Local::now());
        if let Err(error) = self.engine.set_render_settings(&output_uri, &profile) {
            warn!(%output_uri, %error, "render settings rejected");
            self.emit_error(
                EditorErrorKind::RenderingFailed,
                "Failed setting rendering options",
            );
            return false;
        }
        if let Err(error) = self.engine.set_mode(PipelineMode::SmartRender) {
            warn!(%error, "smart render mode rejected");
            self.emit_error(EditorErrorKind::RenderingFailed, "Failed to set rendering mode");
            return false;
        }
        info!(%output_uri, "rendering");

        self.watch_bus();
        self.duration = None;
        self.progress = 0.0;
        self.main_loop
            .timeout_add(self.config.progress_interval(), |model| {
                model.update_progress()
            });

        if let Err(error) = self.engine.set_state(PipelineState::Playing) {
            warn!(%error, "pipeline failed to start");
            self.stop_pipeline();
            self.progress = PROGRESS_INACTIVE;
            self.emit_error(
                EditorErrorKind::RenderingFailed,
                "Failed to set pipeline to playing state",
            );
            return false;
        }
        true
    }

    /// Stops a running render. The progress sampler ends on its next tick.
    pub fn cancel_render(&mut self) {
        info!("cancelling render");
        self.stop_pipeline();
        self.progress = 0.0;
    }

    /// Timeline duration, queried once and cached until the next render.
    pub fn duration(&mut self) -> Option<ClockTime> {
        if self.duration.is_none() {
            self.duration = self.engine.query_duration();
        }
        self.duration
    }

    pub fn set_duration(&mut self, duration: Option<ClockTime>) {
        self.duration = duration;
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn set_progress(&mut self, progress: f64) {
        self.progress = progress;
    }

    pub fn emit_progress_changed(&mut self) {
        self.emit(ModelEvent::ProgressChanged(self.progress));
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Reacts to one pipeline bus message.
    pub fn handle_bus_message(&mut self, message: BusMessage) {
        match message {
            BusMessage::Eos => {
                info!("render reached end of stream");
                self.progress = 1.0;
                self.emit_progress_changed();
                self.stop_pipeline();
                self.emit(ModelEvent::RenderComplete);
                self.progress = PROGRESS_INACTIVE;
            }
            BusMessage::Error {
                message,
                debug: details,
            } => {
                warn!(%message, details = details.as_deref().unwrap_or_default(), "render error");
                self.emit_error(EditorErrorKind::RenderingFailed, message);
                self.stop_pipeline();
            }
            other => trace!(message = ?other, "bus message ignored"),
        }
    }

    /// One progress sampler tick; `Break` stops the sampler.
    pub fn update_progress(&mut self) -> ControlFlow<()> {
        if self.progress == PROGRESS_INACTIVE {
            return ControlFlow::Break(());
        }

        match self.duration().filter(|duration| *duration > ClockTime::ZERO) {
            None => self.progress = 0.0,
            Some(duration) => {
                let position = self.engine.query_position();
                self.progress = match position {
                    Some(position) => position.nanos() as f64 / duration.nanos() as f64,
                    None => -1.0,
                };
                debug!(
                    percent = self.progress * 100.0,
                    position = ?position,
                    %duration,
                    "render progress"
                );
            }
        }

        if self.progress < 0.0 {
            self.progress = 0.0;
            return ControlFlow::Break(());
        }
        self.emit_progress_changed();
        ControlFlow::Continue(())
    }

    fn watch_bus(&mut self) {
        if self.bus_watch.is_some() {
            return;
        }
        let id = self
            .main_loop
            .watch_add(self.engine.bus().add_watch(), |model, message| {
                model.handle_bus_message(message);
                ControlFlow::Continue(())
            });
        self.bus_watch = Some(id);
    }

    fn stop_pipeline(&mut self) {
        if let Err(error) = self.engine.set_state(PipelineState::Null) {
            warn!(%error, "failed to stop pipeline");
        }
    }

    fn emit_error(&mut self, kind: EditorErrorKind, message: impl Into<String>) {
        let event = EditorErrorEvent::new(kind, message);
        debug!(kind = ?event.kind, message = %event.message, "model error");
        self.emit(ModelEvent::Error(event));
    }

    fn emit(&mut self, event: ModelEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }
}
