//! Timeline and render pipeline engine behind the editor model.

pub mod backend;
pub mod bus;
pub mod error;
pub mod main_loop;
pub mod pipeline;
pub mod profile;
pub mod render;
pub mod time;
pub mod timeline;
pub mod uri;

pub use backend::{FfmpegMediaBackend, MediaBackend, ProbedMedia, RenderJob};
pub use bus::{Bus, BusMessage};
pub use error::{EngineError, Result};
pub use main_loop::{LoopHandle, MainLoop, SourceId};
pub use pipeline::{Pipeline, PipelineMode, PipelineState, TimelineEngine};
pub use profile::{
    AudioCodec, AudioProfile, ContainerFormat, EncodingProfile, StreamProfile, VideoCodec,
    VideoProfile,
};
pub use render::{RenderPlan, build_render_plan};
pub use time::ClockTime;
pub use timeline::{FileSource, Layer, Timeline};
pub use uri::{display_name, path_to_uri, uri_to_path};
