mod error;
mod probe;
mod progress;
mod render;
mod time;

pub use error::{MediaFfmpegError, Result};
pub use probe::{MediaInfo, StreamInfo, StreamKind, probe_media};
pub use progress::parse_progress_line;
pub use render::{
    RenderOutcome, RenderProcess, RenderRequest, RenderStrategy, build_render_args,
    spawn_render,
};
pub use time::{NANOS_PER_SECOND, micros_to_nanos, seconds_to_nanos};
