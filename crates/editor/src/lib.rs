//! Clip list model over the timeline engine, with asynchronous render and progress.

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod output;
pub mod roles;

pub use config::{EditorConfig, default_config_path};
pub use error::{EditorError, Result};
pub use events::{EditorErrorEvent, EditorErrorKind, ModelEvent};
pub use model::{PROGRESS_INACTIVE, VideoEditorModel};
pub use output::{output_uri, render_profile};
pub use roles::{Role, role_names};
