use std::ops::Range;

use serde::Serialize;

/// Notifications emitted by the editor model to its observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ModelEvent {
    RowsAboutToBeInserted(Range<usize>),
    /// Rows actually inserted; empty when the append failed.
    RowsInserted(Range<usize>),
    RowsAboutToBeRemoved(Range<usize>),
    RowsRemoved(Range<usize>),
    ProgressChanged(f64),
    RenderComplete,
    Error(EditorErrorEvent),
}

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EditorErrorKind {
    NoMedia,
    RenderingFailed,
}

impl EditorErrorKind {
    /// Short headline shown above the error message.
    pub fn category(self) -> &'static str {
        match self {
            Self::NoMedia => "Add clips before exporting",
            Self::RenderingFailed => "Rendering failed",
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorErrorEvent {
    pub kind: EditorErrorKind,
    pub message: String,
}

impl EditorErrorEvent {
    pub fn new(kind: EditorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
