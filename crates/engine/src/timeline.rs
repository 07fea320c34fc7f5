use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::time::ClockTime;
use crate::uri::display_name;

/// A clip backed by one media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSource {
    pub uri: String,
    pub path: PathBuf,
    pub duration: Option<ClockTime>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl FileSource {
    /// Last path segment of the source uri.
    pub fn display_name(&self) -> &str {
        display_name(&self.uri)
    }
}

/// Ordered, gapless sequence of clips played back to back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Layer {
    clips: Vec<FileSource>,
}

impl Layer {
    /// Appends `clip` after the last clip.
    pub fn push(&mut self, clip: FileSource) {
        debug!(uri = %clip.uri, position = self.clips.len(), "clip added to layer");
        self.clips.push(clip);
    }

    /// Removes and returns the clip at `index`; later clips move up.
    pub fn remove(&mut self, index: usize) -> Result<FileSource> {
        if index >= self.clips.len() {
            return Err(EngineError::ClipIndexOutOfRange {
                index,
                len: self.clips.len(),
            });
        }
        let removed = self.clips.remove(index);
        debug!(uri = %removed.uri, index, "clip removed from layer");
        Ok(removed)
    }

    pub fn nth(&self, index: usize) -> Option<&FileSource> {
        self.clips.get(index)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clips(&self) -> &[FileSource] {
        &self.clips
    }

    /// Total playback duration, or `None` while any clip duration is unknown.
    pub fn duration(&self) -> Option<ClockTime> {
        self.clips.iter().map(|clip| clip.duration).sum()
    }
}

/// Timeline holding the single simple layer that gets rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Timeline {
    layer: Layer,
}

impl Timeline {
    /// Creates a timeline with one empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn layer_mut(&mut self) -> &mut Layer {
        &mut self.layer
    }

    /// Duration of the timeline; `None` when empty or unknown.
    pub fn duration(&self) -> Option<ClockTime> {
        if self.layer.is_empty() {
            return None;
        }
        self.layer.duration()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{FileSource, Layer, Timeline};
    use crate::error::EngineError;
    use crate::time::ClockTime;

    fn clip(name: &str, seconds: Option<u64>) -> FileSource {
        FileSource {
            uri: format!("file:///media/{name}"),
            path: PathBuf::from(format!("/media/{name}")),
            duration: seconds.map(|s| ClockTime::from_nanos(s * 1_000_000_000)),
            video_codec: Some("h264".to_string()),
            audio_codec: Some("aac".to_string()),
        }
    }

    #[test]
    fn layer_duration_is_sum_of_clips() {
        let mut layer = Layer::default();
        layer.push(clip("a.mp4", Some(2)));
        layer.push(clip("b.mp4", Some(3)));

        assert_eq!(layer.duration(), Some(ClockTime::from_nanos(5_000_000_000)));
    }

    #[test]
    fn unknown_clip_duration_makes_layer_duration_unknown() {
        let mut layer = Layer::default();
        layer.push(clip("a.mp4", Some(2)));
        layer.push(clip("still.png", None));

        assert_eq!(layer.duration(), None);
    }

    #[test]
    fn remove_shifts_following_clips() {
        let mut layer = Layer::default();
        layer.push(clip("a.mp4", Some(1)));
        layer.push(clip("b.mp4", Some(1)));
        layer.push(clip("c.mp4", Some(1)));

        let removed = layer.remove(1).expect("remove should succeed");

        assert_eq!(removed.display_name(), "b.mp4");
        assert_eq!(layer.nth(1).map(FileSource::display_name), Some("c.mp4"));
        assert!(matches!(
            layer.remove(2),
            Err(EngineError::ClipIndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn empty_timeline_has_no_duration() {
        let mut timeline = Timeline::new();
        assert_eq!(timeline.duration(), None);

        timeline.layer_mut().push(clip("a.mp4", Some(4)));
        assert_eq!(timeline.duration(), Some(ClockTime::from_nanos(4_000_000_000)));
    }
}
