use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::trace;

use crate::pipeline::PipelineState;

/// Asynchronous status message posted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BusMessage {
    /// The render reached the end of the timeline.
    Eos,
    Error {
        message: String,
        debug: Option<String>,
    },
    StateChanged {
        old: PipelineState,
        new: PipelineState,
    },
}

/// Thread-safe message bus; clones share the same watchers.
#[derive(Debug, Clone, Default)]
pub struct Bus {
    watchers: Arc<Mutex<Vec<Sender<BusMessage>>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a watcher that receives every message posted from now on.
    pub fn add_watch(&self) -> Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel();
        self.lock_watchers().push(tx);
        rx
    }

    /// Delivers `message` to all live watchers; disconnected ones are dropped.
    pub fn post(&self, message: BusMessage) {
        trace!(?message, "bus message posted");
        self.lock_watchers()
            .retain(|watcher| watcher.send(message.clone()).is_ok());
    }

    pub fn watcher_count(&self) -> usize {
        self.lock_watchers().len()
    }

    fn lock_watchers(&self) -> std::sync::MutexGuard<'_, Vec<Sender<BusMessage>>> {
        self.watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::{Bus, BusMessage};

    #[test]
    fn messages_posted_from_other_threads_reach_watchers() {
        let bus = Bus::new();
        let watch = bus.add_watch();

        let poster = bus.clone();
        thread::spawn(move || poster.post(BusMessage::Eos))
            .join()
            .expect("poster thread");

        assert_eq!(watch.recv().expect("message"), BusMessage::Eos);
    }

    #[test]
    fn dropped_watchers_are_pruned_on_post() {
        let bus = Bus::new();
        let kept = bus.add_watch();
        drop(bus.add_watch());

        bus.post(BusMessage::Eos);

        assert_eq!(bus.watcher_count(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
