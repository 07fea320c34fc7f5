use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::bus::BusMessage;

/// Upper bound for one blocking wait while bus watches are attached.
const POLL_SLICE: Duration = Duration::from_millis(10);

/// Identifies a source attached to a [`MainLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

type TimeoutCallback<T> = Box<dyn FnMut(&mut T) -> ControlFlow<()>>;
type WatchCallback<T> = Box<dyn FnMut(&mut T, BusMessage) -> ControlFlow<()>>;

enum Source<T> {
    Timeout {
        interval: Duration,
        deadline: Instant,
        callback: TimeoutCallback<T>,
    },
    Watch {
        messages: Receiver<BusMessage>,
        callback: WatchCallback<T>,
    },
}

struct Shared<T> {
    next_id: u64,
    added: Vec<(SourceId, Source<T>)>,
    removed: Vec<SourceId>,
    quit: bool,
}

impl<T> Shared<T> {
    fn attach(&mut self, source: Source<T>) -> SourceId {
        self.next_id += 1;
        let id = SourceId(self.next_id);
        self.added.push((id, source));
        id
    }
}

/// Cloneable handle for attaching sources to a [`MainLoop`], usable from inside callbacks.
pub struct LoopHandle<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T> Clone for LoopHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> LoopHandle<T> {
    /// Calls `callback` every `interval` until it returns `Break`.
    pub fn timeout_add<F>(&self, interval: Duration, callback: F) -> SourceId
    where
        F: FnMut(&mut T) -> ControlFlow<()> + 'static,
    {
        let id = self.shared.borrow_mut().attach(Source::Timeout {
            interval,
            deadline: Instant::now() + interval,
            callback: Box::new(callback),
        });
        debug!(?id, interval_ms = interval.as_millis() as u64, "timeout attached");
        id
    }

    /// Dispatches every message arriving on `messages` until the callback returns `Break`.
    pub fn watch_add<F>(&self, messages: Receiver<BusMessage>, callback: F) -> SourceId
    where
        F: FnMut(&mut T, BusMessage) -> ControlFlow<()> + 'static,
    {
        let id = self.shared.borrow_mut().attach(Source::Watch {
            messages,
            callback: Box::new(callback),
        });
        debug!(?id, "bus watch attached");
        id
    }

    /// Detaches a source; unknown ids are ignored.
    pub fn remove(&self, id: SourceId) {
        self.shared.borrow_mut().removed.push(id);
    }

    /// Makes [`MainLoop::run`] return after the current iteration.
    pub fn quit(&self) {
        self.shared.borrow_mut().quit = true;
    }
}

/// Single-threaded loop dispatching timeouts and bus watches to callbacks that receive `&mut T`.
pub struct MainLoop<T> {
    shared: Rc<RefCell<Shared<T>>>,
    sources: Vec<(SourceId, Source<T>)>,
}

impl<T> Default for MainLoop<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MainLoop<T> {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                next_id: 0,
                added: Vec::new(),
                removed: Vec::new(),
                quit: false,
            })),
            sources: Vec::new(),
        }
    }

    pub fn handle(&self) -> LoopHandle<T> {
        LoopHandle {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Number of attached sources, including ones attached since the last iteration.
    pub fn source_count(&self) -> usize {
        self.sync_sources_len()
    }

    /// Runs until [`LoopHandle::quit`] is called.
    pub fn run(&mut self, target: &mut T) {
        self.shared.borrow_mut().quit = false;
        while !self.shared.borrow().quit {
            self.iteration(target, true);
        }
        debug!("main loop quit");
    }

    /// Dispatches every ready source once. With `may_block` waits for the next
    /// timeout or one poll slice when nothing is ready. Returns true if any
    /// callback ran.
    pub fn iteration(&mut self, target: &mut T, may_block: bool) -> bool {
        self.sync_sources();
        let mut dispatched = self.dispatch(target);
        if !dispatched && may_block && !self.shared.borrow().quit {
            thread::sleep(self.wait_time());
            self.sync_sources();
            dispatched = self.dispatch(target);
        }
        self.sync_sources();
        dispatched
    }

    fn sync_sources_len(&self) -> usize {
        let shared = self.shared.borrow();
        self.sources.len() + shared.added.len()
            - shared
                .removed
                .iter()
                .filter(|id| self.sources.iter().any(|(attached, _)| attached == *id))
                .count()
    }

    fn sync_sources(&mut self) {
        let mut shared = self.shared.borrow_mut();
        self.sources.append(&mut shared.added);
        if !shared.removed.is_empty() {
            let removed = std::mem::take(&mut shared.removed);
            self.sources.retain(|(id, _)| !removed.contains(id));
        }
    }

    fn wait_time(&self) -> Duration {
        let now = Instant::now();
        let has_watch = self
            .sources
            .iter()
            .any(|(_, source)| matches!(source, Source::Watch { .. }));
        let next_deadline = self
            .sources
            .iter()
            .filter_map(|(_, source)| match source {
                Source::Timeout { deadline, .. } => Some(deadline.saturating_duration_since(now)),
                Source::Watch { .. } => None,
            })
            .min();
        match (next_deadline, has_watch) {
            (Some(deadline), true) => deadline.min(POLL_SLICE),
            (Some(deadline), false) => deadline,
            (None, _) => POLL_SLICE,
        }
    }

    fn dispatch(&mut self, target: &mut T) -> bool {
        let now = Instant::now();
        let mut dispatched = false;
        let mut finished = Vec::new();

        for (id, source) in &mut self.sources {
            if self.shared.borrow().removed.contains(id) {
                continue;
            }
            let flow = match source {
                Source::Timeout {
                    interval,
                    deadline,
                    callback,
                } => {
                    if *deadline > now {
                        continue;
                    }
                    dispatched = true;
                    trace!(?id, "timeout dispatched");
                    *deadline = Instant::now() + *interval;
                    callback(target)
                }
                Source::Watch { messages, callback } => {
                    let mut flow = ControlFlow::Continue(());
                    while flow.is_continue() {
                        match messages.try_recv() {
                            Ok(message) => {
                                dispatched = true;
                                trace!(?id, ?message, "bus message dispatched");
                                flow = callback(target, message);
                            }
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => {
                                debug!(?id, "bus disconnected, detaching watch");
                                flow = ControlFlow::Break(());
                            }
                        }
                    }
                    flow
                }
            };
            if flow.is_break() {
                finished.push(*id);
            }
        }

        if !finished.is_empty() {
            self.sources.retain(|(id, _)| !finished.contains(id));
        }
        dispatched
    }
}
