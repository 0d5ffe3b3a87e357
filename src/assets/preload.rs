use std::sync::{
    Arc,
    mpsc::{self, Receiver, TryRecvError},
};

use rayon::prelude::*;

use crate::{
    assets::{PreparedImage, decode::decode_image, source::AssetSource},
    foundation::error::{ReelError, ReelResult},
};

/// Whether a media driver accepts live updates yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaReadiness {
    Loading {
        loaded: usize,
        failed: usize,
        total: usize,
    },
    Ready,
}

impl MediaReadiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Result of feeding one completion report into a [`LoadTracker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// First report for this index; more are outstanding.
    Counted,
    /// First report for this index and the last one outstanding.
    BecameReady,
    /// Duplicate or out-of-range report, or the tracker was already ready.
    Ignored,
}

/// Per-index completion bookkeeping for a join over `total` load tasks.
///
/// Each index counts at most once, so a spurious second report can neither double count nor
/// re-trigger readiness.
#[derive(Clone, Debug)]
pub struct LoadTracker {
    done: Vec<bool>,
    loaded: usize,
    failed: usize,
    ready: bool,
}

impl LoadTracker {
    pub fn new(total: usize) -> Self {
        Self {
            done: vec![false; total],
            loaded: 0,
            failed: 0,
            ready: total == 0,
        }
    }

    pub fn total(&self) -> usize {
        self.done.len()
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn readiness(&self) -> MediaReadiness {
        if self.ready {
            MediaReadiness::Ready
        } else {
            MediaReadiness::Loading {
                loaded: self.loaded,
                failed: self.failed,
                total: self.total(),
            }
        }
    }

    /// Record that `index` finished loading, successfully or not.
    pub fn record(&mut self, index: usize, ok: bool) -> Completion {
        if self.ready {
            return Completion::Ignored;
        }
        let Some(slot) = self.done.get_mut(index) else {
            return Completion::Ignored;
        };
        if *slot {
            return Completion::Ignored;
        }
        *slot = true;
        if ok {
            self.loaded += 1;
        } else {
            self.failed += 1;
        }
        if self.loaded + self.failed == self.done.len() {
            self.ready = true;
            Completion::BecameReady
        } else {
            Completion::Counted
        }
    }

    fn outstanding(&self) -> impl Iterator<Item = usize> + '_ {
        self.done
            .iter()
            .enumerate()
            .filter_map(|(i, done)| (!*done).then_some(i))
    }
}

/// Loaded frames in sequence order. A `None` slot is a frame that failed to load.
#[derive(Clone, Debug, Default)]
pub struct FrameSet {
    frames: Vec<Option<PreparedImage>>,
}

impl FrameSet {
    pub fn new(frames: Vec<Option<PreparedImage>>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PreparedImage> {
        self.frames.get(index).and_then(Option::as_ref)
    }

    pub fn loaded_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }
}

/// One completion report sent from a worker back to the owner.
#[derive(Debug)]
pub struct LoadEvent {
    pub index: usize,
    pub result: Result<PreparedImage, String>,
}

/// Concurrent fetch+decode of an ordered list of assets on a rayon pool.
///
/// Workers only report over a channel; the owner drains it with [`Preloader::poll`] from its event
/// loop and never blocks.
pub struct Preloader {
    rx: Receiver<LoadEvent>,
    tracker: LoadTracker,
    slots: Vec<Option<PreparedImage>>,
    paths: Vec<String>,
    delivered: bool,
    _pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Preloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preloader")
            .field("readiness", &self.tracker.readiness())
            .field("delivered", &self.delivered)
            .finish()
    }
}

impl Preloader {
    #[tracing::instrument(skip(source, paths), fields(total = paths.len()))]
    pub fn start(
        source: Arc<dyn AssetSource>,
        paths: Vec<String>,
        threads: Option<usize>,
    ) -> ReelResult<Self> {
        let pool = build_thread_pool(threads)?;
        let (tx, rx) = mpsc::channel::<LoadEvent>();
        let jobs = paths.clone();
        tracing::info!(total = paths.len(), "preload started");

        pool.spawn(move || {
            jobs.into_par_iter()
                .enumerate()
                .for_each_with(tx, |tx, (index, rel)| {
                    let result = source
                        .fetch(&rel)
                        .and_then(|bytes| decode_image(&bytes))
                        .and_then(|img| {
                            if img.is_drawable() {
                                Ok(img)
                            } else {
                                Err(ReelError::media("decoded image has zero size"))
                            }
                        })
                        .map_err(|e| e.to_string());
                    // The receiver is gone once the owner is dropped; nothing left to report to.
                    let _ = tx.send(LoadEvent { index, result });
                });
        });

        Ok(Self {
            rx,
            tracker: LoadTracker::new(paths.len()),
            slots: vec![None; paths.len()],
            paths,
            delivered: false,
            _pool: pool,
        })
    }

    pub fn readiness(&self) -> MediaReadiness {
        self.tracker.readiness()
    }

    pub fn tracker(&self) -> &LoadTracker {
        &self.tracker
    }

    /// Drain completed loads without blocking.
    ///
    /// Returns the frame set exactly once, on the call that observes readiness.
    pub fn poll(&mut self) -> Option<FrameSet> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.fail_outstanding("loader stopped before reporting");
                    break;
                }
            }
        }
        self.take_if_ready()
    }

    /// Block until every load has reported, then return the frame set.
    ///
    /// Returns an empty set if it was already handed out by [`Preloader::poll`].
    pub fn wait(mut self) -> FrameSet {
        while !self.tracker.readiness().is_ready() {
            match self.rx.recv() {
                Ok(event) => self.apply(event),
                Err(_) => self.fail_outstanding("loader stopped before reporting"),
            }
        }
        self.take_if_ready().unwrap_or_default()
    }

    fn apply(&mut self, event: LoadEvent) {
        let LoadEvent { index, result } = event;
        let completion = self.tracker.record(index, result.is_ok());
        if completion == Completion::Ignored {
            tracing::debug!(index, "ignoring duplicate load report");
            return;
        }
        match result {
            Ok(img) => self.slots[index] = Some(img),
            Err(err) => {
                let path = self.paths.get(index).map(String::as_str).unwrap_or("?");
                tracing::warn!(index, path, %err, "frame failed to load; it will be skipped");
            }
        }
    }

    fn fail_outstanding(&mut self, reason: &str) {
        let outstanding: Vec<usize> = self.tracker.outstanding().collect();
        for index in outstanding {
            self.apply(LoadEvent {
                index,
                result: Err(reason.to_string()),
            });
        }
    }

    fn take_if_ready(&mut self) -> Option<FrameSet> {
        if self.delivered || !self.tracker.readiness().is_ready() {
            return None;
        }
        self.delivered = true;
        tracing::info!(
            loaded = self.tracker.loaded(),
            failed = self.tracker.failed(),
            total = self.tracker.total(),
            "preload finished"
        );
        Some(FrameSet::new(std::mem::take(&mut self.slots)))
    }
}

pub(crate) fn build_thread_pool(threads: Option<usize>) -> ReelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ReelError::validation(
            "preload 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ReelError::media(format!("failed to build rayon thread pool: {e}")))
}
