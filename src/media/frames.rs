use std::sync::Arc;

use crate::{
    assets::{
        preload::{FrameSet, MediaReadiness, Preloader},
        source::AssetSource,
    },
    foundation::{
        core::ScrollProgress,
        error::{ReelError, ReelResult},
    },
    media::{MediaCursor, MediaDriver, MediaKind, MediaStats},
    render::{canvas::CanvasSurface, fit::FitMode, schedule::FrameRequest},
};

const INDEX_PLACEHOLDER: &str = "{index}";

/// Ordered still-image resources named by a 1-based, zero-padded index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    template: String,
    count: usize,
}

impl FrameSequence {
    pub fn new(template: impl Into<String>, count: usize) -> ReelResult<Self> {
        let template = template.into();
        if !template.contains(INDEX_PLACEHOLDER) {
            return Err(ReelError::validation(format!(
                "frame template '{template}' must contain '{INDEX_PLACEHOLDER}'"
            )));
        }
        if count == 0 {
            return Err(ReelError::validation("frame count must be >= 1"));
        }
        Ok(Self { template, count })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Resource path for the 0-based `index` (`0` -> `...-001.jpg`).
    pub fn frame_path(&self, index: usize) -> String {
        self.template
            .replace(INDEX_PLACEHOLDER, &format!("{:03}", index + 1))
    }

    pub fn paths(&self) -> Vec<String> {
        (0..self.count).map(|i| self.frame_path(i)).collect()
    }
}

/// `round(progress * (count - 1))`, kept inside `[0, count - 1]`.
pub fn frame_index_for(progress: ScrollProgress, count: usize) -> usize {
    let Some(last) = count.checked_sub(1) else {
        return 0;
    };
    let idx = (progress.get() * last as f64).round();
    (idx.max(0.0) as usize).min(last)
}

enum FramesState {
    Loading(Preloader),
    Ready(FrameSet),
}

/// Frame-sequence scrubber: preloads every frame, then paints one per animation frame.
pub struct FrameScrubber {
    sequence: FrameSequence,
    fit: FitMode,
    state: FramesState,
    progress: ScrollProgress,
    request: FrameRequest<usize>,
    last_drawn: Option<usize>,
    skipped: u64,
}

impl std::fmt::Debug for FrameScrubber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScrubber")
            .field("count", &self.sequence.count())
            .field("readiness", &self.readiness())
            .field("last_drawn", &self.last_drawn)
            .finish()
    }
}

impl FrameScrubber {
    /// Start loading every frame of `sequence` on a worker pool.
    pub fn start(
        sequence: FrameSequence,
        fit: FitMode,
        source: Arc<dyn AssetSource>,
        threads: Option<usize>,
    ) -> ReelResult<Self> {
        let preloader = Preloader::start(source, sequence.paths(), threads)?;
        Ok(Self::with_state(sequence, fit, FramesState::Loading(preloader)))
    }

    /// A scrubber over frames that are already decoded.
    pub fn from_frames(sequence: FrameSequence, fit: FitMode, frames: FrameSet) -> Self {
        Self::with_state(sequence, fit, FramesState::Ready(frames))
    }

    fn with_state(sequence: FrameSequence, fit: FitMode, state: FramesState) -> Self {
        Self {
            sequence,
            fit,
            state,
            progress: ScrollProgress::START,
            request: FrameRequest::new(),
            last_drawn: None,
            skipped: 0,
        }
    }

    pub fn last_drawn(&self) -> Option<usize> {
        self.last_drawn
    }

    /// Draws skipped because the selected frame failed to load.
    pub fn skipped_draws(&self) -> u64 {
        self.skipped
    }

    fn draw_index(&mut self, index: usize, canvas: &mut CanvasSurface) -> ReelResult<bool> {
        let FramesState::Ready(frames) = &self.state else {
            return Ok(false);
        };
        let Some(frame) = frames.get(index) else {
            tracing::debug!(index, "frame missing; keeping previous frame");
            self.skipped += 1;
            return Ok(false);
        };
        let drawn = canvas.draw_image(frame, self.fit)?;
        if drawn {
            self.last_drawn = Some(index);
        }
        Ok(drawn)
    }
}

impl MediaDriver for FrameScrubber {
    fn kind(&self) -> MediaKind {
        MediaKind::Frames
    }

    fn fit(&self) -> FitMode {
        self.fit
    }

    fn readiness(&self) -> MediaReadiness {
        match &self.state {
            FramesState::Loading(pre) => pre.readiness(),
            FramesState::Ready(_) => MediaReadiness::Ready,
        }
    }

    fn poll(&mut self) -> bool {
        let FramesState::Loading(pre) = &mut self.state else {
            return false;
        };
        match pre.poll() {
            Some(frames) => {
                self.state = FramesState::Ready(frames);
                true
            }
            None => false,
        }
    }

    fn on_progress(&mut self, progress: ScrollProgress) {
        if !self.readiness().is_ready() {
            return;
        }
        self.progress = progress;
        let index = frame_index_for(progress, self.sequence.count());
        tracing::debug!(progress = progress.get(), index, "frame requested");
        self.request.request(index);
    }

    fn wants_frame(&self) -> bool {
        self.request.is_pending()
    }

    fn on_animation_frame(&mut self, canvas: &mut CanvasSurface) -> ReelResult<bool> {
        match self.request.take() {
            Some(index) => self.draw_index(index, canvas),
            None => Ok(false),
        }
    }

    fn draw_current(
        &mut self,
        progress: ScrollProgress,
        canvas: &mut CanvasSurface,
    ) -> ReelResult<bool> {
        self.progress = progress;
        let index = frame_index_for(progress, self.sequence.count());
        self.draw_index(index, canvas)
    }

    fn stats(&self) -> MediaStats {
        let (loading, loaded, failed) = match &self.state {
            FramesState::Loading(pre) => {
                let t = pre.tracker();
                (true, t.loaded(), t.failed())
            }
            FramesState::Ready(frames) => {
                let loaded = frames.loaded_count();
                (false, loaded, frames.len() - loaded)
            }
        };
        MediaStats {
            kind: MediaKind::Frames,
            loading,
            needed: self.sequence.count(),
            loaded,
            failed,
            cursor: MediaCursor::Frame(frame_index_for(self.progress, self.sequence.count())),
        }
    }
}
