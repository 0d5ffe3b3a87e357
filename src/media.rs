use std::sync::Arc;

use crate::{
    assets::{preload::MediaReadiness, source::AssetSource},
    config::MediaConfig,
    foundation::{core::ScrollProgress, error::ReelResult},
    render::{canvas::CanvasSurface, fit::FitMode},
};

pub mod frames;
pub mod video;

pub use frames::{FrameScrubber, FrameSequence, frame_index_for};
pub use video::{FfmpegPlayhead, VideoPlayhead, VideoScrubber, video_time_for};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Frames,
    Video,
}

/// Where the media currently points, derived from the last progress the driver accepted.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCursor {
    Frame(usize),
    Time(f64),
    /// Video duration not known yet; seeks are no-ops.
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct MediaStats {
    pub kind: MediaKind,
    pub loading: bool,
    pub needed: usize,
    pub loaded: usize,
    pub failed: usize,
    pub cursor: MediaCursor,
}

/// A scroll-scrubbed media strategy.
///
/// The stage feeds it progress (once it reports [`MediaReadiness::Ready`]) and calls it from the
/// animation-frame callback to paint into the canvas.
pub trait MediaDriver {
    fn kind(&self) -> MediaKind;

    fn fit(&self) -> FitMode;

    fn readiness(&self) -> MediaReadiness;

    /// Drain background work without blocking. Returns `true` on the call that reached readiness.
    fn poll(&mut self) -> bool;

    /// Accept a new scroll progress. Ignored while not ready.
    fn on_progress(&mut self, progress: ScrollProgress);

    /// Whether a draw is queued for the next animation frame.
    fn wants_frame(&self) -> bool;

    /// Animation-frame callback. Returns whether the canvas was painted.
    fn on_animation_frame(&mut self, canvas: &mut CanvasSurface) -> ReelResult<bool>;

    /// Paint the media position for `progress` right now, bypassing frame scheduling.
    fn draw_current(
        &mut self,
        progress: ScrollProgress,
        canvas: &mut CanvasSurface,
    ) -> ReelResult<bool>;

    fn stats(&self) -> MediaStats;
}

/// Build the driver named by `config`.
#[tracing::instrument(skip(config, source))]
pub fn create_driver(
    config: &MediaConfig,
    source: Arc<dyn AssetSource>,
    preload_threads: Option<usize>,
) -> ReelResult<Box<dyn MediaDriver>> {
    match config {
        MediaConfig::Frames {
            template,
            count,
            fit,
        } => {
            let sequence = FrameSequence::new(template, *count)?;
            tracing::info!(count, template = %template, "frame-sequence driver selected");
            Ok(Box::new(FrameScrubber::start(
                sequence,
                *fit,
                source,
                preload_threads,
            )?))
        }
        MediaConfig::Video {
            source: rel,
            fit,
            fast_seek,
        } => {
            let locator = source.locate(rel)?;
            tracing::info!(locator = %locator, "video driver selected");
            let playhead = FfmpegPlayhead::open(&locator, *fast_seek);
            Ok(Box::new(VideoScrubber::new(playhead, *fit)))
        }
    }
}
