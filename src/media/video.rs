use std::collections::{HashMap, VecDeque};

use crate::{
    assets::{
        PreparedImage,
        media::{self, SeekMode, VideoSourceInfo},
        preload::MediaReadiness,
    },
    foundation::{core::ScrollProgress, error::ReelResult},
    media::{MediaCursor, MediaDriver, MediaKind, MediaStats},
    render::{canvas::CanvasSurface, fit::FitMode, schedule::FrameRequest},
};

/// `progress * duration`, or `None` when the duration is unknown, zero or non-finite.
pub fn video_time_for(progress: ScrollProgress, duration: Option<f64>) -> Option<f64> {
    duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| progress.get() * d)
}

/// Seekable, muted video position.
///
/// Seeks replace any pending target; nothing is queued.
pub trait VideoPlayhead {
    fn duration(&self) -> Option<f64>;

    fn supports_fast_seek(&self) -> bool;

    fn fast_seek(&mut self, time_sec: f64);

    fn set_current_time(&mut self, time_sec: f64);

    /// Last seek target, if any.
    fn current_time(&self) -> Option<f64>;

    /// The frame at the current target, decoding it if needed.
    fn present(&mut self) -> ReelResult<Option<PreparedImage>>;
}

/// LRU of decoded frames keyed by the millisecond start of their source frame, filled in
/// prefetch batches.
#[derive(Debug)]
pub struct FrameCache {
    frames: HashMap<u64, PreparedImage>,
    lru: VecDeque<u64>,
    capacity: usize,
    prefetch_frames: u32,
}

impl FrameCache {
    pub fn new(capacity: usize, prefetch_frames: u32) -> Self {
        Self {
            frames: HashMap::new(),
            lru: VecDeque::new(),
            capacity: capacity.max(1),
            prefetch_frames: prefetch_frames.max(1),
        }
    }

    /// Sized from `SCROLLREEL_VIDEO_CACHE_CAPACITY` / `SCROLLREEL_VIDEO_PREFETCH_FRAMES`.
    pub fn from_env() -> Self {
        let capacity = std::env::var("SCROLLREEL_VIDEO_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(64);
        let prefetch_frames = std::env::var("SCROLLREEL_VIDEO_PREFETCH_FRAMES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(12);
        Self::new(capacity, prefetch_frames)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Source frame showing at `time_sec`. Scroll-derived times land between frames, so the
    /// cache works in frame slots rather than raw timestamps.
    pub fn frame_slot(time_sec: f64, source_fps: f64) -> u64 {
        let fps = grid_fps(source_fps);
        // Nudge so times computed as `n / fps` do not drop into slot `n - 1`.
        (time_sec.max(0.0) * fps + 1e-6).floor() as u64
    }

    /// Millisecond key of the start of `slot`.
    pub fn key_for_slot(slot: u64, source_fps: f64) -> u64 {
        (slot as f64 * 1000.0 / grid_fps(source_fps)).round() as u64
    }

    /// Cached frame for `time_sec`, or decode the batch around it with `decode(start, count)`.
    pub fn get_or_decode<F>(
        &mut self,
        time_sec: f64,
        source_fps: f64,
        mut decode: F,
    ) -> ReelResult<Option<PreparedImage>>
    where
        F: FnMut(f64, u32) -> ReelResult<Vec<PreparedImage>>,
    {
        let slot = Self::frame_slot(time_sec, source_fps);
        let key = Self::key_for_slot(slot, source_fps);
        if let Some(img) = self.frames.get(&key).cloned() {
            self.touch(key);
            return Ok(Some(img));
        }

        let per_batch = u64::from(self.prefetch_frames);
        let first = slot / per_batch * per_batch;
        let start_sec = Self::key_for_slot(first, source_fps) as f64 / 1000.0;

        let batch = decode(start_sec, self.prefetch_frames)?;
        let mut nearest: Option<PreparedImage> = None;
        for (offset, img) in batch.into_iter().enumerate() {
            let s = first + offset as u64;
            if s <= slot {
                nearest = Some(img.clone());
            }
            self.insert(Self::key_for_slot(s, source_fps), img);
        }

        if let Some(img) = self.frames.get(&key).cloned() {
            self.touch(key);
            return Ok(Some(img));
        }
        // Short batch (end of stream): pin the closest earlier frame to this slot.
        if let Some(img) = &nearest {
            self.insert(key, img.clone());
        }
        Ok(nearest)
    }

    fn insert(&mut self, key: u64, img: PreparedImage) {
        if self.frames.insert(key, img).is_some() {
            self.touch(key);
            return;
        }
        self.lru.push_back(key);
        while self.lru.len() > self.capacity {
            if let Some(old) = self.lru.pop_front() {
                self.frames.remove(&old);
            }
        }
    }

    fn touch(&mut self, key: u64) {
        if let Some(pos) = self.lru.iter().position(|x| *x == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key);
    }
}

fn grid_fps(source_fps: f64) -> f64 {
    if source_fps.is_finite() && source_fps > 0.0 {
        source_fps
    } else {
        1000.0
    }
}

/// Playhead backed by the system `ffmpeg`.
#[derive(Debug)]
pub struct FfmpegPlayhead {
    info: Option<VideoSourceInfo>,
    fast_seek: bool,
    target: Option<(f64, SeekMode)>,
    cache: FrameCache,
}

impl FfmpegPlayhead {
    /// Probe `locator`. A failed probe leaves the duration unknown, which makes every seek a
    /// no-op instead of an error.
    pub fn open(locator: &str, fast_seek: bool) -> Self {
        let info = match media::probe_video(locator) {
            Ok(info) => {
                if info.duration_sec.is_none() {
                    tracing::warn!(locator, "video duration unknown; scrubbing disabled");
                }
                Some(info)
            }
            Err(err) => {
                tracing::warn!(locator, %err, "video probe failed; scrubbing disabled");
                None
            }
        };
        Self::with_info(info, fast_seek)
    }

    pub fn with_info(info: Option<VideoSourceInfo>, fast_seek: bool) -> Self {
        Self {
            info,
            fast_seek,
            target: None,
            cache: FrameCache::from_env(),
        }
    }

    pub fn info(&self) -> Option<&VideoSourceInfo> {
        self.info.as_ref()
    }
}

impl VideoPlayhead for FfmpegPlayhead {
    fn duration(&self) -> Option<f64> {
        self.info.as_ref().and_then(|i| i.duration_sec)
    }

    fn supports_fast_seek(&self) -> bool {
        self.fast_seek
    }

    fn fast_seek(&mut self, time_sec: f64) {
        self.target = Some((time_sec, SeekMode::Fast));
    }

    fn set_current_time(&mut self, time_sec: f64) {
        self.target = Some((time_sec, SeekMode::Exact));
    }

    fn current_time(&self) -> Option<f64> {
        self.target.map(|(t, _)| t)
    }

    fn present(&mut self) -> ReelResult<Option<PreparedImage>> {
        let (Some(info), Some((time_sec, mode))) = (self.info.as_ref(), self.target) else {
            return Ok(None);
        };
        self.cache
            .get_or_decode(time_sec, info.source_fps(), |start, count| {
                media::decode_video_frames(info, start, count, mode)
            })
    }
}

/// Video scrubber: every progress change seeks the playhead directly; the canvas shows the
/// frame at the latest target on the next animation frame.
pub struct VideoScrubber<P: VideoPlayhead> {
    playhead: P,
    fit: FitMode,
    request: FrameRequest<f64>,
    cursor: MediaCursor,
    warned_unknown_duration: bool,
}

impl<P: VideoPlayhead> std::fmt::Debug for VideoScrubber<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoScrubber")
            .field("fit", &self.fit)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl<P: VideoPlayhead> VideoScrubber<P> {
    pub fn new(playhead: P, fit: FitMode) -> Self {
        Self {
            playhead,
            fit,
            request: FrameRequest::new(),
            cursor: MediaCursor::Unknown,
            warned_unknown_duration: false,
        }
    }

    pub fn playhead(&self) -> &P {
        &self.playhead
    }

    /// Seek for `progress`. Returns the target time, or `None` if the seek was a no-op.
    fn seek(&mut self, progress: ScrollProgress) -> Option<f64> {
        let Some(time) = video_time_for(progress, self.playhead.duration()) else {
            if !self.warned_unknown_duration {
                tracing::warn!("video duration unknown; ignoring scroll");
                self.warned_unknown_duration = true;
            }
            return None;
        };
        if self.playhead.supports_fast_seek() {
            self.playhead.fast_seek(time);
        } else {
            self.playhead.set_current_time(time);
        }
        self.cursor = MediaCursor::Time(time);
        tracing::debug!(progress = progress.get(), time, "video seek");
        Some(time)
    }

    fn present(&mut self, canvas: &mut CanvasSurface) -> ReelResult<bool> {
        match self.playhead.present()? {
            Some(frame) => canvas.draw_image(&frame, self.fit),
            None => Ok(false),
        }
    }
}

impl<P: VideoPlayhead> MediaDriver for VideoScrubber<P> {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn fit(&self) -> FitMode {
        self.fit
    }

    fn readiness(&self) -> MediaReadiness {
        MediaReadiness::Ready
    }

    fn poll(&mut self) -> bool {
        false
    }

    fn on_progress(&mut self, progress: ScrollProgress) {
        if let Some(time) = self.seek(progress) {
            self.request.request(time);
        }
    }

    fn wants_frame(&self) -> bool {
        self.request.is_pending()
    }

    fn on_animation_frame(&mut self, canvas: &mut CanvasSurface) -> ReelResult<bool> {
        if self.request.take().is_none() {
            return Ok(false);
        }
        self.present(canvas)
    }

    fn draw_current(
        &mut self,
        progress: ScrollProgress,
        canvas: &mut CanvasSurface,
    ) -> ReelResult<bool> {
        if self.seek(progress).is_none() {
            return Ok(false);
        }
        self.present(canvas)
    }

    fn stats(&self) -> MediaStats {
        MediaStats {
            kind: MediaKind::Video,
            loading: false,
            needed: 1,
            loaded: usize::from(self.playhead.duration().is_some()),
            failed: usize::from(self.playhead.duration().is_none()),
            cursor: self.cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::foundation::core::Size;

    #[derive(Debug, Default)]
    struct StubPlayhead {
        duration: Option<f64>,
        fast: bool,
        seeks: Vec<(f64, bool)>,
    }

    impl VideoPlayhead for StubPlayhead {
        fn duration(&self) -> Option<f64> {
            self.duration
        }
        fn supports_fast_seek(&self) -> bool {
            self.fast
        }
        fn fast_seek(&mut self, t: f64) {
            self.seeks.push((t, true));
        }
        fn set_current_time(&mut self, t: f64) {
            self.seeks.push((t, false));
        }
        fn current_time(&self) -> Option<f64> {
            self.seeks.last().map(|(t, _)| *t)
        }
        fn present(&mut self) -> ReelResult<Option<PreparedImage>> {
            Ok(self.current_time().map(|_| frame(200)))
        }
    }

    fn frame(v: u8) -> PreparedImage {
        PreparedImage {
            width: 2,
            height: 1,
            rgba8_premul: Arc::new([v, v, v, 255].repeat(2)),
        }
    }

    #[test]
    fn time_mapping_requires_usable_duration() {
        assert_eq!(video_time_for(ScrollProgress::new(0.5), Some(10.0)), Some(5.0));
        assert_eq!(video_time_for(ScrollProgress::new(0.5), None), None);
        assert_eq!(video_time_for(ScrollProgress::new(0.5), Some(0.0)), None);
        assert_eq!(video_time_for(ScrollProgress::new(0.5), Some(f64::NAN)), None);
        assert_eq!(
            video_time_for(ScrollProgress::new(0.5), Some(f64::INFINITY)),
            None
        );
    }

    #[test]
    fn prefers_fast_seek_and_falls_back_to_exact() {
        let mut fast = VideoScrubber::new(
            StubPlayhead {
                duration: Some(8.0),
                fast: true,
                ..Default::default()
            },
            FitMode::Cover,
        );
        fast.on_progress(ScrollProgress::new(0.25));
        assert_eq!(fast.playhead().seeks, vec![(2.0, true)]);

        let mut exact = VideoScrubber::new(
            StubPlayhead {
                duration: Some(8.0),
                ..Default::default()
            },
            FitMode::Cover,
        );
        exact.on_progress(ScrollProgress::new(0.5));
        assert_eq!(exact.playhead().seeks, vec![(4.0, false)]);
    }

    #[test]
    fn unknown_duration_makes_seeks_noops() {
        let mut s = VideoScrubber::new(StubPlayhead::default(), FitMode::Cover);
        s.on_progress(ScrollProgress::new(0.7));
        assert!(s.playhead().seeks.is_empty());
        assert!(!s.wants_frame());
        assert_eq!(s.stats().cursor, MediaCursor::Unknown);
    }

    #[test]
    fn each_seek_goes_out_but_one_present_per_frame() {
        let mut s = VideoScrubber::new(
            StubPlayhead {
                duration: Some(10.0),
                fast: true,
                ..Default::default()
            },
            FitMode::Cover,
        );
        let mut canvas = CanvasSurface::new(Size::new(4, 2)).unwrap();
        s.on_progress(ScrollProgress::new(0.1));
        s.on_progress(ScrollProgress::new(0.2));
        assert_eq!(s.playhead().seeks.len(), 2);
        assert!(s.on_animation_frame(&mut canvas).unwrap());
        assert!(!s.on_animation_frame(&mut canvas).unwrap());
        assert_eq!(canvas.draw_count(), 1);
        assert_eq!(s.stats().cursor, MediaCursor::Time(2.0));
    }

    #[test]
    fn cache_serves_batch_neighbours_without_decoding() {
        let mut cache = FrameCache::new(64, 4);
        let mut calls = Vec::new();
        let mut decode = |start: f64, count: u32| -> ReelResult<Vec<PreparedImage>> {
            calls.push((start, count));
            Ok((0..count).map(|i| frame(i as u8)).collect())
        };

        // 10 fps: batch of 4 covers 0, 100, 200, 300 ms.
        let a = cache.get_or_decode(0.2, 10.0, &mut decode).unwrap().unwrap();
        assert_eq!(a.rgba8_premul[0], 2);
        let b = cache.get_or_decode(0.3, 10.0, &mut decode).unwrap().unwrap();
        assert_eq!(b.rgba8_premul[0], 3);
        assert_eq!(calls, vec![(0.0, 4)]);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn scroll_times_between_frames_reuse_one_batch() {
        let mut cache = FrameCache::new(64, 12);
        let mut calls = 0;
        let mut decode = |_: f64, count: u32| -> ReelResult<Vec<PreparedImage>> {
            calls += 1;
            Ok((0..count).map(|i| frame(i as u8)).collect())
        };

        // 30 fps: 0.517 s and 0.520 s both sit in frame 15, first batch is frames 12..24.
        for _ in 0..3 {
            let img = cache.get_or_decode(0.517, 30.0, &mut decode).unwrap().unwrap();
            assert_eq!(img.rgba8_premul[0], 3);
        }
        let img = cache.get_or_decode(0.520, 30.0, &mut decode).unwrap().unwrap();
        assert_eq!(img.rgba8_premul[0], 3);
        let img = cache.get_or_decode(0.7, 30.0, &mut decode).unwrap().unwrap();
        assert_eq!(img.rgba8_premul[0], 9);
        assert_eq!(calls, 1);
    }

    #[test]
    fn slots_follow_the_source_grid() {
        assert_eq!(FrameCache::frame_slot(0.4, 10.0), 4);
        assert_eq!(FrameCache::frame_slot(0.399, 10.0), 3);
        assert_eq!(FrameCache::frame_slot(0.1, 30.0), 3);
        assert_eq!(FrameCache::key_for_slot(15, 30.0), 500);
    }

    #[test]
    fn short_batch_pins_last_frame_to_the_slot() {
        let mut cache = FrameCache::new(8, 4);
        let mut calls = 0;
        let mut decode = |_: f64, _: u32| -> ReelResult<Vec<PreparedImage>> {
            calls += 1;
            Ok(vec![frame(7)])
        };
        for _ in 0..2 {
            let img = cache.get_or_decode(0.3, 10.0, &mut decode).unwrap().unwrap();
            assert_eq!(img.rgba8_premul[0], 7);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let mut cache = FrameCache::new(2, 1);
        let mut decode = |_: f64, _: u32| -> ReelResult<Vec<PreparedImage>> { Ok(vec![frame(1)]) };
        cache.get_or_decode(0.0, 1.0, &mut decode).unwrap();
        cache.get_or_decode(1.0, 1.0, &mut decode).unwrap();
        cache.get_or_decode(2.0, 1.0, &mut decode).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn off_grid_time_falls_back_to_previous_frame() {
        let mut cache = FrameCache::new(8, 2);
        let mut decode = |_: f64, count: u32| -> ReelResult<Vec<PreparedImage>> {
            Ok((0..count).map(|i| frame(10 + i as u8)).collect())
        };
        // 4 fps: batch covers 0 and 250 ms; 120 ms shows the 0 ms frame.
        let img = cache.get_or_decode(0.12, 4.0, &mut decode).unwrap().unwrap();
        assert_eq!(img.rgba8_premul[0], 10);
    }

    #[test]
    fn playhead_without_probe_info_presents_nothing() {
        let mut p = FfmpegPlayhead::with_info(None, true);
        p.fast_seek(1.0);
        assert_eq!(p.duration(), None);
        assert!(p.present().unwrap().is_none());
    }
}
