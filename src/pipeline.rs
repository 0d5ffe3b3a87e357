use std::{
    path::Path,
    time::{Duration, Instant},
};

use anyhow::Context as _;

use crate::{
    assets::source::open_source,
    config::SiteConfig,
    encode_ffmpeg::{EncodeSettings, FfmpegEncoder},
    foundation::{
        core::{Rgba8, ScrollProgress, Size},
        error::{ReelError, ReelResult},
    },
    render::FrameRGBA,
    stage::{HostEvent, Stage},
};

const READY_POLL: Duration = Duration::from_millis(5);

/// Mount a stage for `config` and block until its media is ready or `timeout` elapses.
#[tracing::instrument(skip(config))]
pub fn mount_ready(config: &SiteConfig, viewport: Size, timeout: Duration) -> ReelResult<Stage> {
    let source = open_source(config.asset_root(), &config.base_path)?;
    let mut stage = Stage::mount(config, source, viewport)?;
    wait_ready(&mut stage, timeout)?;
    Ok(stage)
}

pub fn wait_ready(stage: &mut Stage, timeout: Duration) -> ReelResult<()> {
    let deadline = Instant::now() + timeout;
    while !stage.readiness().is_ready() {
        stage.poll()?;
        if stage.readiness().is_ready() {
            break;
        }
        if Instant::now() >= deadline {
            let stats = stage.media_stats();
            return Err(ReelError::media(format!(
                "media not ready after {timeout:?} ({}/{} loaded, {} failed)",
                stats.loaded, stats.needed, stats.failed
            )));
        }
        std::thread::sleep(READY_POLL);
    }
    Ok(())
}

/// Scroll to `progress`, let one animation frame run, and composite the page.
pub fn render_at_progress(stage: &mut Stage, progress: ScrollProgress) -> ReelResult<FrameRGBA> {
    stage.scroll_to(progress)?;
    stage.handle(HostEvent::AnimationFrame)?;
    stage.compose()
}

/// `steps` evenly spaced positions from top to bottom of the scroll region.
pub fn sweep_positions(steps: usize) -> Vec<ScrollProgress> {
    match steps {
        0 => Vec::new(),
        1 => vec![ScrollProgress::START],
        n => (0..n)
            .map(|i| ScrollProgress::new(i as f64 / (n - 1) as f64))
            .collect(),
    }
}

pub fn write_png(frame: &FrameRGBA, path: &Path) -> ReelResult<()> {
    crate::encode_ffmpeg::ensure_parent_dir(path)?;
    frame
        .to_rgba_image()?
        .save(path)
        .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepStats {
    pub frames: u64,
    pub media_draws: u64,
}

/// Scroll the stage through `steps` positions, handing every composited frame to `sink`.
pub fn sweep<F>(stage: &mut Stage, steps: usize, mut sink: F) -> ReelResult<SweepStats>
where
    F: FnMut(ScrollProgress, &FrameRGBA) -> ReelResult<()>,
{
    let draws_before = stage.canvas().draw_count();
    let mut frames = 0u64;
    for p in sweep_positions(steps) {
        let frame = render_at_progress(stage, p)?;
        sink(p, &frame)?;
        frames += 1;
    }
    Ok(SweepStats {
        frames,
        media_draws: stage.canvas().draw_count() - draws_before,
    })
}

/// Encode a full top-to-bottom sweep as MP4 through system ffmpeg.
#[tracing::instrument(skip(stage, settings), fields(out = %settings.out_path.display()))]
pub fn sweep_to_mp4(
    stage: &mut Stage,
    steps: usize,
    settings: EncodeSettings,
    background: Rgba8,
) -> ReelResult<SweepStats> {
    if settings.size != stage.viewport() {
        stage.handle(HostEvent::Resize {
            viewport: settings.size,
        })?;
        stage.redraw()?;
    }
    let mut encoder = FfmpegEncoder::spawn(settings, background)?;
    let stats = sweep(stage, steps, |_, frame| encoder.push(frame))?;
    encoder.finish()?;
    tracing::info!(frames = stats.frames, media_draws = stats.media_draws, "sweep encoded");
    Ok(stats)
}
