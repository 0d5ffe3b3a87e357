use std::{cell::RefCell, rc::Rc, sync::Arc};

use crate::{
    assets::{preload::MediaReadiness, source::AssetSource},
    config::{SiteConfig, Theme},
    foundation::{
        core::{ScrollProgress, Size},
        error::ReelResult,
    },
    media::{MediaCursor, MediaDriver, MediaKind, MediaStats, create_driver, frame_index_for},
    overlay::{TextOverlay, text::OverlayRenderer},
    render::{
        FrameRGBA,
        canvas::CanvasSurface,
        composite::{fill_solid, over_in_place},
    },
    scroll::{
        region::{ScrollRegion, ScrollTracker},
        signal::{ProgressSignal, Subscription},
    },
};

pub const LOADING_CAPTION: &str = "LOADING ASSETS";

/// Input from the host environment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HostEvent {
    /// Document scroll offset changed.
    Scroll { y: f64 },
    /// Viewport (and with it the sticky canvas parent) changed size.
    Resize { viewport: Size },
    /// The host is about to paint.
    AnimationFrame,
}

/// Debug overlay contents.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct HudSnapshot {
    pub loading: bool,
    pub images_needed: usize,
    pub images_loaded: usize,
    pub images_failed: usize,
    /// Frame the current scroll position maps to, whether or not it has been drawn yet.
    pub frame_index: Option<usize>,
    pub progress: f64,
    pub cursor: MediaCursor,
}

type SharedDriver = Rc<RefCell<Box<dyn MediaDriver>>>;

/// The pinned viewport of the landing page: one scroll measurement fanned out to the media
/// driver and the text overlay, composited over the theme background.
///
/// Dropping the stage drops every progress subscription it holds.
pub struct Stage {
    tracker: ScrollTracker,
    signal: ProgressSignal,
    driver: SharedDriver,
    overlay: Rc<RefCell<TextOverlay>>,
    renderer: OverlayRenderer,
    canvas: CanvasSurface,
    viewport: Size,
    theme: Theme,
    media_sub: Option<Subscription>,
    _overlay_sub: Subscription,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("viewport", &self.viewport)
            .field("progress", &self.signal.get())
            .field("media_subscribed", &self.media_sub.is_some())
            .finish()
    }
}

impl Stage {
    /// Build the driver named by `config` and mount it into a `viewport`-sized stage.
    #[tracing::instrument(skip(config, source))]
    pub fn mount(
        config: &SiteConfig,
        source: Arc<dyn AssetSource>,
        viewport: Size,
    ) -> ReelResult<Self> {
        let driver = create_driver(&config.media, source.clone(), config.preload_threads)?;
        let font = match config.overlay.font.as_deref() {
            Some(rel) => match source.fetch(rel) {
                Ok(bytes) => Some(Arc::new(bytes)),
                Err(err) => {
                    tracing::warn!(font = rel, %err, "overlay font unavailable");
                    None
                }
            },
            None => None,
        };
        let renderer = OverlayRenderer::new(font, config.overlay_style())?;
        let overlay = TextOverlay::new(
            config.overlay.panels.clone(),
            config.overlay.ramp,
            config.overlay.parallax_px,
        );
        let region = ScrollRegion::new(config.scroll.region_top, config.scroll.region_viewports);
        Self::with_parts(driver, overlay, renderer, region, config.theme, viewport)
    }

    /// Assemble a stage from already-built parts.
    pub fn with_parts(
        driver: Box<dyn MediaDriver>,
        overlay: TextOverlay,
        renderer: OverlayRenderer,
        region: ScrollRegion,
        theme: Theme,
        viewport: Size,
    ) -> ReelResult<Self> {
        let tracker = ScrollTracker::new(region, f64::from(viewport.height));
        let signal = ProgressSignal::new(tracker.progress());
        let overlay = Rc::new(RefCell::new(overlay));
        overlay.borrow_mut().update(signal.get());

        let overlay_sub = {
            let overlay = overlay.clone();
            signal.subscribe(move |p| match overlay.try_borrow_mut() {
                Ok(mut o) => o.update(p),
                Err(_) => tracing::warn!("overlay busy; progress update dropped"),
            })
        };

        let mut stage = Self {
            tracker,
            signal,
            driver: Rc::new(RefCell::new(driver)),
            overlay,
            renderer,
            canvas: CanvasSurface::new(viewport)?,
            viewport,
            theme,
            media_sub: None,
            _overlay_sub: overlay_sub,
        };
        if stage.readiness().is_ready() {
            stage.on_ready()?;
        }
        Ok(stage)
    }

    pub fn progress(&self) -> ScrollProgress {
        self.signal.get()
    }

    /// Shared progress; extra consumers may subscribe.
    pub fn signal(&self) -> &ProgressSignal {
        &self.signal
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn canvas(&self) -> &CanvasSurface {
        &self.canvas
    }

    pub fn readiness(&self) -> MediaReadiness {
        self.driver.borrow().readiness()
    }

    pub fn media_kind(&self) -> MediaKind {
        self.driver.borrow().kind()
    }

    pub fn media_stats(&self) -> MediaStats {
        self.driver.borrow().stats()
    }

    pub fn overlay(&self) -> std::cell::Ref<'_, TextOverlay> {
        self.overlay.borrow()
    }

    /// Whether the media driver has a draw queued for the next animation frame.
    pub fn wants_frame(&self) -> bool {
        self.driver.borrow().wants_frame()
    }

    /// Drain background media work. Returns `true` on the call that reached readiness.
    pub fn poll(&mut self) -> ReelResult<bool> {
        let became_ready = self.driver.borrow_mut().poll();
        if became_ready {
            self.on_ready()?;
        }
        Ok(became_ready)
    }

    fn on_ready(&mut self) -> ReelResult<()> {
        if self.media_sub.is_some() {
            return Ok(());
        }
        let driver = self.driver.clone();
        self.media_sub = Some(self.signal.subscribe(move |p| match driver.try_borrow_mut() {
            Ok(mut d) => d.on_progress(p),
            Err(_) => tracing::warn!("media driver busy; progress update dropped"),
        }));
        let progress = self.signal.get();
        let drawn = self
            .driver
            .borrow_mut()
            .draw_current(progress, &mut self.canvas)?;
        tracing::info!(progress = progress.get(), drawn, "media ready");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub fn handle(&mut self, event: HostEvent) -> ReelResult<()> {
        self.poll()?;
        match event {
            HostEvent::Scroll { y } => {
                let p = self.tracker.on_scroll(y);
                self.signal.set(p);
            }
            HostEvent::Resize { viewport } => {
                self.canvas.resync(viewport)?;
                self.viewport = viewport;
                let p = self.tracker.on_resize(f64::from(viewport.height));
                self.signal.set(p);
            }
            HostEvent::AnimationFrame => {
                self.driver
                    .borrow_mut()
                    .on_animation_frame(&mut self.canvas)?;
            }
        }
        Ok(())
    }

    /// Paint the current position immediately, outside frame scheduling. No-op while loading.
    pub fn redraw(&mut self) -> ReelResult<bool> {
        if !self.readiness().is_ready() {
            return Ok(false);
        }
        let progress = self.signal.get();
        self.driver
            .borrow_mut()
            .draw_current(progress, &mut self.canvas)
    }

    /// Scroll so the region sits at `progress`.
    pub fn scroll_to(&mut self, progress: ScrollProgress) -> ReelResult<()> {
        self.poll()?;
        let p = self.tracker.seek(progress);
        self.signal.set(p);
        Ok(())
    }

    /// Current page pixels: background, media canvas, then text overlay (or the loading screen
    /// while media is not ready).
    pub fn compose(&mut self) -> ReelResult<FrameRGBA> {
        let Size { width, height } = self.viewport;
        let mut data = vec![0u8; width as usize * height as usize * 4];
        fill_solid(&mut data, self.theme.background.premultiplied());

        if self.readiness().is_ready() {
            over_in_place(&mut data, self.canvas.pixels(), 1.0)?;
            let layer = self.renderer.render(self.viewport, &self.overlay.borrow())?;
            if let Some(layer) = layer {
                over_in_place(&mut data, &layer, 1.0)?;
            }
        } else if let Some(layer) = self.renderer.render_caption(self.viewport, LOADING_CAPTION)? {
            over_in_place(&mut data, &layer, 1.0)?;
        }

        Ok(FrameRGBA {
            width,
            height,
            data,
            premultiplied: true,
        })
    }

    pub fn hud(&self) -> HudSnapshot {
        let stats = self.media_stats();
        let progress = self.signal.get();
        HudSnapshot {
            loading: stats.loading,
            images_needed: stats.needed,
            images_loaded: stats.loaded,
            images_failed: stats.failed,
            frame_index: (stats.kind == MediaKind::Frames)
                .then(|| frame_index_for(progress, stats.needed)),
            progress: progress.get(),
            cursor: stats.cursor,
        }
    }
}
