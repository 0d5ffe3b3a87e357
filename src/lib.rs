//! scrollreel renders a scroll-synchronized cinematic landing page.
//!
//! A single scroll measurement drives two consumers through a shared [`ProgressSignal`]:
//!
//! - a media driver ([`FrameScrubber`] over a preloaded image sequence, or [`VideoScrubber`]
//!   seeking a video) painting into a [`CanvasSurface`]
//! - a [`TextOverlay`] of fading, parallaxing text panels
//!
//! [`Stage`] composes both over the theme background. The access gate ([`LoginForm`],
//! [`InviteGenerator`]) and the timed welcome live in [`LandingPage`]. [`pipeline`] drives a
//! stage headlessly for PNG stills and MP4 sweeps.
#![forbid(unsafe_code)]

pub mod access;
pub mod assets;
pub mod config;
pub mod encode_ffmpeg;
pub mod foundation;
pub mod media;
pub mod overlay;
pub mod page;
pub mod pipeline;
pub mod render;
pub mod scroll;
pub mod stage;

pub use access::{
    AccessApi, AccessRequest, GenerateResponse, HttpAccessApi, LoginResponse, UserData,
    forms::{Clipboard, InviteGenerator, LoginForm, MemoryClipboard, SystemClipboard},
};
pub use assets::{
    PreparedImage,
    preload::{FrameSet, MediaReadiness, Preloader},
    source::{AssetSource, DirSource, HttpSource, open_source},
};
pub use config::{MediaConfig, OverlayConfig, ScrollConfig, SiteConfig, Theme};
pub use encode_ffmpeg::{EncodeSettings, FfmpegEncoder, is_ffmpeg_on_path};
pub use foundation::{
    core::{Rgba8, ScrollProgress, Size},
    error::{ReelError, ReelResult},
};
pub use media::{
    FfmpegPlayhead, FrameScrubber, FrameSequence, MediaCursor, MediaDriver, MediaKind, MediaStats,
    VideoPlayhead, VideoScrubber, create_driver, frame_index_for, video_time_for,
};
pub use overlay::{
    Anchor, OverlayPanel, PanelState, Ramp, TextOverlay,
    text::{OverlayRenderer, OverlayStyle},
};
pub use page::{LandingPage, Onboarding, PageView, Session};
pub use render::{
    FrameRGBA,
    canvas::CanvasSurface,
    fit::{FitMode, FitRect, fit_rect},
};
pub use scroll::{
    region::{ScrollRegion, ScrollTracker, progress_for},
    signal::{ProgressSignal, Subscription},
};
pub use stage::{HostEvent, HudSnapshot, Stage};
