use std::path::Path;

use anyhow::Context;

use crate::{
    foundation::{
        core::Rgba8,
        error::{ReelError, ReelResult},
    },
    overlay::{Anchor, OverlayPanel, Ramp, text::OverlayStyle},
    render::fit::FitMode,
};

pub const DEFAULT_API_URL: &str = "https://dsrtvy8wfe.execute-api.eu-north-1.amazonaws.com";
pub const DEFAULT_FRAME_TEMPLATE: &str = "/frames/ezgif-frame-{index}.jpg";
pub const DEFAULT_FRAME_COUNT: usize = 240;
pub const DEFAULT_WELCOME_MS: u64 = 4500;

/// Which scrubber drives the media layer.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaConfig {
    Frames {
        /// Path template with an `{index}` placeholder (1-based, zero-padded to 3 digits).
        template: String,
        count: usize,
        #[serde(default)]
        fit: FitMode,
    },
    Video {
        source: String,
        #[serde(default = "cover")]
        fit: FitMode,
        /// Prefer keyframe seeks over exact ones.
        #[serde(default = "yes")]
        fast_seek: bool,
    },
}

fn cover() -> FitMode {
    FitMode::Cover
}

fn yes() -> bool {
    true
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self::Frames {
            template: DEFAULT_FRAME_TEMPLATE.to_string(),
            count: DEFAULT_FRAME_COUNT,
            fit: FitMode::Contain,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Document offset of the tall region, in pixels.
    pub region_top: f64,
    /// Tall region height in viewport heights.
    pub region_viewports: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            region_top: 0.0,
            region_viewports: 4.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub panels: Vec<OverlayPanel>,
    pub ramp: Ramp,
    /// Vertical offset in pixels at the start and end of each panel's window.
    pub parallax_px: [f64; 2],
    /// Font file (relative to the asset root). Text is skipped when unset.
    pub font: Option<String>,
    pub heading_px: f32,
    pub body_px: f32,
    pub cta_px: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            panels: frame_panels(),
            ramp: Ramp::default(),
            parallax_px: [20.0, -20.0],
            font: None,
            heading_px: 72.0,
            body_px: 18.0,
            cta_px: 14.0,
        }
    }
}

impl OverlayConfig {
    /// Panel set and motion of the video page: every panel hangs from the top, drifting up only.
    pub fn video_profile() -> Self {
        Self {
            panels: video_panels(),
            parallax_px: [0.0, -20.0],
            ..Self::default()
        }
    }
}

fn frame_panels() -> Vec<OverlayPanel> {
    vec![
        OverlayPanel::new([-0.05, 0.2], Anchor::Center, "We have").with_motion_window([0.0, 0.2]),
        OverlayPanel::new([0.25, 0.45], Anchor::Left, "Physical AI")
            .with_body("Intelligence that breaks the screen barrier."),
        OverlayPanel::new([0.55, 0.75], Anchor::Right, "Onboard")
            .with_body("Processing power that rivals workstations, in the palm of your hand."),
        OverlayPanel::new([0.85, 1.0], Anchor::Center, "This is the future")
            .with_cta("PRE-ORDER NOW"),
    ]
}

fn video_panels() -> Vec<OverlayPanel> {
    vec![
        OverlayPanel::new([-0.05, 0.2], Anchor::Top, "We have").with_motion_window([0.0, 0.2]),
        OverlayPanel::new([0.25, 0.45], Anchor::Top, "Physical AI")
            .with_body("Intelligence that breaks the screen barrier."),
        OverlayPanel::new([0.55, 0.75], Anchor::Top, "Onboard")
            .with_body("Processing power that rivals workstations."),
        OverlayPanel::new([0.85, 1.0], Anchor::Top, "This is the future").with_cta("PRE-ORDER NOW"),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Theme {
    pub background: Rgba8,
    pub heading: Rgba8,
    pub body: Rgba8,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            background: Rgba8([5, 5, 5, 255]),
            heading: Rgba8::WHITE.with_alpha(230),
            body: Rgba8::WHITE.with_alpha(153),
        }
    }

    pub fn light() -> Self {
        Self {
            background: Rgba8::WHITE,
            heading: Rgba8::BLACK,
            body: Rgba8::BLACK.with_alpha(153),
        }
    }
}

/// Everything needed to compose the landing page.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Deployment subfolder every asset URL is prefixed with (`/beta/krrish`).
    pub base_path: String,
    /// Directory or http(s) origin serving static assets. Defaults to the config file's directory.
    pub asset_root: Option<String>,
    /// Access-code endpoint.
    pub api_url: String,
    pub media: MediaConfig,
    pub scroll: ScrollConfig,
    pub overlay: OverlayConfig,
    pub theme: Theme,
    pub welcome_ms: u64,
    /// Preload worker count; rayon's default when unset.
    pub preload_threads: Option<usize>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            asset_root: None,
            api_url: DEFAULT_API_URL.to_string(),
            media: MediaConfig::default(),
            scroll: ScrollConfig::default(),
            overlay: OverlayConfig::default(),
            theme: Theme::dark(),
            welcome_ms: DEFAULT_WELCOME_MS,
            preload_threads: None,
        }
    }
}

impl SiteConfig {
    /// The video-scrubbing page: white background, cover-fit `drone.mp4`.
    pub fn video_preset() -> Self {
        Self {
            media: MediaConfig::Video {
                source: "/drone.mp4".to_string(),
                fit: FitMode::Cover,
                fast_seek: true,
            },
            overlay: OverlayConfig::video_profile(),
            theme: Theme::light(),
            ..Self::default()
        }
    }

    /// Read, default and validate a JSON config file.
    pub fn load(path: &Path) -> ReelResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read site config from '{}'", path.display()))?;
        let mut cfg: Self = serde_json::from_str(&text)?;
        if cfg.asset_root.is_none() {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let dir = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir
            };
            cfg.asset_root = Some(dir.to_string_lossy().into_owned());
        }
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// `SCROLLREEL_API_URL` and `SCROLLREEL_ASSET_ROOT` win over file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SCROLLREEL_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(root) = lookup("SCROLLREEL_ASSET_ROOT").filter(|v| !v.trim().is_empty()) {
            self.asset_root = Some(root);
        }
    }

    pub fn asset_root(&self) -> &str {
        self.asset_root.as_deref().unwrap_or(".")
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            heading: self.theme.heading,
            body: self.theme.body,
            background: self.theme.background,
            heading_px: self.overlay.heading_px,
            body_px: self.overlay.body_px,
            cta_px: self.overlay.cta_px,
        }
    }

    pub fn validate(&self) -> ReelResult<()> {
        match &self.media {
            MediaConfig::Frames {
                template, count, ..
            } => {
                if *count == 0 {
                    return Err(ReelError::validation("media.count must be >= 1"));
                }
                if !template.contains("{index}") {
                    return Err(ReelError::validation(
                        "media.template must contain '{index}'",
                    ));
                }
            }
            MediaConfig::Video { source, .. } => {
                if source.trim().is_empty() {
                    return Err(ReelError::validation("media.source must be non-empty"));
                }
            }
        }

        let v = self.scroll.region_viewports;
        if !v.is_finite() || v < 1.0 {
            return Err(ReelError::validation(
                "scroll.region_viewports must be finite and >= 1",
            ));
        }
        if !self.scroll.region_top.is_finite() {
            return Err(ReelError::validation("scroll.region_top must be finite"));
        }

        self.overlay.ramp.validate()?;
        for panel in &self.overlay.panels {
            panel.validate()?;
        }
        if !self.overlay.parallax_px.iter().all(|v| v.is_finite()) {
            return Err(ReelError::validation("overlay.parallax_px must be finite"));
        }
        for (name, px) in [
            ("heading_px", self.overlay.heading_px),
            ("body_px", self.overlay.body_px),
            ("cta_px", self.overlay.cta_px),
        ] {
            if !px.is_finite() || px <= 0.0 {
                return Err(ReelError::validation(format!(
                    "overlay.{name} must be finite and > 0"
                )));
            }
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ReelError::validation(
                "api_url must be an http(s) URL",
            ));
        }
        if self.preload_threads == Some(0) {
            return Err(ReelError::validation(
                "preload_threads must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_the_frame_page() {
        let cfg = SiteConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.media, MediaConfig::default());
        let windows: Vec<[f64; 2]> = cfg.overlay.panels.iter().map(|p| p.window).collect();
        assert_eq!(
            windows,
            vec![[-0.05, 0.2], [0.25, 0.45], [0.55, 0.75], [0.85, 1.0]]
        );
        assert_eq!(cfg.overlay.panels[1].anchor, Anchor::Left);
        assert_eq!(cfg.overlay.panels[2].anchor, Anchor::Right);
        assert_eq!(cfg.theme.background, Rgba8([5, 5, 5, 255]));
        assert_eq!(cfg.welcome_ms, 4500);
        assert_eq!(cfg.scroll.region_viewports, 4.0);
    }

    #[test]
    fn video_preset_uses_cover_and_upward_drift() {
        let cfg = SiteConfig::video_preset();
        cfg.validate().unwrap();
        assert!(matches!(
            cfg.media,
            MediaConfig::Video {
                fit: FitMode::Cover,
                ..
            }
        ));
        assert_eq!(cfg.overlay.parallax_px, [0.0, -20.0]);
        assert_eq!(cfg.theme.background, Rgba8::WHITE);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: SiteConfig = serde_json::from_str(
            r#"{"base_path":"/beta/krrish","media":{"kind":"video","source":"drone.mp4"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.base_path, "/beta/krrish");
        assert_eq!(
            cfg.media,
            MediaConfig::Video {
                source: "drone.mp4".into(),
                fit: FitMode::Cover,
                fast_seek: true
            }
        );
        assert_eq!(cfg.overlay.panels.len(), 4);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn frames_default_to_contain() {
        let media: MediaConfig = serde_json::from_str(
            r#"{"kind":"frames","template":"f/{index}.png","count":3}"#,
        )
        .unwrap();
        assert!(matches!(
            media,
            MediaConfig::Frames {
                fit: FitMode::Contain,
                ..
            }
        ));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut cfg = SiteConfig::default();
        cfg.scroll.region_viewports = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = SiteConfig::default();
        cfg.media = MediaConfig::Frames {
            template: "f.png".into(),
            count: 3,
            fit: FitMode::Contain,
        };
        assert!(cfg.validate().is_err());

        let mut cfg = SiteConfig::default();
        cfg.api_url = "ftp://x".into();
        assert!(cfg.validate().is_err());

        let mut cfg = SiteConfig::default();
        cfg.preload_threads = Some(0);
        assert!(cfg.validate().is_err());

        let mut cfg = SiteConfig::default();
        cfg.overlay.ramp = Ramp::WindowFraction(2.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_win() {
        let mut cfg = SiteConfig::default();
        cfg.apply_overrides(|k| match k {
            "SCROLLREEL_API_URL" => Some("http://127.0.0.1:9".into()),
            "SCROLLREEL_ASSET_ROOT" => Some("/srv/public".into()),
            _ => None,
        });
        assert_eq!(cfg.api_url, "http://127.0.0.1:9");
        assert_eq!(cfg.asset_root(), "/srv/public");
    }

    #[test]
    fn load_defaults_asset_root_to_config_dir() {
        let dir = std::path::PathBuf::from("target").join("config_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("site.json");
        std::fs::write(&path, r#"{"welcome_ms": 10}"#).unwrap();

        let cfg = SiteConfig::load(&path).unwrap();
        assert_eq!(cfg.welcome_ms, 10);
        if std::env::var("SCROLLREEL_ASSET_ROOT").is_err() {
            assert_eq!(cfg.asset_root(), dir.to_string_lossy());
        }

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SiteConfig::load(&path).unwrap_err(),
            ReelError::Serde(_)
        ));
    }
}
