use crate::foundation::{
    core::ScrollProgress,
    error::{ReelError, ReelResult},
};

pub mod text;

/// Where a panel sits in the viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    /// Centered on both axes.
    #[default]
    Center,
    /// Vertically centered, left-aligned with an inset.
    Left,
    /// Vertically centered, right-aligned with an inset.
    Right,
    /// Horizontally centered, hanging from the top.
    Top,
}

/// One fading text panel.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverlayPanel {
    /// Scroll window `[start, end]` the panel is visible in.
    pub window: [f64; 2],
    /// Window the parallax offset runs across; `window` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_window: Option<[f64; 2]>,
    #[serde(default)]
    pub anchor: Anchor,
    pub heading: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Call-to-action button label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
}

impl OverlayPanel {
    pub fn new(window: [f64; 2], anchor: Anchor, heading: impl Into<String>) -> Self {
        Self {
            window,
            motion_window: None,
            anchor,
            heading: heading.into(),
            body: None,
            cta: None,
        }
    }

    pub fn with_motion_window(mut self, window: [f64; 2]) -> Self {
        self.motion_window = Some(window);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_cta(mut self, cta: impl Into<String>) -> Self {
        self.cta = Some(cta.into());
        self
    }

    pub fn validate(&self) -> ReelResult<()> {
        for w in std::iter::once(self.window).chain(self.motion_window) {
            let [start, end] = w;
            if !(start.is_finite() && end.is_finite() && start < end) {
                return Err(ReelError::validation(format!(
                    "panel '{}' window [{start}, {end}] must be finite with start < end",
                    self.heading
                )));
            }
        }
        if self.heading.trim().is_empty() {
            return Err(ReelError::validation("panel heading must be non-empty"));
        }
        Ok(())
    }
}

/// Width of the fade-in and fade-out ramps at the window edges.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ramp {
    /// Fraction of the panel's own window width.
    WindowFraction(f64),
    /// Absolute width in progress units.
    Progress(f64),
}

impl Default for Ramp {
    fn default() -> Self {
        Self::WindowFraction(0.05)
    }
}

impl Ramp {
    /// Ramp width for `window`, capped so fade-in and fade-out never overlap.
    pub fn width(self, window: [f64; 2]) -> f64 {
        let span = window[1] - window[0];
        let w = match self {
            Self::WindowFraction(f) => span * f,
            Self::Progress(w) => w,
        };
        w.clamp(0.0, span / 2.0)
    }

    pub fn validate(self) -> ReelResult<()> {
        match self {
            Self::WindowFraction(f) if f.is_finite() && f > 0.0 && f <= 0.5 => Ok(()),
            Self::Progress(w) if w.is_finite() && w > 0.0 => Ok(()),
            _ => Err(ReelError::validation(
                "overlay ramp must be a window_fraction in (0, 0.5] or a positive progress width",
            )),
        }
    }
}

/// Piecewise-linear map through `(input[i], output[i])`, clamped outside the first and last
/// stops. `input` must be non-decreasing.
pub fn interpolate(input: &[f64], output: &[f64], x: f64) -> f64 {
    debug_assert_eq!(input.len(), output.len());
    let (Some(&first), Some(&last)) = (input.first(), input.last()) else {
        return 0.0;
    };
    if x <= first {
        return output[0];
    }
    if x >= last {
        return output[output.len() - 1];
    }
    for i in 1..input.len() {
        let (x0, x1) = (input[i - 1], input[i]);
        if x <= x1 {
            if x1 <= x0 {
                return output[i];
            }
            let t = (x - x0) / (x1 - x0);
            return output[i - 1] + (output[i] - output[i - 1]) * t;
        }
    }
    output[output.len() - 1]
}

/// 0 outside `window`, ramping to 1 over the ramp width at each edge and holding in between.
pub fn panel_opacity(window: [f64; 2], ramp: Ramp, progress: ScrollProgress) -> f64 {
    let [start, end] = window;
    let r = ramp.width(window);
    interpolate(
        &[start, start + r, end - r, end],
        &[0.0, 1.0, 1.0, 0.0],
        progress.get(),
    )
}

/// Vertical parallax offset in pixels, linear from `parallax[0]` to `parallax[1]` across the
/// window and clamped outside it.
pub fn panel_offset(window: [f64; 2], parallax: [f64; 2], progress: ScrollProgress) -> f64 {
    interpolate(&window, &parallax, progress.get())
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct PanelState {
    pub opacity: f64,
    pub offset_y: f64,
}

/// The four-panel text overlay. Panels are always present; visibility is purely their computed
/// opacity.
#[derive(Clone, Debug)]
pub struct TextOverlay {
    panels: Vec<OverlayPanel>,
    ramp: Ramp,
    parallax: [f64; 2],
    states: Vec<PanelState>,
}

impl TextOverlay {
    pub fn new(panels: Vec<OverlayPanel>, ramp: Ramp, parallax: [f64; 2]) -> Self {
        let mut overlay = Self {
            states: Vec::with_capacity(panels.len()),
            panels,
            ramp,
            parallax,
        };
        overlay.update(ScrollProgress::START);
        overlay
    }

    pub fn panels(&self) -> &[OverlayPanel] {
        &self.panels
    }

    pub fn states(&self) -> &[PanelState] {
        &self.states
    }

    pub fn update(&mut self, progress: ScrollProgress) {
        self.states.clear();
        for panel in &self.panels {
            self.states.push(PanelState {
                opacity: panel_opacity(panel.window, self.ramp, progress),
                offset_y: panel_offset(
                    panel.motion_window.unwrap_or(panel.window),
                    self.parallax,
                    progress,
                ),
            });
        }
    }

    /// Panels with non-zero opacity, paired with their state.
    pub fn visible(&self) -> impl Iterator<Item = (&OverlayPanel, &PanelState)> {
        self.panels
            .iter()
            .zip(self.states.iter())
            .filter(|(_, s)| s.opacity > 0.0)
    }
}
