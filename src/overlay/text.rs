use std::sync::Arc;

use vello_cpu::kurbo::Shape;

use crate::{
    foundation::{
        core::{Affine, Rgba8, Size},
        error::{ReelError, ReelResult},
    },
    overlay::{Anchor, OverlayPanel, PanelState, TextOverlay},
    render::canvas::affine_to_cpu,
};

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<Rgba8> for TextBrushRgba8 {
    fn from(c: Rgba8) -> Self {
        let [r, g, b, a] = c.0;
        Self { r, g, b, a }
    }
}

/// Parley contexts bound to one registered font family.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for TextLayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextLayoutEngine")
            .field("family_name", &self.family_name)
            .finish()
    }
}

impl TextLayoutEngine {
    pub fn new(font_bytes: Arc<Vec<u8>>) -> ReelResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.as_ref().clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| ReelError::validation("no font families registered from font bytes"))?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ReelError::validation("registered font family has no name"))?
            .to_string();
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.as_ref().clone()),
            0,
        );

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn layout_plain(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
        max_width_px: Option<f32>,
    ) -> ReelResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ReelError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(max_width_px);
        layout.align(
            max_width_px,
            parley::Alignment::Start,
            parley::AlignmentOptions::default(),
        );
        Ok(layout)
    }
}

/// Colors and type sizes for the overlay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub heading: Rgba8,
    pub body: Rgba8,
    /// Page background; the call-to-action label is cut out in this color.
    pub background: Rgba8,
    pub heading_px: f32,
    pub body_px: f32,
    pub cta_px: f32,
}

const BODY_MAX_WIDTH: f32 = 384.0;
const HEADING_GAP: f64 = 16.0;
const CTA_GAP: f64 = 32.0;
const CTA_PAD_X: f64 = 32.0;
const CTA_PAD_Y: f64 = 12.0;
const WIDE_VIEWPORT: u32 = 768;

#[derive(Clone, Copy, Debug, PartialEq)]
enum HAlign {
    Start,
    Center,
    End,
}

impl HAlign {
    fn factor(self) -> f64 {
        match self {
            Self::Start => 0.0,
            Self::Center => 0.5,
            Self::End => 1.0,
        }
    }
}

/// Top-left of a panel block of `block` size inside `viewport`, before parallax.
fn block_origin(anchor: Anchor, viewport: Size, block: (f64, f64)) -> (f64, f64) {
    let (vw, vh) = (f64::from(viewport.width), f64::from(viewport.height));
    let (bw, bh) = block;
    let wide = viewport.width >= WIDE_VIEWPORT;
    let inset = if wide { 128.0 } else { 40.0 };
    match anchor {
        Anchor::Center => ((vw - bw) / 2.0, (vh - bh) / 2.0),
        Anchor::Left => (inset, (vh - bh) / 2.0),
        Anchor::Right => (vw - inset - bw, (vh - bh) / 2.0),
        Anchor::Top => ((vw - bw) / 2.0, if wide { 160.0 } else { 128.0 }),
    }
}

fn text_align(anchor: Anchor) -> HAlign {
    match anchor {
        Anchor::Left => HAlign::Start,
        Anchor::Right => HAlign::End,
        Anchor::Center | Anchor::Top => HAlign::Center,
    }
}

struct PanelBlock {
    heading: parley::Layout<TextBrushRgba8>,
    body: Option<parley::Layout<TextBrushRgba8>>,
    cta: Option<parley::Layout<TextBrushRgba8>>,
}

impl PanelBlock {
    fn cta_size(cta: &parley::Layout<TextBrushRgba8>) -> (f64, f64) {
        (
            f64::from(cta.width()) + 2.0 * CTA_PAD_X,
            f64::from(cta.height()) + 2.0 * CTA_PAD_Y,
        )
    }

    fn size(&self) -> (f64, f64) {
        let mut w = f64::from(self.heading.width());
        let mut h = f64::from(self.heading.height());
        if let Some(body) = &self.body {
            w = w.max(f64::from(body.width()));
            h += HEADING_GAP + f64::from(body.height());
        }
        if let Some(cta) = &self.cta {
            let (cw, ch) = Self::cta_size(cta);
            w = w.max(cw);
            h += CTA_GAP + ch;
        }
        (w, h)
    }
}

/// Rasterizes the visible overlay panels into a transparent premultiplied layer.
#[derive(Debug)]
pub struct OverlayRenderer {
    engine: Option<TextLayoutEngine>,
    style: OverlayStyle,
    warned_no_font: bool,
}

impl OverlayRenderer {
    /// `font_bytes` of `None` renders nothing (logged once).
    pub fn new(font_bytes: Option<Arc<Vec<u8>>>, style: OverlayStyle) -> ReelResult<Self> {
        let engine = font_bytes.map(TextLayoutEngine::new).transpose()?;
        Ok(Self {
            engine,
            style,
            warned_no_font: false,
        })
    }

    pub fn has_font(&self) -> bool {
        self.engine.is_some()
    }

    /// Layer for the overlay's current panel states, or `None` when nothing is visible.
    #[tracing::instrument(skip(self, overlay))]
    pub fn render(&mut self, viewport: Size, overlay: &TextOverlay) -> ReelResult<Option<Vec<u8>>> {
        if viewport.is_empty() || overlay.visible().next().is_none() {
            return Ok(None);
        }
        let Some(engine) = self.engine.as_mut() else {
            if !self.warned_no_font {
                tracing::warn!("no overlay font configured; text panels are not drawn");
                self.warned_no_font = true;
            }
            return Ok(None);
        };

        let (w, h) = viewport.to_u16()?;
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        for (panel, state) in overlay.visible() {
            draw_panel(&mut ctx, engine, &self.style, viewport, panel, state)?;
        }
        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        Ok(Some(pixmap.data_as_u8_slice().to_vec()))
    }

    /// A single centered caption line (loading screen), or `None` without a font.
    pub fn render_caption(&mut self, viewport: Size, caption: &str) -> ReelResult<Option<Vec<u8>>> {
        if viewport.is_empty() {
            return Ok(None);
        }
        let Some(engine) = self.engine.as_mut() else {
            return Ok(None);
        };
        let layout = engine.layout_plain(caption, self.style.cta_px, self.style.body.into(), None)?;
        let (bw, bh) = (f64::from(layout.width()), f64::from(layout.height()));
        let (x, y) = block_origin(Anchor::Center, viewport, (bw, bh));

        let (w, h) = viewport.to_u16()?;
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        fill_layout(&mut ctx, &engine.font, &layout, x, y, bw, HAlign::Start);
        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        Ok(Some(pixmap.data_as_u8_slice().to_vec()))
    }
}

fn draw_panel(
    ctx: &mut vello_cpu::RenderContext,
    engine: &mut TextLayoutEngine,
    style: &OverlayStyle,
    viewport: Size,
    panel: &OverlayPanel,
    state: &PanelState,
) -> ReelResult<()> {
    let block = PanelBlock {
        heading: engine.layout_plain(&panel.heading, style.heading_px, style.heading.into(), None)?,
        body: panel
            .body
            .as_deref()
            .map(|b| engine.layout_plain(b, style.body_px, style.body.into(), Some(BODY_MAX_WIDTH)))
            .transpose()?,
        cta: panel
            .cta
            .as_deref()
            .map(|c| engine.layout_plain(c, style.cta_px, style.background.into(), None))
            .transpose()?,
    };
    let (bw, bh) = block.size();
    let (x0, y0) = block_origin(panel.anchor, viewport, (bw, bh));
    let y0 = y0 + state.offset_y;
    let align = text_align(panel.anchor);

    ctx.push_opacity_layer(state.opacity as f32);

    let mut y = y0;
    fill_layout(ctx, &engine.font, &block.heading, x0, y, bw, align);
    y += f64::from(block.heading.height());
    if let Some(body) = &block.body {
        y += HEADING_GAP;
        fill_layout(ctx, &engine.font, body, x0, y, bw, align);
        y += f64::from(body.height());
    }
    if let Some(cta) = &block.cta {
        y += CTA_GAP;
        let (cw, ch) = PanelBlock::cta_size(cta);
        let cx = x0 + (bw - cw) * align.factor();
        let pill = vello_cpu::kurbo::RoundedRect::new(cx, y, cx + cw, y + ch, ch / 2.0);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        let [r, g, b, a] = style.heading.0;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
        ctx.fill_path(&pill.to_path(0.1));
        fill_layout(
            ctx,
            &engine.font,
            cta,
            cx + CTA_PAD_X,
            y + CTA_PAD_Y,
            f64::from(cta.width()),
            HAlign::Start,
        );
    }

    ctx.pop_layer();
    Ok(())
}

fn fill_layout(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    layout: &parley::Layout<TextBrushRgba8>,
    x: f64,
    y: f64,
    box_width: f64,
    align: HAlign,
) {
    for line in layout.lines() {
        let dx = (box_width - f64::from(line.metrics().advance)) * align.factor();
        ctx.set_transform(affine_to_cpu(Affine::translate((x + dx, y))));
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = run.style().brush;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}
