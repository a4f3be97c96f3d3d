use crate::chip::{Chip, ChipPayload};
use crate::editor::StoryEditor;
use crate::palette::Palette;
use crate::render::SurfaceLayout;
use crate::surface::{Surface, SurfaceCaret};
use crate::sync::Synchronizer;

/// Pointer-to-caret lookups the host may or may not provide.
pub trait CaretApis {
    /// Primary lookup: the caret drawn exactly under the pointer.
    fn caret_range_from_point(&self, _x: u16, _y: usize) -> Option<SurfaceCaret> {
        None
    }

    /// Secondary lookup: the closest caret near the pointer.
    fn caret_position_from_point(&self, _x: u16, _y: usize) -> Option<SurfaceCaret> {
        None
    }
}

/// Caret lookups backed by the render layout.
pub struct LayoutCaretApis<'a> {
    layout: &'a SurfaceLayout,
}

impl<'a> LayoutCaretApis<'a> {
    pub fn new(layout: &'a SurfaceLayout) -> Self {
        Self { layout }
    }
}

impl CaretApis for LayoutCaretApis<'_> {
    fn caret_range_from_point(&self, x: u16, y: usize) -> Option<SurfaceCaret> {
        self.layout.caret_at(x, y)
    }

    fn caret_position_from_point(&self, x: u16, y: usize) -> Option<SurfaceCaret> {
        self.layout.nearest_caret_on_line(x, y)
    }
}

/// A host without any caret lookups.
pub struct NoCaretApis;

impl CaretApis for NoCaretApis {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedBy {
    CaretRange,
    CaretPosition,
    TextGeometry,
    EndOfContent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertionPoint {
    pub caret: SurfaceCaret,
    pub resolved_by: ResolvedBy,
}

/// Finds where a drop at `(x, y)` lands. `None` only when the pointer is
/// outside the surface.
///
/// Tried in order: the exact caret hit, the nearest caret on the hit line,
/// interpolation inside a text node's box, then the end of the content.
pub fn resolve_drop_point(
    surface: &Surface,
    layout: &SurfaceLayout,
    apis: &dyn CaretApis,
    x: u16,
    y: usize,
) -> Option<InsertionPoint> {
    if !layout.contains(x, y) {
        return None;
    }
    let strategies: [(ResolvedBy, &dyn Fn() -> Option<SurfaceCaret>); 3] = [
        (ResolvedBy::CaretRange, &|| apis.caret_range_from_point(x, y)),
        (ResolvedBy::CaretPosition, &|| apis.caret_position_from_point(x, y)),
        (ResolvedBy::TextGeometry, &|| caret_from_geometry(surface, layout, x, y)),
    ];
    for (resolved_by, strategy) in strategies {
        match strategy() {
            Some(caret) if surface.contains(caret) => {
                return Some(InsertionPoint { caret, resolved_by });
            }
            Some(caret) => {
                tracing::trace!(?caret, ?resolved_by, "discarding caret outside the surface");
            }
            None => {}
        }
    }
    Some(InsertionPoint {
        caret: surface.end_caret(),
        resolved_by: ResolvedBy::EndOfContent,
    })
}

/// Locates the text node whose box spans line `y` and interpolates a character
/// offset from the average glyph width.
fn caret_from_geometry(
    surface: &Surface,
    layout: &SurfaceLayout,
    x: u16,
    y: usize,
) -> Option<SurfaceCaret> {
    let text_box = layout
        .text_boxes()
        .iter()
        .find(|text_box| text_box.top <= y && y <= text_box.bottom)?;
    if text_box.chars == 0 || text_box.right <= text_box.left {
        return Some(SurfaceCaret::new(text_box.node, 0));
    }
    let lines = (text_box.bottom - text_box.top + 1) as f32;
    let span = (text_box.right - text_box.left) as f32 * lines;
    let glyph = span / text_box.chars as f32;
    let along = (y - text_box.top) as f32 * (text_box.right - text_box.left) as f32
        + x.saturating_sub(text_box.left) as f32;
    let offset = ((along / glyph).round() as usize).min(text_box.chars);
    let caret = SurfaceCaret::new(text_box.node, offset);
    surface.contains(caret).then_some(caret)
}

/// Inserts `chip` at `point`, splitting text when the point is mid-text, and
/// leaves the caret right after the chip.
pub fn materialize_chip(
    sync: &mut Synchronizer,
    editor: &mut StoryEditor,
    point: InsertionPoint,
    chip: &Chip,
) -> bool {
    sync.insert_chip_node(editor, point.caret, chip)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DropIndicator {
    pub point: InsertionPoint,
}

/// Tracks a drag in progress over the story.
#[derive(Debug, Default)]
pub struct DropController {
    indicator: Option<DropIndicator>,
}

impl DropController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indicator(&self) -> Option<DropIndicator> {
        self.indicator
    }

    pub fn drag_over(
        &mut self,
        surface: &Surface,
        layout: &SurfaceLayout,
        apis: &dyn CaretApis,
        x: u16,
        y: usize,
    ) -> Option<DropIndicator> {
        self.indicator = resolve_drop_point(surface, layout, apis, x, y)
            .map(|point| DropIndicator { point });
        self.indicator
    }

    /// Clears the indicator once the pointer has left the surface.
    pub fn drag_leave(&mut self, layout: &SurfaceLayout, x: u16, y: usize) -> bool {
        if layout.contains(x, y) || self.indicator.is_none() {
            return false;
        }
        self.indicator = None;
        true
    }

    pub fn cancel(&mut self) {
        self.indicator = None;
    }

    /// Completes a drag. Payloads that fail to parse or validate are dropped
    /// without a trace in the story.
    #[allow(clippy::too_many_arguments)]
    pub fn drop(
        &mut self,
        sync: &mut Synchronizer,
        editor: &mut StoryEditor,
        palette: &mut Palette,
        layout: &SurfaceLayout,
        apis: &dyn CaretApis,
        x: u16,
        y: usize,
        data: &str,
    ) -> bool {
        self.indicator = None;
        let payload = match ChipPayload::from_json(data) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(%err, "ignoring drop");
                return false;
            }
        };
        let chip = match payload.clone().into_chip() {
            Ok(chip) => chip,
            Err(err) => {
                tracing::debug!(%err, "ignoring drop");
                return false;
            }
        };
        let Some(surface) = sync.surface() else {
            return false;
        };
        let Some(point) = resolve_drop_point(surface, layout, apis, x, y) else {
            return false;
        };
        if !materialize_chip(sync, editor, point, &chip) {
            return false;
        }
        tracing::debug!(label = chip.label(), ?point, "placed chip");
        palette.placed(&payload);
        true
    }
}
