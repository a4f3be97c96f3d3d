use std::ops::Deref;
use std::time::Instant;

use ratatui::layout::Rect;
use ratatui::text::Line;

use crate::chip::ChipPayload;
use crate::compile::{TokenStream, compile};
use crate::config::EditorConfig;
use crate::drop::{CaretApis, DropController, DropIndicator, LayoutCaretApis};
use crate::editor::{EditEvent, StoryEditor};
use crate::palette::Palette;
use crate::render::{
    CursorVisualPosition, RenderResult, SurfaceLayout, render_surface, render_tokens,
};
use crate::surface::{SurfaceCaret, SurfaceNode};
use crate::sync::Synchronizer;
use crate::theme::Theme;

/// What a click on the story did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The caret moved to the clicked position.
    Caret,
    /// A chip's close button was hit and the chip removed.
    ChipRemoved,
    Ignored,
}

/// EditorDisplay wraps a StoryEditor and everything that puts it on screen:
/// the synchronized surface, the palette, drag state and the last layout.
#[derive(Debug)]
pub struct EditorDisplay {
    editor: StoryEditor,
    sync: Synchronizer,
    palette: Palette,
    drops: DropController,
    theme: Theme,
    layout: SurfaceLayout,
    last_cursor_visual: Option<CursorVisualPosition>,
    preferred_column: Option<u16>,
    last_view_height: usize,
    last_total_lines: usize,
    last_text_area: Rect,
}

impl EditorDisplay {
    pub fn new(editor: StoryEditor, config: &EditorConfig) -> Self {
        let sync = Synchronizer::attach(&editor, config.restore_delay);
        Self {
            editor,
            sync,
            palette: Palette::new(config),
            drops: DropController::new(),
            theme: Theme::default(),
            layout: SurfaceLayout::default(),
            last_cursor_visual: None,
            preferred_column: None,
            last_view_height: 1,
            last_total_lines: 0,
            last_text_area: Rect::default(),
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn layout(&self) -> &SurfaceLayout {
        &self.layout
    }

    pub fn last_cursor_visual(&self) -> Option<CursorVisualPosition> {
        self.last_cursor_visual
    }

    pub fn last_view_height(&self) -> usize {
        self.last_view_height
    }

    pub fn last_total_lines(&self) -> usize {
        self.last_total_lines
    }

    /// Lays out the surface at the given width and remembers the result for
    /// hit testing.
    pub fn render_story(&mut self, wrap_width: usize) -> RenderResult {
        let Some(surface) = self.sync.surface() else {
            let result = render_surface(&Default::default(), None, wrap_width, &self.theme);
            self.layout = result.layout.clone();
            self.last_cursor_visual = None;
            return result;
        };
        let result = render_surface(surface, Some(self.sync.caret()), wrap_width, &self.theme);
        self.layout = result.layout.clone();
        self.last_cursor_visual = result.cursor;
        result
    }

    /// Update tracking state after rendering (called from draw)
    pub fn update_after_render(&mut self, text_area: Rect, total_lines: usize) {
        self.last_text_area = text_area;
        self.last_total_lines = total_lines;
        self.last_view_height = (text_area.height as usize).max(1);
        self.layout.extend_height(self.last_view_height);
    }

    pub fn type_text(&mut self, text: &str) -> bool {
        self.preferred_column = None;
        self.sync.handle_input(&mut self.editor, text)
    }

    pub fn paste(&mut self, text: &str) -> bool {
        self.preferred_column = None;
        self.sync.paste(&mut self.editor, text)
    }

    pub fn backspace(&mut self) -> bool {
        self.preferred_column = None;
        self.sync.backspace(&mut self.editor)
    }

    pub fn delete(&mut self) -> bool {
        self.preferred_column = None;
        self.sync.delete(&mut self.editor)
    }

    /// Cursor motion and other model-side edits.
    pub fn dispatch(&mut self, event: EditEvent) -> bool {
        self.preferred_column = None;
        self.sync.dispatch(&mut self.editor, &event)
    }

    /// Move cursor vertically by delta lines, keeping the column where possible.
    pub fn move_cursor_vertical(&mut self, delta: i32) -> bool {
        self.sync.flush();
        let Some(current) = self.layout.position_of(self.sync.caret()) else {
            return false;
        };
        let desired_column = self.preferred_column.unwrap_or(current.column);
        let max_line = self.layout.height().saturating_sub(1) as i32;
        let target_line = (current.line as i32 + delta).clamp(0, max_line.max(0)) as usize;

        let mut line = target_line;
        let destination = loop {
            if let Some(caret) = self.layout.nearest_caret_on_line(desired_column, line) {
                break Some(caret);
            }
            if line == current.line {
                break None;
            }
            if line > current.line {
                line -= 1;
            } else {
                line += 1;
            }
        };
        let Some(destination) = destination else {
            return false;
        };
        if destination == self.sync.caret() {
            return false;
        }
        let moved = self.sync.set_caret(&mut self.editor, destination);
        self.preferred_column = Some(desired_column);
        self.last_cursor_visual = self.layout.position_of(destination);
        moved
    }

    /// Translates a terminal cell into story coordinates.
    pub fn content_point(&self, column: u16, row: u16, scroll_top: usize) -> Option<(u16, usize)> {
        let area = self.last_text_area;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        let max_x = area.x.saturating_add(area.width);
        let max_y = area.y.saturating_add(area.height);
        if column < area.x || column >= max_x || row < area.y || row >= max_y {
            return None;
        }
        Some((column - area.x, scroll_top + (row - area.y) as usize))
    }

    pub fn click(&mut self, column: u16, row: u16, scroll_top: usize) -> ClickOutcome {
        let Some((x, y)) = self.content_point(column, row, scroll_top) else {
            return ClickOutcome::Ignored;
        };
        if let Some(chip_box) = self.layout.chip_at(x, y) {
            if x == chip_box.close_column() {
                let id = self
                    .sync
                    .surface()
                    .and_then(|surface| surface.nodes().get(chip_box.node))
                    .and_then(|node| match node {
                        SurfaceNode::Chip(chip) => chip.id,
                        _ => None,
                    });
                if let Some(id) = id {
                    if self.sync.remove_chip(&mut self.editor, &id) {
                        return ClickOutcome::ChipRemoved;
                    }
                }
                return ClickOutcome::Ignored;
            }
        }
        let apis = LayoutCaretApis::new(&self.layout);
        let caret = apis
            .caret_range_from_point(x, y)
            .or_else(|| apis.caret_position_from_point(x, y));
        match caret {
            Some(caret) => {
                self.preferred_column = None;
                self.sync.set_caret(&mut self.editor, caret);
                ClickOutcome::Caret
            }
            None => ClickOutcome::Ignored,
        }
    }

    pub fn drag_over(&mut self, column: u16, row: u16, scroll_top: usize) -> Option<DropIndicator> {
        let Some((x, y)) = self.content_point(column, row, scroll_top) else {
            self.drops.cancel();
            return None;
        };
        let surface = self.sync.surface()?;
        let apis = LayoutCaretApis::new(&self.layout);
        self.drops.drag_over(surface, &self.layout, &apis, x, y)
    }

    pub fn drag_leave(&mut self, column: u16, row: u16, scroll_top: usize) -> bool {
        match self.content_point(column, row, scroll_top) {
            Some((x, y)) => self.drops.drag_leave(&self.layout, x, y),
            None => {
                let had_indicator = self.drops.indicator().is_some();
                self.drops.cancel();
                had_indicator
            }
        }
    }

    /// Where the drop indicator should be drawn, in story coordinates.
    pub fn drop_indicator(&self) -> Option<CursorVisualPosition> {
        let indicator = self.drops.indicator()?;
        self.layout.position_of(indicator.point.caret)
    }

    pub fn drop_payload(&mut self, column: u16, row: u16, scroll_top: usize, data: &str) -> bool {
        let Some((x, y)) = self.content_point(column, row, scroll_top) else {
            self.drops.cancel();
            return false;
        };
        let apis = LayoutCaretApis::new(&self.layout);
        self.drops.drop(
            &mut self.sync,
            &mut self.editor,
            &mut self.palette,
            &self.layout,
            &apis,
            x,
            y,
            data,
        )
    }

    /// Keyboard counterpart of a drop: places the palette word at the caret.
    pub fn insert_payload(&mut self, payload: &ChipPayload) -> bool {
        let chip = match payload.clone().into_chip() {
            Ok(chip) => chip,
            Err(err) => {
                tracing::debug!(%err, "ignoring palette insert");
                return false;
            }
        };
        if !self.sync.insert_chip_at_caret(&mut self.editor, chip) {
            return false;
        }
        self.palette.placed(payload);
        true
    }

    pub fn flush(&mut self) -> bool {
        self.sync.flush()
    }

    pub fn flush_due(&mut self, now: Instant) -> bool {
        self.sync.flush_due(now)
    }

    pub fn restore_deadline(&self) -> Option<Instant> {
        self.sync.restore_deadline()
    }

    /// Unmounts the surface. Pending work turns into no-ops.
    pub fn detach(&mut self) {
        self.drops.cancel();
        self.sync.detach();
    }

    pub fn caret(&self) -> SurfaceCaret {
        self.sync.caret()
    }

    pub fn compile(&self) -> TokenStream {
        compile(self.editor.segments(), &self.palette.keyword_catalog())
    }

    /// The compiled story with its blanks highlighted.
    pub fn render_preview(&self, wrap_width: usize) -> Vec<Line<'static>> {
        render_tokens(&self.compile(), wrap_width, &self.theme)
    }
}

impl Deref for EditorDisplay {
    type Target = StoryEditor;

    fn deref(&self) -> &Self::Target {
        &self.editor
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::chip::{Category, Qualifier};
    use crate::compile::Token;
    use crate::editor::{Segment, SegmentList};

    const WIDTH: u16 = 40;

    fn create_test_display() -> EditorDisplay {
        let config = EditorConfig {
            restore_delay: Duration::ZERO,
            ..EditorConfig::default()
        };
        let mut display = EditorDisplay::new(StoryEditor::new(), &config);
        refresh(&mut display);
        display
    }

    fn refresh(display: &mut EditorDisplay) {
        display.flush();
        let result = display.render_story(WIDTH as usize);
        display.update_after_render(Rect::new(0, 0, WIDTH, 10), result.total_lines);
    }

    fn drop_at(display: &mut EditorDisplay, column: u16, row: u16, data: &str) -> bool {
        let dropped = display.drop_payload(column, row, 0, data);
        refresh(display);
        dropped
    }

    #[test]
    fn authoring_session_compiles_chips_and_inline_keywords() {
        let mut display = create_test_display();
        display.type_text("I went to the ");
        refresh(&mut display);

        display
            .palette_mut()
            .select_qualifier(Category::Verb, Some(Qualifier::Past));
        let payload = display.palette().payload_for(Category::Verb).unwrap().to_json();
        assert!(drop_at(&mut display, 30, 0, &payload));

        display.type_text(" store and ate a Thing.");
        refresh(&mut display);

        assert_eq!(
            display.compile().tokens(),
            &[
                Token::plain("I went to the "),
                Token::blank("Verb (Past)", Some("past")),
                Token::plain(" store and ate a "),
                Token::blank("Thing", None),
                Token::plain("."),
            ]
        );
        assert_eq!(display.palette().selected(Category::Verb), None);
    }

    #[test]
    fn drop_indicator_follows_pointer_and_clears_on_leave() {
        let mut display = create_test_display();
        display.type_text("hello world");
        refresh(&mut display);

        display.drag_over(3, 0, 0);
        assert_eq!(
            display.drop_indicator(),
            Some(CursorVisualPosition { line: 0, column: 3 })
        );
        display.drag_over(25, 0, 0);
        assert_eq!(
            display.drop_indicator(),
            Some(CursorVisualPosition { line: 0, column: 11 })
        );

        assert!(display.drag_leave(WIDTH + 5, 0, 0));
        assert_eq!(display.drop_indicator(), None);
    }

    #[test]
    fn dropping_mid_word_splits_text() {
        let mut display = create_test_display();
        display.type_text("hello");
        refresh(&mut display);
        let payload = display.palette().payload_for(Category::Color).unwrap().to_json();

        assert!(drop_at(&mut display, 2, 0, &payload));
        display.type_text("!");
        refresh(&mut display);

        assert_eq!(display.segments().visible_text(), "heColor!llo");
    }

    #[test]
    fn close_button_removes_chip() {
        let mut display = create_test_display();
        display.type_text("a ");
        refresh(&mut display);
        let payload = display.palette().payload_for(Category::Noun).unwrap().to_json();
        drop_at(&mut display, 10, 0, &payload);

        let chip_box = display.layout().chips()[0];
        assert_eq!(
            display.click(chip_box.close_column(), chip_box.line as u16, 0),
            ClickOutcome::ChipRemoved
        );
        refresh(&mut display);

        assert_eq!(display.segments().chip_count(), 0);
        assert_eq!(display.segments().visible_text(), "a ");
    }

    #[test]
    fn clicking_text_moves_the_caret() {
        let mut display = create_test_display();
        display.type_text("hello");
        refresh(&mut display);

        assert_eq!(display.click(1, 0, 0), ClickOutcome::Caret);
        assert_eq!(display.cursor().get(), 1);
        assert_eq!(display.click(1, 20, 0), ClickOutcome::Ignored);
    }

    #[test]
    fn custom_word_drops_once() {
        let mut display = create_test_display();
        let word = display.palette_mut().add_custom_word("grandma").unwrap();
        let payload = display.palette().custom_payload(&word).unwrap().to_json();

        assert!(drop_at(&mut display, 0, 0, &payload));
        assert!(display.palette().custom_words().is_empty());

        assert!(display.backspace());
        refresh(&mut display);
        assert!(display.segments().is_empty());
        assert!(display.palette().custom_words().is_empty());
    }

    #[test]
    fn palette_insert_at_caret_resets_form() {
        let mut display = create_test_display();
        display.type_text("ab");
        display.dispatch(EditEvent::MoveLeft);
        display
            .palette_mut()
            .select_qualifier(Category::Adjective, Some(Qualifier::Comparative));
        let payload = display.palette().payload_for(Category::Adjective).unwrap();

        assert!(display.insert_payload(&payload));
        display.flush();

        assert_eq!(display.segments().chip_count(), 1);
        assert_eq!(display.cursor().get(), 2);
        assert_eq!(display.palette().selected(Category::Adjective), None);
        assert_eq!(display.render_preview(40).len(), 1);
    }

    #[test]
    fn garbage_drop_changes_nothing() {
        let mut display = create_test_display();
        display.type_text("x");
        refresh(&mut display);
        assert!(!drop_at(&mut display, 0, 0, "{\"kind\":\"placeholder\""));
        assert_eq!(display.segments().visible_text(), "x");
    }

    #[test]
    fn vertical_motion_keeps_column() {
        let mut display = create_test_display();
        display.type_text("first line\nsecond line");
        refresh(&mut display);
        display.dispatch(EditEvent::MoveTo(3));
        refresh(&mut display);

        assert!(display.move_cursor_vertical(1));
        refresh(&mut display);
        assert_eq!(display.cursor().get(), 14);
        assert!(display.move_cursor_vertical(-1));
        assert_eq!(display.cursor().get(), 3);
    }

    #[test]
    fn frame_drawn_before_restore_keeps_caret_in_place() {
        let text: String = (0..31).map(|i| format!("line {i}\n")).collect();
        let mut editor =
            StoryEditor::with_segments(SegmentList::from_segments(vec![Segment::Text(text)]));
        editor.set_cursor(0);
        let config = EditorConfig {
            restore_delay: Duration::from_secs(60),
            ..EditorConfig::default()
        };
        let mut display = EditorDisplay::new(editor, &config);

        assert!(display.type_text("x"));
        assert!(display.synchronizer().has_pending_restore());
        let interim = display.render_story(20);
        assert_eq!(interim.cursor, Some(CursorVisualPosition { line: 0, column: 1 }));

        assert!(display.flush());
        let settled = display.render_story(20);
        assert_eq!(settled.cursor, interim.cursor);
        assert_eq!(display.cursor().get(), 1);
    }

    #[test]
    fn detached_display_ignores_late_work() {
        let mut display = create_test_display();
        display.type_text("x");
        display.detach();
        assert!(!display.flush());
        assert!(!display.type_text("y"));
        assert_eq!(display.segments().visible_text(), "x");
    }

    #[test]
    fn inline_keywords_can_be_switched_off() {
        let config = EditorConfig {
            inline_keywords: false,
            ..EditorConfig::default()
        };
        let mut display = EditorDisplay::new(StoryEditor::new(), &config);
        display.type_text("a Person");
        assert_eq!(display.compile().tokens(), &[Token::plain("a Person")]);
    }
}
