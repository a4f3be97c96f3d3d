use crate::chip::{Chip, ChipId};

mod cursor;
mod reducer;
mod segments;

pub use cursor::{CursorOffset, char_to_byte_idx, next_word_boundary, previous_word_boundary};
pub use reducer::{ANCHOR_CHARS, EditEvent, plain_text, reduce};
pub use segments::{Segment, SegmentList};

/// Owns a story being authored and the caret inside it.
///
/// Every command runs through [`reduce`] and reports whether anything changed.
#[derive(Clone, Debug, Default)]
pub struct StoryEditor {
    segments: SegmentList,
    cursor: CursorOffset,
}

impl StoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segments(segments: SegmentList) -> Self {
        let cursor = CursorOffset(segments.len());
        Self { segments, cursor }
    }

    pub fn segments(&self) -> &SegmentList {
        &self.segments
    }

    pub fn cursor(&self) -> CursorOffset {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn apply(&mut self, event: &EditEvent) -> bool {
        let (segments, cursor) = reduce(&self.segments, self.cursor, event);
        let changed = segments != self.segments || cursor != self.cursor;
        self.segments = segments;
        self.cursor = cursor;
        changed
    }

    /// Swaps in a model rebuilt from the rendered surface.
    pub(crate) fn replace(&mut self, segments: SegmentList, cursor: CursorOffset) {
        self.cursor = cursor.clamp_to(segments.len());
        self.segments = segments;
    }

    pub fn set_cursor(&mut self, offset: usize) -> bool {
        self.apply(&EditEvent::MoveTo(offset))
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        self.apply(&EditEvent::InsertText(ch.to_string()))
    }

    pub fn insert_str(&mut self, text: &str) -> bool {
        self.apply(&EditEvent::InsertText(text.to_string()))
    }

    pub fn paste(&mut self, text: &str) -> bool {
        self.apply(&EditEvent::Paste(text.to_string()))
    }

    pub fn insert_chip(&mut self, chip: Chip) -> bool {
        self.apply(&EditEvent::InsertChip(chip))
    }

    pub fn insert_chip_at(&mut self, offset: usize, chip: Chip) -> bool {
        self.apply(&EditEvent::InsertChipAt { offset, chip })
    }

    pub fn remove_chip(&mut self, id: &ChipId) -> bool {
        self.apply(&EditEvent::RemoveChip(*id))
    }

    pub fn backspace(&mut self) -> bool {
        self.apply(&EditEvent::Backspace)
    }

    pub fn delete(&mut self) -> bool {
        self.apply(&EditEvent::Delete)
    }

    pub fn move_left(&mut self) -> bool {
        self.apply(&EditEvent::MoveLeft)
    }

    pub fn move_right(&mut self) -> bool {
        self.apply(&EditEvent::MoveRight)
    }

    pub fn move_word_left(&mut self) -> bool {
        self.apply(&EditEvent::MoveWordLeft)
    }

    pub fn move_word_right(&mut self) -> bool {
        self.apply(&EditEvent::MoveWordRight)
    }

    pub fn move_to_start(&mut self) -> bool {
        self.apply(&EditEvent::MoveHome)
    }

    pub fn move_to_end(&mut self) -> bool {
        self.apply(&EditEvent::MoveEnd)
    }

    /// The chip directly left of the caret.
    pub fn chip_before_cursor(&self) -> Option<&Chip> {
        let at = self.cursor.get();
        if at == 0 {
            return None;
        }
        self.segments.chip_at(at - 1)
    }

    pub fn chip_after_cursor(&self) -> Option<&Chip> {
        self.segments.chip_at(self.cursor.get())
    }
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;
