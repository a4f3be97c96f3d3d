use super::segments::{Segment, SegmentList};

/// Stand-in character for a chip when a story is flattened for word motion.
/// Chips behave like a run of punctuation: never part of a word, never whitespace.
const CHIP_UNIT: char = '\u{FFFC}';

/// Caret position in units: one per character, one per chip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CursorOffset(pub usize);

impl CursorOffset {
    pub fn get(self) -> usize {
        self.0
    }

    pub(crate) fn clamp_to(self, len: usize) -> Self {
        Self(self.0.min(len))
    }
}

impl From<usize> for CursorOffset {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

pub fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    if char_idx == 0 {
        return 0;
    }
    for (count, (byte_idx, _)) in text.char_indices().enumerate() {
        if count == char_idx {
            return byte_idx;
        }
    }
    text.len()
}

pub(crate) fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn unit_chars(list: &SegmentList) -> Vec<char> {
    let mut chars = Vec::with_capacity(list.len());
    for segment in list.segments() {
        match segment {
            Segment::Text(text) => chars.extend(text.chars()),
            Segment::Placeholder(_) => chars.push(CHIP_UNIT),
        }
    }
    chars
}

pub fn previous_word_boundary(list: &SegmentList, offset: usize) -> usize {
    let chars = unit_chars(list);
    let mut idx = offset.min(chars.len());
    if idx == 0 {
        return 0;
    }

    while idx > 0 && chars[idx - 1].is_whitespace() {
        idx -= 1;
    }
    if idx == 0 {
        return 0;
    }

    while idx > 0 && is_word_char(chars[idx - 1]) {
        idx -= 1;
    }
    if idx > 0 && !is_word_char(chars[idx - 1]) && !chars[idx - 1].is_whitespace() {
        while idx > 0 && !is_word_char(chars[idx - 1]) && !chars[idx - 1].is_whitespace() {
            idx -= 1;
        }
    }
    idx
}

pub fn next_word_boundary(list: &SegmentList, offset: usize) -> usize {
    let chars = unit_chars(list);
    let len = chars.len();
    let mut idx = offset.min(len);
    if idx >= len {
        return len;
    }

    if chars[idx].is_whitespace() {
        while idx < len && chars[idx].is_whitespace() {
            idx += 1;
        }
        return idx;
    }

    if is_word_char(chars[idx]) {
        while idx < len && is_word_char(chars[idx]) {
            idx += 1;
        }
        while idx < len && !chars[idx].is_whitespace() && !is_word_char(chars[idx]) {
            idx += 1;
        }
        while idx < len && chars[idx].is_whitespace() {
            idx += 1;
        }
        return idx;
    }

    while idx < len && !chars[idx].is_whitespace() && !is_word_char(chars[idx]) {
        idx += 1;
    }
    while idx < len && chars[idx].is_whitespace() {
        idx += 1;
    }
    idx
}
