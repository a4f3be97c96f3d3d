use crate::chip::{Chip, ChipId};

use super::cursor::{CursorOffset, next_word_boundary, previous_word_boundary};
use super::segments::SegmentList;

/// Characters the rendered surface uses as invisible caret anchors. They must
/// never leak into the model.
pub const ANCHOR_CHARS: [char; 3] = ['\u{200B}', '\u{200E}', '\u{FEFF}'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditEvent {
    InsertText(String),
    /// Clipboard content. Always inserted as plain text.
    Paste(String),
    InsertChip(Chip),
    InsertChipAt { offset: usize, chip: Chip },
    RemoveChip(ChipId),
    Backspace,
    Delete,
    MoveLeft,
    MoveRight,
    MoveWordLeft,
    MoveWordRight,
    MoveHome,
    MoveEnd,
    MoveTo(usize),
}

/// Applies one edit to a story and its caret, returning the new pair.
///
/// Chips are atomic: a single Backspace or Delete next to a chip removes the
/// whole chip, and the caret can only sit before or after one.
pub fn reduce(
    list: &SegmentList,
    cursor: CursorOffset,
    event: &EditEvent,
) -> (SegmentList, CursorOffset) {
    let mut next = list.clone();
    let len = next.len();
    let at = cursor.clamp_to(len).get();

    let caret = match event {
        EditEvent::InsertText(text) => insert_text(&mut next, at, text),
        EditEvent::Paste(text) => insert_text(&mut next, at, &plain_text(text)),
        EditEvent::InsertChip(chip) => {
            if next.insert_chip(at, chip.clone()) {
                at + 1
            } else {
                at
            }
        }
        EditEvent::InsertChipAt { offset, chip } => {
            let offset = (*offset).min(len);
            if next.insert_chip(offset, chip.clone()) {
                offset + 1
            } else {
                at
            }
        }
        EditEvent::RemoveChip(id) => match next.chip_position(id) {
            Some(position) => {
                next.remove_chip(id);
                if position < at { at - 1 } else { at }
            }
            None => at,
        },
        EditEvent::Backspace => {
            if at == 0 {
                0
            } else {
                next.remove_unit(at - 1);
                at - 1
            }
        }
        EditEvent::Delete => {
            if at < len {
                next.remove_unit(at);
            }
            at
        }
        EditEvent::MoveLeft => at.saturating_sub(1),
        EditEvent::MoveRight => (at + 1).min(len),
        EditEvent::MoveWordLeft => previous_word_boundary(&next, at),
        EditEvent::MoveWordRight => next_word_boundary(&next, at),
        EditEvent::MoveHome => 0,
        EditEvent::MoveEnd => len,
        EditEvent::MoveTo(offset) => (*offset).min(len),
    };

    (next, CursorOffset(caret))
}

fn insert_text(list: &mut SegmentList, at: usize, text: &str) -> usize {
    if list.insert_text(at, text) {
        at + text.chars().count()
    } else {
        at
    }
}

/// Reduces clipboard content to plain characters: anchor characters and
/// control characters other than newline and tab are dropped, CRLF becomes LF.
pub fn plain_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .filter(|ch| !ANCHOR_CHARS.contains(ch))
        .filter(|ch| !ch.is_control() || *ch == '\n' || *ch == '\t')
        .collect()
}
