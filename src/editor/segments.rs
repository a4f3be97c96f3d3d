use crate::chip::{Chip, ChipId};
use crate::compile::{Token, TokenStream};

use super::cursor::char_to_byte_idx;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Placeholder(Chip),
}

impl Segment {
    /// Width in cursor units. A chip is a single unit.
    pub fn units(&self) -> usize {
        match self {
            Segment::Text(text) => text.chars().count(),
            Segment::Placeholder(_) => 1,
        }
    }

    pub fn as_chip(&self) -> Option<&Chip> {
        match self {
            Segment::Placeholder(chip) => Some(chip),
            Segment::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Segment::Text(_))
    }
}

/// The canonical story model: free text alternating with chips.
///
/// Two text segments are never adjacent, text segments are never empty, and
/// every chip id occurs at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentList {
    segments: Vec<Segment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from arbitrary segments, merging text runs and dropping
    /// chips whose id was already seen.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        let mut list = Self::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => {
                    if !text.is_empty() {
                        list.segments.push(Segment::Text(text));
                    }
                }
                Segment::Placeholder(chip) => {
                    if !list.contains_chip(&chip.id()) {
                        list.segments.push(Segment::Placeholder(chip));
                    }
                }
            }
        }
        list.merge_text_runs();
        list
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Length in cursor units.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Segment::units).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn chips(&self) -> impl Iterator<Item = &Chip> {
        self.segments.iter().filter_map(Segment::as_chip)
    }

    pub fn chip_count(&self) -> usize {
        self.chips().count()
    }

    pub fn contains_chip(&self, id: &ChipId) -> bool {
        self.chips().any(|chip| chip.id() == *id)
    }

    pub fn find_chip(&self, id: &ChipId) -> Option<&Chip> {
        self.chips().find(|chip| chip.id() == *id)
    }

    /// Unit position of the chip with `id`.
    pub fn chip_position(&self, id: &ChipId) -> Option<usize> {
        let mut position = 0;
        for segment in &self.segments {
            if let Segment::Placeholder(chip) = segment {
                if chip.id() == *id {
                    return Some(position);
                }
            }
            position += segment.units();
        }
        None
    }

    /// The chip occupying unit `pos`, if that unit is a chip.
    pub fn chip_at(&self, pos: usize) -> Option<&Chip> {
        let mut remaining = pos;
        for segment in &self.segments {
            let units = segment.units();
            if remaining < units {
                return segment.as_chip();
            }
            remaining -= units;
        }
        None
    }

    pub fn insert_text(&mut self, pos: usize, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let index = self.split_at(pos);
        self.segments
            .insert(index, Segment::Text(text.to_string()));
        self.merge_text_runs();
        true
    }

    /// Inserts `chip` at `pos`, splitting a text segment when needed.
    /// Refuses a chip whose id is already present.
    pub fn insert_chip(&mut self, pos: usize, chip: Chip) -> bool {
        if self.contains_chip(&chip.id()) {
            return false;
        }
        let index = self.split_at(pos);
        self.segments.insert(index, Segment::Placeholder(chip));
        self.merge_text_runs();
        true
    }

    /// Removes exactly the chip with `id`. Absent ids are a no-op.
    pub fn remove_chip(&mut self, id: &ChipId) -> bool {
        let Some(index) = self
            .segments
            .iter()
            .position(|segment| segment.as_chip().is_some_and(|chip| chip.id() == *id))
        else {
            return false;
        };
        self.segments.remove(index);
        self.merge_text_runs();
        true
    }

    /// Removes the unit at `pos`: one character, or a whole chip.
    pub fn remove_unit(&mut self, pos: usize) -> Option<Segment> {
        let mut remaining = pos;
        let mut target = None;
        for (index, segment) in self.segments.iter().enumerate() {
            let units = segment.units();
            if remaining < units {
                target = Some((index, remaining));
                break;
            }
            remaining -= units;
        }
        let (index, offset) = target?;
        let removed = if let Segment::Text(text) = &mut self.segments[index] {
            let start = char_to_byte_idx(text, offset);
            let end = char_to_byte_idx(text, offset + 1);
            Segment::Text(text.drain(start..end).collect())
        } else {
            self.segments.remove(index)
        };
        self.merge_text_runs();
        Some(removed)
    }

    /// What a reader sees, with chips shown by their labels.
    pub fn visible_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(chip) => out.push_str(chip.label()),
            }
        }
        out
    }

    /// Plain strings for text, blanks for chips, in reading order.
    pub fn to_token_stream(&self) -> TokenStream {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => Token::Plain(text.clone()),
                Segment::Placeholder(chip) => Token::blank_for_chip(chip),
            })
            .collect()
    }

    /// Returns the segment index at which something inserted at `pos` belongs,
    /// splitting a text segment in two if `pos` falls inside it.
    fn split_at(&mut self, pos: usize) -> usize {
        let mut remaining = pos;
        for index in 0..self.segments.len() {
            if remaining == 0 {
                return index;
            }
            let units = self.segments[index].units();
            if remaining < units {
                if let Segment::Text(text) = &mut self.segments[index] {
                    let byte_idx = char_to_byte_idx(text, remaining);
                    let tail = text.split_off(byte_idx);
                    self.segments.insert(index + 1, Segment::Text(tail));
                    return index + 1;
                }
            }
            remaining -= units.min(remaining);
        }
        self.segments.len()
    }

    fn merge_text_runs(&mut self) {
        let mut merged: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            match segment {
                Segment::Text(text) if text.is_empty() => {}
                Segment::Text(text) => {
                    if let Some(Segment::Text(previous)) = merged.last_mut() {
                        previous.push_str(&text);
                    } else {
                        merged.push(Segment::Text(text));
                    }
                }
                chip => merged.push(chip),
            }
        }
        self.segments = merged;
    }
}
