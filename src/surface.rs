use std::collections::HashSet;

use crate::chip::{Category, Chip, ChipId, ChipKind, Qualifier};
use crate::editor::{ANCHOR_CHARS, Segment, SegmentList, char_to_byte_idx};

/// Attributes a chip node carries on the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChipNode {
    pub id: Option<ChipId>,
    pub type_name: String,
    pub qualifier: Option<String>,
    pub label: String,
    pub custom: bool,
}

impl ChipNode {
    pub fn from_chip(chip: &Chip) -> Self {
        Self {
            id: Some(chip.id()),
            type_name: chip.type_name().to_string(),
            qualifier: chip.qualifier().map(|q| q.as_str().to_string()),
            label: chip.label().to_string(),
            custom: matches!(chip.kind(), ChipKind::Custom(_)),
        }
    }

    fn to_chip(&self, id: ChipId) -> Chip {
        let kind = match Category::from_label(&self.type_name) {
            Some(category) if !self.custom => ChipKind::Catalog(category),
            _ => ChipKind::Custom(self.type_name.to_uppercase()),
        };
        let qualifier = self.qualifier.as_deref().and_then(Qualifier::parse);
        let label = self.label.trim();
        let label = if label.is_empty() { "Placeholder" } else { label };
        Chip::from_parts(id, kind, qualifier, label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceNode {
    Text(String),
    Chip(ChipNode),
    /// Zero-width caret anchor following a chip.
    Anchor,
}

impl SurfaceNode {
    /// Width in cursor units: visible characters, one per chip, none for anchors.
    fn units(&self) -> usize {
        match self {
            SurfaceNode::Text(text) => visible_len(text),
            SurfaceNode::Chip(_) => 1,
            SurfaceNode::Anchor => 0,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            SurfaceNode::Anchor => true,
            SurfaceNode::Text(text) => text.chars().all(is_anchor_char),
            SurfaceNode::Chip(_) => false,
        }
    }

    fn chip_id(&self) -> Option<ChipId> {
        match self {
            SurfaceNode::Chip(node) => node.id,
            _ => None,
        }
    }
}

/// A collapsed caret on the surface.
///
/// In a text node `offset` counts characters. On a chip node `0` is before and
/// `1` after the chip. An anchor only has offset `0`. `node == nodes.len()`
/// addresses the end of the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceCaret {
    pub node: usize,
    pub offset: usize,
}

impl SurfaceCaret {
    pub fn new(node: usize, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// The rendered story as a flat node list, always regenerated from a
/// [`SegmentList`]. A zero-width anchor after a chip gives the caret somewhere
/// to live.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Surface {
    nodes: Vec<SurfaceNode>,
}

pub fn is_anchor_char(ch: char) -> bool {
    ANCHOR_CHARS.contains(&ch)
}

fn visible_len(text: &str) -> usize {
    text.chars().filter(|ch| !is_anchor_char(*ch)).count()
}

/// Raw character index of the `visible`-th visible character in `text`.
fn raw_index(text: &str, visible: usize) -> usize {
    let mut seen = 0;
    for (index, ch) in text.chars().enumerate() {
        if seen == visible {
            return index;
        }
        if !is_anchor_char(ch) {
            seen += 1;
        }
    }
    text.chars().count()
}

impl Surface {
    pub fn from_nodes(nodes: Vec<SurfaceNode>) -> Self {
        Self { nodes }
    }

    /// Renders a story from scratch.
    pub fn project(list: &SegmentList) -> Self {
        let segments = list.segments();
        let mut nodes = Vec::with_capacity(segments.len() + 1);
        for (index, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Text(text) => nodes.push(SurfaceNode::Text(text.clone())),
                Segment::Placeholder(chip) => {
                    nodes.push(SurfaceNode::Chip(ChipNode::from_chip(chip)));
                    let followed_by_text = segments.get(index + 1).is_some_and(Segment::is_text);
                    if !followed_by_text {
                        nodes.push(SurfaceNode::Anchor);
                    }
                }
            }
        }
        Self { nodes }
    }

    pub fn nodes(&self) -> &[SurfaceNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total cursor units on the surface.
    pub fn units(&self) -> usize {
        self.nodes.iter().map(SurfaceNode::units).sum()
    }

    pub fn contains(&self, caret: SurfaceCaret) -> bool {
        match self.nodes.get(caret.node) {
            None => caret.node == self.nodes.len(),
            Some(SurfaceNode::Text(text)) => caret.offset <= text.chars().count(),
            Some(SurfaceNode::Chip(_)) => caret.offset <= 1,
            Some(SurfaceNode::Anchor) => caret.offset == 0,
        }
    }

    /// Walks the nodes left to right and rebuilds the story model.
    ///
    /// Chips already tracked in `previous` keep their identity; chip nodes with
    /// an unknown id keep the id they carry; nodes without one get a fresh id.
    pub fn read_back(&self, previous: &SegmentList) -> SegmentList {
        let mut seen: HashSet<ChipId> = HashSet::new();
        let mut segments = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            match node {
                SurfaceNode::Text(text) => {
                    let clean: String = text.chars().filter(|ch| !is_anchor_char(*ch)).collect();
                    if !clean.is_empty() {
                        segments.push(Segment::Text(clean));
                    }
                }
                SurfaceNode::Anchor => {}
                SurfaceNode::Chip(chip_node) => {
                    let id = match chip_node.id {
                        Some(id) if !seen.contains(&id) => id,
                        _ => ChipId::new(),
                    };
                    seen.insert(id);
                    let chip = match previous.find_chip(&id) {
                        Some(existing) => existing.clone(),
                        None => chip_node.to_chip(id),
                    };
                    segments.push(Segment::Placeholder(chip));
                }
            }
        }
        SegmentList::from_segments(segments)
    }

    /// Character offset of `caret`, counting every chip as one unit.
    pub fn offset_of(&self, caret: SurfaceCaret) -> Option<usize> {
        if !self.contains(caret) {
            return None;
        }
        let before: usize = self.nodes[..caret.node.min(self.nodes.len())]
            .iter()
            .map(SurfaceNode::units)
            .sum();
        let within = match self.nodes.get(caret.node) {
            Some(SurfaceNode::Text(text)) => {
                text.chars().take(caret.offset).filter(|ch| !is_anchor_char(*ch)).count()
            }
            Some(SurfaceNode::Chip(_)) => caret.offset,
            Some(SurfaceNode::Anchor) | None => 0,
        };
        Some(before + within)
    }

    /// Finds the caret for a character offset, chips counting as one.
    ///
    /// An offset right after a chip lands in the node following the chip; an
    /// anchor is synthesized there when the chip has no follower. Returns `None`
    /// when the offset lies beyond the content.
    pub fn restore_caret(&mut self, offset: usize) -> Option<SurfaceCaret> {
        let mut count = 0;
        let mut index = 0;
        while index < self.nodes.len() {
            match &self.nodes[index] {
                SurfaceNode::Text(text) => {
                    let units = visible_len(text);
                    if count + units >= offset {
                        return Some(SurfaceCaret::new(index, raw_index(text, offset - count)));
                    }
                    count += units;
                }
                SurfaceNode::Chip(_) => {
                    if offset == count {
                        return Some(SurfaceCaret::new(index, 0));
                    }
                    if offset == count + 1 {
                        let follower = self.ensure_anchor_after(index);
                        return Some(SurfaceCaret::new(follower, 0));
                    }
                    count += 1;
                }
                SurfaceNode::Anchor => {
                    if offset == count {
                        return Some(SurfaceCaret::new(index, 0));
                    }
                }
            }
            index += 1;
        }
        if offset == count {
            Some(self.end_caret())
        } else {
            None
        }
    }

    pub fn end_caret(&self) -> SurfaceCaret {
        match self.nodes.last() {
            Some(SurfaceNode::Text(text)) => {
                SurfaceCaret::new(self.nodes.len() - 1, text.chars().count())
            }
            Some(SurfaceNode::Anchor) => SurfaceCaret::new(self.nodes.len() - 1, 0),
            Some(SurfaceNode::Chip(_)) | None => SurfaceCaret::new(self.nodes.len(), 0),
        }
    }

    /// Makes sure the node after `index` can hold a caret and returns its index.
    pub fn ensure_anchor_after(&mut self, index: usize) -> usize {
        let follower = index + 1;
        match self.nodes.get(follower) {
            Some(SurfaceNode::Anchor) => {}
            Some(SurfaceNode::Text(text)) if !text.is_empty() => {}
            Some(SurfaceNode::Text(_)) => self.nodes[follower] = SurfaceNode::Anchor,
            Some(SurfaceNode::Chip(_)) | None => self.nodes.insert(follower, SurfaceNode::Anchor),
        }
        follower
    }

    /// Native typing: inserts `text` at `caret` and returns the caret after it.
    pub fn insert_text_at(&mut self, caret: SurfaceCaret, text: &str) -> Option<SurfaceCaret> {
        if text.is_empty() || !self.contains(caret) {
            return None;
        }
        let count = text.chars().count();
        if caret.node == self.nodes.len() {
            self.nodes.push(SurfaceNode::Text(text.to_string()));
            return Some(SurfaceCaret::new(caret.node, count));
        }
        match &mut self.nodes[caret.node] {
            SurfaceNode::Text(existing) => {
                let byte_idx = char_to_byte_idx(existing, caret.offset);
                existing.insert_str(byte_idx, text);
                Some(SurfaceCaret::new(caret.node, caret.offset + count))
            }
            SurfaceNode::Anchor => {
                self.nodes[caret.node] = SurfaceNode::Text(text.to_string());
                Some(SurfaceCaret::new(caret.node, count))
            }
            SurfaceNode::Chip(_) => {
                let index = caret.node + caret.offset.min(1);
                self.nodes.insert(index, SurfaceNode::Text(text.to_string()));
                Some(SurfaceCaret::new(index, count))
            }
        }
    }

    /// Native Backspace on plain text. Returns `None` when the character left
    /// of the caret is not text (a chip, or nothing at all).
    pub fn delete_char_before(&mut self, caret: SurfaceCaret) -> Option<SurfaceCaret> {
        if !self.contains(caret) {
            return None;
        }
        if let Some(SurfaceNode::Text(text)) = self.nodes.get_mut(caret.node) {
            if let Some(target) = last_visible_before(text, caret.offset) {
                remove_char(text, target);
                return Some(SurfaceCaret::new(caret.node, target));
            }
        }
        let mut index = match self.nodes.get(caret.node) {
            Some(SurfaceNode::Chip(_)) if caret.offset == 1 => return None,
            _ => caret.node,
        };
        while index > 0 {
            index -= 1;
            match &mut self.nodes[index] {
                SurfaceNode::Text(text) => {
                    let len = text.chars().count();
                    if let Some(target) = last_visible_before(text, len) {
                        remove_char(text, target);
                        return Some(SurfaceCaret::new(index, target));
                    }
                }
                SurfaceNode::Anchor => {}
                SurfaceNode::Chip(_) => return None,
            }
        }
        None
    }

    /// Native Delete on plain text. Returns `None` when the character right of
    /// the caret is not text.
    pub fn delete_char_after(&mut self, caret: SurfaceCaret) -> Option<SurfaceCaret> {
        if !self.contains(caret) {
            return None;
        }
        if let Some(SurfaceNode::Text(text)) = self.nodes.get_mut(caret.node) {
            if let Some(target) = first_visible_from(text, caret.offset) {
                remove_char(text, target);
                return Some(caret);
            }
        }
        let mut index = match self.nodes.get(caret.node) {
            Some(SurfaceNode::Chip(_)) if caret.offset == 0 => return None,
            _ => caret.node + 1,
        };
        while index < self.nodes.len() {
            match &mut self.nodes[index] {
                SurfaceNode::Text(text) => {
                    if let Some(target) = first_visible_from(text, 0) {
                        remove_char(text, target);
                        return Some(caret);
                    }
                }
                SurfaceNode::Anchor => {}
                SurfaceNode::Chip(_) => return None,
            }
            index += 1;
        }
        None
    }

    /// Inserts `node` at `caret`, splitting a text node the caret sits inside.
    /// Returns the index of the inserted node.
    pub fn insert_node_at(&mut self, caret: SurfaceCaret, node: SurfaceNode) -> usize {
        let caret = if self.contains(caret) {
            caret
        } else {
            self.end_caret()
        };
        let index = match self.nodes.get_mut(caret.node) {
            None => self.nodes.len(),
            Some(SurfaceNode::Text(text)) => {
                let len = text.chars().count();
                if caret.offset == 0 {
                    caret.node
                } else if caret.offset >= len {
                    caret.node + 1
                } else {
                    let byte_idx = char_to_byte_idx(text, caret.offset);
                    let tail = text.split_off(byte_idx);
                    self.nodes.insert(caret.node + 1, SurfaceNode::Text(tail));
                    caret.node + 1
                }
            }
            Some(SurfaceNode::Anchor) => caret.node,
            Some(SurfaceNode::Chip(_)) => caret.node + caret.offset.min(1),
        };
        self.nodes.insert(index, node);
        index
    }

    /// The chip a Backspace at `caret` should swallow whole: the chip directly
    /// left of the caret, looking through anchors.
    pub fn chip_before(&self, caret: SurfaceCaret) -> Option<ChipId> {
        let start = match self.nodes.get(caret.node) {
            Some(SurfaceNode::Text(text)) => {
                if text.chars().take(caret.offset).any(|ch| !is_anchor_char(ch)) {
                    return None;
                }
                caret.node
            }
            Some(SurfaceNode::Chip(node)) if caret.offset >= 1 => return node.id,
            Some(_) | None => caret.node.min(self.nodes.len()),
        };
        self.nodes[..start]
            .iter()
            .rev()
            .find(|node| !node.is_blank())
            .and_then(SurfaceNode::chip_id)
    }

    /// The chip a Delete at `caret` should swallow whole.
    pub fn chip_after(&self, caret: SurfaceCaret) -> Option<ChipId> {
        let start = match self.nodes.get(caret.node) {
            Some(SurfaceNode::Text(text)) => {
                if text.chars().skip(caret.offset).any(|ch| !is_anchor_char(ch)) {
                    return None;
                }
                caret.node + 1
            }
            Some(SurfaceNode::Chip(node)) if caret.offset == 0 => return node.id,
            Some(_) => caret.node + 1,
            None => return None,
        };
        self.nodes
            .get(start..)?
            .iter()
            .find(|node| !node.is_blank())
            .and_then(SurfaceNode::chip_id)
    }
}

fn last_visible_before(text: &str, offset: usize) -> Option<usize> {
    text.chars()
        .take(offset)
        .enumerate()
        .filter(|(_, ch)| !is_anchor_char(*ch))
        .map(|(index, _)| index)
        .last()
}

fn first_visible_from(text: &str, offset: usize) -> Option<usize> {
    text.chars()
        .enumerate()
        .skip(offset)
        .find(|(_, ch)| !is_anchor_char(*ch))
        .map(|(index, _)| index)
}

fn remove_char(text: &mut String, index: usize) {
    let start = char_to_byte_idx(text, index);
    let end = char_to_byte_idx(text, index + 1);
    text.drain(start..end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::Qualifier;

    fn sample() -> (SegmentList, Chip) {
        let chip = Chip::catalog(Category::Verb, Some(Qualifier::Past));
        let list = SegmentList::from_segments(vec![
            Segment::Text("ab".into()),
            Segment::Placeholder(chip.clone()),
        ]);
        (list, chip)
    }

    #[test]
    fn projection_adds_anchor_after_trailing_chip() {
        let (list, chip) = sample();
        let surface = Surface::project(&list);
        assert_eq!(
            surface.nodes(),
            &[
                SurfaceNode::Text("ab".into()),
                SurfaceNode::Chip(ChipNode::from_chip(&chip)),
                SurfaceNode::Anchor,
            ]
        );
    }

    #[test]
    fn no_anchor_when_text_follows_chip() {
        let chip = Chip::catalog(Category::Noun, None);
        let list = SegmentList::from_segments(vec![
            Segment::Placeholder(chip),
            Segment::Text("!".into()),
        ]);
        let surface = Surface::project(&list);
        assert_eq!(surface.len(), 2);
    }

    #[test]
    fn read_back_reuses_identity_and_strips_anchors() {
        let (list, chip) = sample();
        let mut nodes = Surface::project(&list).nodes().to_vec();
        nodes.push(SurfaceNode::Text("\u{200E}c".into()));
        let rebuilt = Surface::from_nodes(nodes).read_back(&list);
        assert_eq!(rebuilt.segments().len(), 3);
        assert_eq!(rebuilt.find_chip(&chip.id()), Some(&chip));
        assert_eq!(rebuilt.visible_text(), "abVerb (Past)c");
    }

    #[test]
    fn read_back_mints_identity_for_anonymous_chip_nodes() {
        let node = ChipNode {
            id: None,
            type_name: "COLOR".into(),
            qualifier: None,
            label: "Color".into(),
            custom: false,
        };
        let surface = Surface::from_nodes(vec![SurfaceNode::Chip(node.clone()), SurfaceNode::Chip(node)]);
        let rebuilt = surface.read_back(&SegmentList::new());
        let ids: Vec<_> = rebuilt.chips().map(Chip::id).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(rebuilt.chips().next().unwrap().category(), Some(Category::Color));
    }

    #[test]
    fn offsets_count_chips_as_one() {
        let (list, _) = sample();
        let surface = Surface::project(&list);
        assert_eq!(surface.offset_of(SurfaceCaret::new(0, 1)), Some(1));
        assert_eq!(surface.offset_of(SurfaceCaret::new(1, 1)), Some(3));
        assert_eq!(surface.offset_of(SurfaceCaret::new(2, 0)), Some(3));
        assert_eq!(surface.offset_of(SurfaceCaret::new(0, 9)), None);
    }

    #[test]
    fn restore_after_chip_lands_in_anchor() {
        let (_, chip) = sample();
        let mut surface = Surface::from_nodes(vec![
            SurfaceNode::Text("ab".into()),
            SurfaceNode::Chip(ChipNode::from_chip(&chip)),
        ]);

        let caret = surface.restore_caret(3).unwrap();

        assert_eq!(caret, SurfaceCaret::new(2, 0));
        assert_eq!(surface.nodes()[2], SurfaceNode::Anchor);
    }

    #[test]
    fn restore_beyond_content_fails() {
        let (list, _) = sample();
        let mut surface = Surface::project(&list);
        assert_eq!(surface.restore_caret(10), None);
    }

    #[test]
    fn restore_before_leading_chip() {
        let chip = Chip::catalog(Category::Noun, None);
        let list = SegmentList::from_segments(vec![Segment::Placeholder(chip)]);
        let mut surface = Surface::project(&list);
        assert_eq!(surface.restore_caret(0), Some(SurfaceCaret::new(0, 0)));
        assert_eq!(surface.restore_caret(1), Some(SurfaceCaret::new(1, 0)));
    }

    #[test]
    fn typing_into_anchor_turns_it_into_text() {
        let (list, _) = sample();
        let mut surface = Surface::project(&list);
        let caret = surface.insert_text_at(SurfaceCaret::new(2, 0), "xy").unwrap();
        assert_eq!(caret, SurfaceCaret::new(2, 2));
        assert_eq!(surface.nodes()[2], SurfaceNode::Text("xy".into()));
    }

    #[test]
    fn chip_before_looks_through_anchor() {
        let (list, chip) = sample();
        let surface = Surface::project(&list);
        assert_eq!(surface.chip_before(SurfaceCaret::new(2, 0)), Some(chip.id()));
        assert_eq!(surface.chip_before(SurfaceCaret::new(0, 2)), None);
        assert_eq!(surface.chip_after(SurfaceCaret::new(0, 2)), Some(chip.id()));
        assert_eq!(surface.chip_after(SurfaceCaret::new(0, 1)), None);
    }

    #[test]
    fn native_backspace_refuses_to_eat_chips() {
        let (list, _) = sample();
        let mut surface = Surface::project(&list);
        assert_eq!(surface.delete_char_before(SurfaceCaret::new(2, 0)), None);
        assert_eq!(
            surface.delete_char_before(SurfaceCaret::new(0, 2)),
            Some(SurfaceCaret::new(0, 1))
        );
        assert_eq!(surface.nodes()[0], SurfaceNode::Text("a".into()));
    }

    #[test]
    fn inserting_node_mid_text_splits_it() {
        let list = SegmentList::from_segments(vec![Segment::Text("hello".into())]);
        let mut surface = Surface::project(&list);
        let chip = Chip::catalog(Category::Color, None);
        let index = surface.insert_node_at(
            SurfaceCaret::new(0, 2),
            SurfaceNode::Chip(ChipNode::from_chip(&chip)),
        );
        assert_eq!(index, 1);
        assert_eq!(surface.nodes()[0], SurfaceNode::Text("he".into()));
        assert_eq!(surface.nodes()[2], SurfaceNode::Text("llo".into()));
    }
}
