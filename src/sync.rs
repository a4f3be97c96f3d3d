use std::time::{Duration, Instant};

use crate::chip::{Chip, ChipId};
use crate::editor::{CursorOffset, EditEvent, StoryEditor, plain_text};
use crate::surface::{ChipNode, Surface, SurfaceCaret, SurfaceNode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Reconciling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingRestore {
    offset: usize,
    due: Instant,
}

/// Keeps the rendered [`Surface`] and the [`StoryEditor`] model in step.
///
/// Every mutation runs one pass: snapshot the caret as a unit offset, rebuild
/// the model from the surface (or apply the edit to the model directly),
/// re-project the surface, then place the caret at the snapshot offset. The
/// placement is confirmed again once [`Synchronizer::flush`] runs after the
/// frame is drawn.
#[derive(Debug)]
pub struct Synchronizer {
    surface: Option<Surface>,
    caret: SurfaceCaret,
    state: SyncState,
    pending: Option<PendingRestore>,
    restore_delay: Duration,
}

impl Synchronizer {
    /// Projects `editor` onto a fresh surface with the caret at the editor's cursor.
    pub fn attach(editor: &StoryEditor, restore_delay: Duration) -> Self {
        let mut surface = Surface::project(editor.segments());
        let caret = surface
            .restore_caret(editor.cursor().get())
            .unwrap_or_else(|| surface.end_caret());
        Self {
            surface: Some(surface),
            caret,
            state: SyncState::Idle,
            pending: None,
            restore_delay,
        }
    }

    /// Drops the surface. Later passes and deferred restores become no-ops.
    pub fn detach(&mut self) {
        self.surface = None;
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn caret(&self) -> SurfaceCaret {
        self.caret
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn has_pending_restore(&self) -> bool {
        self.pending.is_some()
    }

    /// Moves the caret, e.g. after a click. Carets outside the surface are ignored.
    pub fn set_caret(&mut self, editor: &mut StoryEditor, caret: SurfaceCaret) -> bool {
        self.flush();
        let Some(surface) = self.surface.as_ref() else {
            return false;
        };
        let Some(offset) = surface.offset_of(caret) else {
            return false;
        };
        self.caret = caret;
        editor.set_cursor(offset)
    }

    /// Native typing at the caret.
    pub fn handle_input(&mut self, editor: &mut StoryEditor, text: &str) -> bool {
        self.flush();
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        let Some(caret) = surface.insert_text_at(self.caret, text) else {
            return false;
        };
        self.caret = caret;
        self.reconcile(editor)
    }

    /// Clipboard content is reduced to plain text before it reaches the surface.
    pub fn paste(&mut self, editor: &mut StoryEditor, text: &str) -> bool {
        let text = plain_text(text);
        if text.is_empty() {
            return false;
        }
        self.handle_input(editor, &text)
    }

    /// Removes the chip left of the caret as a whole, or one character of text.
    pub fn backspace(&mut self, editor: &mut StoryEditor) -> bool {
        self.flush();
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        if let Some(id) = surface.chip_before(self.caret) {
            return self.remove_chip(editor, &id);
        }
        match surface.delete_char_before(self.caret) {
            Some(caret) => {
                self.caret = caret;
                self.reconcile(editor)
            }
            None => false,
        }
    }

    pub fn delete(&mut self, editor: &mut StoryEditor) -> bool {
        self.flush();
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        if let Some(id) = surface.chip_after(self.caret) {
            return self.remove_chip(editor, &id);
        }
        match surface.delete_char_after(self.caret) {
            Some(caret) => {
                self.caret = caret;
                self.reconcile(editor)
            }
            None => false,
        }
    }

    /// Programmatic delete. An id that is no longer in the story is a no-op.
    pub fn remove_chip(&mut self, editor: &mut StoryEditor, id: &ChipId) -> bool {
        self.dispatch(editor, &EditEvent::RemoveChip(*id))
    }

    pub fn insert_chip_at_caret(&mut self, editor: &mut StoryEditor, chip: Chip) -> bool {
        self.dispatch(editor, &EditEvent::InsertChip(chip))
    }

    /// Places a chip node at `at`, splitting text if needed, and leaves the caret
    /// in the anchor right after it once the pass completes.
    pub fn insert_chip_node(
        &mut self,
        editor: &mut StoryEditor,
        at: SurfaceCaret,
        chip: &Chip,
    ) -> bool {
        self.flush();
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        let index = surface.insert_node_at(at, SurfaceNode::Chip(ChipNode::from_chip(chip)));
        let anchor = surface.ensure_anchor_after(index);
        self.caret = SurfaceCaret::new(anchor, 0);
        self.reconcile(editor)
    }

    /// Applies a model-side edit and re-projects the surface from the result.
    pub fn dispatch(&mut self, editor: &mut StoryEditor, event: &EditEvent) -> bool {
        self.flush();
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        self.state = SyncState::Reconciling;
        let offset = surface
            .offset_of(self.caret)
            .unwrap_or_else(|| surface.units());
        editor.set_cursor(offset);
        let changed = editor.apply(event);
        *surface = Surface::project(editor.segments());
        let cursor = editor.cursor().get();
        self.caret = interim_caret(surface, cursor);
        tracing::trace!(?event, cursor, "dispatched edit");
        self.defer_restore(cursor);
        changed
    }

    /// Runs the deferred caret restore, if one is waiting.
    ///
    /// Returns whether a restore ran. With the surface detached the pending
    /// restore is discarded.
    pub fn flush(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        let Some(surface) = self.surface.as_mut() else {
            tracing::debug!("surface detached before caret restore");
            self.state = SyncState::Idle;
            return false;
        };
        self.caret = match surface.restore_caret(pending.offset) {
            Some(caret) => caret,
            None => {
                tracing::debug!(offset = pending.offset, "caret restore drifted, placing at end");
                surface.end_caret()
            }
        };
        self.state = SyncState::Idle;
        true
    }

    /// Flushes only once the restore delay has elapsed.
    pub fn flush_due(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(pending) if now >= pending.due => self.flush(),
            _ => false,
        }
    }

    /// Time left until the pending restore is due.
    pub fn restore_deadline(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.due)
    }

    fn reconcile(&mut self, editor: &mut StoryEditor) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        self.state = SyncState::Reconciling;
        let offset = surface
            .offset_of(self.caret)
            .unwrap_or_else(|| surface.units());
        let segments = surface.read_back(editor.segments());
        let changed = segments != *editor.segments();
        *surface = Surface::project(&segments);
        self.caret = interim_caret(surface, offset);
        tracing::trace!(
            offset,
            segments = segments.segments().len(),
            chips = segments.chip_count(),
            "reconciled surface"
        );
        editor.replace(segments, CursorOffset(offset));
        self.defer_restore(offset);
        changed
    }

    fn defer_restore(&mut self, offset: usize) {
        self.pending = Some(PendingRestore {
            offset,
            due: Instant::now() + self.restore_delay,
        });
    }
}

/// Caret shown between a pass and its flush, so frames drawn in between
/// already sit where the user was typing.
fn interim_caret(surface: &mut Surface, offset: usize) -> SurfaceCaret {
    surface
        .restore_caret(offset)
        .unwrap_or_else(|| surface.end_caret())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::chip::{Category, Qualifier};
    use crate::editor::{Segment, SegmentList};

    fn assert_in_step(sync: &Synchronizer, editor: &StoryEditor) {
        let surface = sync.surface().unwrap();
        let model = editor.segments();
        assert_eq!(&surface.read_back(model), model);
        assert_eq!(surface.offset_of(sync.caret()), Some(editor.cursor().get()));

        let segments = model.segments();
        for pair in segments.windows(2) {
            assert!(!(pair[0].is_text() && pair[1].is_text()), "{segments:?}");
        }
        assert!(!segments.contains(&Segment::Text(String::new())));
        let ids: HashSet<_> = model.chips().map(Chip::id).collect();
        assert_eq!(ids.len(), model.chip_count());
    }

    fn editor_with_trailing_chip() -> (StoryEditor, Chip) {
        let chip = Chip::catalog(Category::Verb, Some(Qualifier::Past));
        let list = SegmentList::from_segments(vec![
            Segment::Text("I ".into()),
            Segment::Placeholder(chip.clone()),
        ]);
        (StoryEditor::with_segments(list), chip)
    }

    #[test]
    fn typing_goes_through_reconciliation() {
        let mut editor = StoryEditor::new();
        let mut sync = Synchronizer::attach(&editor, Duration::ZERO);

        assert!(sync.handle_input(&mut editor, "hi"));
        assert_eq!(sync.state(), SyncState::Reconciling);
        assert!(sync.flush());
        assert_eq!(sync.state(), SyncState::Idle);

        assert_eq!(editor.segments().visible_text(), "hi");
        assert_eq!(editor.cursor().get(), 2);
        assert_eq!(sync.caret(), SurfaceCaret::new(0, 2));
    }

    #[test]
    fn caret_after_chip_lives_in_anchor() {
        let (mut editor, _) = editor_with_trailing_chip();
        let mut sync = Synchronizer::attach(&editor, Duration::ZERO);
        assert_eq!(sync.caret(), SurfaceCaret::new(2, 0));

        sync.handle_input(&mut editor, " today");
        sync.flush();

        assert_eq!(editor.segments().visible_text(), "I Verb (Past) today");
        assert_eq!(editor.cursor().get(), 9);
        assert_eq!(sync.caret(), SurfaceCaret::new(2, 6));
    }

    #[test]
    fn one_backspace_removes_a_whole_chip() {
        let (mut editor, chip) = editor_with_trailing_chip();
        let mut sync = Synchronizer::attach(&editor, Duration::ZERO);

        assert!(sync.backspace(&mut editor));
        sync.flush();

        assert!(!editor.segments().contains_chip(&chip.id()));
        assert_eq!(editor.segments().segments(), &[Segment::Text("I ".into())]);
        assert_eq!(editor.cursor().get(), 2);
    }

    #[test]
    fn delete_before_chip_removes_it() {
        let (mut editor, _) = editor_with_trailing_chip();
        editor.set_cursor(2);
        let mut sync = Synchronizer::attach(&editor, Duration::ZERO);

        assert!(sync.delete(&mut editor));
        sync.flush();

        assert_eq!(editor.segments().chip_count(), 0);
        assert_eq!(editor.segments().visible_text(), "I ");
    }

    #[test]
    fn backspace_in_text_removes_one_character() {
        let (mut editor, _) = editor_with_trailing_chip();
        editor.set_cursor(1);
        let mut sync = Synchronizer::attach(&editor, Duration::ZERO);

        assert!(sync.backspace(&mut editor));
        sync.flush();

        assert_eq!(editor.segments().visible_text(), " Verb (Past)");
        assert_eq!(editor.cursor().get(), 0);
    }

    #[test]
    fn paste_is_plain_text() {
        let mut editor = StoryEditor::new();
        let mut sync = Synchronizer::attach(&editor, Duration::ZERO);

        sync.paste(&mut editor, "a\u{200B}b\r\nc\u{1b}");
        sync.flush();

        assert_eq!(editor.segments().visible_text(), "ab\nc");
        assert_eq!(editor.segments().chip_count(), 0);
    }

    #[test]
    fn next_event_flushes_pending_restore() {
        let mut editor = StoryEditor::new();
        let mut sync = Synchronizer::attach(&editor, Duration::from_secs(60));

        sync.handle_input(&mut editor, "a");
        assert!(sync.has_pending_restore());
        sync.handle_input(&mut editor, "b");

        assert_eq!(editor.segments().visible_text(), "ab");
    }

    #[test]
    fn deferred_restore_after_detach_is_noop() {
        let mut editor = StoryEditor::new();
        let mut sync = Synchronizer::attach(&editor, Duration::ZERO);

        sync.handle_input(&mut editor, "a");
        sync.detach();

        assert!(!sync.flush());
        assert_eq!(sync.state(), SyncState::Idle);
        assert!(!sync.handle_input(&mut editor, "b"));
    }

    #[test]
    fn removing_absent_chip_changes_nothing() {
        let (mut editor, chip) = editor_with_trailing_chip();
        let mut sync = Synchronizer::attach(&editor, Duration::ZERO);
        assert!(sync.remove_chip(&mut editor, &chip.id()));
        sync.flush();
        let before = editor.segments().clone();

        assert!(!sync.remove_chip(&mut editor, &chip.id()));
        assert_eq!(editor.segments(), &before);
    }

    #[test]
    fn caret_is_in_place_before_the_flush() {
        let list = SegmentList::from_segments(vec![Segment::Text("one\ntwo\nthree".into())]);
        let mut editor = StoryEditor::with_segments(list);
        editor.set_cursor(0);
        let mut sync = Synchronizer::attach(&editor, Duration::from_secs(60));

        sync.handle_input(&mut editor, "x");
        assert!(sync.has_pending_restore());
        assert_eq!(sync.caret(), SurfaceCaret::new(0, 1));

        sync.dispatch(&mut editor, &EditEvent::MoveRight);
        assert_eq!(sync.caret(), SurfaceCaret::new(0, 2));
        sync.flush();
        assert_eq!(sync.caret(), SurfaceCaret::new(0, 2));
    }

    #[test]
    fn random_interleavings_stay_in_step() {
        let words = ["a", "bc", " ", "déjà", "\n", "xyz "];
        for seed in 0..48 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut editor = StoryEditor::new();
            let mut sync = Synchronizer::attach(&editor, Duration::from_secs(60));

            for _ in 0..60 {
                let len = editor.len();
                let category = Category::ALL[rng.gen_range(0..Category::ALL.len())];
                match rng.gen_range(0..9) {
                    0 | 1 => {
                        let word = words[rng.gen_range(0..words.len())];
                        sync.handle_input(&mut editor, word);
                    }
                    2 => {
                        let at = sync.caret();
                        sync.insert_chip_node(&mut editor, at, &Chip::catalog(category, None));
                    }
                    3 => {
                        sync.insert_chip_at_caret(&mut editor, Chip::catalog(category, None));
                    }
                    4 => {
                        sync.backspace(&mut editor);
                    }
                    5 => {
                        sync.delete(&mut editor);
                    }
                    6 => {
                        let to = rng.gen_range(0..=len);
                        sync.dispatch(&mut editor, &EditEvent::MoveTo(to));
                    }
                    7 => {
                        let chips: Vec<ChipId> = editor.segments().chips().map(Chip::id).collect();
                        if !chips.is_empty() {
                            let id = chips[rng.gen_range(0..chips.len())];
                            assert!(sync.remove_chip(&mut editor, &id));
                        }
                    }
                    _ => {
                        sync.flush();
                    }
                }
                assert_in_step(&sync, &editor);
            }
        }
    }

    #[test]
    fn flush_due_waits_for_the_delay() {
        let mut editor = StoryEditor::new();
        let mut sync = Synchronizer::attach(&editor, Duration::from_secs(60));
        sync.handle_input(&mut editor, "a");

        assert!(!sync.flush_due(Instant::now()));
        let deadline = sync.restore_deadline().unwrap();
        assert!(sync.flush_due(deadline));
    }
}
