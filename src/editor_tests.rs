use super::*;
use crate::chip::{Category, Qualifier};

fn editor_from(segments: Vec<Segment>) -> StoryEditor {
    StoryEditor::with_segments(SegmentList::from_segments(segments))
}

#[test]
fn typing_into_an_empty_story() {
    let mut editor = StoryEditor::new();
    assert!(editor.is_empty());
    for ch in "Hi there".chars() {
        assert!(editor.insert_char(ch));
    }
    assert_eq!(editor.segments().visible_text(), "Hi there");
    assert_eq!(editor.cursor(), CursorOffset(8));
}

#[test]
fn commands_report_whether_anything_changed() {
    let mut editor = StoryEditor::new();
    assert!(!editor.backspace());
    assert!(!editor.delete());
    assert!(!editor.move_left());
    assert!(!editor.insert_str(""));
    assert!(editor.insert_str("ab"));
    assert!(editor.move_to_start());
    assert!(!editor.move_to_start());
}

#[test]
fn with_segments_starts_at_the_end() {
    let editor = editor_from(vec![
        Segment::Text("ab".into()),
        Segment::Placeholder(Chip::catalog(Category::Noun, None)),
    ]);
    assert_eq!(editor.cursor(), CursorOffset(3));
    assert_eq!(editor.len(), 3);
}

#[test]
fn chip_neighbours_of_the_cursor() {
    let chip = Chip::catalog(Category::Emotion, None);
    let mut editor = editor_from(vec![
        Segment::Text("so ".into()),
        Segment::Placeholder(chip.clone()),
        Segment::Text("!".into()),
    ]);
    editor.set_cursor(4);
    assert_eq!(editor.chip_before_cursor(), Some(&chip));
    assert_eq!(editor.chip_after_cursor(), None);
    editor.set_cursor(3);
    assert_eq!(editor.chip_before_cursor(), None);
    assert_eq!(editor.chip_after_cursor(), Some(&chip));
}

#[test]
fn one_backspace_per_chip() {
    let chip = Chip::catalog(Category::Verb, Some(Qualifier::Gerund));
    let mut editor = editor_from(vec![
        Segment::Text("keep ".into()),
        Segment::Placeholder(chip.clone()),
    ]);

    assert!(editor.backspace());

    assert!(!editor.segments().contains_chip(&chip.id()));
    assert_eq!(editor.segments().visible_text(), "keep ");
    assert_eq!(editor.cursor(), CursorOffset(5));
}

#[test]
fn insert_and_remove_chip_by_id() {
    let mut editor = StoryEditor::new();
    editor.insert_str("a b");
    editor.set_cursor(2);
    let chip = Chip::custom("Banana");

    assert!(editor.insert_chip(chip.clone()));
    assert!(!editor.insert_chip(chip.clone()));
    assert_eq!(editor.cursor(), CursorOffset(3));

    assert!(editor.remove_chip(&chip.id()));
    assert!(!editor.remove_chip(&chip.id()));
    assert_eq!(editor.segments().visible_text(), "a b");
    assert_eq!(editor.cursor(), CursorOffset(2));
}

#[test]
fn word_motion_over_text() {
    let mut editor = editor_from(vec![Segment::Text("one two  three".into())]);
    editor.move_to_start();
    assert!(editor.move_word_right());
    assert_eq!(editor.cursor(), CursorOffset(4));
    assert!(editor.move_word_right());
    assert_eq!(editor.cursor(), CursorOffset(9));
    editor.move_to_end();
    assert!(editor.move_word_left());
    assert_eq!(editor.cursor(), CursorOffset(9));
}

#[test]
fn word_motion_stops_at_chips() {
    let mut editor = editor_from(vec![
        Segment::Text("ab".into()),
        Segment::Placeholder(Chip::catalog(Category::Size, None)),
        Segment::Text("cd".into()),
    ]);
    editor.move_to_start();
    editor.move_word_right();
    assert_eq!(editor.cursor(), CursorOffset(3));
    editor.move_to_end();
    editor.move_word_left();
    assert_eq!(editor.cursor(), CursorOffset(2));
}

#[test]
fn paste_goes_in_as_text() {
    let mut editor = StoryEditor::new();
    assert!(editor.paste("x\u{200B}y"));
    assert_eq!(editor.segments().segments(), &[Segment::Text("xy".into())]);
}

#[test]
fn insert_chip_at_explicit_offset() {
    let mut editor = editor_from(vec![Segment::Text("abcd".into())]);
    let chip = Chip::catalog(Category::Color, None);
    assert!(editor.insert_chip_at(1, chip.clone()));
    assert_eq!(editor.cursor(), CursorOffset(2));
    assert_eq!(editor.segments().chip_position(&chip.id()), Some(1));
}
