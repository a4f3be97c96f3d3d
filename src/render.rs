use ratatui::text::{Line, Span};
use ratatui::style::Style;
use unicode_width::UnicodeWidthChar;

use crate::compile::{Token, TokenStream};
use crate::surface::{Surface, SurfaceCaret, SurfaceNode};
use crate::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorVisualPosition {
    pub line: usize,
    pub column: u16,
}

#[derive(Debug)]
pub struct RenderResult {
    pub lines: Vec<Line<'static>>,
    pub cursor: Option<CursorVisualPosition>,
    pub total_lines: usize,
    pub layout: SurfaceLayout,
}

/// Cells a chip occupies on one line, `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipBox {
    pub node: usize,
    pub line: usize,
    pub start: u16,
    pub end: u16,
}

impl ChipBox {
    /// Column of the `×` close button.
    pub fn close_column(&self) -> u16 {
        self.end.saturating_sub(2)
    }
}

/// Bounding box of a text node, used for geometry-based hit testing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextBox {
    pub node: usize,
    pub top: usize,
    pub bottom: usize,
    pub left: u16,
    pub right: u16,
    pub chars: usize,
}

/// Where every caret stop of a rendered surface ended up.
#[derive(Clone, Debug, Default)]
pub struct SurfaceLayout {
    width: usize,
    height: usize,
    carets: Vec<(SurfaceCaret, CursorVisualPosition)>,
    chips: Vec<ChipBox>,
    text_boxes: Vec<TextBox>,
}

impl SurfaceLayout {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Grows the bounds to cover the whole viewport, not just the drawn lines.
    pub fn extend_height(&mut self, height: usize) {
        self.height = self.height.max(height);
    }

    pub fn contains(&self, x: u16, y: usize) -> bool {
        (x as usize) < self.width && y < self.height
    }

    pub fn carets(&self) -> &[(SurfaceCaret, CursorVisualPosition)] {
        &self.carets
    }

    pub fn position_of(&self, caret: SurfaceCaret) -> Option<CursorVisualPosition> {
        self.carets
            .iter()
            .find(|(candidate, _)| *candidate == caret)
            .map(|(_, position)| *position)
    }

    /// The caret stop drawn exactly at `(x, y)`.
    pub fn caret_at(&self, x: u16, y: usize) -> Option<SurfaceCaret> {
        self.carets
            .iter()
            .find(|(_, position)| position.line == y && position.column == x)
            .map(|(caret, _)| *caret)
    }

    /// The caret stop closest to column `x` on line `y`.
    pub fn nearest_caret_on_line(&self, x: u16, y: usize) -> Option<SurfaceCaret> {
        self.carets
            .iter()
            .filter(|(_, position)| position.line == y)
            .min_by_key(|(_, position)| position.column.abs_diff(x))
            .map(|(caret, _)| *caret)
    }

    pub fn chips(&self) -> &[ChipBox] {
        &self.chips
    }

    pub fn chip_at(&self, x: u16, y: usize) -> Option<ChipBox> {
        self.chips
            .iter()
            .find(|chip| chip.line == y && chip.start <= x && x < chip.end)
            .copied()
    }

    pub fn text_boxes(&self) -> &[TextBox] {
        &self.text_boxes
    }
}

pub fn render_surface(
    surface: &Surface,
    caret: Option<SurfaceCaret>,
    width: usize,
    theme: &Theme,
) -> RenderResult {
    let mut renderer = Renderer::new(width.max(1));
    renderer.render_surface(surface, theme);
    renderer.finish(surface, caret)
}

/// Lays out a compiled story with its blanks highlighted.
pub fn render_tokens(tokens: &TokenStream, width: usize, theme: &Theme) -> Vec<Line<'static>> {
    let mut renderer = Renderer::new(width.max(1));
    let mut fragments = Vec::new();
    for token in tokens {
        match token {
            Token::Plain(text) => {
                tokenize_text(text, Style::default(), None, &mut fragments);
            }
            Token::Blank { text, .. } => {
                fragments.push(FragmentItem::Token(atomic_fragment(
                    format!("[{text}]"),
                    theme.blank_style(),
                    Vec::new(),
                )));
            }
        }
    }
    let lines = wrap_fragments(&fragments, renderer.wrap_width);
    renderer.consume_lines(lines);
    if renderer.lines.is_empty() {
        renderer.lines.push(Line::from(""));
    }
    renderer.lines
}

/// Text shown for a chip node.
pub fn chip_text(label: &str) -> String {
    format!("[{label} ×]")
}

struct Renderer {
    wrap_width: usize,
    lines: Vec<Line<'static>>,
    current_line_index: usize,
    carets: Vec<(SurfaceCaret, CursorVisualPosition)>,
}

impl Renderer {
    fn new(wrap_width: usize) -> Self {
        Self {
            wrap_width,
            lines: Vec::new(),
            current_line_index: 0,
            carets: Vec::new(),
        }
    }

    fn render_surface(&mut self, surface: &Surface, theme: &Theme) {
        let mut fragments = Vec::new();
        for (index, node) in surface.nodes().iter().enumerate() {
            match node {
                SurfaceNode::Text(text) => {
                    tokenize_text(text, Style::default(), Some(index), &mut fragments);
                }
                SurfaceNode::Chip(chip) => {
                    let text = chip_text(&chip.label);
                    let width = visible_width(&text);
                    fragments.push(FragmentItem::Token(atomic_fragment(
                        text,
                        theme.chip_style(chip.custom),
                        vec![
                            TextEvent {
                                offset: 0,
                                caret: SurfaceCaret::new(index, 0),
                            },
                            TextEvent {
                                offset: width,
                                caret: SurfaceCaret::new(index, 1),
                            },
                        ],
                    )));
                }
                SurfaceNode::Anchor => {
                    fragments.push(FragmentItem::Token(atomic_fragment(
                        String::new(),
                        Style::default(),
                        vec![TextEvent {
                            offset: 0,
                            caret: SurfaceCaret::new(index, 0),
                        }],
                    )));
                }
            }
        }
        if surface.is_empty() {
            fragments.push(FragmentItem::Token(atomic_fragment(
                String::new(),
                Style::default(),
                vec![TextEvent {
                    offset: 0,
                    caret: surface.end_caret(),
                }],
            )));
        }
        let lines = wrap_fragments(&fragments, self.wrap_width);
        self.consume_lines(lines);
    }

    fn consume_lines(&mut self, outputs: Vec<LineOutput>) {
        for output in outputs {
            let mut spans: Vec<Span<'static>> = Vec::with_capacity(output.spans.len());
            for segment in output.spans {
                spans.push(Span::styled(segment.text, segment.style));
            }
            for event in output.events {
                let position = CursorVisualPosition {
                    line: self.current_line_index,
                    column: event.column,
                };
                self.carets.push((event.caret, position));
            }
            self.lines.push(Line::from(spans));
            self.current_line_index += 1;
        }
    }

    fn finish(mut self, surface: &Surface, caret: Option<SurfaceCaret>) -> RenderResult {
        if self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        let total_lines = self.lines.len();

        let mut chips = Vec::new();
        let mut text_boxes = Vec::new();
        for (index, node) in surface.nodes().iter().enumerate() {
            let stops: Vec<CursorVisualPosition> = self
                .carets
                .iter()
                .filter(|(caret, _)| caret.node == index)
                .map(|(_, position)| *position)
                .collect();
            let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
                continue;
            };
            match node {
                SurfaceNode::Chip(_) => chips.push(ChipBox {
                    node: index,
                    line: first.line,
                    start: first.column,
                    end: last.column,
                }),
                SurfaceNode::Text(text) => text_boxes.push(TextBox {
                    node: index,
                    top: first.line,
                    bottom: last.line,
                    left: stops.iter().map(|p| p.column).min().unwrap_or(0),
                    right: stops.iter().map(|p| p.column).max().unwrap_or(0),
                    chars: text.chars().count(),
                }),
                SurfaceNode::Anchor => {}
            }
        }

        let layout = SurfaceLayout {
            width: self.wrap_width,
            height: total_lines,
            carets: self.carets,
            chips,
            text_boxes,
        };
        let cursor = caret.and_then(|caret| layout.position_of(caret));

        RenderResult {
            lines: self.lines,
            cursor,
            total_lines,
            layout,
        }
    }
}

#[derive(Clone)]
struct LineSegment {
    text: String,
    style: Style,
}

#[derive(Clone)]
struct LineOutput {
    spans: Vec<LineSegment>,
    events: Vec<LocatedEvent>,
}

#[derive(Clone, Copy)]
struct LocatedEvent {
    column: u16,
    caret: SurfaceCaret,
}

#[derive(Clone)]
struct Fragment {
    text: String,
    style: Style,
    kind: FragmentKind,
    width: usize,
    events: Vec<TextEvent>,
}

#[derive(Clone, Copy)]
enum FragmentKind {
    Word,
    Whitespace,
}

#[derive(Clone)]
enum FragmentItem {
    Token(Fragment),
    LineBreak,
}

#[derive(Clone, Copy)]
struct TextEvent {
    offset: usize,
    caret: SurfaceCaret,
}

fn atomic_fragment(text: String, style: Style, events: Vec<TextEvent>) -> Fragment {
    let width = visible_width(&text);
    Fragment {
        text,
        style,
        kind: FragmentKind::Word,
        width,
        events,
    }
}

/// Splits `text` into word and whitespace fragments. With `node` set, a caret
/// stop is recorded before every character and after the last one.
fn tokenize_text(
    text: &str,
    style: Style,
    node: Option<usize>,
    fragments: &mut Vec<FragmentItem>,
) {
    let mut builder: Option<TokenBuilder> = None;
    let mut pending_events: Vec<TextEvent> = Vec::new();
    let mut buffer: Vec<char> = Vec::new();
    let mut count = 0;
    for ch in text.chars() {
        if let Some(node) = node {
            pending_events.push(TextEvent {
                offset: 0,
                caret: SurfaceCaret::new(node, count),
            });
        }
        count += 1;
        if ch == '\r' {
            continue;
        }
        if ch == '\n' {
            if let Some(mut token) = builder.take() {
                token.add_events(&mut pending_events);
                fragments.push(FragmentItem::Token(token.finish()));
            } else if !pending_events.is_empty() {
                fragments.push(FragmentItem::Token(Fragment {
                    text: String::new(),
                    style,
                    kind: FragmentKind::Word,
                    width: 0,
                    events: pending_events.drain(..).collect(),
                }));
            }
            fragments.push(FragmentItem::LineBreak);
            continue;
        }

        buffer.clear();
        if ch == '\t' {
            buffer.extend_from_slice(&[' '; 4]);
        } else {
            buffer.push(ch);
        }
        for actual in &buffer {
            let is_whitespace = actual.is_whitespace();
            if builder
                .as_ref()
                .is_some_and(|existing| existing.kind_matches(is_whitespace))
            {
                if let Some(current) = builder.as_mut() {
                    current.add_events(&mut pending_events);
                    current.push_char(*actual);
                }
            } else {
                if let Some(mut existing) = builder.take() {
                    existing.add_events(&mut pending_events);
                    fragments.push(FragmentItem::Token(existing.finish()));
                }
                let mut new_builder = TokenBuilder::new(style, is_whitespace);
                new_builder.add_events(&mut pending_events);
                new_builder.push_char(*actual);
                builder = Some(new_builder);
            }
        }
    }
    if let Some(node) = node {
        pending_events.push(TextEvent {
            offset: 0,
            caret: SurfaceCaret::new(node, count),
        });
    }

    if let Some(mut token) = builder {
        token.add_events(&mut pending_events);
        fragments.push(FragmentItem::Token(token.finish()));
    } else if !pending_events.is_empty() {
        fragments.push(FragmentItem::Token(Fragment {
            text: String::new(),
            style,
            kind: FragmentKind::Word,
            width: 0,
            events: pending_events,
        }));
    }
}

struct TokenBuilder {
    text: String,
    style: Style,
    kind: FragmentKind,
    width: usize,
    events: Vec<TextEvent>,
}

impl TokenBuilder {
    fn new(style: Style, is_whitespace: bool) -> Self {
        Self {
            text: String::new(),
            style,
            kind: if is_whitespace {
                FragmentKind::Whitespace
            } else {
                FragmentKind::Word
            },
            width: 0,
            events: Vec::new(),
        }
    }

    fn kind_matches(&self, is_whitespace: bool) -> bool {
        matches!(
            (self.kind, is_whitespace),
            (FragmentKind::Whitespace, true) | (FragmentKind::Word, false)
        )
    }

    fn add_events(&mut self, pending: &mut Vec<TextEvent>) {
        for mut event in pending.drain(..) {
            event.offset = self.width;
            self.events.push(event);
        }
    }

    fn push_char(&mut self, ch: char) {
        self.text.push(ch);
        self.width += UnicodeWidthChar::width(ch).unwrap_or(0);
    }

    fn finish(self) -> Fragment {
        Fragment {
            text: self.text,
            style: self.style,
            kind: self.kind,
            width: self.width,
            events: self.events,
        }
    }
}

fn wrap_fragments(fragments: &[FragmentItem], width: usize) -> Vec<LineOutput> {
    let mut outputs = Vec::new();
    let mut builder = LineBuilder::new();
    let mut pending_whitespace: Vec<Fragment> = Vec::new();

    for fragment in fragments {
        match fragment {
            FragmentItem::LineBreak => {
                builder.consume_pending(&mut pending_whitespace);
                outputs.push(builder.build_line());
                builder = LineBuilder::new();
            }
            FragmentItem::Token(token) => match token.kind {
                FragmentKind::Whitespace => {
                    pending_whitespace.push(token.clone());
                }
                FragmentKind::Word => {
                    let whitespace_width: usize =
                        pending_whitespace.iter().map(|item| item.width).sum();
                    if token.width > 0
                        && builder.current_width() > 0
                        && builder.current_width() + whitespace_width + token.width > width
                    {
                        builder.consume_pending(&mut pending_whitespace);
                        outputs.push(builder.build_line());
                        builder = LineBuilder::new();
                    }

                    builder.append_with_pending(token.clone(), &mut pending_whitespace);
                }
            },
        }
    }

    builder.consume_pending(&mut pending_whitespace);
    outputs.push(builder.build_line());
    outputs
}

struct LineBuilder {
    segments: Vec<LineSegment>,
    events: Vec<LocatedEvent>,
    width: usize,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            segments: Vec::new(),
            events: Vec::new(),
            width: 0,
        }
    }

    fn current_width(&self) -> usize {
        self.width
    }

    fn append_with_pending(&mut self, token: Fragment, pending_whitespace: &mut Vec<Fragment>) {
        self.consume_pending(pending_whitespace);
        self.append_token(token);
    }

    fn consume_pending(&mut self, pending_whitespace: &mut Vec<Fragment>) {
        for fragment in pending_whitespace.drain(..) {
            self.append_token(fragment);
        }
    }

    fn append_token(&mut self, fragment: Fragment) {
        if !fragment.text.is_empty() {
            self.segments.push(LineSegment {
                text: fragment.text.clone(),
                style: fragment.style,
            });
            self.width += fragment.width;
        }

        for event in fragment.events {
            let column = self.width.saturating_sub(fragment.width) + event.offset;
            self.events.push(LocatedEvent {
                column: column as u16,
                caret: event.caret,
            });
        }
    }

    fn build_line(mut self) -> LineOutput {
        if self.segments.is_empty() {
            self.segments.push(LineSegment {
                text: String::new(),
                style: Style::default(),
            });
        }
        LineOutput {
            spans: self.segments,
            events: self.events,
        }
    }
}

fn visible_width(text: &str) -> usize {
    text.chars()
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum()
}
