use std::{
    env,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
        Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::Style,
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use madlibs_tui::chip::{Category, ChipPayload};
use madlibs_tui::config::EditorConfig;
use madlibs_tui::editor::{EditEvent, StoryEditor};
use madlibs_tui::editor_display::{ClickOutcome, EditorDisplay};
use madlibs_tui::error::StoreError;
use madlibs_tui::play::PlaySession;
use madlibs_tui::story::{AuthToken, FileStore, Story, StoryKey, StoryStore};
use madlibs_tui::telemetry;

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const MOUSE_SCROLL_LINES: usize = 3;
const PALETTE_WIDTH: u16 = 28;

fn main() -> Result<()> {
    run()
}

fn usage() {
    eprintln!("Usage: madlibs new <stories.json>");
    eprintln!("       madlibs play <stories.json> <invite-code>");
    eprintln!("       madlibs list <stories.json>");
    eprintln!("       madlibs delete <stories.json> <invite-code>");
}

fn auth_token() -> Option<AuthToken> {
    env::var("MADLIBS_AUTH_TOKEN").ok().and_then(AuthToken::new)
}

fn open_store(path: &Path) -> Result<FileStore> {
    FileStore::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn run() -> Result<()> {
    let config = EditorConfig::from_env();
    telemetry::init(&config).context("failed to open log file")?;

    let mut args = env::args().skip(1);
    let (Some(command), Some(path)) = (args.next(), args.next()) else {
        usage();
        return Ok(());
    };
    let path = PathBuf::from(path);
    match command.as_str() {
        "new" => author(path, config),
        "play" | "delete" => {
            let Some(key) = args.next() else {
                usage();
                return Ok(());
            };
            if command == "play" {
                play(path, &key)
            } else {
                delete(path, &key)
            }
        }
        "list" => list(path),
        other => {
            usage();
            bail!("unknown command `{other}`")
        }
    }
}

fn author(path: PathBuf, config: EditorConfig) -> Result<()> {
    let store = open_store(&path)?;
    let mut app = App::new(store, auth_token(), &config);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )
    .context("failed to initialize terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    app.display.detach();
    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )
    .ok();
    terminal.show_cursor().ok();

    if let Some(story) = &app.saved {
        println!("Saved \"{}\". Invite code: {}", story.title, story.invite_code);
    }
    res
}

fn play(path: PathBuf, key: &str) -> Result<()> {
    let mut store = open_store(&path)?;
    let key: StoryKey = key.parse().context("invalid story key")?;
    let story = store
        .record_play(&key, auth_token().as_ref())
        .context("failed to load story")?;
    let mut session = PlaySession::new(&story);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", session.title())?;
    let mut lines = stdin.lock().lines();
    while let Some(prompt) = session.prompt() {
        write!(stdout, "[{}] {}: ", prompt.progress(), prompt.question())?;
        stdout.flush()?;
        let Some(line) = lines.next() else {
            writeln!(stdout)?;
            return Ok(());
        };
        let line = line.context("failed to read answer")?;
        if !session.answer(&line) {
            writeln!(stdout, "Please enter a word.")?;
        }
    }
    if let Some(result) = session.result() {
        writeln!(stdout, "\n{result}")?;
    }
    Ok(())
}

fn list(path: PathBuf) -> Result<()> {
    let Some(user) = auth_token() else {
        bail!("set MADLIBS_AUTH_TOKEN to list your stories");
    };
    let store = open_store(&path)?;
    let stories = store.list_stories(&user);
    let mut stdout = io::stdout();
    for (heading, group) in [("Written", &stories.created), ("Played", &stories.played)] {
        writeln!(stdout, "{heading}:")?;
        if group.is_empty() {
            writeln!(stdout, "  (none)")?;
        }
        for story in group {
            let title = if story.title.is_empty() { "(untitled)" } else { story.title.as_str() };
            writeln!(stdout, "  {}  {}", story.invite_code, title)?;
        }
    }
    Ok(())
}

fn delete(path: PathBuf, key: &str) -> Result<()> {
    let Some(user) = auth_token() else {
        bail!("set MADLIBS_AUTH_TOKEN to delete a story");
    };
    let mut store = open_store(&path)?;
    let key: StoryKey = key.parse().context("invalid story key")?;
    let story = store
        .delete_story(&key, &user)
        .with_context(|| format!("failed to delete {key}"))?;
    println!("Deleted \"{}\" ({})", story.title, story.invite_code);
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();
    let mut needs_redraw = true;

    while !app.should_quit() {
        if needs_redraw {
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed to draw frame")?;
            needs_redraw = false;
        }

        let mut timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if let Some(deadline) = app.display.restore_deadline() {
            timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
        }

        if event::poll(timeout).context("event poll failed")? {
            let evt = event::read().context("failed to read event")?;
            app.handle_event(evt)?;
            needs_redraw = true;
        }

        // The caret restore waits for the frame above to land.
        if app.display.flush_due(Instant::now()) {
            needs_redraw = true;
        }

        if last_tick.elapsed() >= tick_rate {
            let had_message_before = app.has_status_message();
            app.on_tick();
            last_tick = Instant::now();
            if had_message_before && !app.has_status_message() {
                needs_redraw = true;
            }
        }
    }

    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PaletteItem {
    Catalog(Category),
    Custom(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    Story,
    Palette,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PromptKind {
    Title,
    CustomWord,
}

#[derive(Clone, Debug)]
struct InputPrompt {
    kind: PromptKind,
    buffer: String,
}

impl InputPrompt {
    fn label(&self) -> &'static str {
        match self.kind {
            PromptKind::Title => "Title",
            PromptKind::CustomWord => "Your word",
        }
    }
}

#[derive(Clone, Debug)]
enum DragState {
    /// Left button went down on a palette row; becomes a chip drag once moved.
    Palette { payload: String, dragging: bool },
}

struct App {
    display: EditorDisplay,
    store: FileStore,
    owner: Option<AuthToken>,
    saved: Option<Story>,
    title: String,
    focus: Focus,
    palette_state: ListState,
    prompt: Option<InputPrompt>,
    preview: bool,
    scroll_top: usize,
    should_quit: bool,
    dirty: bool,
    status_message: Option<(String, Instant)>,
    drag_state: Option<DragState>,
    last_palette_area: Rect,
    last_viewport_height: usize,
}

impl App {
    fn new(store: FileStore, owner: Option<AuthToken>, config: &EditorConfig) -> Self {
        let mut palette_state = ListState::default();
        palette_state.select(Some(0));
        Self {
            display: EditorDisplay::new(StoryEditor::new(), config),
            store,
            owner,
            saved: None,
            title: String::new(),
            focus: Focus::Story,
            palette_state,
            prompt: None,
            preview: false,
            scroll_top: 0,
            should_quit: false,
            dirty: false,
            status_message: Some(("Drag words from the palette into your story".to_string(), Instant::now())),
            drag_state: None,
            last_palette_area: Rect::default(),
            last_viewport_height: 0,
        }
    }

    fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn has_status_message(&self) -> bool {
        self.status_message.is_some()
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn on_tick(&mut self) {
        if let Some((_, instant)) = &self.status_message
            && instant.elapsed() > STATUS_TIMEOUT
        {
            self.status_message = None;
        }
    }

    fn palette_items(&self) -> Vec<PaletteItem> {
        let palette = self.display.palette();
        palette
            .entries()
            .iter()
            .map(|entry| PaletteItem::Catalog(entry.category))
            .chain(palette.custom_words().iter().cloned().map(PaletteItem::Custom))
            .collect()
    }

    fn payload_for_item(&self, item: &PaletteItem) -> Option<ChipPayload> {
        match item {
            PaletteItem::Catalog(category) => self.display.palette().payload_for(*category),
            PaletteItem::Custom(word) => self.display.palette().custom_payload(word),
        }
    }

    fn selected_item(&self) -> Option<PaletteItem> {
        let index = self.palette_state.selected()?;
        self.palette_items().into_iter().nth(index)
    }

    fn clamp_palette_selection(&mut self) {
        let count = self.palette_items().len();
        let selected = self.palette_state.selected().unwrap_or(0);
        self.palette_state
            .select(if count == 0 { None } else { Some(selected.min(count - 1)) });
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height == 0 || area.width == 0 {
            return;
        }

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);
        let main_area = vertical[0];
        let status_area = vertical[1];

        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(PALETTE_WIDTH)])
            .split(main_area);
        let story_block = Block::default().borders(Borders::ALL).title(if self.preview {
            " Preview "
        } else {
            " Story "
        });
        let text_area = story_block.inner(horizontal[0]);
        let palette_area = horizontal[1];
        frame.render_widget(story_block, horizontal[0]);

        let wrap_width = text_area.width.max(1) as usize;
        let viewport_height = (text_area.height as usize).max(1);
        self.last_viewport_height = viewport_height;

        if self.preview {
            let lines = self.display.render_preview(wrap_width);
            let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
            frame.render_widget(paragraph, text_area);
        } else {
            let render = self.display.render_story(wrap_width);
            self.display.update_after_render(text_area, render.total_lines);
            self.adjust_scroll(render.total_lines, viewport_height);

            let paragraph = Paragraph::new(Text::from(render.lines))
                .wrap(Wrap { trim: false })
                .scroll((self.scroll_top as u16, 0));
            frame.render_widget(paragraph, text_area);

            if let Some(indicator) = self.display.drop_indicator()
                && let Some((x, y)) = self.visible_cell(text_area, indicator.line, indicator.column)
            {
                let style = self.display.theme().indicator_style();
                if let Some(cell) = frame.buffer_mut().cell_mut((x, y)) {
                    cell.set_style(style);
                }
            }

            if self.prompt.is_none()
                && self.focus == Focus::Story
                && let Some(cursor) = self.display.last_cursor_visual()
                && let Some((x, y)) = self.visible_cell(text_area, cursor.line, cursor.column)
            {
                frame.set_cursor_position(Position::new(x, y));
            }
        }

        self.draw_palette(frame, palette_area);

        let status_line = self.status_line(status_area.width as usize);
        let status_widget =
            Paragraph::new(status_line).style(self.display.theme().status_bar_style());
        frame.render_widget(status_widget, status_area);

        if let Some(prompt) = &self.prompt {
            let prefix = prompt.label().len() + 2;
            let x = status_area.x + (prefix + prompt.buffer.chars().count()) as u16;
            frame.set_cursor_position(Position::new(
                x.min(status_area.x + status_area.width.saturating_sub(1)),
                status_area.y,
            ));
        }
    }

    fn visible_cell(&self, area: Rect, line: usize, column: u16) -> Option<(u16, u16)> {
        if line < self.scroll_top || line >= self.scroll_top + area.height as usize || area.width == 0
        {
            return None;
        }
        let y = area.y + (line - self.scroll_top) as u16;
        let x = area.x + column.min(area.width - 1);
        Some((x, y))
    }

    fn draw_palette(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title(" Words ");
        self.last_palette_area = block.inner(area);
        let theme = self.display.theme();
        let palette = self.display.palette();
        let mut items: Vec<ListItem> = palette
            .entries()
            .iter()
            .map(|entry| ListItem::new(Line::from(entry.label())))
            .collect();
        items.extend(palette.custom_words().iter().map(|word| {
            ListItem::new(Line::from(Span::styled(
                format!("{word} *"),
                theme.chip_style(true),
            )))
        }));
        let highlight = if self.focus == Focus::Palette {
            theme.palette_selected_style()
        } else {
            Style::default()
        };
        let list = List::new(items)
            .block(block)
            .style(theme.palette_style())
            .highlight_style(highlight);
        frame.render_stateful_widget(list, area, &mut self.palette_state);
    }

    fn status_line(&self, width: usize) -> Line<'static> {
        let theme = self.display.theme();
        if let Some(prompt) = &self.prompt {
            return Line::from(format!("{}: {}", prompt.label(), prompt.buffer));
        }

        let mut spans = Vec::new();
        let title = if self.title.is_empty() {
            "Untitled".to_string()
        } else {
            self.title.clone()
        };
        spans.push(Span::styled(format!(" {title}"), theme.title_style()));
        if self.dirty {
            spans.push(Span::raw(" *"));
        }
        let blanks = self.display.compile().blank_count();
        spans.push(Span::raw(format!(", {blanks} blanks")));
        if let Some((message, _)) = &self.status_message {
            spans.push(Span::raw(format!("  {message}")));
        }

        let shortcuts = "^T title ^W word ^P preview ^S save ^Q quit";
        let left_width: usize = spans.iter().map(|span| span.content.chars().count()).sum();
        if left_width + 1 + shortcuts.len() <= width {
            spans.push(Span::raw(" ".repeat(width - left_width - shortcuts.len())));
            spans.push(Span::raw(shortcuts));
        }
        Line::from(spans)
    }

    fn adjust_scroll(&mut self, total_lines: usize, viewport: usize) {
        let max_scroll = total_lines.saturating_sub(viewport);
        if let Some(cursor) = self.display.last_cursor_visual() {
            if cursor.line < self.scroll_top {
                self.scroll_top = cursor.line;
            } else if cursor.line >= self.scroll_top + viewport {
                self.scroll_top = cursor.line + 1 - viewport;
            }
        }
        self.scroll_top = self.scroll_top.min(max_scroll);
    }

    fn scroll_by_lines(&mut self, delta: isize) {
        let max_scroll = self
            .display
            .last_total_lines()
            .saturating_sub(self.last_viewport_height);
        self.scroll_top = self.scroll_top.saturating_add_signed(delta).min(max_scroll);
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) => {
                if self.prompt.is_some() {
                    self.handle_prompt_key(code);
                    return Ok(());
                }
                match (code, modifiers) {
                    (KeyCode::Char('q'), m) | (KeyCode::Char('c'), m)
                        if m.contains(KeyModifiers::CONTROL) =>
                    {
                        self.should_quit = true;
                    }
                    (KeyCode::Char('s'), m) if m.contains(KeyModifiers::CONTROL) => {
                        self.save()?;
                    }
                    (KeyCode::Char('t'), m) if m.contains(KeyModifiers::CONTROL) => {
                        self.prompt = Some(InputPrompt {
                            kind: PromptKind::Title,
                            buffer: self.title.clone(),
                        });
                    }
                    (KeyCode::Char('w'), m) if m.contains(KeyModifiers::CONTROL) => {
                        self.prompt = Some(InputPrompt {
                            kind: PromptKind::CustomWord,
                            buffer: String::new(),
                        });
                    }
                    (KeyCode::Char('p'), m) if m.contains(KeyModifiers::CONTROL) => {
                        self.preview = !self.preview;
                    }
                    (KeyCode::Tab, _) | (KeyCode::BackTab, _) => {
                        self.focus = match self.focus {
                            Focus::Story => Focus::Palette,
                            Focus::Palette => Focus::Story,
                        };
                    }
                    (KeyCode::Esc, _) => {
                        self.focus = Focus::Story;
                        self.preview = false;
                    }
                    _ if self.preview => {}
                    _ => match self.focus {
                        Focus::Story => self.handle_story_key(code, modifiers),
                        Focus::Palette => self.handle_palette_key(code),
                    },
                }
            }
            Event::Paste(text) if !self.preview && self.prompt.is_none() => {
                if self.display.paste(&text) {
                    self.mark_dirty();
                }
            }
            Event::Mouse(mouse) if self.prompt.is_none() => self.handle_mouse_event(mouse),
            _ => {}
        }
        Ok(())
    }

    fn handle_story_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let word = modifiers.contains(KeyModifiers::CONTROL) || modifiers.contains(KeyModifiers::ALT);
        let changed = match code {
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                self.display.type_text(ch.encode_utf8(&mut [0; 4]))
            }
            KeyCode::Enter => self.display.type_text("\n"),
            KeyCode::Backspace => self.display.backspace(),
            KeyCode::Delete => self.display.delete(),
            KeyCode::Left => {
                let event = if word { EditEvent::MoveWordLeft } else { EditEvent::MoveLeft };
                self.display.dispatch(event);
                false
            }
            KeyCode::Right => {
                let event = if word { EditEvent::MoveWordRight } else { EditEvent::MoveRight };
                self.display.dispatch(event);
                false
            }
            KeyCode::Home => {
                self.display.dispatch(EditEvent::MoveHome);
                false
            }
            KeyCode::End => {
                self.display.dispatch(EditEvent::MoveEnd);
                false
            }
            KeyCode::Up => {
                self.display.move_cursor_vertical(-1);
                false
            }
            KeyCode::Down => {
                self.display.move_cursor_vertical(1);
                false
            }
            _ => false,
        };
        if changed {
            self.mark_dirty();
        }
    }

    fn handle_palette_key(&mut self, code: KeyCode) {
        let count = self.palette_items().len();
        if count == 0 {
            return;
        }
        let selected = self.palette_state.selected().unwrap_or(0);
        match code {
            KeyCode::Up => self.palette_state.select(Some(selected.saturating_sub(1))),
            KeyCode::Down => self.palette_state.select(Some((selected + 1).min(count - 1))),
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
                if let Some(PaletteItem::Catalog(category)) = self.selected_item() {
                    let qualifier = self.display.palette_mut().cycle_qualifier(category);
                    if !category.supports_qualifiers() {
                        self.set_status(format!("{category} has no forms"));
                    } else if qualifier.is_none() {
                        self.set_status(format!("{category}: any form"));
                    }
                }
            }
            KeyCode::Enter => {
                let Some(item) = self.selected_item() else {
                    return;
                };
                if let Some(payload) = self.payload_for_item(&item)
                    && self.display.insert_payload(&payload)
                {
                    self.mark_dirty();
                    self.clamp_palette_selection();
                    self.focus = Focus::Story;
                }
            }
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, code: KeyCode) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Backspace => {
                prompt.buffer.pop();
            }
            KeyCode::Char(ch) => prompt.buffer.push(ch),
            KeyCode::Enter => {
                let Some(prompt) = self.prompt.take() else {
                    return;
                };
                match prompt.kind {
                    PromptKind::Title => {
                        self.title = prompt.buffer.trim().to_string();
                        self.mark_dirty();
                    }
                    PromptKind::CustomWord => {
                        match self.display.palette_mut().add_custom_word(&prompt.buffer) {
                            Some(word) => self.set_status(format!("Added \"{word}\" to the palette")),
                            None => self.set_status("That word is empty or already there"),
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_mouse_event(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::ScrollUp => self.scroll_by_lines(-(MOUSE_SCROLL_LINES as isize)),
            MouseEventKind::ScrollDown => self.scroll_by_lines(MOUSE_SCROLL_LINES as isize),
            MouseEventKind::Down(MouseButton::Left) => self.handle_mouse_down(event),
            MouseEventKind::Drag(MouseButton::Left) => self.handle_mouse_drag(event),
            MouseEventKind::Up(MouseButton::Left) => self.handle_mouse_up(event),
            _ => {}
        }
    }

    fn palette_row(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.last_palette_area;
        if column < area.x || column >= area.x + area.width || row < area.y || row >= area.y + area.height {
            return None;
        }
        let index = self.palette_state.offset() + (row - area.y) as usize;
        (index < self.palette_items().len()).then_some(index)
    }

    fn handle_mouse_down(&mut self, event: MouseEvent) {
        self.drag_state = None;
        if let Some(index) = self.palette_row(event.column, event.row) {
            self.palette_state.select(Some(index));
            self.focus = Focus::Palette;
            let payload = self
                .palette_items()
                .get(index)
                .and_then(|item| self.payload_for_item(item));
            if let Some(payload) = payload {
                self.drag_state = Some(DragState::Palette {
                    payload: payload.to_json(),
                    dragging: false,
                });
            }
            return;
        }
        if self.preview {
            return;
        }
        self.focus = Focus::Story;
        if self.display.click(event.column, event.row, self.scroll_top) == ClickOutcome::ChipRemoved
        {
            self.mark_dirty();
        }
    }

    fn handle_mouse_drag(&mut self, event: MouseEvent) {
        let Some(DragState::Palette { dragging, .. }) = self.drag_state.as_mut() else {
            return;
        };
        *dragging = true;
        if self.preview {
            return;
        }
        if self
            .display
            .drag_over(event.column, event.row, self.scroll_top)
            .is_none()
        {
            self.display.drag_leave(event.column, event.row, self.scroll_top);
        }
    }

    fn handle_mouse_up(&mut self, event: MouseEvent) {
        let Some(DragState::Palette { payload, dragging }) = self.drag_state.take() else {
            return;
        };
        if !dragging || self.preview {
            return;
        }
        if self
            .display
            .drop_payload(event.column, event.row, self.scroll_top, &payload)
        {
            self.mark_dirty();
            self.clamp_palette_selection();
            self.focus = Focus::Story;
        }
    }

    fn save(&mut self) -> Result<()> {
        if self.title.trim().is_empty() {
            self.set_status("Give your story a title first (Ctrl+T)");
            return Ok(());
        }
        let story = match &self.saved {
            Some(story) => story.clone(),
            None => match self.store.create_story(self.owner.as_ref()) {
                Ok(story) => story,
                Err(err @ StoreError::CodesExhausted(_)) => {
                    self.set_status(err.to_string());
                    return Ok(());
                }
                Err(err) => return Err(err).context("failed to create story"),
            },
        };
        let tokens = self.display.compile();
        let story = self
            .store
            .update_story(story.story_id, &self.title, &tokens)
            .context("failed to save story")?;
        self.set_status(format!("Saved. Invite code: {}", story.invite_code));
        self.saved = Some(story);
        self.dirty = false;
        Ok(())
    }
}
