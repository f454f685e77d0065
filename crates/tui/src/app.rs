use std::{cmp, io, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use shelf_core::{
    AppConfig, CatalogItem, DecodeReport, ItemKind, Library, LibraryError, Loan,
    NewItem, VariantTag,
};
use tracing::{error, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_INPUT_LEN: usize = 96;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Items,
    Members,
    Loans,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Items, Tab::Members, Tab::Loans];

    fn index(self) -> usize {
        match self {
            Tab::Items => 0,
            Tab::Members => 1,
            Tab::Loans => 2,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Tab::Items => "Items",
            Tab::Members => "Members",
            Tab::Loans => "Loans",
        }
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Single-line editable field. The cursor counts characters, not bytes.
#[derive(Debug, Clone)]
struct TextInput {
    label: &'static str,
    input: String,
    cursor: usize,
}

impl TextInput {
    fn new(label: &'static str, initial: impl Into<String>) -> Self {
        let input = initial.into();
        let cursor = input.chars().count();
        Self {
            label,
            input,
            cursor,
        }
    }

    fn len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map(|(index, _)| index)
            .unwrap_or(self.input.len())
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.len() as isize;
        let mut next = self.cursor as isize + delta;
        if next < 0 {
            next = 0;
        } else if next > len {
            next = len;
        }
        self.cursor = next as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.len();
    }

    fn insert(&mut self, ch: char) {
        if self.len() >= MAX_INPUT_LEN || ch.is_control() {
            return;
        }
        let at = self.byte_index();
        self.input.insert(at, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index();
            self.input.remove(at);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_index();
            self.input.remove(at);
        }
    }

    fn value(&self) -> &str {
        self.input.trim()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormKind {
    AddItem,
    AddMember,
    Borrow { item_id: String },
    Return { item_id: String },
}

#[derive(Debug, Clone)]
struct FormModal {
    kind: FormKind,
    title: String,
    fields: Vec<TextInput>,
    focus: usize,
    error: Option<String>,
}

impl FormModal {
    fn new(kind: FormKind, title: impl Into<String>, fields: Vec<TextInput>) -> Self {
        Self {
            kind,
            title: title.into(),
            fields,
            focus: 0,
            error: None,
        }
    }

    fn add_item() -> Self {
        Self::new(
            FormKind::AddItem,
            "Add Item",
            vec![
                TextInput::new("Kind (general/fiction/nonfiction)", "general"),
                TextInput::new("Title", ""),
                TextInput::new("Author", ""),
                TextInput::new("Genre or subject", ""),
                TextInput::new("ID (blank to generate)", ""),
            ],
        )
    }

    fn add_member() -> Self {
        Self::new(
            FormKind::AddMember,
            "Add Member",
            vec![
                TextInput::new("Name", ""),
                TextInput::new("ID (blank to generate)", ""),
            ],
        )
    }

    fn borrow(item: &CatalogItem) -> Self {
        Self::new(
            FormKind::Borrow {
                item_id: item.id().to_string(),
            },
            format!("Borrow - {}", item.title()),
            vec![TextInput::new("Member ID", "")],
        )
    }

    fn return_item(item: &CatalogItem, holder: Option<&str>) -> Self {
        Self::new(
            FormKind::Return {
                item_id: item.id().to_string(),
            },
            format!("Return - {}", item.title()),
            vec![TextInput::new("Member ID", holder.unwrap_or_default())],
        )
    }

    fn focused_mut(&mut self) -> Option<&mut TextInput> {
        self.fields.get_mut(self.focus)
    }

    fn move_focus(&mut self, delta: isize) {
        let count = self.fields.len() as isize;
        if count == 0 {
            return;
        }
        self.focus = (self.focus as isize + delta).rem_euclid(count) as usize;
    }

    fn is_last_field(&self) -> bool {
        self.focus + 1 >= self.fields.len()
    }

    fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(TextInput::value).unwrap_or("")
    }

    fn optional(&self, index: usize) -> Option<&str> {
        Some(self.value(index)).filter(|value| !value.is_empty())
    }
}

/// Interactive shell over a [`Library`].
pub struct ShelfApp {
    library: Library,
    config: AppConfig,
    tab: Tab,
    cursors: [usize; 3],
    form: Option<FormModal>,
    status: String,
    dirty: bool,
    quit_armed: bool,
    should_quit: bool,
    last_saved: Option<DateTime<Local>>,
    theme: Theme,
}

impl ShelfApp {
    pub fn new(library: Library, config: AppConfig, report: &DecodeReport) -> Self {
        let status = load_summary(&library, report);
        Self {
            library,
            config,
            tab: Tab::Items,
            cursors: [0; 3],
            form: None,
            status,
            dirty: false,
            quit_armed: false,
            should_quit: false,
            last_saved: None,
            theme: Theme::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| self.draw(frame))?;
            if event::poll(TICK_RATE).context("failed to poll terminal events")? {
                let event = event::read().context("failed to read terminal event")?;
                self.handle_input(event);
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Press {
                return;
            }
            if self.form.is_some() {
                self.handle_form_key(key);
            } else {
                self.handle_key(key);
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let quit_armed = std::mem::take(&mut self.quit_armed);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.dirty && !quit_armed {
                    self.quit_armed = true;
                    self.set_status("Unsaved changes: press s to save or q again to quit");
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::BackTab => self.tab = self.tab.prev(),
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::Char('g') | KeyCode::Home => self.cursors[self.tab.index()] = 0,
            KeyCode::Char('G') | KeyCode::End => {
                self.cursors[self.tab.index()] = self.row_count(self.tab).saturating_sub(1);
            }
            KeyCode::Char('a') => {
                self.form = Some(FormModal::add_item());
                self.set_status("Enter the new item's details");
            }
            KeyCode::Char('m') => {
                self.form = Some(FormModal::add_member());
                self.set_status("Enter the new member's details");
            }
            KeyCode::Char('b') => self.begin_borrow(),
            KeyCode::Char('r') => self.begin_return(),
            KeyCode::Char('s') => self.save(),
            KeyCode::Char('L') => self.reload(),
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let Some(mut form) = self.form.take() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.set_status(format!("{} cancelled", form.title));
                return;
            }
            KeyCode::Enter if !form.is_last_field() => form.move_focus(1),
            KeyCode::Enter => match self.submit_form(&form) {
                Ok(message) => {
                    self.set_status(message);
                    self.after_mutation();
                    return;
                }
                Err(err) if err.is_user_error() => {
                    warn!(%err, "Request rejected");
                    form.error = Some(err.to_string());
                }
                Err(err) => {
                    error!(%err, "Request failed");
                    self.set_status(format!("Error: {err}"));
                    return;
                }
            },
            KeyCode::Tab | KeyCode::Down => form.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => form.move_focus(-1),
            code => {
                if let Some(field) = form.focused_mut() {
                    match code {
                        KeyCode::Left => field.move_cursor(-1),
                        KeyCode::Right => field.move_cursor(1),
                        KeyCode::Home => field.move_home(),
                        KeyCode::End => field.move_end(),
                        KeyCode::Backspace => field.backspace(),
                        KeyCode::Delete => field.delete(),
                        KeyCode::Char(ch)
                            if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
                        {
                            field.insert(ch);
                        }
                        _ => {}
                    }
                }
            }
        }
        self.form = Some(form);
    }

    fn submit_form(&mut self, form: &FormModal) -> shelf_core::Result<String> {
        match &form.kind {
            FormKind::AddItem => {
                let tag = parse_variant(form.value(0))?;
                let kind = ItemKind::from_tag(tag, form.value(3));
                let mut request = NewItem::new(kind, form.value(1), form.value(2));
                if let Some(id) = form.optional(4) {
                    request = request.with_id(id);
                }
                let id = self.library.add_item(request)?;
                self.tab = Tab::Items;
                self.cursors[Tab::Items.index()] = self.library.items().len().saturating_sub(1);
                Ok(format!("Added item {id}"))
            }
            FormKind::AddMember => {
                let id = self
                    .library
                    .add_member(form.value(0), form.optional(1))?;
                self.tab = Tab::Members;
                self.cursors[Tab::Members.index()] =
                    self.library.members().len().saturating_sub(1);
                Ok(format!("Added member {id}"))
            }
            FormKind::Borrow { item_id } => {
                let member_id = form.value(0);
                self.library.borrow(item_id, member_id)?;
                Ok(format!("{} borrowed", self.describe_loan(item_id, member_id)))
            }
            FormKind::Return { item_id } => {
                let member_id = form.value(0);
                self.library.return_item(item_id, member_id)?;
                Ok(format!("{} returned", self.describe_loan(item_id, member_id)))
            }
        }
    }

    fn begin_borrow(&mut self) {
        if self.tab != Tab::Items {
            self.set_status("Select an item on the Items tab to borrow it");
            return;
        }
        let Some(item) = self.selected_item() else {
            self.set_status("No item selected");
            return;
        };
        if !item.is_available() {
            let holder = self
                .library
                .holder_of(item.id())
                .map(|member| member.name().to_string())
                .unwrap_or_else(|| "another member".to_string());
            let message = format!("'{}' is already borrowed by {holder}", item.title());
            self.set_status(message);
            return;
        }
        self.form = Some(FormModal::borrow(item));
    }

    fn begin_return(&mut self) {
        match self.tab {
            Tab::Loans => {
                let Some(Loan { item_id, member_id }) =
                    self.library.loans().into_iter().nth(self.cursor())
                else {
                    self.set_status("No loan selected");
                    return;
                };
                match self.library.return_item(&item_id, &member_id) {
                    Ok(()) => {
                        let message =
                            format!("{} returned", self.describe_loan(&item_id, &member_id));
                        self.set_status(message);
                        self.after_mutation();
                    }
                    Err(err) => self.set_status(format!("Error: {err}")),
                }
            }
            Tab::Items => {
                let Some(item) = self.selected_item() else {
                    self.set_status("No item selected");
                    return;
                };
                if item.is_available() {
                    let message = LibraryError::NotBorrowed {
                        item: item.id().to_string(),
                    };
                    self.set_status(format!("Error: {message}"));
                    return;
                }
                let holder = self.library.holder_of(item.id()).map(|member| member.id());
                self.form = Some(FormModal::return_item(item, holder));
            }
            Tab::Members => self.set_status("Select an item or a loan to return it"),
        }
    }

    fn after_mutation(&mut self) {
        self.dirty = true;
        if self.config.autosave {
            self.persist("Autosave");
        }
        self.clamp_cursors();
    }

    fn save(&mut self) {
        if self.persist("Save") {
            let path = self.config.data_file.display().to_string();
            self.set_status(format!("Saved to {path}"));
        }
    }

    fn persist(&mut self, action: &str) -> bool {
        match self.library.save(&self.config.data_file) {
            Ok(()) => {
                self.dirty = false;
                self.last_saved = Some(Local::now());
                true
            }
            Err(err) => {
                error!(%err, "{action} failed");
                self.set_status(format!("{action} failed: {err}"));
                false
            }
        }
    }

    fn reload(&mut self) {
        match Library::load(&self.config.data_file, self.config.load_policy) {
            Ok((library, report)) => {
                self.library = library;
                self.dirty = false;
                self.clamp_cursors();
                let summary = load_summary(&self.library, &report);
                info!(path = %self.config.data_file.display(), "Library reloaded");
                self.set_status(format!("Reloaded: {summary}"));
            }
            Err(err) => {
                error!(%err, "Reload failed");
                self.set_status(format!("Reload failed: {err}"));
            }
        }
    }

    fn describe_loan(&self, item_id: &str, member_id: &str) -> String {
        let title = self
            .library
            .item(item_id)
            .map(|item| item.title().to_string())
            .unwrap_or_else(|_| item_id.to_string());
        let name = self
            .library
            .member(member_id)
            .map(|member| member.name().to_string())
            .unwrap_or_else(|_| member_id.to_string());
        format!("'{title}' / {name}")
    }

    fn selected_item(&self) -> Option<&CatalogItem> {
        self.library.items().get(self.cursors[Tab::Items.index()])
    }

    fn cursor(&self) -> usize {
        self.cursors[self.tab.index()]
    }

    fn row_count(&self, tab: Tab) -> usize {
        match tab {
            Tab::Items => self.library.items().len(),
            Tab::Members => self.library.members().len(),
            Tab::Loans => self.library.loans().len(),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let total = self.row_count(self.tab) as isize;
        let slot = &mut self.cursors[self.tab.index()];
        let mut next = *slot as isize + delta;
        if next >= total {
            next = total - 1;
        }
        if next < 0 {
            next = 0;
        }
        *slot = next as usize;
    }

    fn clamp_cursors(&mut self) {
        for tab in Tab::ALL {
            let last = self.row_count(tab).saturating_sub(1);
            let slot = &mut self.cursors[tab.index()];
            *slot = cmp::min(*slot, last);
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(frame.size());

        self.render_tabs(frame, chunks[0]);
        match self.tab {
            Tab::Items => self.render_items(frame, chunks[1]),
            Tab::Members => self.render_members(frame, chunks[1]),
            Tab::Loans => self.render_loans(frame, chunks[1]),
        }
        self.render_status(frame, chunks[2]);
        if let Some(form) = &self.form {
            self.render_form(frame, form);
        }
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles = Tab::ALL
            .iter()
            .map(|tab| format!("{} ({})", tab.title(), self.row_count(*tab)))
            .collect::<Vec<_>>();
        let tabs = Tabs::new(titles)
            .select(self.tab.index())
            .block(Block::default().borders(Borders::ALL).title("Shelf"))
            .style(Style::default().fg(self.theme.muted))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn render_items(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let rows = self
            .library
            .items()
            .iter()
            .map(|item| {
                let (label, color) = if item.is_available() {
                    ("available", self.theme.success)
                } else {
                    ("on loan", self.theme.danger)
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        item.title().to_string(),
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" · {} · {}", item.author(), item.id()),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::styled(format!("  {label}"), Style::default().fg(color)),
                ]))
            })
            .collect::<Vec<_>>();
        self.render_list(frame, columns[0], "Catalog", rows);

        let detail = match self.selected_item() {
            Some(item) => {
                let mut lines = vec![
                    Line::from(Span::styled(
                        item.title().to_string(),
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::from(format!("Kind: {}", variant_label(item.tag()))),
                    Line::from(""),
                    Line::from(item.to_string()),
                    Line::from(""),
                ];
                match self.library.holder_of(item.id()) {
                    Some(member) => lines.push(Line::from(Span::styled(
                        format!("Held by {} ({})", member.name(), member.id()),
                        Style::default().fg(self.theme.warning),
                    ))),
                    None => lines.push(Line::from("On the shelf")),
                }
                lines
            }
            None => vec![Line::from("The catalog is empty. Press a to add an item.")],
        };
        self.render_detail(frame, columns[1], "Item", detail);
    }

    fn render_members(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);

        let rows = self
            .library
            .members()
            .iter()
            .map(|member| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        member.name().to_string(),
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" · {} · {} held", member.id(), member.held().len()),
                        Style::default().fg(self.theme.muted),
                    ),
                ]))
            })
            .collect::<Vec<_>>();
        self.render_list(frame, columns[0], "Members", rows);

        let selected = self
            .library
            .members()
            .get(self.cursors[Tab::Members.index()]);
        let detail = match selected {
            Some(member) => {
                let mut lines = vec![Line::from(member.to_string()), Line::from("")];
                if member.held().is_empty() {
                    lines.push(Line::from("No books borrowed."));
                }
                for item_id in member.held() {
                    let title = self
                        .library
                        .item(item_id)
                        .map(|item| item.title().to_string())
                        .unwrap_or_default();
                    lines.push(Line::from(format!("- {title} ({item_id})")));
                }
                lines
            }
            None => vec![Line::from("No members yet. Press m to register one.")],
        };
        self.render_detail(frame, columns[1], "Member", detail);
    }

    fn render_loans(&self, frame: &mut Frame, area: Rect) {
        let rows = self
            .library
            .loans()
            .iter()
            .map(|loan| {
                let title = self
                    .library
                    .item(&loan.item_id)
                    .map(|item| item.title().to_string())
                    .unwrap_or_default();
                let name = self
                    .library
                    .member(&loan.member_id)
                    .map(|member| member.name().to_string())
                    .unwrap_or_default();
                ListItem::new(Line::from(vec![
                    Span::styled(
                        title,
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" ({})", loan.item_id),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::raw(" → "),
                    Span::styled(name, Style::default().fg(self.theme.warning)),
                    Span::styled(
                        format!(" ({})", loan.member_id),
                        Style::default().fg(self.theme.muted),
                    ),
                ]))
            })
            .collect::<Vec<_>>();
        self.render_list(frame, area, "Current loans (r to return)", rows);
    }

    fn render_list(&self, frame: &mut Frame, area: Rect, title: &str, rows: Vec<ListItem>) {
        let mut list_state = ListState::default();
        if !rows.is_empty() {
            list_state.select(Some(cmp::min(self.cursor(), rows.len() - 1)));
        }
        let list = List::new(rows)
            .block(Block::default().borders(Borders::ALL).title(title.to_string()))
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect, title: &str, lines: Vec<Line>) {
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title.to_string()))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let saved = match (self.dirty, self.last_saved) {
            (true, _) => "unsaved changes".to_string(),
            (false, Some(at)) => format!("saved {}", at.format("%H:%M:%S")),
            (false, None) => "no changes".to_string(),
        };
        let title = format!(
            "Status · {} · {}{}",
            self.config.data_file.display(),
            saved,
            if self.config.autosave {
                " (auto-save enabled)"
            } else {
                ""
            }
        );
        let hints = "a add item  m add member  b borrow  r return  s save  L reload  Tab switch  q quit";
        let paragraph = Paragraph::new(vec![
            Line::from(self.status.clone()),
            Line::from(Span::styled(hints, Style::default().fg(self.theme.muted))),
        ])
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_form(&self, frame: &mut Frame, form: &FormModal) {
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(72_u16, frame_area.width.saturating_sub(4)), 30_u16);
        let height = (form.fields.len() as u16 + 6).min(frame_area.height);
        let area = centered_rect(width, height, frame_area);

        frame.render_widget(Clear, area);

        let mut lines = form
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let focused = index == form.focus;
                let marker = if focused {
                    Span::styled("▶ ", Style::default().fg(self.theme.accent))
                } else {
                    Span::raw("  ")
                };
                let label_style = if focused {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.theme.muted)
                };
                Line::from(vec![
                    marker,
                    Span::styled(format!("{}: ", field.label), label_style),
                    Span::raw(field.input.clone()),
                ])
            })
            .collect::<Vec<_>>();
        lines.push(Line::from(""));
        if let Some(message) = &form.error {
            lines.push(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(self.theme.danger),
            )));
        }
        lines.push(Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" next/submit  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" field  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]));

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(form.title.clone()),
        );
        frame.render_widget(paragraph, area);

        if let Some(field) = form.fields.get(form.focus) {
            let offset = 2 + field.label.chars().count() + 2 + field.cursor;
            let cursor_x = (area.x + 1 + offset as u16).min(area.x + area.width.saturating_sub(2));
            let cursor_y = area.y + 1 + form.focus as u16;
            frame.set_cursor(cursor_x, cursor_y);
        }
    }
}

fn parse_variant(input: &str) -> shelf_core::Result<VariantTag> {
    let tag = match input.trim().to_ascii_lowercase().as_str() {
        "g" => Ok(VariantTag::General),
        "f" => Ok(VariantTag::Fiction),
        "n" | "non-fiction" => Ok(VariantTag::NonFiction),
        other => other.parse::<VariantTag>(),
    };
    tag.map_err(|reason| LibraryError::InvalidInput {
        field: "kind",
        reason,
    })
}

fn variant_label(tag: VariantTag) -> &'static str {
    match tag {
        VariantTag::General => "General",
        VariantTag::Fiction => "Fiction",
        VariantTag::NonFiction => "Non-Fiction",
    }
}

fn load_summary(library: &Library, report: &DecodeReport) -> String {
    let mut summary = format!(
        "Loaded {} items and {} members",
        library.items().len(),
        library.members().len()
    );
    if !report.skipped.is_empty() {
        let lines = report
            .skipped
            .iter()
            .map(|record| record.line.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        summary.push_str(&format!(" • skipped corrupt lines {lines}"));
    }
    if !report.repaired.is_empty() {
        summary.push_str(&format!(
            " • availability repaired for {}",
            report.repaired.join(", ")
        ));
    }
    summary
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use shelf_core::LoadPolicy;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut ShelfApp, text: &str) {
        for ch in text.chars() {
            app.handle_form_key(key(KeyCode::Char(ch)));
        }
    }

    fn app() -> ShelfApp {
        let mut library = Library::new();
        library.seed_demo().expect("seed");
        let config = AppConfig {
            data_file: PathBuf::from("unused.csv"),
            load_policy: LoadPolicy::Abort,
            autosave: false,
            seed_demo: false,
        };
        ShelfApp::new(library, config, &DecodeReport::default())
    }

    #[test]
    fn text_input_edits_at_cursor() {
        let mut input = TextInput::new("Title", "Dne");
        input.move_cursor(-1);
        input.move_cursor(-1);
        input.insert('u');
        assert_eq!(input.input, "Dune");
        input.move_end();
        input.backspace();
        input.move_home();
        input.delete();
        assert_eq!(input.value(), "un");
        input.insert('é');
        assert_eq!(input.input, "éun");
        assert_eq!(input.cursor, 1);
    }

    #[test]
    fn add_item_form_creates_fiction() {
        let mut app = app();
        app.handle_key(key(KeyCode::Char('a')));
        let kind = app.form.as_mut().and_then(FormModal::focused_mut).expect("field");
        kind.move_home();
        for _ in 0..kind.len() {
            kind.delete();
        }
        type_text(&mut app, "fiction");
        app.handle_form_key(key(KeyCode::Enter));
        type_text(&mut app, "Neuromancer");
        app.handle_form_key(key(KeyCode::Enter));
        type_text(&mut app, "William Gibson");
        app.handle_form_key(key(KeyCode::Enter));
        type_text(&mut app, "Cyberpunk");
        app.handle_form_key(key(KeyCode::Enter));
        app.handle_form_key(key(KeyCode::Enter));

        assert!(app.form.is_none(), "status: {}", app.status);
        let item = app.library.items().last().expect("item");
        assert_eq!(item.title(), "Neuromancer");
        assert_eq!(item.extra(), Some("Cyberpunk"));
        assert_eq!(item.id(), "B0001");
        assert!(app.dirty);
    }

    #[test]
    fn unknown_member_keeps_borrow_form_open() {
        let mut app = app();
        app.handle_key(key(KeyCode::Char('b')));
        type_text(&mut app, "M999");
        app.handle_form_key(key(KeyCode::Enter));
        let form = app.form.as_ref().expect("form stays open");
        assert!(form.error.as_deref().unwrap_or_default().contains("not found"));

        let field = app.form.as_mut().and_then(FormModal::focused_mut).expect("field");
        for _ in 0..4 {
            field.backspace();
        }
        type_text(&mut app, "M001");
        app.handle_form_key(key(KeyCode::Enter));
        assert!(app.form.is_none());
        assert_eq!(app.library.loans().len(), 1);
    }

    #[test]
    fn loans_tab_returns_selected_loan() {
        let mut app = app();
        let item_id = app.library.items()[0].id().to_string();
        app.library.borrow(&item_id, "M002").expect("borrow");
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.tab, Tab::Loans);
        app.handle_key(key(KeyCode::Char('r')));
        assert!(app.library.loans().is_empty());
        assert!(app.library.items()[0].is_available());
    }

    #[test]
    fn quitting_with_unsaved_changes_needs_confirmation() {
        let mut app = app();
        app.dirty = true;
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn variant_shortcuts_parse() {
        assert_eq!(parse_variant("F").ok(), Some(VariantTag::Fiction));
        assert_eq!(parse_variant("nonfiction").ok(), Some(VariantTag::NonFiction));
        assert!(matches!(
            parse_variant("poetry"),
            Err(LibraryError::InvalidInput { field: "kind", .. })
        ));
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut app = app();
        app.move_cursor(-3);
        assert_eq!(app.cursor(), 0);
        app.move_cursor(50);
        assert_eq!(app.cursor(), app.library.items().len() - 1);
        app.tab = Tab::Loans;
        app.move_cursor(1);
        assert_eq!(app.cursor(), 0);
        assert_eq!(app.row_count(Tab::Members), app.library.members().len());
    }
}
