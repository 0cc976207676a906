// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::io;
use std::iter;
use std::mem;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use pricebook_app::{
    AppCommand, AppEvent, AppMode, AppState, LineItem, Locale, MonospaceMeasure, Overlay,
    PageSpec, PriceEditInput, PriceEdits, TagColor, Workbook, filter_items, format_display_price,
    format_plain_cents, format_total, group_items, layout, render_text,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs};
use time::OffsetDateTime;

pub const DEFAULT_RECEIPT_COLUMNS: usize = 48;
const STATUS_TTL: Duration = Duration::from_secs(4);

/// Receipt layout settings resolved from config.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptSettings {
    pub page: PageSpec,
    /// Width of the text rendering in characters.
    pub columns: usize,
    /// Header used when no receipt title was entered.
    pub default_title: Option<String>,
}

impl Default for ReceiptSettings {
    fn default() -> Self {
        Self {
            page: PageSpec::default(),
            columns: DEFAULT_RECEIPT_COLUMNS,
            default_title: None,
        }
    }
}

impl ReceiptSettings {
    /// Maps the page width onto `columns` character cells so that wrapping
    /// and dot fill agree with the text rendering.
    pub fn measure(&self) -> MonospaceMeasure {
        MonospaceMeasure::new(self.page.page_width / self.columns.max(1) as f64)
    }

    pub fn header<'a>(&'a self, title: &'a str) -> Option<&'a str> {
        Some(title.trim())
            .filter(|title| !title.is_empty())
            .or(self.default_title.as_deref())
    }
}

/// Lays out `items` and renders the receipt as monospace text.
pub fn receipt_text(
    items: &[LineItem],
    settings: &ReceiptSettings,
    title: &str,
    printed_at: OffsetDateTime,
) -> String {
    let plan = layout(
        items,
        &settings.page,
        settings.header(title),
        &settings.measure(),
        printed_at,
    );
    render_text(&plan, settings.columns)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookFailure {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySnapshot {
    pub workbooks: Vec<Workbook>,
    pub failures: Vec<WorkbookFailure>,
}

pub trait AppRuntime {
    fn load_workbooks(&mut self) -> Result<LibrarySnapshot>;
    /// Stores a workbook from a path or URL and returns its stored name.
    fn import_workbook(&mut self, source: &str) -> Result<String>;
    /// Writes edits into the stored workbook and returns the patched cell count.
    fn save_prices(&mut self, workbook: &str, edits: &PriceEdits) -> Result<usize>;
    fn receipt_settings(&self) -> ReceiptSettings;
    fn printed_at(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, Default)]
struct ViewData {
    workbooks: Vec<Workbook>,
    edits: BTreeMap<String, PriceEdits>,
    settings: ReceiptSettings,
    cursor: usize,
    input: String,
    receipt_scroll: u16,
    printed_at: Option<OffsetDateTime>,
    status_token: u64,
    quit_armed: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum ListRow<'a> {
    Section { label: String, count: usize },
    Item(&'a LineItem),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputAction {
    Edited,
    Submit,
    Cancel,
    Ignored,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_view_data(state, runtime, &mut view_data) {
        state.dispatch(AppCommand::SetStatus(format!("load failed: {error:#}")));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match next_key_event() {
            Ok(Some(key)) => {
                if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn next_key_event() -> Result<Option<KeyEvent>> {
    if !event::poll(Duration::from_millis(120)).context("poll event")? {
        return Ok(None);
    }
    match event::read().context("read event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
        _ => Ok(None),
    }
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn refresh_view_data<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    view_data.settings = runtime.receipt_settings();
    let snapshot = runtime.load_workbooks()?;

    let names = snapshot
        .workbooks
        .iter()
        .map(|workbook| workbook.name.clone())
        .collect();
    state.dispatch(AppCommand::SetTabs(names));
    state.selection.retain_valid(&snapshot.workbooks);
    view_data.edits.retain(|name, _| {
        snapshot
            .workbooks
            .iter()
            .any(|workbook| &workbook.name == name)
    });
    view_data.workbooks = snapshot.workbooks;
    clamp_cursor(state, view_data);

    if !snapshot.failures.is_empty() {
        state.dispatch(AppCommand::SetStatus(failure_summary(&snapshot.failures)));
    }
    Ok(())
}

fn failure_summary(failures: &[WorkbookFailure]) -> String {
    let names = failures
        .iter()
        .map(|failure| format!("{} ({})", failure.name, failure.message))
        .collect::<Vec<_>>()
        .join("; ");
    format!("could not load {} workbook(s): {names}", failures.len())
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_TTL);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

/// Dispatches `command` and arms the status timer when it set a status.
fn dispatch_command(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    dispatch_command(
        state,
        view_data,
        internal_tx,
        AppCommand::SetStatus(message.into()),
    );
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match state.mode {
        AppMode::Search => {
            handle_search_key(state, view_data, internal_tx, key);
            return false;
        }
        AppMode::PriceInput => {
            handle_price_input_key(state, view_data, internal_tx, key);
            return false;
        }
        AppMode::TitleInput => {
            handle_title_input_key(state, view_data, internal_tx, key);
            return false;
        }
        AppMode::ImportInput => {
            handle_import_input_key(state, runtime, view_data, internal_tx, key);
            return false;
        }
        AppMode::Nav => {}
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }

    if state.overlay != Overlay::None {
        handle_overlay_key(state, view_data, internal_tx, key);
        return false;
    }

    handle_nav_key(state, runtime, view_data, internal_tx, key)
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let quit_armed = mem::take(&mut view_data.quit_armed);
    match key.code {
        KeyCode::Char('q') => {
            if quit_armed || !has_unsaved_edits(view_data) {
                return true;
            }
            view_data.quit_armed = true;
            emit_status(
                state,
                view_data,
                internal_tx,
                "unsaved price edits -- press s to save or q again to quit",
            );
        }
        KeyCode::Char('f') | KeyCode::Right | KeyCode::Tab => {
            dispatch_command(state, view_data, internal_tx, AppCommand::NextTab);
            view_data.cursor = 0;
        }
        KeyCode::Char('b') | KeyCode::Left | KeyCode::BackTab => {
            dispatch_command(state, view_data, internal_tx, AppCommand::PrevTab);
            view_data.cursor = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => move_cursor(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(state, view_data, -1),
        KeyCode::Char('g') | KeyCode::Home => view_data.cursor = 0,
        KeyCode::Char('G') | KeyCode::End => {
            let last = visible_items(state, view_data).len().saturating_sub(1);
            view_data.cursor = last;
        }
        KeyCode::Char(' ') => toggle_cursor_item(state, view_data, internal_tx),
        KeyCode::Char('/') => {
            view_data.input = state.search.clone();
            dispatch_command(state, view_data, internal_tx, AppCommand::EnterSearch);
        }
        KeyCode::Char('e') => {
            dispatch_command(state, view_data, internal_tx, AppCommand::ToggleEditing);
        }
        KeyCode::Enter => open_price_input(state, view_data, internal_tx),
        KeyCode::Char('s') => save_active_edits(state, runtime, view_data, internal_tx),
        KeyCode::Char('r') => {
            view_data.printed_at = Some(runtime.printed_at());
            view_data.receipt_scroll = 0;
            dispatch_command(
                state,
                view_data,
                internal_tx,
                AppCommand::ShowOverlay(Overlay::Receipt),
            );
        }
        KeyCode::Char('t') => {
            view_data.input = state.receipt_title.clone();
            dispatch_command(state, view_data, internal_tx, AppCommand::OpenTitleInput);
        }
        KeyCode::Char('v') => dispatch_command(
            state,
            view_data,
            internal_tx,
            AppCommand::ShowOverlay(Overlay::Review),
        ),
        KeyCode::Char('c') => {
            dispatch_command(state, view_data, internal_tx, AppCommand::ClearSelection);
        }
        KeyCode::Char('i') => {
            view_data.input.clear();
            dispatch_command(state, view_data, internal_tx, AppCommand::OpenImportInput);
        }
        KeyCode::Char('R') => reload(state, runtime, view_data, internal_tx),
        KeyCode::Char('?') => dispatch_command(
            state,
            view_data,
            internal_tx,
            AppCommand::ShowOverlay(Overlay::Help),
        ),
        _ => {}
    }
    false
}

fn handle_overlay_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match (state.overlay, key.code) {
        (_, KeyCode::Esc | KeyCode::Char('q'))
        | (Overlay::Receipt, KeyCode::Char('r'))
        | (Overlay::Review, KeyCode::Char('v'))
        | (Overlay::Help, KeyCode::Char('?')) => {
            dispatch_command(state, view_data, internal_tx, AppCommand::CloseOverlay);
        }
        (Overlay::Receipt, KeyCode::Char('j') | KeyCode::Down) => {
            view_data.receipt_scroll = view_data.receipt_scroll.saturating_add(1);
        }
        (Overlay::Receipt, KeyCode::Char('k') | KeyCode::Up) => {
            view_data.receipt_scroll = view_data.receipt_scroll.saturating_sub(1);
        }
        (Overlay::Receipt, KeyCode::Char('t')) => {
            view_data.input = state.receipt_title.clone();
            dispatch_command(state, view_data, internal_tx, AppCommand::OpenTitleInput);
        }
        (Overlay::Review, KeyCode::Char('c')) => {
            dispatch_command(state, view_data, internal_tx, AppCommand::ClearSelection);
        }
        _ => {}
    }
}

fn edit_input(buffer: &mut String, key: KeyEvent) -> InputAction {
    match key.code {
        KeyCode::Enter => InputAction::Submit,
        KeyCode::Esc => InputAction::Cancel,
        KeyCode::Backspace => {
            buffer.pop();
            InputAction::Edited
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.push(c);
            InputAction::Edited
        }
        _ => InputAction::Ignored,
    }
}

fn handle_search_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match edit_input(&mut view_data.input, key) {
        InputAction::Edited => {
            let query = view_data.input.clone();
            dispatch_command(state, view_data, internal_tx, AppCommand::SetSearch(query));
            view_data.cursor = 0;
        }
        InputAction::Submit => {
            view_data.input.clear();
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
        }
        InputAction::Cancel => {
            view_data.input.clear();
            dispatch_command(
                state,
                view_data,
                internal_tx,
                AppCommand::SetSearch(String::new()),
            );
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
            view_data.cursor = 0;
        }
        InputAction::Ignored => {}
    }
}

fn handle_price_input_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match edit_input(&mut view_data.input, key) {
        InputAction::Submit => submit_price(state, view_data, internal_tx),
        InputAction::Cancel => {
            view_data.input.clear();
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
        }
        InputAction::Edited | InputAction::Ignored => {}
    }
}

fn handle_title_input_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match edit_input(&mut view_data.input, key) {
        InputAction::Submit => {
            let title = mem::take(&mut view_data.input);
            dispatch_command(
                state,
                view_data,
                internal_tx,
                AppCommand::SetReceiptTitle(title),
            );
            let status = if state.receipt_title.is_empty() {
                "receipt title cleared"
            } else {
                "receipt title set"
            };
            emit_status(state, view_data, internal_tx, status);
        }
        InputAction::Cancel => {
            view_data.input.clear();
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
        }
        InputAction::Edited | InputAction::Ignored => {}
    }
}

fn handle_import_input_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match edit_input(&mut view_data.input, key) {
        InputAction::Submit => {
            let source = mem::take(&mut view_data.input);
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
            import_source(state, runtime, view_data, internal_tx, source.trim());
        }
        InputAction::Cancel => {
            view_data.input.clear();
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
        }
        InputAction::Edited | InputAction::Ignored => {}
    }
}

fn import_source<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    source: &str,
) {
    if source.is_empty() {
        emit_status(state, view_data, internal_tx, "import canceled: no source given");
        return;
    }
    let name = match runtime.import_workbook(source) {
        Ok(name) => name,
        Err(error) => {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("import failed: {error:#}"),
            );
            return;
        }
    };
    if let Err(error) = refresh_view_data(state, runtime, view_data) {
        emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
        return;
    }
    dispatch_command(
        state,
        view_data,
        internal_tx,
        AppCommand::SelectTab(name.clone()),
    );
    view_data.cursor = 0;
    emit_status(state, view_data, internal_tx, format!("imported {name}"));
}

fn reload<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    state.dispatch(AppCommand::ClearStatus);
    match refresh_view_data(state, runtime, view_data) {
        Ok(()) if state.status_line.is_some() => {
            view_data.status_token = view_data.status_token.saturating_add(1);
            schedule_status_clear(internal_tx, view_data.status_token);
        }
        Ok(()) => emit_status(state, view_data, internal_tx, "reloaded"),
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
        }
    }
}

fn open_price_input(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(item) = cursor_item(state, view_data) else {
        emit_status(state, view_data, internal_tx, "no item under cursor");
        return;
    };
    let current = staged_price(state, view_data, &item.title).unwrap_or(item.price_cents);
    let prefill = format_plain_cents(current);
    dispatch_command(state, view_data, internal_tx, AppCommand::OpenPriceInput);
    if state.mode == AppMode::PriceInput {
        view_data.input = prefill;
    }
}

fn submit_price(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let target = state
        .active_tab_name()
        .map(str::to_owned)
        .zip(cursor_item(state, view_data).map(|item| item.title.clone()));
    let Some((tab, title)) = target else {
        view_data.input.clear();
        dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
        return;
    };

    let input = PriceEditInput::new(title.clone(), view_data.input.clone());
    let result = input
        .validate()
        .and_then(|_| view_data.edits.entry(tab).or_default().apply(&input));
    match result {
        Ok(cents) => {
            view_data.input.clear();
            dispatch_command(state, view_data, internal_tx, AppCommand::ExitToNav);
            let price = format_display_price(cents, view_data.settings.page.locale);
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("{} set to {price} -- press s to save", title.trim()),
            );
        }
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

fn save_active_edits<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(tab) = state.active_tab_name().map(str::to_owned) else {
        emit_status(state, view_data, internal_tx, "no workbook open");
        return;
    };
    let Some(edits) = view_data
        .edits
        .get(&tab)
        .filter(|edits| !edits.is_empty())
        .cloned()
    else {
        emit_status(state, view_data, internal_tx, "no price edits to save");
        return;
    };

    match runtime.save_prices(&tab, &edits) {
        Ok(patched) => {
            view_data.edits.remove(&tab);
            if let Err(error) = refresh_view_data(state, runtime, view_data) {
                emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
                return;
            }
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("saved {patched} price cell(s) to {tab}"),
            );
        }
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("save failed: {error:#}"));
        }
    }
}

fn has_unsaved_edits(view_data: &ViewData) -> bool {
    view_data.edits.values().any(|edits| !edits.is_empty())
}

fn toggle_cursor_item(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(index) = cursor_item(state, view_data).map(|item| item.source_row_index) else {
        emit_status(state, view_data, internal_tx, "no item under cursor");
        return;
    };
    dispatch_command(state, view_data, internal_tx, AppCommand::ToggleItem(index));
}

fn move_cursor(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let len = visible_items(state, view_data).len();
    if len == 0 {
        view_data.cursor = 0;
        return;
    }
    let next = (view_data.cursor as isize + delta).clamp(0, len as isize - 1);
    view_data.cursor = next as usize;
}

fn clamp_cursor(state: &AppState, view_data: &mut ViewData) {
    let len = visible_items(state, view_data).len();
    view_data.cursor = view_data.cursor.min(len.saturating_sub(1));
}

fn active_workbook<'a>(state: &AppState, view_data: &'a ViewData) -> Option<&'a Workbook> {
    let name = state.active_tab_name()?;
    view_data
        .workbooks
        .iter()
        .find(|workbook| workbook.name == name)
}

fn list_rows<'a>(state: &AppState, view_data: &'a ViewData) -> Vec<ListRow<'a>> {
    let Some(workbook) = active_workbook(state, view_data) else {
        return Vec::new();
    };
    let filtered = filter_items(&workbook.items, &state.search);
    group_items(filtered, view_data.settings.page.locale)
        .into_iter()
        .flat_map(|section| {
            iter::once(ListRow::Section {
                label: section.label,
                count: section.items.len(),
            })
            .chain(section.items.into_iter().map(ListRow::Item))
        })
        .collect()
}

fn visible_items<'a>(state: &AppState, view_data: &'a ViewData) -> Vec<&'a LineItem> {
    list_rows(state, view_data)
        .into_iter()
        .filter_map(|row| match row {
            ListRow::Item(item) => Some(item),
            ListRow::Section { .. } => None,
        })
        .collect()
}

fn cursor_item<'a>(state: &AppState, view_data: &'a ViewData) -> Option<&'a LineItem> {
    visible_items(state, view_data)
        .get(view_data.cursor)
        .copied()
}

fn staged_price(state: &AppState, view_data: &ViewData, title: &str) -> Option<i64> {
    let tab = state.active_tab_name()?;
    view_data.edits.get(tab)?.get(title.trim())
}

fn selected_items(state: &AppState, view_data: &ViewData) -> Vec<LineItem> {
    state
        .selection
        .selected_across(&view_data.workbooks)
        .into_iter()
        .map(|(_, item)| item.clone())
        .collect()
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let tab_titles = state
        .tabs
        .iter()
        .map(|tab| tab_title(state, tab))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("pricebook").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(state.active_tab);
    frame.render_widget(tabs, layout[0]);

    if state.tabs.is_empty() {
        let empty = Paragraph::new("no workbooks yet -- press i to import one")
            .block(Block::default().borders(Borders::ALL).title("items"));
        frame.render_widget(empty, layout[1]);
    } else {
        let (lines, cursor_line) = body_lines(state, view_data);
        let visible_rows = usize::from(layout[1].height.saturating_sub(2));
        let offset = cursor_line.saturating_sub(visible_rows.saturating_sub(1));
        let body = Paragraph::new(lines)
            .scroll((u16::try_from(offset).unwrap_or(u16::MAX), 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(body_title(state, view_data)),
            );
        frame.render_widget(body, layout[1]);
    }

    let total = Paragraph::new(total_bar_text(state, view_data)).style(
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(total, layout[2]);

    let status =
        Paragraph::new(status_text(state, view_data)).style(Style::default().fg(Color::Yellow));
    frame.render_widget(status, layout[3]);

    match state.overlay {
        Overlay::None => {}
        Overlay::Receipt => {
            let area = centered_rect(60, 80, frame.area());
            frame.render_widget(Clear, area);
            let receipt = Paragraph::new(render_receipt_overlay_text(state, view_data))
                .scroll((view_data.receipt_scroll, 0))
                .block(Block::default().title("receipt").borders(Borders::ALL));
            frame.render_widget(receipt, area);
        }
        Overlay::Review => {
            let area = centered_rect(70, 70, frame.area());
            frame.render_widget(Clear, area);
            let review = Paragraph::new(render_review_overlay_text(state, view_data)).block(
                Block::default()
                    .title("selected items")
                    .borders(Borders::ALL),
            );
            frame.render_widget(review, area);
        }
        Overlay::Help => {
            let area = centered_rect(80, 60, frame.area());
            frame.render_widget(Clear, area);
            let help = Paragraph::new(help_overlay_text())
                .block(Block::default().title("help").borders(Borders::ALL));
            frame.render_widget(help, area);
        }
    }
}

fn tab_title(state: &AppState, tab: &str) -> String {
    if state.editing_tabs.contains(tab) {
        format!(" {tab} [edit] ")
    } else {
        format!(" {tab} ")
    }
}

fn body_title(state: &AppState, view_data: &ViewData) -> String {
    let Some(workbook) = active_workbook(state, view_data) else {
        return "items".to_owned();
    };
    let shown = visible_items(state, view_data).len();
    let mut title = format!(" {} -- {shown}/{} items", workbook.name, workbook.items.len());
    if !state.search.trim().is_empty() {
        title.push_str(&format!(" | search: {}", state.search.trim()));
    }
    if state.is_editing() {
        title.push_str(" | editing prices");
    }
    title.push(' ');
    title
}

fn body_lines(state: &AppState, view_data: &ViewData) -> (Vec<Line<'static>>, usize) {
    let tab = state.active_tab_name().unwrap_or_default();
    let locale = view_data.settings.page.locale;
    let rows = list_rows(state, view_data);
    let mut lines = Vec::with_capacity(rows.len());
    let mut item_position = 0;
    let mut cursor_line = 0;
    for row in rows {
        match row {
            ListRow::Section { label, count } => lines.push(section_line(&label, count)),
            ListRow::Item(item) => {
                let selected = state.selection.is_selected(tab, item.source_row_index);
                let staged = staged_price(state, view_data, &item.title);
                let mut line = item_line(item, selected, staged, locale);
                if item_position == view_data.cursor {
                    cursor_line = lines.len();
                    line = line.patch_style(Style::default().add_modifier(Modifier::REVERSED));
                }
                item_position += 1;
                lines.push(line);
            }
        }
    }
    (lines, cursor_line)
}

fn section_line(label: &str, count: usize) -> Line<'static> {
    Line::from(Span::styled(
        format!("{label} ({count})"),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))
}

fn item_line(
    item: &LineItem,
    selected: bool,
    staged: Option<i64>,
    locale: Locale,
) -> Line<'static> {
    let mark = if selected { "  [x] " } else { "  [ ] " };
    let mut spans = vec![Span::raw(mark), Span::raw(item.title.clone())];
    for (text, color) in [
        (&item.tag0_text, &item.tag0_color),
        (&item.tag1_text, &item.tag1_color),
    ] {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {text} "), tag_style(color.as_ref())));
    }
    if !item.time.trim().is_empty() {
        spans.push(Span::styled(
            format!("  {}", item.time.trim()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let price = match staged {
        Some(cents) if cents != item.price_cents => Span::styled(
            format!("  {} *", format_display_price(cents, locale)),
            Style::default().fg(Color::Yellow),
        ),
        _ => Span::raw(format!("  {}", format_display_price(item.price_cents, locale))),
    };
    spans.push(price);
    Line::from(spans)
}

fn tag_style(color: Option<&TagColor>) -> Style {
    let Some(color) = color else {
        return Style::default().fg(Color::Cyan);
    };
    let (r, g, b) = color.rgb();
    let luma = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000;
    let fg = if luma > 150 { Color::Black } else { Color::White };
    Style::default().bg(Color::Rgb(r, g, b)).fg(fg)
}

fn total_bar_text(state: &AppState, view_data: &ViewData) -> String {
    let locale = view_data.settings.page.locale;
    let total = state.selection.total_cents(&view_data.workbooks);
    let mut text = format!(
        " selected {} | total {}",
        state.selection.len(),
        format_total(total, locale)
    );
    let pending = view_data.edits.values().map(PriceEdits::len).sum::<usize>();
    if pending > 0 {
        text.push_str(&format!(" | {pending} unsaved price edit(s)"));
    }
    if !state.receipt_title.is_empty() {
        text.push_str(&format!(" | receipt: {}", state.receipt_title));
    }
    text
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let prompt = match state.mode {
        AppMode::Nav => {
            return state
                .status_line
                .clone()
                .unwrap_or_else(|| "? help | q quit".to_owned());
        }
        AppMode::Search => format!("search: {}", view_data.input),
        AppMode::PriceInput => format!("new price: {}", view_data.input),
        AppMode::TitleInput => format!("receipt title: {}", view_data.input),
        AppMode::ImportInput => format!("import path or URL: {}", view_data.input),
    };
    match &state.status_line {
        Some(status) if state.mode == AppMode::PriceInput => format!("{prompt}  [{status}]"),
        _ => prompt,
    }
}

fn render_receipt_overlay_text(state: &AppState, view_data: &ViewData) -> String {
    let printed_at = view_data
        .printed_at
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    receipt_text(
        &selected_items(state, view_data),
        &view_data.settings,
        &state.receipt_title,
        printed_at,
    )
}

fn render_review_overlay_text(state: &AppState, view_data: &ViewData) -> String {
    let locale = view_data.settings.page.locale;
    let selected = state.selection.selected_across(&view_data.workbooks);
    if selected.is_empty() {
        return "nothing selected -- press space on an item to select it".to_owned();
    }

    let mut lines = Vec::new();
    let mut current: Option<&str> = None;
    for &(workbook, item) in &selected {
        if current != Some(workbook) {
            if current.is_some() {
                lines.push(String::new());
            }
            lines.push(format!("{workbook}:"));
            current = Some(workbook);
        }
        lines.push(format!(
            "  {}  {}",
            item.full_title(),
            format_display_price(item.price_cents, locale)
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "{} item(s) | total {}",
        selected.len(),
        format_total(state.selection.total_cents(&view_data.workbooks), locale)
    ));
    lines.join("\n")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit\n\
nav: j/k move | g/G top/bottom | f/b tabs | / search | space select | c clear selection\n\
nav: e toggle price editing | enter edit price | s save prices | i import | R reload\n\
nav: r receipt | t receipt title | v review selection | ? help | q quit\n\
input: enter accept | esc cancel | backspace delete\n\
receipt: j/k scroll | t title | r or esc close\n\
review: c clear selection | v or esc close"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
