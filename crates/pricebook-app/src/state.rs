// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::catalog::Selection;
use crate::ids::SourceRowIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Search,
    PriceInput,
    TitleInput,
    ImportInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Receipt,
    Review,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub tabs: Vec<String>,
    pub active_tab: usize,
    pub search: String,
    pub editing_tabs: BTreeSet<String>,
    pub overlay: Overlay,
    pub receipt_title: String,
    pub selection: Selection,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            tabs: Vec::new(),
            active_tab: 0,
            search: String::new(),
            editing_tabs: BTreeSet::new(),
            overlay: Overlay::None,
            receipt_title: String::new(),
            selection: Selection::default(),
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    SetTabs(Vec<String>),
    NextTab,
    PrevTab,
    SelectTab(String),
    EnterSearch,
    SetSearch(String),
    ExitToNav,
    ToggleEditing,
    OpenPriceInput,
    OpenTitleInput,
    OpenImportInput,
    SetReceiptTitle(String),
    ToggleItem(SourceRowIndex),
    ClearSelection,
    ShowOverlay(Overlay),
    CloseOverlay,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(usize),
    TabsReplaced(usize),
    SearchChanged(String),
    EditingChanged { tab: String, editing: bool },
    ReceiptTitleChanged(String),
    SelectionChanged {
        tab: String,
        index: SourceRowIndex,
        selected: bool,
    },
    SelectionCleared,
    OverlayChanged(Overlay),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn active_tab_name(&self) -> Option<&str> {
        self.tabs.get(self.active_tab).map(String::as_str)
    }

    pub fn is_editing(&self) -> bool {
        self.active_tab_name()
            .is_some_and(|tab| self.editing_tabs.contains(tab))
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::SetTabs(tabs) => self.replace_tabs(tabs),
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SelectTab(name) => {
                let Some(position) = self.tabs.iter().position(|tab| *tab == name) else {
                    return vec![self.set_status(&format!("no workbook named {name}"))];
                };
                self.active_tab = position;
                vec![AppEvent::TabChanged(self.active_tab)]
            }
            AppCommand::EnterSearch => {
                self.mode = AppMode::Search;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SetSearch(query) => {
                self.search = query;
                vec![AppEvent::SearchChanged(self.search.clone())]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ToggleEditing => self.toggle_editing(),
            AppCommand::OpenPriceInput => {
                if !self.is_editing() {
                    return vec![self.set_status("press e to enable price editing first")];
                }
                self.mode = AppMode::PriceInput;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenTitleInput => {
                self.mode = AppMode::TitleInput;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenImportInput => {
                self.mode = AppMode::ImportInput;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SetReceiptTitle(title) => {
                self.receipt_title = title.trim().to_owned();
                self.mode = AppMode::Nav;
                vec![
                    AppEvent::ReceiptTitleChanged(self.receipt_title.clone()),
                    AppEvent::ModeChanged(self.mode),
                ]
            }
            AppCommand::ToggleItem(index) => {
                let Some(tab) = self.active_tab_name().map(str::to_owned) else {
                    return vec![self.set_status("no workbook open")];
                };
                let selected = self.selection.toggle(&tab, index);
                vec![AppEvent::SelectionChanged {
                    tab,
                    index,
                    selected,
                }]
            }
            AppCommand::ClearSelection => {
                self.selection.clear_all();
                vec![AppEvent::SelectionCleared, self.set_status("selection cleared")]
            }
            AppCommand::ShowOverlay(overlay) => {
                self.overlay = overlay;
                vec![AppEvent::OverlayChanged(self.overlay)]
            }
            AppCommand::CloseOverlay => {
                self.overlay = Overlay::None;
                vec![AppEvent::OverlayChanged(self.overlay)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn replace_tabs(&mut self, tabs: Vec<String>) -> Vec<AppEvent> {
        let current = self.active_tab_name().map(str::to_owned);
        self.editing_tabs.retain(|tab| tabs.contains(tab));
        self.active_tab = current
            .and_then(|name| tabs.iter().position(|tab| *tab == name))
            .unwrap_or(0);
        self.tabs = tabs;
        vec![AppEvent::TabsReplaced(self.tabs.len())]
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        if self.tabs.is_empty() {
            return Vec::new();
        }
        let len = self.tabs.len() as isize;
        let next = (self.active_tab as isize + delta).rem_euclid(len) as usize;
        self.active_tab = next;
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn toggle_editing(&mut self) -> Vec<AppEvent> {
        let Some(tab) = self.active_tab_name().map(str::to_owned) else {
            return vec![self.set_status("no workbook open")];
        };
        let editing = if self.editing_tabs.remove(&tab) {
            false
        } else {
            self.editing_tabs.insert(tab.clone());
            true
        };
        let label = if editing { "price editing on" } else { "price editing off" };
        vec![
            AppEvent::EditingChanged { tab, editing },
            self.set_status(label),
        ]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
