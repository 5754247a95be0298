mod dispatch;
mod mouse;

use crate::domain::{CatalogListener, Record};
use crate::infra::LinkState;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent};
use std::sync::mpsc::Sender;
use thiserror::Error;

pub use dispatch::dispatch_line;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ResolveStateDir(#[from] crate::infra::ResolveStateDirError),

    #[error("{0}\nHint: run `dexlink fetch` to download the catalog.")]
    LoadDex(#[from] crate::infra::LoadDexError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CatalogSignal {
    CurrentChanged { index: usize },
}

/// Forwards selection changes to the render loop.
pub struct SelectionNotifier {
    tx: Sender<CatalogSignal>,
}

impl SelectionNotifier {
    pub fn new(tx: Sender<CatalogSignal>) -> Self {
        Self { tx }
    }
}

impl CatalogListener for SelectionNotifier {
    fn current_changed(&mut self, index: usize, _record: &Record) {
        let _ = self.tx.send(CatalogSignal::CurrentChanged { index });
    }
}

/// View state for the browser. The catalog itself lives with the controller;
/// the model only mirrors the current index.
#[derive(Clone, Debug)]
pub struct AppModel {
    pub record_count: usize,
    pub selected: usize,
    pub list_offset: usize,
    pub link_state: LinkState,
    pub link_label: String,
    pub terminal_size: (u16, u16),
    pub notice: Option<String>,
    pub help_open: bool,
}

impl AppModel {
    pub fn new(record_count: usize, link_label: String) -> Self {
        Self {
            record_count,
            selected: 0,
            list_offset: 0,
            link_state: LinkState::Disconnected,
            link_label,
            terminal_size: (0, 0),
            notice: None,
            help_open: false,
        }
    }

    pub fn with_notice(&self, notice: Option<String>) -> Self {
        Self {
            notice,
            ..self.clone()
        }
    }

    /// Mirrors a catalog selection change and keeps the row in view.
    pub fn with_selection(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.selected = index.min(self.record_count.saturating_sub(1));
        next.list_offset = clamp_list_offset(
            next.selected,
            next.list_offset,
            list_visible_rows(next.terminal_size),
        );
        next
    }

    pub fn with_terminal_size(&self, width: u16, height: u16) -> Self {
        let mut next = self.clone();
        next.terminal_size = (width, height);
        next.list_offset = clamp_list_offset(
            next.selected,
            next.list_offset,
            list_visible_rows(next.terminal_size),
        );
        next
    }

    pub fn with_link_state(&self, state: LinkState) -> Self {
        let previous = self.link_state;
        let mut next = self.clone();
        next.link_state = state;
        next.notice = match (previous, state) {
            (_, LinkState::Connected) => Some(format!("Linked to {}.", self.link_label)),
            (LinkState::Connected, LinkState::Disconnected) => Some("Link closed.".to_string()),
            (_, LinkState::Connecting) => Some(format!("Connecting to {}…", self.link_label)),
            _ => self.notice.clone(),
        };
        next
    }

    pub fn with_link_error(&self, message: &str) -> Self {
        self.with_notice(Some(format!("Link error: {message}")))
    }
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Navigation {
    Next,
    Prev,
    Random,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    Navigate(Navigation),
    SelectIndex(usize),
    PlayCry,
    Connect,
    Disconnect,
}

pub fn update(model: AppModel, event: AppEvent) -> (AppModel, AppCommand) {
    match event {
        AppEvent::Key(key) => update_on_key(model, key),
        AppEvent::Mouse(mouse) => mouse::update_on_mouse(model, mouse),
    }
}

fn update_on_key(model: AppModel, key: KeyEvent) -> (AppModel, AppCommand) {
    let mut model = model;
    model.notice = None;

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return (model, AppCommand::Quit);
    }

    if model.help_open {
        match key.code {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') => model.help_open = false,
            KeyCode::Char('q') => return (model, AppCommand::Quit),
            _ => {}
        }
        return (model, AppCommand::None);
    }

    let command = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => AppCommand::Quit,
        KeyCode::Char('?') | KeyCode::F(1) => {
            model.help_open = true;
            AppCommand::None
        }
        KeyCode::Right | KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('l') => {
            AppCommand::Navigate(Navigation::Next)
        }
        KeyCode::Left | KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('h') => {
            AppCommand::Navigate(Navigation::Prev)
        }
        KeyCode::Char('r') | KeyCode::Char('R') => AppCommand::Navigate(Navigation::Random),
        KeyCode::Char(' ') => AppCommand::PlayCry,
        KeyCode::Home if model.record_count > 0 => AppCommand::SelectIndex(0),
        KeyCode::End if model.record_count > 0 => {
            AppCommand::SelectIndex(model.record_count - 1)
        }
        KeyCode::Char('c') => {
            if model.link_state == LinkState::Connected {
                model.notice = Some(format!("Already linked to {}.", model.link_label));
            }
            AppCommand::Connect
        }
        KeyCode::Char('x') => AppCommand::Disconnect,
        _ => AppCommand::None,
    };

    (model, command)
}

/// Rows available inside the list panel for a terminal of `terminal_size`.
pub fn list_visible_rows(terminal_size: (u16, u16)) -> usize {
    let (width, height) = terminal_size;
    let layout = crate::ui::browser_layout(ratatui::layout::Rect {
        x: 0,
        y: 0,
        width,
        height,
    });
    usize::from(layout.list_rows().height)
}

pub fn clamp_list_offset(selected: usize, offset: usize, visible_rows: usize) -> usize {
    if visible_rows == 0 {
        return selected;
    }
    if selected < offset {
        return selected;
    }
    if selected >= offset + visible_rows {
        return selected + 1 - visible_rows;
    }
    offset
}
