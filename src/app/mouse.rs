use super::{AppCommand, AppModel, Navigation};
use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

pub(super) fn update_on_mouse(model: AppModel, mouse: MouseEvent) -> (AppModel, AppCommand) {
    if model.terminal_size.0 == 0 || model.terminal_size.1 == 0 || model.help_open {
        return (model, AppCommand::None);
    }

    let (width, height) = model.terminal_size;
    let layout = crate::ui::browser_layout(Rect {
        x: 0,
        y: 0,
        width,
        height,
    });
    if !rect_contains(layout.list, mouse.column, mouse.row) {
        return (model, AppCommand::None);
    }

    let command = match mouse.kind {
        MouseEventKind::ScrollUp => AppCommand::Navigate(Navigation::Prev),
        MouseEventKind::ScrollDown => AppCommand::Navigate(Navigation::Next),
        MouseEventKind::Down(MouseButton::Left) => {
            clicked_index(&model, layout.list_rows(), mouse.row)
                .map(AppCommand::SelectIndex)
                .unwrap_or(AppCommand::None)
        }
        _ => AppCommand::None,
    };

    (model, command)
}

fn clicked_index(model: &AppModel, rows: Rect, row: u16) -> Option<usize> {
    if row < rows.y || row >= rows.y.saturating_add(rows.height) {
        return None;
    }
    let index = model.list_offset + usize::from(row - rows.y);
    (index < model.record_count).then_some(index)
}

fn rect_contains(area: Rect, col: u16, row: u16) -> bool {
    col >= area.x
        && col < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppEvent, update};
    use crossterm::event::KeyModifiers;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> AppEvent {
        AppEvent::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn model() -> AppModel {
        AppModel::new(151, "tcp://localhost:3333".to_string()).with_terminal_size(100, 30)
    }

    fn list_rows() -> Rect {
        crate::ui::browser_layout(Rect::new(0, 0, 100, 30)).list_rows()
    }

    #[test]
    fn click_on_row_selects_with_offset() {
        let rows = list_rows();
        let (_, command) = update(
            model(),
            mouse(MouseEventKind::Down(MouseButton::Left), rows.x + 2, rows.y + 3),
        );
        assert_eq!(command, AppCommand::SelectIndex(3));

        let scrolled = model().with_selection(40);
        let offset = scrolled.list_offset;
        let (_, command) = update(
            scrolled,
            mouse(MouseEventKind::Down(MouseButton::Left), rows.x + 2, rows.y),
        );
        assert_eq!(command, AppCommand::SelectIndex(offset));
    }

    #[test]
    fn click_past_last_record_does_nothing() {
        let rows = list_rows();
        let short = AppModel::new(2, "x".to_string()).with_terminal_size(100, 30);
        let (_, command) = update(
            short,
            mouse(MouseEventKind::Down(MouseButton::Left), rows.x + 2, rows.y + 5),
        );
        assert_eq!(command, AppCommand::None);
    }

    #[test]
    fn wheel_over_list_navigates() {
        let rows = list_rows();
        let (_, command) = update(model(), mouse(MouseEventKind::ScrollDown, rows.x, rows.y));
        assert_eq!(command, AppCommand::Navigate(Navigation::Next));
        let (_, command) = update(model(), mouse(MouseEventKind::ScrollUp, rows.x, rows.y));
        assert_eq!(command, AppCommand::Navigate(Navigation::Prev));
    }

    #[test]
    fn events_outside_list_are_ignored() {
        let (_, command) = update(model(), mouse(MouseEventKind::ScrollDown, 0, 0));
        assert_eq!(command, AppCommand::None);
        let (_, command) = update(model(), mouse(MouseEventKind::Down(MouseButton::Left), 3, 5));
        assert_eq!(command, AppCommand::None);
    }
}
