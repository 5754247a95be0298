mod theme;

use crate::app::AppModel;
use crate::domain::Record;
use crate::infra::LinkState;
use ratatui::prelude::*;
use ratatui::widgets::*;
use unicode_width::UnicodeWidthStr;

/// Screen regions shared by rendering and mouse hit-testing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BrowserLayout {
    pub menu: Rect,
    pub card: Rect,
    pub list: Rect,
    pub footer: Rect,
}

impl BrowserLayout {
    /// List rows inside the panel border.
    pub fn list_rows(&self) -> Rect {
        self.list.inner(Margin {
            vertical: 1,
            horizontal: 1,
        })
    }
}

pub fn browser_layout(full_area: Rect) -> BrowserLayout {
    let menu = Rect {
        height: full_area.height.min(1),
        ..full_area
    };
    let content = Rect {
        y: full_area.y.saturating_add(menu.height),
        height: full_area.height.saturating_sub(menu.height),
        ..full_area
    };
    let content = inner_area(content);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(content);
    let (body, footer) = (rows[0], rows[1]);

    let panels = if body.width >= 70 {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
            .split(body)
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(12), Constraint::Min(0)])
            .split(body)
    };

    BrowserLayout {
        menu,
        card: panels[0],
        list: panels[1],
        footer,
    }
}

pub fn render(frame: &mut Frame, model: &AppModel, records: &[Record]) {
    let full_area = frame.area();
    if full_area.width == 0 || full_area.height == 0 {
        return;
    }

    let layout = browser_layout(full_area);
    frame.render_widget(Block::default().style(Style::default().bg(theme::BEZEL)), full_area);

    render_menu_bar(frame, layout.menu, model);
    match records.get(model.selected) {
        Some(record) => render_card(frame, layout.card, record),
        None => render_empty_card(frame, layout.card),
    }
    render_list(frame, layout.list, model, records);
    render_footer(frame, layout.footer, model);

    if model.help_open {
        render_help_overlay(frame, full_area);
    }
}

fn render_menu_bar(frame: &mut Frame, area: Rect, model: &AppModel) {
    if area.height == 0 {
        return;
    }

    let base_style = Style::default().fg(theme::FG).bg(theme::BAR_BG);
    let title_style = base_style.add_modifier(Modifier::BOLD);
    let (dot, dot_color) = match model.link_state {
        LinkState::Connected => ("●", theme::LINKED),
        LinkState::Connecting => ("◌", theme::PENDING),
        LinkState::Failed => ("●", theme::ERROR),
        LinkState::Disconnected => ("○", theme::MUTED),
    };

    let title = " DEXLINK ";
    let status = format!(" {dot} {} ", model.link_state.label());
    let hint = " ?=help ";
    let fixed = UnicodeWidthStr::width(title)
        + UnicodeWidthStr::width(status.as_str())
        + UnicodeWidthStr::width(hint);
    let label_width = (area.width as usize).saturating_sub(fixed + 1);
    let label = truncate_middle(&model.link_label, label_width);
    let remaining = (area.width as usize)
        .saturating_sub(fixed + UnicodeWidthStr::width(label.as_str()));

    let spans = vec![
        Span::styled(title.to_string(), title_style),
        Span::styled(status, base_style.fg(dot_color)),
        Span::styled(label, base_style.fg(theme::MUTED)),
        Span::styled(" ".repeat(remaining), base_style),
        Span::styled(hint.to_string(), base_style.fg(theme::MUTED)),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)).style(base_style), area);
}

fn render_card(frame: &mut Frame, area: Rect, record: &Record) {
    let screen = Style::default().fg(theme::SCREEN_FG).bg(theme::SCREEN_BG);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Thick)
        .border_style(Style::default().fg(theme::SHELL))
        .padding(Padding::horizontal(1))
        .title(Span::styled(
            format!(" {} ", record.dex_number()),
            Style::default().fg(theme::FG).add_modifier(Modifier::BOLD),
        ))
        .style(screen);

    let name_bar = Style::default()
        .fg(theme::SCREEN_BG)
        .bg(theme::SCREEN_FG)
        .add_modifier(Modifier::BOLD);
    let inner_width = area.width.saturating_sub(4) as usize;
    let name = format!(" {} ", record.display_name());
    let name_pad = inner_width.saturating_sub(UnicodeWidthStr::width(name.as_str()));

    let mut lines = vec![
        Line::from(vec![
            Span::styled(record.dex_number(), screen.add_modifier(Modifier::BOLD)),
            Span::styled("  ", screen),
            Span::styled(record.type_label(), screen),
        ]),
        Line::from(""),
        Line::from(Span::styled(format!("{name}{}", " ".repeat(name_pad)), name_bar)),
        Line::from(""),
    ];
    if record.description.trim().is_empty() {
        lines.push(Line::from(Span::styled("No entry.", screen.add_modifier(Modifier::ITALIC))));
    } else {
        lines.push(Line::from(record.description.clone()));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(record.height_label()));
    lines.push(Line::from(record.weight_label()));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_empty_card(frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new("No entries loaded.").block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme::SHELL))
            .padding(Padding::horizontal(1)),
    );
    frame.render_widget(paragraph, area);
}

fn render_list(frame: &mut Frame, area: Rect, model: &AppModel, records: &[Record]) {
    let max_width = (area.width as usize).saturating_sub(4);
    let items: Vec<ListItem> = records
        .iter()
        .map(|record| {
            let text = format!("{}  {}", record.dex_number(), record.display_name());
            ListItem::new(truncate_end(&text, max_width))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::BORDER))
                .title(format!(" Entries ({}) ", records.len())),
        )
        .style(Style::default().fg(theme::FG))
        .highlight_style(
            Style::default()
                .fg(theme::BEZEL)
                .bg(theme::HIGHLIGHT)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default().with_offset(model.list_offset);
    if !records.is_empty() {
        state.select(Some(model.selected.min(records.len() - 1)));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, model: &AppModel) {
    let line = match &model.notice {
        Some(notice) => Line::from(Span::styled(
            truncate_end(notice, area.width as usize),
            Style::default().fg(theme::HIGHLIGHT),
        )),
        None => Line::from(Span::styled(
            truncate_end(
                "←/→ browse  Space cry  r random  c connect  x disconnect  ? help  q quit",
                area.width as usize,
            ),
            Style::default().fg(theme::MUTED),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup);

    let text = vec![
        Line::from("Browse"),
        Line::from("  - →/↓/j/l: next entry"),
        Line::from("  - ←/↑/k/h: previous entry"),
        Line::from("  - Home/End: first/last entry"),
        Line::from("  - r: random entry"),
        Line::from("  - Space: play cry"),
        Line::from("  - Mouse: click a row, wheel to browse"),
        Line::from(""),
        Line::from("Device link"),
        Line::from("  - c: connect"),
        Line::from("  - x: disconnect"),
        Line::from("  - Device sends PREV / NEXT / CRY / RAND"),
        Line::from(""),
        Line::from("  - ?/F1 or Esc: close help"),
        Line::from("  - q/Ctrl+C: quit"),
    ];

    let help = Paragraph::new(text)
        .style(Style::default().fg(theme::FG).bg(theme::BEZEL))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::SHELL))
                .padding(Padding::horizontal(1))
                .title(" Help "),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(help, popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
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
        .split(vertical[1])[1]
}

fn inner_area(area: Rect) -> Rect {
    if area.width < 40 || area.height < 12 {
        return area;
    }
    area.inner(Margin {
        vertical: 1,
        horizontal: 2,
    })
}

fn truncate_end(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let ellipsis = "…";
    let mut out = take_prefix_width(text, max_width.saturating_sub(1));
    out.push_str(ellipsis);
    out
}

fn truncate_middle(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let available = max_width.saturating_sub(1);
    if available <= 4 {
        return truncate_end(text, max_width);
    }
    let left = take_prefix_width(text, available / 2);
    let right_width = available - available / 2;
    let mut right = String::new();
    for ch in text.chars().rev() {
        let next = format!("{ch}{right}");
        if UnicodeWidthStr::width(next.as_str()) > right_width {
            break;
        }
        right = next;
    }
    format!("{left}…{right}")
}

fn take_prefix_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        let next = format!("{out}{ch}");
        if UnicodeWidthStr::width(next.as_str()) > width {
            break;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    fn record(id: u32, name: &str) -> Record {
        Record {
            id,
            name: name.to_string(),
            types: vec!["electric".to_string()],
            height_m: 0.4,
            weight_kg: 6.0,
            description: "It keeps its tail raised to monitor its surroundings.".to_string(),
            sprite: String::new(),
            cry: String::new(),
        }
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn renders_card_list_and_link_state() {
        let records = vec![record(1, "Bulbasaur"), record(25, "Pikachu")];
        let model = AppModel::new(records.len(), "/dev/ttyACM0".to_string())
            .with_terminal_size(100, 30)
            .with_selection(1);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("terminal");
        terminal
            .draw(|frame| render(frame, &model, &records))
            .expect("draw");
        let text = buffer_text(&terminal);

        assert!(text.contains("DEXLINK"));
        assert!(text.contains("offline"));
        assert!(text.contains("#025  PIKACHU"));
        assert!(text.contains("#001  BULBASAUR"));
        assert!(text.contains("ELECTRIC POKÉMON"));
        assert!(text.contains("HT 1'04\""));
    }

    #[test]
    fn list_rows_sit_inside_the_border() {
        let layout = browser_layout(Rect::new(0, 0, 100, 30));
        let rows = layout.list_rows();
        assert_eq!(rows.y, layout.list.y + 1);
        assert_eq!(rows.height, layout.list.height - 2);
        assert!(layout.card.x < layout.list.x);
    }

    #[test]
    fn narrow_terminals_stack_panels() {
        let layout = browser_layout(Rect::new(0, 0, 50, 40));
        assert!(layout.card.y < layout.list.y);
        assert_eq!(layout.card.height, 12);
    }

    #[test]
    fn truncation_respects_width() {
        assert_eq!(truncate_end("BULBASAUR", 5), "BULB…");
        assert_eq!(truncate_end("MEW", 5), "MEW");
        assert_eq!(truncate_middle("/dev/tty.usbmodem14201", 11), "/dev/…14201");
    }
}
