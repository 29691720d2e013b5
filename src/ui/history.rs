use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};
use turnwise::{recommend::Action, session::Session, util::iso_millis};

use crate::App;

pub struct SessionRowData {
    pub started: String,
    pub scenario: String,
    pub level: u8,
    pub responses: usize,
    pub avg_latency_s: Option<f64>,
    pub valid_ratio: Option<f64>,
    pub end_reason: String,
    pub action: Option<Action>,
    pub to_level: Option<u8>,
}

impl SessionRowData {
    pub fn from_session(session: &Session) -> Self {
        let analysis = session.analysis.as_ref();
        let mut started = iso_millis(session.started_at);
        // minute precision is enough for the table
        started.truncate(16);
        Self {
            started: started.replace('T', " "),
            scenario: session.script_title.clone(),
            level: session.level_at_start.get(),
            responses: session.events.len(),
            avg_latency_s: analysis.map(|a| a.avg_latency_ms as f64 / 1000.0),
            valid_ratio: analysis.map(|a| a.valid_ratio),
            end_reason: session
                .end_reason
                .map_or_else(|| "—".to_string(), |r| r.to_string()),
            action: analysis.map(|a| a.rec.action),
            to_level: analysis.map(|a| a.rec.to_level.get()),
        }
    }
}

pub fn action_color(action: Action) -> Color {
    match action {
        Action::Advance => Color::Green,
        Action::Hold => Color::Yellow,
        Action::Regress => Color::Red,
    }
}

/// Pure presenter for a single archived session row
pub fn present_row(data: &SessionRowData) -> Row<'static> {
    let latency_display = data
        .avg_latency_s
        .map_or_else(|| "—".to_string(), |s| format!("{s:.1}"));

    let valid_display = data
        .valid_ratio
        .map_or_else(|| "—".to_string(), |v| format!("{:.0}%", v * 100.0));

    let valid_style = match data.valid_ratio {
        Some(v) if v >= 0.85 => Style::default().fg(Color::Green),
        Some(v) if v >= 0.6 => Style::default().fg(Color::Yellow),
        Some(_) => Style::default().fg(Color::Red),
        None => Style::default(),
    };

    let (rec_display, rec_style) = match (data.action, data.to_level) {
        (Some(action), Some(to_level)) => (
            format!("{action} → L{to_level}"),
            Style::default().fg(action_color(action)),
        ),
        _ => ("—".to_string(), Style::default().fg(Color::Gray)),
    };

    Row::new(vec![
        Cell::from(data.started.clone()),
        Cell::from(data.scenario.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(format!("L{}", data.level)),
        Cell::from(data.responses.to_string()),
        Cell::from(latency_display),
        Cell::from(valid_display).style(valid_style),
        Cell::from(data.end_reason.clone()),
        Cell::from(rec_display).style(rec_style),
    ])
}

/// Render the session history screen
pub fn render_history(app: &mut App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Sessions table
            Constraint::Length(2), // Instructions
        ])
        .split(area);

    let history = app.trainer.history();
    let title_text = format!(
        "Session history ({} of {} kept)",
        history.len(),
        history.capacity()
    );
    let title = Paragraph::new(title_text)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    if history.is_empty() {
        let no_data = Paragraph::new("No sessions recorded yet. Finish or reset a conversation.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(no_data, chunks[1]);
    } else {
        // borders + header
        let table_height = chunks[1].height.saturating_sub(3) as usize;
        let max_scroll = history.len().saturating_sub(table_height);
        let offset = app.history_state.scroll_offset.min(max_scroll);

        let visible_rows: Vec<Row> = history
            .iter()
            .rev()
            .skip(offset)
            .take(table_height)
            .map(|session| present_row(&SessionRowData::from_session(session)))
            .collect();

        let header = Row::new(vec![
            Cell::from("Started"),
            Cell::from("Scenario"),
            Cell::from("Level"),
            Cell::from("Resp"),
            Cell::from("Avg s"),
            Cell::from("Valid"),
            Cell::from("Ended by"),
            Cell::from("Next"),
        ])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let widths = [
            Constraint::Length(16),
            Constraint::Min(16),
            Constraint::Length(5),
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Length(5),
            Constraint::Length(16),
            Constraint::Length(12),
        ];

        let table = Table::new(visible_rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Sessions"))
            .column_spacing(1);

        f.render_widget(table, chunks[1]);
        app.history_state.scroll_offset = offset;
    }

    let instructions =
        Paragraph::new("(↑/↓) scroll  (PgUp/PgDn) page  (Home) top  (b/backspace) back  (esc) quit")
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
    f.render_widget(instructions, chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_data() -> SessionRowData {
        SessionRowData {
            started: "2026-01-02 10:30".into(),
            scenario: "Cumprimentos".into(),
            level: 2,
            responses: 7,
            avg_latency_s: Some(3.25),
            valid_ratio: Some(0.9),
            end_reason: "ended".into(),
            action: Some(Action::Advance),
            to_level: Some(3),
        }
    }

    #[test]
    fn test_present_row_renders_in_table() {
        use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

        let widths = [Constraint::Length(16), Constraint::Min(12)];
        let table = Table::new(vec![present_row(&row_data())], widths).column_spacing(1);
        let area = Rect::new(0, 0, 40, 1);
        let mut buffer = Buffer::empty(area);
        table.render(area, &mut buffer);
        let rendered: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(rendered.starts_with("2026-01-02 10:30 Cumprimentos"));
    }

    #[test]
    fn test_action_colors() {
        assert_eq!(action_color(Action::Advance), Color::Green);
        assert_eq!(action_color(Action::Hold), Color::Yellow);
        assert_eq!(action_color(Action::Regress), Color::Red);
    }

    #[test]
    fn test_from_session_without_analysis() {
        use turnwise::{level::Level, script::default_scripts};
        let session = Session::new(&default_scripts()[0], Level::TWO, 0);
        let data = SessionRowData::from_session(&session);
        assert_eq!(data.started, "1970-01-01 00:00");
        assert_eq!(data.level, 2);
        assert_eq!(data.responses, 0);
        assert_eq!(data.end_reason, "—");
        assert!(data.action.is_none());
        let _ = present_row(&data);
    }
}
