pub mod charting;
pub mod history;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use turnwise::{
    engine::{OptionSurface, Speaker, TranscriptLine},
    session::Session,
    time_series::latency_series,
    util::ms_to_seconds,
};
use unicode_width::UnicodeWidthStr;

use crate::{
    ui::{
        charting::{compute_chart_params, format_label, format_ratio},
        history::action_color,
    },
    App, AppState,
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const PARTNER_PREFIX: &str = "› ";

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match (&self.state, self.trainer.last_finalized()) {
            (AppState::Summary, Some(session)) => render_summary(self, session, area, buf),
            _ => render_conversation(self, area, buf),
        }
    }
}

fn render_conversation(app: &App, area: Rect, buf: &mut Buffer) {
    let engine = app.trainer.engine();
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let option_lines = surface_lines(app);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2), // header
            Constraint::Min(3),    // transcript
            Constraint::Length(1), // typing / status
            Constraint::Length(option_lines.len() as u16 + 1),
            Constraint::Length(1), // live stats
            Constraint::Length(1), // legend
        ])
        .split(area);

    let mut header = vec![
        Span::styled(engine.script().title().to_string(), bold_style),
        Span::raw("  ·  "),
        Span::styled(
            format!("level {}", engine.level()),
            Style::default().fg(Color::Cyan),
        ),
    ];
    if app.trainer.is_locked() {
        header.push(Span::raw("  ·  "));
        header.push(Span::styled("locked", Style::default().fg(Color::Red)));
    }
    Paragraph::new(Line::from(header))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let transcript = visible_transcript(engine.transcript(), chunks[1]);
    Paragraph::new(transcript)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    let status = if let Some(status) = &app.status {
        Span::styled(status.clone(), Style::default().fg(Color::Yellow))
    } else if engine.is_typing() {
        Span::styled("typing…", italic_style.patch(dim_style))
    } else {
        Span::raw("")
    };
    Paragraph::new(status).render(chunks[2], buf);

    Paragraph::new(option_lines)
        .wrap(Wrap { trim: false })
        .render(chunks[3], buf);

    let live = app.trainer.live_analysis();
    let stats = Paragraph::new(Span::styled(
        format!(
            "{} responses   {} invalid   {:.1} s avg",
            live.total_responses,
            live.invalid_attempts,
            ms_to_seconds(live.avg_latency_ms)
        ),
        dim_style,
    ))
    .alignment(Alignment::Center);
    stats.render(chunks[4], buf);

    let legend = if app.trainer.is_locked() {
        "(F2) restart / (F5) history / (esc)ape"
    } else {
        "(F2) restart / (F3) scenario / (F4) level / (F5) history / (esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[5], buf);
}

/// The newest transcript lines that fit in `area`, oldest first
fn visible_transcript(transcript: &[TranscriptLine], area: Rect) -> Vec<Line<'static>> {
    let width = area.width.max(1) as usize;
    let mut remaining = area.height as usize;
    let mut lines = Vec::new();

    for line in transcript.iter().rev() {
        let text = match line.speaker {
            Speaker::Partner => format!("{PARTNER_PREFIX}{}", line.text),
            Speaker::Learner => line.text.clone(),
        };
        let rows = text.width().div_ceil(width).max(1);
        if rows > remaining {
            break;
        }
        remaining -= rows;

        lines.push(match line.speaker {
            Speaker::Partner => {
                Line::from(Span::styled(text, Style::default().fg(Color::Magenta)))
            }
            Speaker::Learner => Line::from(Span::styled(text, Style::default().fg(Color::Green)))
                .alignment(Alignment::Right),
        });
    }

    lines.reverse();
    lines
}

/// The reply controls for the current level
fn surface_lines(app: &App) -> Vec<Line<'static>> {
    let engine = app.trainer.engine();
    if engine.is_ended() {
        return vec![Line::from(Span::styled(
            "Conversation ended.",
            Style::default().add_modifier(Modifier::DIM),
        ))];
    }

    let selected_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let marker = |on: bool| if on { "▸ " } else { "  " };

    match engine.surface() {
        OptionSurface::Choices(options) => options
            .iter()
            .enumerate()
            .map(|(i, option)| {
                let on = i == app.selected;
                let text = format!("{}[{}] {option}", marker(on), i + 1);
                if on {
                    Line::from(Span::styled(text, selected_style))
                } else {
                    Line::from(text)
                }
            })
            .collect(),
        OptionSurface::FillIn(fill) => {
            let blank = if app.input.is_empty() {
                format!("[{}]", fill.placeholder)
            } else {
                format!("[{}]", app.input)
            };
            let mut lines = vec![Line::from(Span::styled(
                format!("{}{}", marker(app.selected == 0), fill.fill(&blank)),
                if app.selected == 0 {
                    selected_style
                } else {
                    Style::default()
                },
            ))];
            if !fill.other_option.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("{}{}", marker(app.selected == 1), fill.other_option),
                    if app.selected == 1 {
                        selected_style
                    } else {
                        Style::default()
                    },
                )));
            }
            lines
        }
        OptionSurface::FreeText(free) => {
            let mut lines = Vec::new();
            if !free.hint.is_empty() {
                lines.push(Line::from(Span::styled(
                    free.hint.clone(),
                    Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
                )));
            }
            if !free.chips.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("(tab) {}", free.chips.join(" · ")),
                    Style::default().fg(Color::Gray),
                )));
            }
            lines.push(Line::from(vec![
                Span::styled("> ", selected_style),
                Span::raw(app.input.clone()),
                Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
            ]));
            lines
        }
    }
}

fn render_summary(app: &App, session: &Session, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let magenta_style = Style::default().fg(Color::Magenta);

    let Some(analysis) = &session.analysis else {
        return render_conversation(app, area, buf);
    };

    let observations: Vec<Line> = if analysis.observations.is_empty() {
        vec![Line::from(Span::styled(
            "• nothing notable",
            Style::default().fg(Color::Gray),
        ))]
    } else {
        analysis
            .observations
            .iter()
            .map(|o| Line::from(format!("• {o}")))
            .collect()
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Min(4),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // quality
            Constraint::Length(1), // markers
            Constraint::Length(2), // recommendation
            Constraint::Length(observations.len() as u16),
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!(
            "{}  ·  level {}  ·  {}",
            session.script_title,
            session.level_at_start,
            session
                .end_reason
                .map_or_else(|| "in progress".to_string(), |r| r.to_string())
        ),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    let tuples: Vec<(f64, f64)> = latency_series(session).into_iter().map(Into::into).collect();
    let (responses, highest_latency) = compute_chart_params(&tuples);
    // one response still needs a non-empty x range
    let x_max = responses.max(2.0);
    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta_style)
        .graph_type(GraphType::Line)
        .data(&tuples)];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("response")
                .bounds([1.0, x_max])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(format_label(x_max), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("seconds")
                .bounds([0.0, highest_latency])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(format_label(highest_latency), bold_style),
                ]),
        );
    chart.render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!(
            "{} responses   {:.1} s avg   {:.1} s sd   {:.0}% valid   {} invalid",
            analysis.total_responses,
            ms_to_seconds(analysis.avg_latency_ms),
            ms_to_seconds(analysis.latency_sd_ms),
            analysis.valid_ratio * 100.0,
            analysis.invalid_attempts
        ),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    Paragraph::new(format!(
        "rigidity {}   variation {}   fill {}   free {}   markers {}",
        format_ratio(Some(analysis.rigidity_ratio)),
        format_ratio(Some(analysis.variation_ratio)),
        format_ratio(analysis.fill_quality),
        format_ratio(analysis.free_quality),
        format_ratio(analysis.free_markers_ratio),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    let m = &analysis.marker_totals;
    Paragraph::new(Span::styled(
        format!(
            "ask-back {}   gratitude {}   help {}   justify {}   greeting {}   request {}",
            m.ask_back, m.gratitude, m.help, m.justify, m.greeting, m.assertive_request
        ),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);

    let rec = &analysis.rec;
    Paragraph::new(Line::from(vec![
        Span::styled(
            rec.action.to_string().to_uppercase(),
            Style::default()
                .fg(action_color(rec.action))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" → level {}", rec.to_level), bold_style),
        Span::raw(format!(": {}", rec.reason)),
    ]))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(chunks[5], buf);

    Paragraph::new(observations)
        .wrap(Wrap { trim: true })
        .render(chunks[6], buf);

    let legend = if app.trainer.is_locked() {
        "(r)estart / (h)istory / (esc)ape"
    } else {
        "(r)estart / (a)pply level / (n)ext scenario / (h)istory / (esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[8], buf);
}
