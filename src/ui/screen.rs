use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use turnwise::engine::{OptionSurface, Submission};

use crate::{ui::history::render_history, App, AppState};

/// A UI Screen boundary: responsible for rendering and optional key handling
pub trait Screen {
    fn render(&self, app: &mut App, f: &mut Frame);
    /// Optional per-screen key handling. Returns true if the key was handled.
    fn on_key(&mut self, _key: KeyEvent, _app: &mut App) -> bool {
        false
    }
}

/// The running conversation
pub struct ConversationScreen;

impl Screen for ConversationScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }

    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> bool {
        match key.code {
            KeyCode::F(2) => app.restart(),
            KeyCode::F(3) => app.next_scenario(),
            KeyCode::F(4) => app.cycle_level(),
            KeyCode::F(5) => app.state = AppState::History,
            _ => return handle_reply_key(key, app),
        }
        true
    }
}

fn handle_reply_key(key: KeyEvent, app: &mut App) -> bool {
    enum Surface {
        Choices(usize),
        FillIn,
        FreeText(Vec<String>),
    }

    let surface = match app.trainer.engine().surface() {
        OptionSurface::Choices(options) => Surface::Choices(options.len()),
        OptionSurface::FillIn(_) => Surface::FillIn,
        OptionSurface::FreeText(free) => Surface::FreeText(free.chips.clone()),
    };

    match (surface, key.code) {
        (Surface::Choices(n), KeyCode::Up) => app.selected = app.selected.saturating_sub(1).min(n.saturating_sub(1)),
        (Surface::Choices(n), KeyCode::Down) => app.selected = (app.selected + 1).min(n.saturating_sub(1)),
        (Surface::Choices(n), KeyCode::Char(c)) => match c.to_digit(10) {
            Some(d) if d >= 1 && (d as usize) <= n => app.submit(Submission::Option(d as usize - 1)),
            _ => return false,
        },
        (Surface::Choices(_), KeyCode::Enter) => app.submit(Submission::Option(app.selected)),

        (Surface::FillIn, KeyCode::Tab | KeyCode::Up | KeyCode::Down) => app.selected = 1 - app.selected.min(1),
        (Surface::FillIn, KeyCode::Char(c)) => {
            app.selected = 0;
            app.input.push(c);
        }
        (Surface::FillIn, KeyCode::Backspace) => {
            app.input.pop();
        }
        (Surface::FillIn, KeyCode::Enter) if app.selected == 1 => app.submit(Submission::Option(1)),
        (Surface::FillIn, KeyCode::Enter) => app.submit(Submission::Fill(app.input.clone())),

        // chips only prefill the input
        (Surface::FreeText(chips), KeyCode::Tab) if !chips.is_empty() => {
            let chip = &chips[app.chip_cursor % chips.len()];
            if !app.input.is_empty() && !app.input.ends_with(' ') {
                app.input.push(' ');
            }
            app.input.push_str(chip);
            app.chip_cursor = (app.chip_cursor + 1) % chips.len();
        }
        (Surface::FreeText(_), KeyCode::Char(c)) => app.input.push(c),
        (Surface::FreeText(_), KeyCode::Backspace) => {
            app.input.pop();
        }
        (Surface::FreeText(_), KeyCode::Enter) => app.submit(Submission::Free(app.input.clone())),

        _ => return false,
    }
    true
}

/// End-of-session analysis and recommendation
pub struct SummaryScreen;

impl Screen for SummaryScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }

    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> bool {
        match key.code {
            KeyCode::Char('r') => app.restart(),
            KeyCode::Char('a') => app.apply_recommendation(),
            KeyCode::Char('n') => app.next_scenario(),
            KeyCode::Char('h') => app.state = AppState::History,
            _ => return false,
        }
        true
    }
}

/// Archived sessions table
pub struct HistoryScreen;

impl Screen for HistoryScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        render_history(app, f);
    }

    fn on_key(&mut self, key: KeyEvent, app: &mut App) -> bool {
        let offset = &mut app.history_state.scroll_offset;
        match key.code {
            KeyCode::Up => *offset = offset.saturating_sub(1),
            // clamped when rendering
            KeyCode::Down => *offset += 1,
            KeyCode::PageUp => *offset = offset.saturating_sub(10),
            KeyCode::PageDown => *offset += 10,
            KeyCode::Home => *offset = 0,
            KeyCode::Char('b') | KeyCode::Backspace => app.leave_history(),
            _ => return false,
        }
        true
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Conversation => Box::new(ConversationScreen),
        AppState::Summary => Box::new(SummaryScreen),
        AppState::History => Box::new(HistoryScreen),
    }
}
