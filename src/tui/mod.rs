/// Ratatui-based TUI for sitechat.
///
/// Architecture:
///   main task:    event loop — crossterm keyboard events + mpsc UiEvent drain
///   answer task:  tokio::spawn — asks the backend, sends the settled result back
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  header (1 line)                               │
///   ├────────────────────────────────────────────────┤
///   │  transcript (scrollable, Min(0))               │
///   ├────────────────────────────────────────────────┤
///   │  status bar (1 line)                           │
///   ├────────────────────────────────────────────────┤
///   │  input box (3 lines, fixed)                    │
///   └────────────────────────────────────────────────┘
pub mod render;
pub mod chat;

use std::io;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use crate::client::{self, Answer, AskError};
use crate::config::ResolvedConfig;
use crate::session::{PendingQuery, SessionController};

// ── UiEvent — typed events from background tasks → TUI ───────────────────────

#[derive(Debug)]
pub enum UiEvent {
    /// The outstanding question finished, one way or another
    AnswerSettled(Result<Answer, AskError>),
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub controller: SessionController,
    pub cursor: usize,        // byte offset in the draft
    pub scroll: usize,        // lines scrolled up in history
    pub profile: String,
    pub endpoint: String,
    pub show_timestamps: bool,
    /// Index into `controller.suggestions()` (newest first); None = input focused
    pub focused_suggestion: Option<usize>,
    /// Incremented every 120ms while busy for spinner animation
    pub spinner_tick: u32,
    /// One-line message shown in the status bar until the next keypress
    pub notice: Option<String>,
}

impl AppState {
    pub fn new(controller: SessionController, resolved: &ResolvedConfig) -> Self {
        Self {
            controller,
            cursor: 0,
            scroll: 0,
            profile: resolved.profile_name.clone(),
            endpoint: resolved.endpoint.clone(),
            show_timestamps: resolved.show_timestamps,
            focused_suggestion: None,
            spinner_tick: 0,
            notice: None,
        }
    }

    fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::AnswerSettled(result) => {
                if self.controller.settle(result).is_some() {
                    self.scroll = 0; // auto-scroll to the new reply
                    // A new reply may shift the newest-first suggestion order
                    self.focused_suggestion = None;
                }
            }
        }
    }

    /// Phrase of the focused suggestion together with its transcript index.
    pub fn focused(&self) -> Option<(usize, String)> {
        let idx = self.focused_suggestion?;
        self.controller.suggestions().into_iter().nth(idx)
    }

    fn set_draft(&mut self, draft: String, cursor: usize) {
        self.cursor = cursor.min(draft.len());
        self.controller.update_draft(draft);
    }

    fn insert_char(&mut self, c: char) {
        let mut draft = self.controller.draft().to_string();
        let at = self.cursor.min(draft.len());
        draft.insert(at, c);
        self.set_draft(draft, at + c.len_utf8());
    }

    fn backspace(&mut self) {
        let mut draft = self.controller.draft().to_string();
        if self.cursor == 0 {
            return;
        }
        let prev = prev_boundary(&draft, self.cursor);
        draft.replace_range(prev..self.cursor, "");
        self.set_draft(draft, prev);
    }

    fn delete(&mut self) {
        let mut draft = self.controller.draft().to_string();
        if self.cursor >= draft.len() {
            return;
        }
        let next = next_boundary(&draft, self.cursor);
        draft.replace_range(self.cursor..next, "");
        let cursor = self.cursor;
        self.set_draft(draft, cursor);
    }
}

fn prev_boundary(s: &str, at: usize) -> usize {
    s[..at].char_indices().next_back().map(|(i, _)| i).unwrap_or(0)
}

fn next_boundary(s: &str, at: usize) -> usize {
    s[at..].chars().next().map(|c| at + c.len_utf8()).unwrap_or(at)
}

// ── Slash commands ────────────────────────────────────────────────────────────

const HELP_TEXT: &str =
    "Enter send · Tab focus suggestion · PgUp/PgDn scroll · /ts timestamps · /quit exit";

enum SlashOutcome {
    Handled,
    Quit,
    NotACommand,
}

fn handle_slash(state: &mut AppState, input: &str) -> SlashOutcome {
    let cmd = input.trim();
    if !cmd.starts_with('/') {
        return SlashOutcome::NotACommand;
    }
    match cmd {
        "/quit" | "/exit" | "/q" => return SlashOutcome::Quit,
        "/ts" => {
            state.show_timestamps = !state.show_timestamps;
            let on = if state.show_timestamps { "on" } else { "off" };
            state.notice = Some(format!("timestamps {on}"));
        }
        "/help" | "/?" => {
            state.notice = Some(HELP_TEXT.to_string());
        }
        other => {
            // Leave the draft so the typed text can be fixed or sent as-is
            state.notice = Some(format!("unknown command {other} · /help"));
            return SlashOutcome::Handled;
        }
    }
    state.set_draft(String::new(), 0);
    SlashOutcome::Handled
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig) -> Result<()> {
    let controller = crate::build_controller(&resolved)?;
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let mut state = AppState::new(controller, &resolved);
    let result = event_loop(&mut terminal, &mut state).await;

    restore_terminal(&mut terminal);
    tracing::info!(turns = state.controller.transcript().len(), "session ended");
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
) -> Result<()> {
    // Channel: answer tasks → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.controller.is_busy() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, state))?;
                }
            }

            // ── Drain settled answers ─────────────────────────────────────────
            Some(ev) = ui_rx.recv() => {
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        if !handle_key(key, state, &ui_tx) { break; }
                    }
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, state))?;
            }
        }
    }

    Ok(())
}

// ── Key handler ───────────────────────────────────────────────────────────────

/// Returns false when the user asked to quit.
fn handle_key(key: KeyEvent, state: &mut AppState, ui_tx: &mpsc::UnboundedSender<UiEvent>) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    state.notice = None;

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => return false,

        KeyCode::Tab => {
            let offered = state.controller.suggestions().len();
            state.focused_suggestion = match state.focused_suggestion {
                _ if offered == 0 => None,
                None => Some(0),
                Some(i) if i + 1 < offered => Some(i + 1),
                Some(_) => None,
            };
            // Bring the focused affordance into view
            if state.focused_suggestion.is_some() {
                state.scroll = 0;
            }
        }
        KeyCode::Esc => {
            state.focused_suggestion = None;
        }

        KeyCode::Enter => {
            if let Some((_, phrase)) = state.focused() {
                state.focused_suggestion = None;
                if let Ok(pending) = state.controller.on_suggestion_clicked(&phrase) {
                    state.scroll = 0;
                    launch(pending, state, ui_tx.clone());
                }
                return true;
            }

            let draft = state.controller.draft().to_string();
            match handle_slash(state, &draft) {
                SlashOutcome::Quit => return false,
                SlashOutcome::Handled => return true,
                SlashOutcome::NotACommand => {}
            }

            // Empty and busy submissions are refused by the controller; the
            // draft stays as typed so nothing is lost.
            if let Ok(pending) = state.controller.begin_submit(&draft) {
                state.cursor = 0;
                state.scroll = 0;
                launch(pending, state, ui_tx.clone());
            }
        }

        KeyCode::Char(c) if !ctrl => {
            state.focused_suggestion = None;
            state.insert_char(c);
        }
        KeyCode::Char('u') if ctrl => {
            state.set_draft(String::new(), 0);
        }
        KeyCode::Backspace => state.backspace(),
        KeyCode::Delete => state.delete(),
        KeyCode::Left => {
            state.cursor = prev_boundary(state.controller.draft(), state.cursor);
        }
        KeyCode::Right => {
            state.cursor = next_boundary(state.controller.draft(), state.cursor);
        }
        KeyCode::Home => state.cursor = 0,
        KeyCode::End => state.cursor = state.controller.draft().len(),

        KeyCode::Up => state.scroll = state.scroll.saturating_add(1),
        KeyCode::Down => state.scroll = state.scroll.saturating_sub(1),
        KeyCode::PageUp => state.scroll = state.scroll.saturating_add(10),
        KeyCode::PageDown => state.scroll = state.scroll.saturating_sub(10),

        _ => {}
    }
    true
}

// ── Answer launcher ───────────────────────────────────────────────────────────

/// Ask the backend on a background task. The result always comes back as a
/// `UiEvent::AnswerSettled`, even if the ask task panics, so busy is always
/// cleared.
fn launch(pending: PendingQuery, state: &AppState, ui_tx: mpsc::UnboundedSender<UiEvent>) {
    let service = state.controller.service();
    let limit = state.controller.timeout();

    let ask = tokio::spawn(async move {
        client::ask_bounded(service.as_ref(), &pending.query, limit).await
    });

    tokio::spawn(async move {
        let result = match ask.await {
            Ok(result) => result,
            Err(e) => Err(AskError::Transport(format!("answer task failed: {e}"))),
        };
        let _ = ui_tx.send(UiEvent::AnswerSettled(result));
    });
}
