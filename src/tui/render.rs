/// Ratatui draw entry-point for sitechat.
/// Thin dispatcher — transcript rendering lives in chat.rs.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use super::AppState;
use super::chat::SPINNER_GLYPHS;

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),  // header
            Constraint::Min(0),     // transcript
            Constraint::Length(1),  // status bar
            Constraint::Length(3),  // input box
        ])
        .split(f.area());

    draw_header(f, chunks[0]);
    super::chat::draw_history(f, state, chunks[1]);
    draw_status_bar(f, state, chunks[2]);
    draw_input(f, state, chunks[3]);
}

// ── Header ────────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" 🏗  Construction Assistant", Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)),
        Span::styled(
            "  ·  construction-only answers · e.g. \"What is curing?\"",
            Style::default().fg(Color::Rgb(160, 190, 230)),
        ),
    ]);
    f.render_widget(
        Paragraph::new(line).style(Style::default().bg(Color::Rgb(0, 77, 153))),
        area,
    );
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let busy = state.controller.is_busy();

    // Animated spinner glyph in status bar while a question is outstanding
    let (status_glyph, status_color) = if busy {
        let g = SPINNER_GLYPHS[(state.spinner_tick as usize) % SPINNER_GLYPHS.len()];
        (g, Color::Cyan)
    } else {
        ("▲", Color::White)
    };

    let turn_count = state.controller.transcript().len();
    let offered = state.controller.suggestions().len();

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(status_glyph, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::styled(" sitechat", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(state.profile.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(state.endpoint.clone(), Style::default().fg(Color::Rgb(100, 180, 220))),
        Span::styled("  ◈", Style::default().fg(Color::Rgb(80, 70, 140))),
        Span::styled(format!(" {turn_count}"), Style::default().fg(Color::Rgb(140, 120, 220))),
    ];

    if let Some(notice) = &state.notice {
        spans.push(Span::styled(
            format!("  {notice}"),
            Style::default().fg(Color::Rgb(200, 160, 50)),
        ));
    } else if offered > 0 {
        spans.push(Span::styled(
            format!("  Tab suggestions ({offered})  /help"),
            Style::default().fg(Color::Rgb(55, 50, 90)),
        ));
    } else {
        spans.push(Span::styled("  /help", Style::default().fg(Color::Rgb(55, 50, 90))));
    }

    let bar_style = if busy {
        Style::default().bg(Color::Rgb(15, 15, 25))
    } else {
        Style::default().bg(Color::Rgb(10, 10, 18))
    };

    f.render_widget(Paragraph::new(Line::from(spans)).style(bar_style), area);
}

// ── Input box ─────────────────────────────────────────────────────────────────

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let busy = state.controller.is_busy();
    let suggestion_focused = state.focused_suggestion.is_some();

    let (border_color, prompt_color, prompt_char) = if suggestion_focused {
        (Color::Cyan, Color::Cyan, "↳")
    } else if busy {
        (Color::Rgb(40, 40, 60), Color::DarkGray, "·")
    } else {
        (Color::Rgb(60, 60, 80), Color::Cyan, "❯")
    };

    let prompt_span = Span::styled(
        format!("  {prompt_char} "),
        Style::default().fg(prompt_color).add_modifier(Modifier::BOLD),
    );

    let draft = state.controller.draft();
    let content_span = if let Some((_, phrase)) = state.focused() {
        Span::styled(
            format!("Enter to ask about \"{phrase}\" · Tab next · Esc back"),
            Style::default().fg(Color::Cyan),
        )
    } else if draft.is_empty() {
        let hint = if busy {
            "waiting for the answer…"
        } else {
            "Ask about construction (cement, BOQ, curing…)"
        };
        Span::styled(hint, Style::default().fg(Color::Rgb(70, 70, 90)))
    } else {
        Span::styled(draft.to_string(), Style::default().fg(Color::White))
    };

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(Color::Rgb(8, 8, 14)));

    let paragraph = Paragraph::new(Line::from(vec![prompt_span, content_span]))
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);

    // Position cursor at the actual edit cursor, not end of string
    if !suggestion_focused {
        // prompt is "  ❯ " — total visible width is 4 cols
        let prompt_width: usize = 4;
        let text_before_cursor = &draft[..state.cursor.min(draft.len())];
        // usize: a pasted draft can be wider than u16::MAX columns
        let cursor_x = area.x as usize + prompt_width + text_before_cursor.width();
        let cursor_y = area.y.saturating_add(1); // +1 for top border
        if cursor_x < area.right() as usize {
            f.set_cursor_position((cursor_x as u16, cursor_y));
        }
    }
}
