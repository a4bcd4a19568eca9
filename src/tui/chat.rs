/// Transcript pane rendering — build_items, draw_history, spinner, wrapping.
use std::ops::Range;

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, List, ListItem},
};
use unicode_width::UnicodeWidthStr;

use super::AppState;
use crate::session::Author;
use crate::ui::{author_label, turn_time};

// ── Spinner ────────────────────────────────────────────────────────────────────

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_MSGS: &[&str] = &[
    "bot is typing…",
    "looking it up…",
    "still thinking…",
];

pub fn spinner_frame(tick: u32) -> (&'static str, &'static str) {
    let glyph = SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()];
    // Message cycles more slowly — changes every ~4 seconds (120ms × 32 ticks)
    let msg = SPINNER_MSGS[(tick as usize / 32) % SPINNER_MSGS.len()];
    (glyph, msg)
}

// ── History items builder ──────────────────────────────────────────────────────

pub fn build_items(state: &AppState, term_width: u16) -> Vec<ListItem<'static>> {
    let mut items: Vec<ListItem<'static>> = Vec::new();
    let focused_turn = state.focused().map(|(i, _)| i);

    for (idx, turn) in state.controller.transcript().iter().enumerate() {
        let stamp = if state.show_timestamps {
            format!("  {}", turn_time(turn))
        } else {
            String::new()
        };

        match turn.author() {
            Author::User => {
                // Bubble colours
                let bg       = Color::Rgb(0, 38, 77);
                let border   = Color::Rgb(0, 77, 153);
                let label_fg = Color::Rgb(120, 180, 255);
                let text_fg  = Color::Rgb(235, 242, 255);
                let body_style = Style::default().fg(text_fg).bg(bg);
                let edge_style = Style::default().fg(border).bg(bg);

                // Dynamic widths — 2 chars left margin, 1 right margin
                let inner_w = (term_width as usize).saturating_sub(3).max(10);
                let label = author_label(Author::User);
                // "╭─ " + label + stamp + " " + dashes + "╮"
                let used = 4 + label.width() + stamp.width() + 1;
                let top_dashes = "─".repeat(inner_w.saturating_sub(used));
                items.push(ListItem::new(Line::from(vec![
                    Span::raw("  "),
                    Span::styled("╭─ ", edge_style),
                    Span::styled(label, Style::default()
                        .fg(label_fg).bg(bg).add_modifier(Modifier::BOLD)),
                    Span::styled(stamp, Style::default().fg(Color::DarkGray).bg(bg)),
                    Span::styled(format!(" {top_dashes}╮"), edge_style),
                ])));

                // Body — word-wrap inside the box (inner_w minus "│ " = 2)
                let wrap_width = inner_w.saturating_sub(2).max(10);
                for line in wrap_text(turn.text(), wrap_width) {
                    items.push(ListItem::new(Line::from(vec![
                        Span::raw("  "),
                        Span::styled("│ ", edge_style),
                        Span::styled(line, body_style),
                    ])));
                }

                let bot_dashes = "─".repeat(inner_w.saturating_sub(2));
                items.push(ListItem::new(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(format!("╰{bot_dashes}╯"), edge_style),
                ])));
                items.push(ListItem::new(Line::raw("")));
            }

            Author::Bot => {
                // "  bot  " prefix = 7 cols; continuation lines indent to match
                let wrap_width = (term_width as usize).saturating_sub(8).max(20);
                let label_fg = Color::Rgb(0, 210, 210);
                let text_style = Style::default().fg(Color::Rgb(210, 230, 255));
                let emph_style = Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD);

                let rendered = turn.rendered();
                let emphasis = rendered.suggestion.as_ref().map(|s| s.emphasis.clone());
                let wrapped = wrap_emphasis(&rendered.display, emphasis.as_ref(), wrap_width);

                for (i, segments) in wrapped.into_iter().enumerate() {
                    let mut spans = if i == 0 {
                        vec![
                            Span::raw("  "),
                            Span::styled(author_label(Author::Bot), Style::default()
                                .fg(label_fg)
                                .add_modifier(Modifier::BOLD)),
                            Span::raw("  "),
                        ]
                    } else {
                        vec![Span::raw("       ")]
                    };
                    for (text, bold) in segments {
                        spans.push(Span::styled(text, if bold { emph_style } else { text_style }));
                    }
                    items.push(ListItem::new(Line::from(spans)));
                }

                if !stamp.is_empty() {
                    items.push(ListItem::new(Line::from(vec![
                        Span::raw("       "),
                        Span::styled(stamp.trim().to_string(), Style::default().fg(Color::DarkGray)),
                    ])));
                }

                if let Some(s) = &rendered.suggestion {
                    let focused = focused_turn == Some(idx);
                    let (fg, bg, hint) = if focused {
                        (Color::Black, Color::Cyan, "  Enter to ask")
                    } else {
                        (Color::Cyan, Color::Reset, "  Tab")
                    };
                    items.push(ListItem::new(Line::from(vec![
                        Span::raw("       "),
                        Span::styled(
                            format!(" ↳ Ask about {} ", s.phrase),
                            Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(hint, Style::default().fg(Color::DarkGray)),
                    ])));
                }
                items.push(ListItem::new(Line::raw("")));
            }
        }
    }

    if state.controller.is_busy() {
        let (glyph, msg) = spinner_frame(state.spinner_tick);
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{glyph} "), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(msg, Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC)),
        ])));
    }

    items
}

// ── Draw functions ─────────────────────────────────────────────────────────────

pub fn draw_history(f: &mut Frame, state: &AppState, area: Rect) {
    let all_items = build_items(state, area.width);
    let total = all_items.len();
    let visible = area.height as usize;

    let skip = if total > visible {
        (total - visible).saturating_sub(state.scroll)
    } else {
        0
    };

    let sliced: Vec<ListItem<'static>> = all_items.into_iter().skip(skip).collect();
    let list = List::new(sliced)
        .block(Block::default().style(Style::default().bg(Color::Rgb(8, 8, 14))));
    f.render_widget(list, area);
}

// ── Wrapping ───────────────────────────────────────────────────────────────────

/// Word-wrap a single line of text to `max_width` columns.
/// Splits on whitespace; never truncates mid-word unless the word alone exceeds max_width.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    wrap_emphasis(text, None, max_width)
        .into_iter()
        .map(|segments| segments.into_iter().map(|(s, _)| s).collect())
        .collect()
}

/// Word-wrap multi-line text, tagging each piece with whether it falls inside
/// the `emphasis` byte range. A word straddling a range boundary is split into
/// separately tagged pieces so only the phrase itself is emboldened.
pub fn wrap_emphasis(
    text: &str,
    emphasis: Option<&Range<usize>>,
    max_width: usize,
) -> Vec<Vec<(String, bool)>> {
    let mut out = Vec::new();
    let mut line_start = 0usize;

    for src_line in text.split('\n') {
        let mut lines: Vec<Vec<(String, bool)>> = Vec::new();
        let mut current: Vec<(String, bool)> = Vec::new();
        let mut current_width = 0usize;

        for (word_start, word) in words(src_line) {
            let abs = line_start + word_start;
            let pieces = split_word(word, abs, emphasis);
            let word_width = word.width();

            if current_width > 0 && current_width + 1 + word_width > max_width {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            if current_width > 0 {
                let bold = current.last().is_some_and(|(_, b)| *b)
                    && pieces.first().is_some_and(|(_, b)| *b);
                current.push((" ".to_string(), bold));
                current_width += 1;
            }
            current.extend(pieces);
            current_width += word_width;
        }
        if !current.is_empty() || lines.is_empty() {
            lines.push(current);
        }
        out.extend(lines);
        line_start += src_line.len() + 1;
    }
    out
}

/// (byte offset, word) pairs for whitespace-separated words in `line`.
fn words(line: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push((s, &line[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &line[s..]));
    }
    out
}

fn split_word(word: &str, abs_start: usize, emphasis: Option<&Range<usize>>) -> Vec<(String, bool)> {
    let Some(range) = emphasis else {
        return vec![(word.to_string(), false)];
    };
    let abs_end = abs_start + word.len();
    let lo = range.start.clamp(abs_start, abs_end) - abs_start;
    let hi = range.end.clamp(abs_start, abs_end) - abs_start;

    [(0, lo, false), (lo, hi, true), (hi, word.len(), false)]
        .into_iter()
        .filter(|(a, b, _)| a < b)
        .map(|(a, b, bold)| (word[a..b].to_string(), bold))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: Vec<Vec<(String, bool)>>) -> Vec<String> {
        lines
            .into_iter()
            .map(|l| l.into_iter().map(|(s, _)| s).collect())
            .collect()
    }

    #[test]
    fn test_wrap_text_breaks_on_words() {
        assert_eq!(
            wrap_text("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn test_wrap_keeps_blank_lines_between_paragraphs() {
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn test_emphasis_marks_only_the_phrase() {
        // "Try curing? now" with "curing" at 4..10
        let lines = wrap_emphasis("Try curing? now", Some(&(4..10)), 40);
        assert_eq!(
            lines,
            vec![vec![
                ("Try".to_string(), false),
                (" ".to_string(), false),
                ("curing".to_string(), true),
                ("?".to_string(), false),
                (" ".to_string(), false),
                ("now".to_string(), false),
            ]]
        );
    }

    #[test]
    fn test_multi_word_emphasis_keeps_inner_space_bold() {
        let text = "mean fly ash here";
        let lines = wrap_emphasis(text, Some(&(5..12)), 40);
        let bold: String = lines[0].iter().filter(|(_, b)| *b).map(|(s, _)| s.as_str()).collect();
        assert_eq!(bold, "fly ash");
    }

    #[test]
    fn test_emphasis_offsets_survive_line_breaks() {
        let text = "first line\nsee rebar";
        let start = text.find("rebar").unwrap();
        let lines = wrap_emphasis(text, Some(&(start..start + 5)), 40);
        assert_eq!(plain(lines.clone()), vec!["first line", "see rebar"]);
        assert_eq!(lines[1].last(), Some(&("rebar".to_string(), true)));
        assert!(lines[0].iter().all(|(_, b)| !b));
    }

    #[test]
    fn test_spinner_frame_cycles() {
        assert_eq!(spinner_frame(0), ("⠋", "bot is typing…"));
        assert_eq!(spinner_frame(1).0, "⠙");
        assert_eq!(spinner_frame(32).1, "looking it up…");
    }
}
