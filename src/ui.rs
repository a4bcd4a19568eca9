/// UI helpers shared between the TUI and plain-stdout modes.
use crate::session::{Author, Turn};

// ── Author labels ─────────────────────────────────────────────────────────────

pub fn author_label(author: Author) -> &'static str {
    match author {
        Author::User => "you",
        Author::Bot  => "bot",
    }
}

pub fn author_glyph(author: Author) -> &'static str {
    match author {
        Author::User => "❯",
        Author::Bot  => "▲",
    }
}

/// Clock time for a turn, e.g. "14:05:09".
pub fn turn_time(turn: &Turn) -> String {
    turn.created_at().format("%H:%M:%S").to_string()
}

/// Plain-text rendering of one turn for stdout: label, display text
/// (suggestion markers stripped) and a follow-up hint when one is offered.
pub fn format_turn_plain(turn: &Turn, show_timestamps: bool) -> String {
    let rendered = turn.rendered();
    let mut out = format!("  {} {}", author_glyph(turn.author()), author_label(turn.author()));
    if show_timestamps {
        out.push_str(&format!("  {}", turn_time(turn)));
    }
    out.push('\n');
    for line in rendered.display.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
    if let Some(s) = &rendered.suggestion {
        out.push_str(&format!("    ↳ ask about {}: sitechat \"{}\"\n", s.phrase, s.phrase));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Answer, AnswerService, AskError};
    use crate::session::{SessionController, SessionState};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct Unused;

    #[async_trait]
    impl AnswerService for Unused {
        async fn ask(&self, _query: &str) -> Result<Answer, AskError> {
            Err(AskError::Transport("unused".into()))
        }
    }

    fn controller_with_reply(reply: &str) -> SessionController {
        let mut c = SessionController::new(
            SessionState::new("hello"),
            Arc::new(Unused),
            Duration::from_secs(1),
        );
        c.begin_submit("q").unwrap();
        c.settle(Ok(Answer::Text(reply.to_string())));
        c
    }

    #[test]
    fn test_plain_bot_turn_with_suggestion() {
        let c = controller_with_reply("did you mean **slab**?\nA slab is flat.");
        let out = format_turn_plain(&c.transcript()[2], false);
        assert_eq!(
            out,
            "  ▲ bot\n    did you mean slab?\n    A slab is flat.\n    ↳ ask about slab: sitechat \"slab\"\n"
        );
    }

    #[test]
    fn test_plain_user_turn() {
        let c = controller_with_reply("x");
        assert_eq!(format_turn_plain(&c.transcript()[1], false), "  ❯ you\n    q\n");
    }

    #[test]
    fn test_plain_turn_with_timestamp() {
        let c = controller_with_reply("x");
        let out = format_turn_plain(&c.transcript()[0], true);
        let header = out.lines().next().unwrap();
        assert!(header.starts_with("  ▲ bot  "));
        assert_eq!(header.len(), "  ▲ bot  ".len() + "00:00:00".len());
    }
}
