/// Follow-up suggestions embedded in bot replies.
///
/// The backend marks a "did you mean" topic by wrapping it in bold markup:
/// `I'm not sure, but did you mean **curing**? ...`. We strip the markers for
/// display, remember where the phrase sits so the renderer can embolden it,
/// and hand the phrase back so it can be resubmitted as a question.
///
/// Only the first marked phrase in a reply is honored. Later `**...**` pairs
/// are left exactly as the bot sent them.
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Non-greedy, single line: `**a** and **b**` matches `a` only.
static BOLD_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*(.*?)\*\*").expect("static suggestion pattern")
});

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Phrase to resubmit when the suggestion is activated
    pub phrase: String,
    /// Byte range of the phrase inside `Rendered::display`
    pub emphasis: Range<usize>,
}

/// A bot reply prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub display: String,
    pub suggestion: Option<Suggestion>,
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Find the first `**phrase**` in `text`.
///
/// A blank phrase (`****`, `**  **`) is not actionable: the text is returned
/// unchanged with no suggestion.
pub fn extract_suggestion(text: &str) -> Rendered {
    let unchanged = || Rendered { display: text.to_string(), suggestion: None };

    let Some(caps) = BOLD_MARKER.captures(text) else {
        return unchanged();
    };
    let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
        return unchanged();
    };
    let phrase = inner.as_str();
    if phrase.trim().is_empty() {
        return unchanged();
    }

    let mut display = String::with_capacity(text.len());
    display.push_str(&text[..whole.start()]);
    let start = display.len();
    display.push_str(phrase);
    let end = display.len();
    display.push_str(&text[whole.end()..]);

    Rendered {
        display,
        suggestion: Some(Suggestion {
            phrase: phrase.trim().to_string(),
            emphasis: start..end,
        }),
    }
}
