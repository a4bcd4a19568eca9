/// Session controller — the transcript state machine.
///
/// One `SessionController` exists per process. It owns the transcript, the
/// draft input and the busy flag, and is the only thing that mutates them.
///
/// A turn cycle is split in two so an event loop can keep drawing while the
/// remote call is in flight:
///
///   begin_submit(text)  → User turn appended, busy = true, query handed back
///   settle(result)      → Bot turn appended, busy = false
///
/// `submit` runs both halves back to back for callers that can simply await.
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::client::{self, Answer, AnswerService, AskError};
use crate::suggestion::{self, Rendered};

pub const NO_ANSWER_TEXT: &str = "⚠️ No answer returned";
pub const CONNECTIVITY_FAILURE_TEXT: &str = "⚠️ Error: Could not reach server.";
pub const DEFAULT_GREETING: &str =
    "👷 Hi — I'm your construction assistant. Ask me anything about construction.";

// ── Turn ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    User,
    Bot,
}

#[derive(Debug, Clone)]
pub struct Turn {
    author: Author,
    text: String,
    created_at: DateTime<Local>,
}

impl Turn {
    fn new(author: Author, text: impl Into<String>) -> Self {
        Self { author, text: text.into(), created_at: Local::now() }
    }

    pub fn author(&self) -> Author {
        self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// Display form of the turn. User text is never scanned for suggestions.
    pub fn rendered(&self) -> Rendered {
        match self.author {
            Author::Bot => suggestion::extract_suggestion(&self.text),
            Author::User => Rendered { display: self.text.clone(), suggestion: None },
        }
    }
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// Why a submission did not start a cycle. Neither case touches the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("nothing to send")]
    EmptyInput,
    #[error("a request is already outstanding")]
    Busy,
}

/// What kind of Bot turn a settled cycle produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Answered,
    NoAnswer,
    ConnectivityFailure,
}

/// An accepted submission waiting for its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub query: String,
}

// ── SessionState ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionState {
    transcript: Vec<Turn>,
    draft: String,
    busy: bool,
}

impl SessionState {
    pub fn new(greeting: &str) -> Self {
        Self {
            transcript: vec![Turn::new(Author::Bot, greeting)],
            draft: String::new(),
            busy: false,
        }
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

pub struct SessionController {
    state: SessionState,
    service: Arc<dyn AnswerService>,
    timeout: Duration,
    /// Set while busy, for latency logging
    started: Option<Instant>,
}

impl SessionController {
    pub fn new(state: SessionState, service: Arc<dyn AnswerService>, timeout: Duration) -> Self {
        Self { state, service, timeout, started: None }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.state.transcript
    }

    pub fn draft(&self) -> &str {
        &self.state.draft
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn service(&self) -> Arc<dyn AnswerService> {
        Arc::clone(&self.service)
    }

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.state.draft = text.into();
    }

    /// First half of a cycle: validate, append the User turn, go busy.
    pub fn begin_submit(&mut self, text: &str) -> Result<PendingQuery, Rejected> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("ignoring empty submission");
            return Err(Rejected::EmptyInput);
        }
        if self.state.busy {
            tracing::debug!(query = text, "ignoring submission while a request is outstanding");
            return Err(Rejected::Busy);
        }

        self.state.transcript.push(Turn::new(Author::User, text));
        self.state.draft.clear();
        self.state.busy = true;
        self.started = Some(Instant::now());
        tracing::debug!(query = text, "submitted");

        Ok(PendingQuery { query: text.to_string() })
    }

    /// Second half of a cycle: append exactly one Bot turn and leave busy.
    /// Settling while idle is a no-op so a stray result can never add a turn.
    pub fn settle(&mut self, result: Result<Answer, AskError>) -> Option<ReplyKind> {
        if !self.state.busy {
            tracing::warn!("dropping a result that arrived while idle");
            return None;
        }

        let (kind, text) = match result {
            Ok(Answer::Text(answer)) => (ReplyKind::Answered, answer),
            Ok(Answer::Empty) => (ReplyKind::NoAnswer, NO_ANSWER_TEXT.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "could not reach answer service");
                (ReplyKind::ConnectivityFailure, CONNECTIVITY_FAILURE_TEXT.to_string())
            }
        };

        self.state.transcript.push(Turn::new(Author::Bot, text));
        self.state.busy = false;

        let elapsed_ms = self.started.take().map(|t| t.elapsed().as_millis() as u64).unwrap_or(0);
        tracing::info!(?kind, elapsed_ms, "turn settled");
        Some(kind)
    }

    /// Full cycle: begin, ask under the timeout, settle.
    pub async fn submit(&mut self, text: &str) -> Result<ReplyKind, Rejected> {
        let pending = self.begin_submit(text)?;
        let service = self.service();
        let result = client::ask_bounded(service.as_ref(), &pending.query, self.timeout).await;
        Ok(self.settle(result).unwrap_or(ReplyKind::ConnectivityFailure))
    }

    /// A suggestion behaves exactly like the user typing and sending it:
    /// same gate, same User turn, same cycle. Whatever is in the draft stays
    /// there, since the phrase never came from the input box.
    pub fn on_suggestion_clicked(&mut self, phrase: &str) -> Result<PendingQuery, Rejected> {
        tracing::debug!(phrase, "suggestion activated");
        let draft = std::mem::take(&mut self.state.draft);
        let result = self.begin_submit(phrase);
        self.state.draft = draft;
        result
    }

    /// Every suggestion currently offered, newest first, as
    /// (transcript index, phrase).
    pub fn suggestions(&self) -> Vec<(usize, String)> {
        self.state
            .transcript
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(i, t)| t.rendered().suggestion.map(|s| (i, s.phrase)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies from a script, one entry per call, and records every query.
    struct Scripted {
        replies: Mutex<Vec<Result<Answer, AskError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<Answer, AskError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self { replies: Mutex::new(replies), seen: Mutex::new(Vec::new()) })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnswerService for Scripted {
        async fn ask(&self, query: &str) -> Result<Answer, AskError> {
            self.seen.lock().unwrap().push(query.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(AskError::Transport("script exhausted".to_string())))
        }
    }

    struct Stalled;

    #[async_trait]
    impl AnswerService for Stalled {
        async fn ask(&self, _query: &str) -> Result<Answer, AskError> {
            std::future::pending().await
        }
    }

    fn controller(service: Arc<dyn AnswerService>) -> SessionController {
        SessionController::new(SessionState::new(DEFAULT_GREETING), service, Duration::from_secs(60))
    }

    fn texts(c: &SessionController) -> Vec<(Author, String)> {
        c.transcript().iter().map(|t| (t.author(), t.text().to_string())).collect()
    }

    #[test]
    fn test_starts_with_greeting() {
        let c = controller(Scripted::new(vec![]));
        assert_eq!(texts(&c), vec![(Author::Bot, DEFAULT_GREETING.to_string())]);
        assert!(!c.is_busy());
        assert_eq!(c.draft(), "");
    }

    #[test]
    fn test_whitespace_submission_is_ignored() {
        let mut c = controller(Scripted::new(vec![]));
        c.update_draft("   \t ");
        assert_eq!(c.begin_submit("   \t "), Err(Rejected::EmptyInput));
        assert_eq!(c.transcript().len(), 1);
        assert!(!c.is_busy());
        // draft is left alone on a rejected submission
        assert_eq!(c.draft(), "   \t ");
    }

    #[test]
    fn test_update_draft_is_plain_assignment() {
        let mut c = controller(Scripted::new(vec![]));
        c.update_draft("What is ");
        c.update_draft("What is slab?");
        assert_eq!(c.draft(), "What is slab?");
        assert_eq!(c.transcript().len(), 1);
        assert!(!c.is_busy());
    }

    #[test]
    fn test_busy_spans_exactly_one_cycle() {
        let mut c = controller(Scripted::new(vec![]));
        c.update_draft("  What is curing?  ");

        let pending = c.begin_submit("  What is curing?  ").unwrap();
        assert_eq!(pending.query, "What is curing?");
        assert!(c.is_busy());
        assert_eq!(c.draft(), "");
        assert_eq!(c.transcript().len(), 2);
        assert_eq!(c.transcript()[1].author(), Author::User);
        assert_eq!(c.transcript()[1].text(), "What is curing?");

        assert_eq!(c.settle(Ok(Answer::Text("Curing is ...".into()))), Some(ReplyKind::Answered));
        assert!(!c.is_busy());
        assert_eq!(c.transcript().len(), 3);
    }

    #[test]
    fn test_second_submission_while_busy_is_refused() {
        let mut c = controller(Scripted::new(vec![]));
        c.begin_submit("first").unwrap();
        assert_eq!(c.begin_submit("second"), Err(Rejected::Busy));
        assert_eq!(c.transcript().len(), 2);

        c.settle(Ok(Answer::Text("one".into())));
        assert_eq!(
            texts(&c)[1..],
            [(Author::User, "first".to_string()), (Author::Bot, "one".to_string())]
        );
        // idle again, so the next one is accepted
        assert!(c.begin_submit("second").is_ok());
    }

    #[test]
    fn test_settle_while_idle_adds_nothing() {
        let mut c = controller(Scripted::new(vec![]));
        assert_eq!(c.settle(Ok(Answer::Text("stray".into()))), None);
        assert_eq!(c.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_answered_scenario() {
        let svc = Scripted::new(vec![Ok(Answer::Text("Curing is ...".into()))]);
        let mut c = controller(svc.clone());

        let kind = c.submit("What is curing?").await.unwrap();
        assert_eq!(kind, ReplyKind::Answered);
        assert_eq!(
            texts(&c),
            vec![
                (Author::Bot, DEFAULT_GREETING.to_string()),
                (Author::User, "What is curing?".to_string()),
                (Author::Bot, "Curing is ...".to_string()),
            ]
        );
        assert!(!c.is_busy());
        assert_eq!(svc.seen(), vec!["What is curing?"]);
    }

    #[tokio::test]
    async fn test_no_answer_gets_fallback_turn() {
        let mut c = controller(Scripted::new(vec![Ok(Answer::Empty)]));
        assert_eq!(c.submit("hmm").await.unwrap(), ReplyKind::NoAnswer);
        assert_eq!(c.transcript().last().unwrap().text(), NO_ANSWER_TEXT);
        assert!(!c.is_busy());
    }

    #[tokio::test]
    async fn test_failures_map_to_fixed_text() {
        let mut c = controller(Scripted::new(vec![
            Err(AskError::Transport("connection refused".into())),
            Err(AskError::Status { status: 502, body: "bad gateway".into() }),
            Err(AskError::Malformed("expected value at line 1".into())),
        ]));

        assert_eq!(c.submit("a").await.unwrap(), ReplyKind::ConnectivityFailure);
        assert_eq!(c.submit("b").await.unwrap(), ReplyKind::ConnectivityFailure);
        assert_eq!(c.submit("c").await.unwrap(), ReplyKind::ConnectivityFailure);

        let bots: Vec<_> = c.transcript()[1..]
            .iter()
            .filter(|t| t.author() == Author::Bot)
            .map(|t| t.text())
            .collect();
        assert_eq!(bots, vec![CONNECTIVITY_FAILURE_TEXT; 3]);
        // raw cause never reaches the transcript
        assert!(c.transcript().iter().all(|t| !t.text().contains("refused")));
        assert!(!c.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_scenario() {
        let mut c = controller(Arc::new(Stalled));

        let kind = c.submit("What is curing?").await.unwrap();
        assert_eq!(kind, ReplyKind::ConnectivityFailure);
        assert_eq!(
            texts(&c),
            vec![
                (Author::Bot, DEFAULT_GREETING.to_string()),
                (Author::User, "What is curing?".to_string()),
                (Author::Bot, CONNECTIVITY_FAILURE_TEXT.to_string()),
            ]
        );
        assert!(!c.is_busy());
    }

    #[tokio::test]
    async fn test_empty_submit_issues_no_request() {
        let svc = Scripted::new(vec![]);
        let mut c = controller(svc.clone());
        assert_eq!(c.submit("  ").await, Err(Rejected::EmptyInput));
        assert!(svc.seen().is_empty());
        assert_eq!(c.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_suggestion_click_equals_manual_submission() {
        let svc = Scripted::new(vec![
            Ok(Answer::Text("I'm not sure, but did you mean **curing**?".into())),
            Ok(Answer::Text("Curing is ...".into())),
        ]);
        let mut c = controller(svc.clone());

        c.submit("curring").await.unwrap();
        let offered = c.suggestions();
        assert_eq!(offered, vec![(2, "curing".to_string())]);

        let pending = c.on_suggestion_clicked(&offered[0].1).unwrap();
        assert_eq!(pending, PendingQuery { query: "curing".to_string() });
        let result = client::ask_bounded(svc.as_ref(), &pending.query, c.timeout()).await;
        assert_eq!(c.settle(result), Some(ReplyKind::Answered));
        assert_eq!(c.transcript()[3].author(), Author::User);
        assert_eq!(c.transcript()[3].text(), "curing");
        assert_eq!(c.transcript()[4].text(), "Curing is ...");
        assert_eq!(svc.seen(), vec!["curring", "curing"]);
    }

    #[test]
    fn test_suggestion_click_leaves_draft_alone() {
        let mut c = controller(Scripted::new(vec![]));
        c.update_draft("what about rebar");
        let pending = c.on_suggestion_clicked("curing").unwrap();
        assert_eq!(pending.query, "curing");
        assert!(c.is_busy());
        assert_eq!(c.draft(), "what about rebar");
        assert_eq!(c.transcript()[1].text(), "curing");
    }

    #[test]
    fn test_suggestion_click_is_gated_like_submit() {
        let mut c = controller(Scripted::new(vec![]));
        c.begin_submit("first").unwrap();
        assert_eq!(c.on_suggestion_clicked("curing"), Err(Rejected::Busy));
        assert_eq!(c.transcript().len(), 2);
    }

    #[test]
    fn test_user_turns_never_offer_suggestions() {
        let mut c = controller(Scripted::new(vec![]));
        c.begin_submit("what about **slab**").unwrap();
        assert!(c.suggestions().is_empty());
        assert!(c.transcript()[1].rendered().suggestion.is_none());
    }

    #[test]
    fn test_suggestions_newest_first() {
        let mut c = controller(Scripted::new(vec![]));
        c.begin_submit("a").unwrap();
        c.settle(Ok(Answer::Text("did you mean **beam**?".into())));
        c.begin_submit("b").unwrap();
        c.settle(Ok(Answer::Text("plain".into())));
        c.begin_submit("c").unwrap();
        c.settle(Ok(Answer::Text("did you mean **column**?".into())));

        let phrases: Vec<_> = c.suggestions().into_iter().map(|(_, p)| p).collect();
        assert_eq!(phrases, vec!["column", "beam"]);
    }

    #[test]
    fn test_timestamps_follow_insertion_order() {
        let mut c = controller(Scripted::new(vec![]));
        c.begin_submit("a").unwrap();
        c.settle(Ok(Answer::Text("b".into())));
        let t = c.transcript();
        assert!(t.windows(2).all(|w| w[0].created_at() <= w[1].created_at()));
    }
}
