//! The capture/solve command cycle for one WebSocket session.
//!
//! `SessionContext` owns everything scoped to a single connection: the
//! session cache and the current protocol phase. Commands are handled to
//! completion, one at a time; every recoverable failure becomes a structured
//! error reply and the session stays in `Idle`.

use crate::{
    state::AppState,
    ws::protocol::{CaptureReport, ClientMessage, ServerMessage},
};
use glimpse_core::{
    cache::{SNAPSHOT_TTL, SessionCache},
    capture::CaptureError,
    completion::CompletionError,
    normalize::{self, Answer},
    prompt,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Recoverable failures of one command, mapped onto the wire error
/// categories. None of these close the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no context captured yet; send `capture` first")]
    NoSnapshot,
    #[error("captured context is older than {}s; send `capture` again", SNAPSHOT_TTL.as_secs())]
    StaleSnapshot,
    #[error(transparent)]
    CaptureFailed(#[from] CaptureError),
    #[error(transparent)]
    CompletionFailed(#[from] CompletionError),
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

impl SessionError {
    /// The stable category carried in the error envelope's `message` field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NoSnapshot => "no-snapshot",
            Self::StaleSnapshot => "snapshot-expired",
            Self::CaptureFailed(_) => "capture-failed",
            Self::CompletionFailed(_) => "service-unavailable",
            Self::MalformedCommand(_) => "malformed-command",
        }
    }

    pub fn to_reply(&self) -> ServerMessage {
        ServerMessage::Error {
            message: self.category().to_string(),
            details: self.to_string(),
        }
    }
}

/// Protocol phase of one connection after authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CaptureInFlight,
    SolveInFlight,
    Closed,
}

/// What the session loop should do after a command was handled.
#[derive(Debug)]
pub enum Outcome {
    Reply(ServerMessage),
    Close,
}

/// Per-connection dispatcher state.
pub struct SessionContext {
    state: Arc<AppState>,
    cache: SessionCache,
    phase: Phase,
}

impl SessionContext {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            cache: SessionCache::new(),
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    /// Handles one command to completion. Never returns an error: failures
    /// are folded into the reply, per the recoverable-error policy.
    pub async fn handle_command(&mut self, command: ClientMessage, now: Instant) -> Outcome {
        match command {
            ClientMessage::Capture => {
                self.enter(Phase::CaptureInFlight);
                let result = self.capture(now).await;
                self.enter(Phase::Idle);
                Outcome::Reply(Self::reply_from(result))
            }
            ClientMessage::Solve => {
                self.enter(Phase::SolveInFlight);
                let result = self.solve(now).await;
                self.enter(Phase::Idle);
                Outcome::Reply(Self::reply_from(result))
            }
            ClientMessage::Clear => {
                self.cache.clear();
                debug!("session cache cleared");
                Outcome::Reply(ServerMessage::Cleared)
            }
            ClientMessage::Stop => {
                self.enter(Phase::Closed);
                Outcome::Close
            }
        }
    }

    fn reply_from(result: Result<CaptureReport, SessionError>) -> ServerMessage {
        match result {
            Ok(data) => ServerMessage::Response { data },
            Err(err) => {
                warn!(category = err.category(), error = %err, "command failed");
                err.to_reply()
            }
        }
    }

    /// Captures fresh screen and audio text, generates an answer for it, and
    /// caches both.
    async fn capture(&mut self, now: Instant) -> Result<CaptureReport, SessionError> {
        let screen_text = self.state.screen.capture_text().await?;
        let audio_text = self.state.audio.transcript().await?;
        debug!(
            screen_chars = screen_text.len(),
            audio_chars = audio_text.len(),
            "captured context"
        );
        self.cache
            .record_snapshot(screen_text.clone(), audio_text.clone(), now);

        let answer = self.generate_answer(now).await?;
        Ok(CaptureReport {
            screen_text,
            audio_text,
            ai_response: answer,
        })
    }

    /// Answers for the already-captured context. Reuses the cached answer
    /// when it is still fresh; otherwise generates a new one from the same
    /// snapshot. Never re-captures.
    async fn solve(&mut self, now: Instant) -> Result<CaptureReport, SessionError> {
        let (screen_text, audio_text) = {
            let snapshot = self.cache.snapshot().ok_or(SessionError::NoSnapshot)?;
            (snapshot.screen_text.clone(), snapshot.audio_text.clone())
        };
        if !self.cache.has_valid_snapshot(now) {
            return Err(SessionError::StaleSnapshot);
        }

        let answer = match self.cache.get_reusable_answer(now) {
            Some(answer) => {
                debug!("reusing cached answer");
                answer.clone()
            }
            None => self.generate_answer(now).await?,
        };
        Ok(CaptureReport {
            screen_text,
            audio_text,
            ai_response: answer,
        })
    }

    /// One completion round trip for the current snapshot: build the prompt,
    /// call the model, normalize, cache.
    async fn generate_answer(&mut self, now: Instant) -> Result<Answer, SessionError> {
        let (screen_text, audio_text) = {
            let snapshot = self.cache.snapshot().ok_or(SessionError::NoSnapshot)?;
            (snapshot.screen_text.clone(), snapshot.audio_text.clone())
        };
        let messages = prompt::build_messages(&screen_text, &audio_text);
        let raw = self.state.completion.complete(&messages).await?;
        let answer = normalize::normalize(&raw);
        let entry = self
            .cache
            .store_answer(answer, now)
            .map_err(|_| SessionError::NoSnapshot)?;
        Ok(entry.answer.clone())
    }
}
