//! Defines the WebSocket message protocol between the client and the server.

use glimpse_core::normalize::Answer;
use serde::{Deserialize, Serialize};

/// Commands sent from the client to the server. Tags only, no payload.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Capture screen and audio text, generate an answer, cache both.
    Capture,
    /// Answer for the captured context, reusing the cached answer when fresh.
    Solve,
    /// Discard the captured context and its answer.
    Clear,
    /// End the session; the server closes the connection.
    Stop,
}

/// The payload of a successful capture or solve.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub screen_text: String,
    pub audio_text: String,
    pub ai_response: Answer,
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A capture or solve completed.
    Response { data: CaptureReport },
    /// Acknowledges a `clear`.
    Cleared,
    /// A recoverable failure. `message` is a stable category, `details` the
    /// human-readable cause.
    Error { message: String, details: String },
}
