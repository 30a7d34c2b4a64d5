//! Trait seams for the screen-text and audio-text collaborators.
//!
//! Actual screen capture/OCR and audio transcription live outside this
//! workspace. The session engine only depends on these two contracts, so the
//! service can swap in a platform-specific backend (or a mock for tests and
//! local development) without touching the dispatcher.

use async_trait::async_trait;

/// Failure of a capture collaborator (OCR backend missing, capture denied,
/// audio device unavailable, ...). The session survives these; the client
/// gets a structured error and may retry.
#[derive(Debug, thiserror::Error)]
#[error("{source_name} capture failed: {reason}")]
pub struct CaptureError {
    pub source_name: &'static str,
    pub reason: String,
}

impl CaptureError {
    pub fn screen(reason: impl Into<String>) -> Self {
        Self {
            source_name: "screen",
            reason: reason.into(),
        }
    }

    pub fn audio(reason: impl Into<String>) -> Self {
        Self {
            source_name: "audio",
            reason: reason.into(),
        }
    }
}

/// Produces the text currently visible on screen.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScreenTextSource: Send + Sync {
    /// Captures the screen and returns the extracted text. May fail.
    async fn capture_text(&self) -> Result<String, CaptureError>;
}

/// Produces the most recent transcription of what is being said.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioTextSource: Send + Sync {
    /// Returns the latest transcription window. An empty transcript is a
    /// valid result, not an error.
    async fn transcript(&self) -> Result<String, CaptureError>;
}

/// A `ScreenTextSource` that returns fixed text, for development and
/// integration testing without an OCR backend.
pub struct MockScreenSource {
    pub text: String,
}

impl MockScreenSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl ScreenTextSource for MockScreenSource {
    async fn capture_text(&self) -> Result<String, CaptureError> {
        Ok(self.text.clone())
    }
}

/// An `AudioTextSource` that returns fixed text, for development and
/// integration testing without a transcription backend.
pub struct MockAudioSource {
    pub text: String,
}

impl MockAudioSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl AudioTextSource for MockAudioSource {
    async fn transcript(&self) -> Result<String, CaptureError> {
        Ok(self.text.clone())
    }
}
