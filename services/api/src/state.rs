//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the capture
//! collaborators and the completion client behind trait objects, plus the
//! loaded configuration. Each WebSocket session gets its own dispatcher and
//! cache; only these clonable service handles are shared.

use crate::config::Config;
use glimpse_core::{
    capture::{AudioTextSource, ScreenTextSource},
    completion::CompletionClient,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub screen: Arc<dyn ScreenTextSource>,
    pub audio: Arc<dyn AudioTextSource>,
    pub completion: Arc<dyn CompletionClient>,
    pub config: Arc<Config>,
}
