//! Glimpse API Library Crate
//!
//! This library contains all the core logic for the Glimpse capture
//! assistant service: configuration, shared application state, the HTTP
//! router, and the WebSocket command dispatcher. The `api` binary is a thin
//! wrapper around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
