//! WebSocket Session Management
//!
//! This module contains the command protocol for capture sessions:
//!
//! - `protocol`: the JSON message format between client and server.
//! - `session`: the connection lifecycle, from token check to termination.
//! - `cycle`: the per-session dispatcher handling capture/solve/clear/stop.

mod cycle;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
