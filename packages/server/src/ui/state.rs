//! Server state shared by the handlers.

use crate::infrastructure::event_loop::MultiplexerHandle;

/// Shared application state
pub struct AppState {
    /// Entry point to the multiplexer event loop
    pub multiplexer: MultiplexerHandle,
    /// Largest accepted poll request body, in bytes
    pub max_body_bytes: usize,
}
