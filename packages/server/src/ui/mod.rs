//! HTTP surface of the long-polling server.

mod handler;
mod server;
mod signal;
pub mod state;

pub use handler::poll::{BodyError, DEFAULT_MAX_BODY_BYTES};
pub use server::{Server, ServerConfig, build_router};
