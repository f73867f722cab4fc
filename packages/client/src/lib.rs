//! Long-polling chat client.
//!
//! [`LongPollClient`] speaks the envelope protocol over HTTP; [`run_client`]
//! drives an interactive chat session on top of it.

mod domain;
pub mod error;
mod formatter;
mod runner;
mod session;
pub mod transport;
mod ui;

pub use error::ClientError;
pub use runner::run_client;
pub use transport::LongPollClient;
