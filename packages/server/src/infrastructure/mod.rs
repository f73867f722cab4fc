//! Infrastructure layer: wire format and the tokio runtime around the multiplexer.

pub mod dto;
pub mod event_loop;
pub mod scheduler;
