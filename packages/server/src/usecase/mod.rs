//! UseCase layer: routing physical requests onto connections.

mod multiplexer;

pub use multiplexer::{Multiplexer, MultiplexerConfig, MultiplexerStats};
