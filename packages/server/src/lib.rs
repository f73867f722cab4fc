//! Long-polling connection multiplexer.
//!
//! Many logical bidirectional connections over plain request/response HTTP:
//! each connection survives across physical requests, buffers outbound
//! messages while no request is outstanding, and is reclaimed after a period
//! of inactivity.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// demo application
pub mod chat;
