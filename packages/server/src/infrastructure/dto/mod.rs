//! Data Transfer Objects (DTOs).
//!
//! DTOs are organized by surface:
//! - `poll`: the long-polling envelope
//! - `http`: auxiliary HTTP API responses

pub mod conversion;
pub mod http;
pub mod poll;
