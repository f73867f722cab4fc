//! Shared utilities for the Kayoi server and client.

pub mod logger;
pub mod time;
