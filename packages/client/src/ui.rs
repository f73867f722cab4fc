//! UI utilities for the client.

use std::io::Write;

/// Redisplay the prompt after printing incoming messages
pub fn redisplay_prompt(name: &str) {
    print!("{}> ", name);
    std::io::stdout().flush().ok();
}
