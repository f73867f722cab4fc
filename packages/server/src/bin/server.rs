//! Long-polling chat server.
//!
//! Serves the long-polling endpoint at `/poll` and runs the demo chat room
//! on top of it.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kayoi-server
//! cargo run --bin kayoi-server -- --host 0.0.0.0 --port 3000 --session-timeout-secs 30
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use kayoi_server::{
    chat::ChatRoom,
    domain::{ConnectionSettings, DEFAULT_MAX_OUTBOUND},
    infrastructure::event_loop::spawn_multiplexer,
    ui::{DEFAULT_MAX_BODY_BYTES, Server, ServerConfig},
    usecase::MultiplexerConfig,
};
use kayoi_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "kayoi-server")]
#[command(about = "Long-polling chat server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Seconds without a poll before a session is closed
    #[arg(long, default_value = "15")]
    session_timeout_secs: u64,

    /// Maximum accepted request body size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Maximum queued outbound messages per session before it is dropped
    #[arg(long, default_value_t = DEFAULT_MAX_OUTBOUND)]
    max_outbound: usize,

    /// Seconds a closed session keeps answering `close`
    #[arg(long, default_value = "3600")]
    closed_retention_secs: u64,

    /// Seconds between sweeps of expired closed sessions
    #[arg(long, default_value = "60")]
    prune_interval_secs: u64,
}

impl Args {
    fn multiplexer_config(&self) -> MultiplexerConfig {
        MultiplexerConfig {
            connection: ConnectionSettings {
                session_timeout: Duration::from_secs(self.session_timeout_secs),
                max_outbound: self.max_outbound,
            },
            closed_retention: Duration::from_secs(self.closed_retention_secs),
            prune_interval: Duration::from_secs(self.prune_interval_secs),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    let clock = Arc::new(SystemClock);
    let room = Arc::new(ChatRoom::new(clock.clone()));
    let (multiplexer, _event_loop) = spawn_multiplexer(args.multiplexer_config(), room, clock);

    let server = Server::new(
        multiplexer,
        ServerConfig {
            max_body_bytes: args.max_body_bytes,
        },
    );
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
