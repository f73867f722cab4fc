//! Long-polling chat client with reconnection support.
//!
//! Opens a session on the chat server, announces a display name and sends
//! each input line as a chat message. Incoming room events are printed as
//! they arrive. Automatically reconnects when the session is lost (max 5
//! attempts with 5 second interval).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kayoi-client -- --name Alice
//! cargo run --bin kayoi-client -- -n Bob -u http://127.0.0.1:3000/poll
//! ```

use clap::Parser;
use kayoi_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "kayoi-client")]
#[command(about = "Long-polling chat client", long_about = None)]
struct Args {
    /// Display name shown to other participants
    #[arg(short = 'n', long)]
    name: String,

    /// Long-polling endpoint URL
    #[arg(short = 'u', long, default_value = "http://127.0.0.1:8080/poll")]
    url: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Run the client
    if let Err(e) = kayoi_client::run_client(args.url, args.name).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
