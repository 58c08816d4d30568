//! Chat relay server binary
//!
//! Usage:
//!   cargo run -- server                    # Run the relay on the default port
//!   cargo run -- server --port 8000       # Run on a specific port

use std::env;
use std::time::Duration;

use chatrelay::{RelayConfig, RelayError, RelayServer, Result};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "server" => {
            run_server(&args).await?;
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage();
            return Ok(());
        }
    }

    Ok(())
}

fn print_usage() {
    println!("Chatrelay - Minimal Line-Oriented Chat Relay Server");
    println!();
    println!("USAGE:");
    println!("    cargo run -- server [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    server               Start the relay server");
    println!("    help                 Show this help message");
    println!();
    println!("OPTIONS:");
    println!("    --host <HOST>        Host to bind (default: 127.0.0.1)");
    println!("    --port <PORT>        Port to listen on (default: 8000)");
    println!("    --buffer <NUM>       Broadcast buffer capacity (default: 20)");
    println!("    --msg-limit <NUM>    Messages per rate window (default: 20)");
    println!("    --window-secs <NUM>  Rate window length in seconds (default: 3600)");
    println!("    --files-dir <DIR>    Uploaded artifact directory (default: relay-files)");
    println!();
    println!("EXAMPLES:");
    println!("    cargo run -- server");
    println!("    cargo run -- server --port 9000 --buffer 50");
    println!("    RUST_LOG=debug cargo run -- server");
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn numeric_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match flag_value(args, flag) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| RelayError::config(format!("Bad value for {}: {:?}", flag, v))),
        None => Ok(None),
    }
}

fn build_config(args: &[String]) -> Result<RelayConfig> {
    let mut config = RelayConfig::default();

    let host = flag_value(args, "--host").unwrap_or("127.0.0.1");
    let port: u16 = numeric_flag(args, "--port")?.unwrap_or(config.bind_addr.port());
    config.bind_addr = format!("{}:{}", host, port).parse()?;

    if let Some(v) = numeric_flag(args, "--buffer")? {
        config.buffer_capacity = v;
    }
    if let Some(v) = numeric_flag(args, "--msg-limit")? {
        config.message_limit = v;
    }
    if let Some(v) = numeric_flag(args, "--window-secs")? {
        config.rate_window = Duration::from_secs(v);
    }
    if let Some(v) = flag_value(args, "--files-dir") {
        config.files_dir = v.into();
    }

    Ok(config)
}

async fn run_server(args: &[String]) -> Result<()> {
    let config = build_config(args)?;

    info!("Starting chat relay server...");
    info!("Configuration:");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - Buffer capacity: {}", config.buffer_capacity);
    info!(
        "  - Rate limit: {} messages per {:?}",
        config.message_limit, config.rate_window
    );
    info!("  - Files directory: {}", config.files_dir.display());

    let server = RelayServer::bind(config).await?;

    // Serve until the listener fails
    if let Err(e) = server.serve().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
