//! Sparrow raw TCP sample
//!
//! Setiap data yang masuk dijawab "hello world!", lalu koneksi ditutup
//! setelah response terkirim.
//!
//! Usage:
//!   cargo run --release --bin sparrow_echo -- --port 8889

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use mio::Token;
use tracing::{debug, error};

use sparrow::config::{DEFAULT_TIMEOUT, DEFAULT_WORKERS};
use sparrow::core::Registry;
use sparrow::{logging, Handler, Result, Server, ServerConfig};

const REPLY: &[u8] = b"hello world!";

/// Raw TCP server replying a fixed greeting.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8889)]
    port: u16,

    /// Idle timeout in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout: u64,

    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    #[arg(long, default_value = "info")]
    log_level: String,
}

struct Greeter;

impl Handler for Greeter {
    fn on_receive(&self, registry: &Registry, token: Token) -> Result<()> {
        if let Some(data) = registry.pop_received(token) {
            debug!(token = token.0, bytes = data.len(), "received");
            registry.enqueue(token, REPLY);
        }
        Ok(())
    }

    fn on_send(&self, registry: &Registry, token: Token) -> Result<()> {
        registry.remove(token);
        Ok(())
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(&args.log_level, None) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = ServerConfig::new(SocketAddr::new(args.host, args.port))
        .with_timeout(Duration::from_millis(args.timeout))
        .with_workers(args.workers);

    match Server::bind(config, Greeter).and_then(Server::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}
