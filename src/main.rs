//! Sparrow HTTP sample server
//!
//! Usage:
//!   cargo run --release --bin sparrow -- --port 8888 --workers 10
//!
//! Routes:
//!   /test  GET -> "hello GET", POST -> "hello POST"

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use sparrow::config::{DEFAULT_TIMEOUT, DEFAULT_WORKERS};
use sparrow::logging::{self, DEFAULT_LOG_FILE};
use sparrow::protocol::{HttpService, Request, Resource};
use sparrow::{Server, ServerConfig};

/// Event-driven HTTP server with a readiness reactor and worker pool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8888)]
    port: u16,

    /// Idle timeout in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout: u64,

    /// Worker threads per reactor
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Reactor shards sharing the listener (0 = one per CPU)
    #[arg(short, long, default_value_t = 1)]
    reactors: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_LOG_FILE)]
    log_file: Option<PathBuf>,
}

struct TestPage;

impl Resource for TestPage {
    fn get(&self, _request: &Request) -> Vec<u8> {
        b"hello GET".to_vec()
    }

    fn post(&self, _request: &Request) -> Vec<u8> {
        b"hello POST".to_vec()
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(&args.log_level, args.log_file.as_deref()) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = ServerConfig::new(SocketAddr::new(args.host, args.port))
        .with_timeout(Duration::from_millis(args.timeout))
        .with_workers(args.workers)
        .with_reactors(args.reactors);

    let service = HttpService::new().route("/test", TestPage);

    let result = Server::bind(config, service).and_then(|server| {
        let addr = server.local_addr()?;
        info!(%addr, "sparrow http server listening");
        server.run()
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}
