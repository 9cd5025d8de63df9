//! Sparrow - Event-Driven TCP Server Engine
//!
//! Arsitektur:
//! - Reactor: satu thread per shard, semua socket I/O non-blocking via mio
//! - Registry: `Token -> Connection`, satu-satunya jalur create/remove
//! - Worker pool: application callback tanpa socket I/O
//! - Protocol: HTTP/1.1 subset sebagai `Handler` bawaan
//!
//! ```no_run
//! use sparrow::protocol::{HttpService, Request, Resource};
//! use sparrow::{Server, ServerConfig};
//!
//! struct Hello;
//!
//! impl Resource for Hello {
//!     fn get(&self, _request: &Request) -> Vec<u8> {
//!         b"hello GET".to_vec()
//!     }
//! }
//!
//! let config = ServerConfig::default();
//! let service = HttpService::new().route("/test", Hello);
//! Server::bind(config, service)?.run()?;
//! # Ok::<(), sparrow::Error>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod network;
pub mod protocol;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use network::{Handler, RunningServer, Server, ShutdownHandle};
