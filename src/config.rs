//! Server configuration
//!
//! Semua nilai di sini adalah startup configuration. Library tidak membaca
//! environment atau argumen CLI, binary yang memetakan keduanya ke struct ini.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default listening address (port sample server)
pub const DEFAULT_BIND: &str = "0.0.0.0:8888";
/// Default idle timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default jumlah worker per reactor
pub const DEFAULT_WORKERS: usize = 10;
/// Default kapasitas `mio::Events`
pub const DEFAULT_EVENTS_CAPACITY: usize = 1024;
/// Default batas koneksi per reactor
pub const DEFAULT_MAX_CONNECTIONS: usize = 10240;
/// Default ukuran satu `read` di drain loop
pub const DEFAULT_READ_CHUNK: usize = 4096;
/// Default batas outbound per koneksi sebelum reads di-pause
pub const DEFAULT_MAX_OUTBOUND: usize = 1024 * 1024;

/// Startup configuration untuk `Server`
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Alamat listening socket
    pub bind: SocketAddr,
    /// Koneksi idle lebih lama dari ini akan di-evict
    pub timeout: Duration,
    /// Jumlah worker per reactor
    pub workers: usize,
    /// Jumlah reactor shard yang berbagi listener. 0 = satu per CPU core
    pub reactors: usize,
    /// Kapasitas event buffer per wait
    pub events_capacity: usize,
    /// Batas koneksi per reactor
    pub max_connections: usize,
    /// Bytes per `read` syscall
    pub read_chunk: usize,
    /// SO_SNDBUF/SO_RCVBUF untuk socket yang di-accept (None = default OS)
    pub socket_buffer: Option<usize>,
    /// TCP_NODELAY untuk socket yang di-accept
    pub nodelay: bool,
    /// Outbound yang belum terkirim. Di atas ini koneksi berhenti dibaca.
    pub max_outbound: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8888)),
            timeout: DEFAULT_TIMEOUT,
            workers: DEFAULT_WORKERS,
            reactors: 1,
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            read_chunk: DEFAULT_READ_CHUNK,
            socket_buffer: None,
            nodelay: true,
            max_outbound: DEFAULT_MAX_OUTBOUND,
        }
    }
}

impl ServerConfig {
    /// Config default dengan alamat tertentu
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_reactors(mut self, reactors: usize) -> Self {
        self.reactors = reactors;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = read_chunk;
        self
    }

    pub fn with_socket_buffer(mut self, size: usize) -> Self {
        self.socket_buffer = Some(size);
        self
    }

    pub fn with_max_outbound(mut self, max_outbound: usize) -> Self {
        self.max_outbound = max_outbound;
        self
    }

    /// Validasi sebelum server dijalankan.
    ///
    /// # Errors
    /// `Error::Config` jika ada nilai nol yang membuat server tidak bisa jalan.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be greater than zero"));
        }
        if self.events_capacity == 0 {
            return Err(Error::config("events_capacity must be at least 1"));
        }
        if self.max_connections == 0 {
            return Err(Error::config("max_connections must be at least 1"));
        }
        if self.read_chunk == 0 {
            return Err(Error::config("read_chunk must be at least 1"));
        }
        if self.max_outbound == 0 {
            return Err(Error::config("max_outbound must be at least 1"));
        }
        if self.socket_buffer == Some(0) {
            return Err(Error::config("socket_buffer must be greater than zero"));
        }
        Ok(())
    }

    /// Jumlah reactor yang benar-benar dijalankan (resolve `reactors = 0`)
    pub fn resolved_reactors(&self) -> usize {
        if self.reactors > 0 {
            return self.reactors;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let config = ServerConfig::default().with_workers(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = ServerConfig::default().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_socket_buffer() {
        let config = ServerConfig::default().with_socket_buffer(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_max_outbound() {
        let config = ServerConfig::default().with_max_outbound(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert_eq!(ServerConfig::default().max_outbound, DEFAULT_MAX_OUTBOUND);
    }

    #[test]
    fn test_resolved_reactors() {
        assert_eq!(ServerConfig::default().with_reactors(3).resolved_reactors(), 3);
        assert!(ServerConfig::default().with_reactors(0).resolved_reactors() >= 1);
    }
}
