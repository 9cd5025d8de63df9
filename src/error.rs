//! Error types untuk seluruh crate
//!
//! Klasifikasi mengikuti lapisan I/O:
//! - `WouldBlock` bukan error, hanya menghentikan drain loop
//! - Peer menutup koneksi bukan error, koneksi dihapus lewat `Registry::remove`
//! - Error lain dari socket dicatat dan koneksi dihapus

use std::io;

use thiserror::Error;

/// Result type untuk operasi sparrow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors yang bisa muncul dari reactor, registry, dan worker pool.
///
/// Request yang tidak bisa di-parse ditangani HTTP service sendiri (400 lalu
/// close), jadi tidak muncul di sini.
#[derive(Debug, Error)]
pub enum Error {
    /// Hard socket error (bukan `WouldBlock`).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Konfigurasi startup tidak valid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Multiplexer wait gagal terus-menerus.
    #[error("readiness wait failed {attempts} times in a row: {source}")]
    Poll {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// Application callback returned an error or panicked.
    #[error("handler failed: {0}")]
    Handler(String),

    /// Task channel sudah ditutup (server shutting down).
    #[error("task channel closed")]
    Shutdown,
}

impl Error {
    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Create a handler error.
    pub fn handler(reason: impl Into<String>) -> Self {
        Self::Handler(reason.into())
    }
}

/// `true` untuk kondisi transient "coba lagi nanti".
#[inline]
pub(crate) fn would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

/// `true` jika syscall terpotong signal dan harus diulang.
#[inline]
pub(crate) fn interrupted(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}
