//! Core module: per-connection state dan registry
//!
//! Prinsip desain:
//! - Satu `Connection` per socket yang hidup, disimpan per `Token`
//! - Semua insert/delete lewat `Registry`, yang juga (de)register ke mio
//! - Token tidak pernah dipakai ulang, jadi task lama tidak bisa salah alamat

mod buffer;
mod connection;
mod registry;

pub use buffer::{InboundBuffer, OutboundBuffer};
pub use connection::{Connection, ReadStatus, SocketOptions, WriteStatus};
pub use registry::{Registry, Sweep, FIRST_CONNECTION_TOKEN};
