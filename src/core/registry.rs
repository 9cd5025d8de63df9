//! Connection Registry: token -> Connection
//!
//! Satu-satunya pemilik lifecycle koneksi. Insert (accept) dan delete
//! (close/evict) selalu dilakukan bersama register/deregister multiplexer dan
//! close socket dalam satu operasi di bawah lock map, sehingga state parsial
//! (terdaftar tapi tidak ada Connection, atau sebaliknya) tidak pernah terlihat.
//!
//! Komponen lain hanya memegang `Token` dan selalu re-resolve lewat registry.
//! Lookup yang gagal berarti koneksi sudah dihapus: no-op, bukan error.

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use mio::{Interest, Token};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::connection::{Connection, ReadStatus, SocketOptions, WriteStatus};
use crate::error::Result;

/// Token 0 dan 1 dipakai listener dan waker milik reactor
pub const FIRST_CONNECTION_TOKEN: usize = 2;

type Shared = Arc<Mutex<Connection>>;

/// Hasil satu sweep timeout
#[derive(Debug, Default, Clone)]
pub struct Sweep {
    /// Token yang idle lebih lama dari timeout
    pub expired: Vec<Token>,
    /// `last_activity` paling lama di antara koneksi yang masih hidup
    pub oldest: Option<Instant>,
}

/// Shared registry antara reactor dan worker pool.
///
/// Lock order: map dulu, lalu connection. Tidak ada path yang memegang lock
/// connection sambil mengambil lock map.
pub struct Registry {
    poll: mio::Registry,
    connections: Mutex<HashMap<Token, Shared>>,
    next_token: AtomicUsize,
    options: SocketOptions,
    read_chunk: usize,
    max_outbound: usize,
}

impl Registry {
    /// Membuat registry di atas `mio::Registry` milik reactor
    pub fn new(poll: mio::Registry, options: SocketOptions, read_chunk: usize) -> Self {
        Self {
            poll,
            connections: Mutex::new(HashMap::with_capacity(1024)),
            next_token: AtomicUsize::new(FIRST_CONNECTION_TOKEN),
            options,
            read_chunk: read_chunk.max(1),
            max_outbound: usize::MAX,
        }
    }

    /// Batas outbound per koneksi. Di atas batas ini reads dihentikan sampai
    /// peer membaca cukup banyak.
    pub fn with_outbound_limit(mut self, limit: usize) -> Self {
        self.max_outbound = limit.max(1);
        self
    }

    /// Daftarkan socket hasil accept untuk read interest dan simpan Connection-nya.
    ///
    /// Token tidak pernah dipakai ulang selama registry hidup. Jika register ke
    /// multiplexer gagal, error dicatat, socket langsung ditutup, dan error
    /// dikembalikan ke caller.
    pub fn create(&self, peer: SocketAddr, stream: TcpStream) -> Result<Token> {
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));
        let mut conn = Connection::new(stream, peer, self.options)?;

        let mut map = self.connections.lock();
        let registered = match conn.stream_mut() {
            Some(stream) => self.poll.register(stream, token, Interest::READABLE),
            None => Ok(()),
        };
        if let Err(e) = registered {
            error!(%peer, error = %e, "failed to register connection");
            conn.close(&self.poll);
            return Err(e.into());
        }

        map.insert(token, Arc::new(Mutex::new(conn)));
        debug!(token = token.0, %peer, "connection created");
        Ok(token)
    }

    /// Deregister, tutup socket, dan hapus Connection. Idempotent.
    ///
    /// Returns `true` jika koneksi ada sebelum dipanggil.
    pub fn remove(&self, token: Token) -> bool {
        let mut map = self.connections.lock();
        match map.remove(&token) {
            Some(conn) => {
                let mut conn = conn.lock();
                conn.close(&self.poll);
                debug!(token = token.0, peer = %conn.peer_addr(), "connection removed");
                true
            }
            None => false,
        }
    }

    /// Drain socket ke inbound sampai `WouldBlock`.
    ///
    /// Zero-length read menghapus koneksi dan mengembalikan `ReadStatus::Closed`.
    /// Hard error menghapus koneksi lalu dipropagasi.
    pub fn receive(&self, token: Token) -> Result<ReadStatus> {
        let conn = match self.get(token) {
            Some(c) => c,
            None => {
                debug!(token = token.0, "receive on unknown connection");
                return Ok(ReadStatus::Closed);
            }
        };

        let result = conn.lock().fill(self.read_chunk);
        match result {
            Ok(ReadStatus::Closed) => {
                self.remove(token);
                Ok(ReadStatus::Closed)
            }
            Ok(status) => Ok(status),
            Err(e) => {
                self.remove(token);
                Err(e.into())
            }
        }
    }

    /// Append `data` (jika ada) ke outbound lalu tulis sebanyak yang diterima socket.
    ///
    /// Hanya dipanggil dari thread reactor. Worker memakai [`Registry::enqueue`].
    /// Hard write error menghapus koneksi lalu dipropagasi.
    pub fn send(&self, token: Token, data: Option<&[u8]>) -> Result<WriteStatus> {
        let conn = match self.get(token) {
            Some(c) => c,
            None => {
                debug!(token = token.0, "send on unknown connection");
                return Ok(WriteStatus::Idle);
            }
        };

        let result = {
            let mut conn = conn.lock();
            if let Some(data) = data {
                conn.outbound.extend(data);
            }
            conn.flush()
        };

        match result {
            Ok(status) => Ok(status),
            Err(e) => {
                self.remove(token);
                Err(e.into())
            }
        }
    }

    /// Append ke outbound tanpa I/O. Reactor yang akan flush.
    ///
    /// Returns `false` jika koneksi sudah tidak ada.
    pub fn enqueue(&self, token: Token, data: &[u8]) -> bool {
        self.with(token, |conn| {
            if conn.is_open() {
                conn.outbound.extend(data);
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Ambil dan kosongkan seluruh inbound sebagai satu buffer kontigu.
    pub fn pop_received(&self, token: Token) -> Option<Vec<u8>> {
        self.with(token, |conn| conn.inbound.take())
    }

    /// Kembalikan bytes yang belum dikonsumsi parser (misalnya awal request
    /// berikutnya) ke depan inbound, sebelum bytes yang masuk sejak `pop_received`.
    pub fn restore_received(&self, token: Token, leftover: Vec<u8>) -> bool {
        self.with(token, |conn| conn.inbound.unshift(leftover))
            .is_some()
    }

    /// Ambil protocol state milik koneksi.
    ///
    /// `None` jika koneksi tidak ada, state belum diset, atau tipenya berbeda
    /// (state dengan tipe berbeda tetap disimpan).
    pub fn take_state<T: Any + Send>(&self, token: Token) -> Option<T> {
        self.with(token, |conn| {
            let state = conn.state.take()?;
            match state.downcast::<T>() {
                Ok(state) => Some(*state),
                Err(other) => {
                    conn.state = Some(other);
                    None
                }
            }
        })
        .flatten()
    }

    /// Simpan protocol state untuk koneksi. `false` jika koneksi sudah tidak ada.
    pub fn put_state<T: Any + Send>(&self, token: Token, state: T) -> bool {
        self.with(token, |conn| conn.state = Some(Box::new(state)))
            .is_some()
    }

    pub fn peer_addr(&self, token: Token) -> Option<SocketAddr> {
        self.with(token, |conn| conn.peer_addr())
    }

    pub fn has_pending_output(&self, token: Token) -> bool {
        self.with(token, |conn| !conn.outbound.is_empty())
            .unwrap_or(false)
    }

    /// Set interest: READABLE, plus WRITABLE selama outbound belum kosong.
    /// Outbound yang mencapai batas hanya WRITABLE (reads di-pause).
    pub fn rearm(&self, token: Token) -> Result<()> {
        let conn = match self.get(token) {
            Some(c) => c,
            None => return Ok(()),
        };

        let result = {
            let mut conn = conn.lock();
            let pending = conn.outbound.pending().len();
            let wanted = if pending == 0 {
                Interest::READABLE
            } else if pending >= self.max_outbound {
                Interest::WRITABLE
            } else {
                Interest::READABLE | Interest::WRITABLE
            };
            if conn.interest == wanted {
                Ok(())
            } else {
                conn.interest = wanted;
                match conn.stream_mut() {
                    Some(stream) => self.poll.reregister(stream, token, wanted),
                    None => Ok(()),
                }
            }
        };

        if let Err(e) = result {
            warn!(token = token.0, error = %e, "failed to re-arm interest");
            self.remove(token);
            return Err(e.into());
        }
        Ok(())
    }

    /// Scan semua koneksi untuk timeout.
    pub fn sweep(&self, now: Instant, timeout: Duration) -> Sweep {
        let map = self.connections.lock();
        let mut sweep = Sweep::default();

        for (token, conn) in map.iter() {
            let conn = conn.lock();
            if conn.is_expired(now, timeout) {
                sweep.expired.push(*token);
            } else {
                let seen = conn.last_activity();
                sweep.oldest = Some(sweep.oldest.map_or(seen, |o| o.min(seen)));
            }
        }
        sweep
    }

    #[inline]
    pub fn contains(&self, token: Token) -> bool {
        self.connections.lock().contains_key(&token)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.connections.lock().keys().copied().collect()
    }

    /// Tutup semua koneksi (shutdown)
    pub fn clear(&self) -> usize {
        let tokens = self.tokens();
        tokens.into_iter().filter(|t| self.remove(*t)).count()
    }

    /// Jalankan `f` dengan lock connection. Closure tidak boleh memanggil registry lagi.
    pub(crate) fn with<R>(&self, token: Token, f: impl FnOnce(&mut Connection) -> R) -> Option<R> {
        let conn = self.get(token)?;
        let mut conn = conn.lock();
        Some(f(&mut conn))
    }

    fn get(&self, token: Token) -> Option<Shared> {
        self.connections.lock().get(&token).cloned()
    }
}
