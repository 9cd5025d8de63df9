//! Connection state per accepted socket
//!
//! Semua I/O non-blocking: drain loop berhenti di `WouldBlock`,
//! tidak pernah menunggu.

use std::any::Any;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Instant;

use mio::net::TcpStream;
use mio::Interest;

use super::buffer::{InboundBuffer, OutboundBuffer};
use crate::error::{interrupted, would_block};

/// Hasil drain loop `read`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Socket masih terbuka, `bytes` baru masuk ke inbound
    Open { bytes: usize },
    /// Peer menutup koneksi (zero-length read) atau koneksi sudah tidak ada
    Closed,
}

/// Hasil flush outbound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Tidak ada yang perlu dikirim
    Idle,
    /// Sebagian terkirim, sisanya menunggu socket writable lagi
    Pending,
    /// Outbound terkirim semua pada panggilan ini
    Complete,
}

/// Task yang tertunda karena worker masih memproses koneksi ini
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Deferred {
    pub receive: bool,
    pub send: bool,
}

/// Per-socket state. Hanya bisa diakses lewat `Registry`.
pub struct Connection {
    // None setelah `close`: socket sudah ditutup secara deterministik
    stream: Option<TcpStream>,
    peer: SocketAddr,
    last_activity: Instant,
    pub(crate) inbound: InboundBuffer,
    pub(crate) outbound: OutboundBuffer,
    // Protocol-specific, opaque untuk reactor
    pub(crate) state: Option<Box<dyn Any + Send>>,
    pub(crate) interest: Interest,
    pub(crate) in_flight: bool,
    pub(crate) deferred: Deferred,
}

/// Socket options untuk koneksi baru
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    pub nodelay: bool,
    pub buffer_size: Option<usize>,
}

impl Connection {
    /// Wrap socket hasil accept. Socket dari mio sudah non-blocking.
    pub fn new(stream: TcpStream, peer: SocketAddr, options: SocketOptions) -> io::Result<Self> {
        if options.nodelay {
            stream.set_nodelay(true)?;
        }
        if let Some(size) = options.buffer_size {
            set_socket_buffers(&stream, size);
        }

        Ok(Self {
            stream: Some(stream),
            peer,
            last_activity: Instant::now(),
            inbound: InboundBuffer::new(),
            outbound: OutboundBuffer::new(),
            state: None,
            interest: Interest::READABLE,
            in_flight: false,
            deferred: Deferred::default(),
        })
    }

    #[inline(always)]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    #[inline(always)]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// `true` jika idle lebih lama dari `timeout` pada waktu `now`
    #[inline]
    pub fn is_expired(&self, now: Instant, timeout: std::time::Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub(crate) fn stream_mut(&mut self) -> Option<&mut TcpStream> {
        self.stream.as_mut()
    }

    /// Drain socket ke inbound sampai `WouldBlock`.
    ///
    /// `last_activity` di-update sebelum syscall pertama.
    pub(crate) fn fill(&mut self, chunk_size: usize) -> io::Result<ReadStatus> {
        self.last_activity = Instant::now();
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Ok(ReadStatus::Closed),
        };

        let mut total = 0;
        loop {
            let mut chunk = vec![0u8; chunk_size];
            match stream.read(&mut chunk) {
                Ok(0) => return Ok(ReadStatus::Closed),
                Ok(n) => {
                    chunk.truncate(n);
                    self.inbound.push(chunk);
                    total += n;
                }
                Err(ref e) if would_block(e) => return Ok(ReadStatus::Open { bytes: total }),
                Err(ref e) if interrupted(e) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Tulis outbound sebanyak yang diterima socket.
    pub(crate) fn flush(&mut self) -> io::Result<WriteStatus> {
        self.last_activity = Instant::now();
        if self.outbound.is_empty() {
            return Ok(WriteStatus::Idle);
        }
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Err(io::Error::from(io::ErrorKind::NotConnected)),
        };

        while !self.outbound.is_empty() {
            match stream.write(self.outbound.pending()) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write to socket",
                    ));
                }
                Ok(n) => self.outbound.advance(n),
                // Partial write: cursor sudah maju, sisanya tetap di buffer
                Err(ref e) if would_block(e) => return Ok(WriteStatus::Pending),
                Err(ref e) if interrupted(e) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(WriteStatus::Complete)
    }

    /// Deregister dari multiplexer lalu tutup socket. Idempotent.
    pub(crate) fn close(&mut self, poll: &mio::Registry) {
        if let Some(mut stream) = self.stream.take() {
            // "not registered" bukan masalah di sini
            let _ = poll.deregister(&mut stream);
            let _ = stream.shutdown(std::net::Shutdown::Both);
            drop(stream);
        }
        self.state = None;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.pending().len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

/// Set socket buffer sizes untuk throughput.
/// Error diabaikan, tidak semua platform mendukung.
#[cfg(unix)]
fn set_socket_buffers(stream: &TcpStream, size: usize) {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let optval: libc::c_int = size.min(libc::c_int::MAX as usize) as libc::c_int;
    // SAFETY: fd valid selama `stream` hidup, optval pointer ke stack lokal
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(not(unix))]
fn set_socket_buffers(_stream: &TcpStream, _size: usize) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pair() -> (TcpStream, std::net::TcpStream, SocketAddr) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, peer) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (TcpStream::from_std(server), client, peer)
    }

    fn options() -> SocketOptions {
        SocketOptions {
            nodelay: true,
            buffer_size: Some(64 * 1024),
        }
    }

    #[test]
    fn test_fill_stops_on_would_block() {
        let (server, mut client, peer) = pair();
        let mut conn = Connection::new(server, peer, options()).unwrap();

        client.write_all(b"ping").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let status = conn.fill(2).unwrap();
        assert_eq!(status, ReadStatus::Open { bytes: 4 });
        assert_eq!(conn.inbound.take(), b"ping".to_vec());

        // Tidak ada data: langsung WouldBlock
        assert_eq!(conn.fill(2).unwrap(), ReadStatus::Open { bytes: 0 });
    }

    #[test]
    fn test_fill_reports_peer_close() {
        let (server, client, peer) = pair();
        let mut conn = Connection::new(server, peer, options()).unwrap();

        drop(client);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(conn.fill(1024).unwrap(), ReadStatus::Closed);
    }

    #[test]
    fn test_flush_and_idle() {
        let (server, mut client, peer) = pair();
        let mut conn = Connection::new(server, peer, options()).unwrap();

        assert_eq!(conn.flush().unwrap(), WriteStatus::Idle);

        conn.outbound.extend(b"pong");
        assert_eq!(conn.flush().unwrap(), WriteStatus::Complete);

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn test_is_expired() {
        let (server, _client, peer) = pair();
        let conn = Connection::new(server, peer, options()).unwrap();
        let later = conn.last_activity() + Duration::from_secs(5);

        assert!(!conn.is_expired(later, Duration::from_secs(10)));
        assert!(conn.is_expired(later, Duration::from_secs(1)));
    }
}
