//! Reactor: event loop di atas mio (epoll/kqueue)
//!
//! Satu thread per reactor. Semua socket I/O (accept, read, write) terjadi di
//! sini secara non-blocking; worker hanya menerima Task setelah data tersedia.
//!
//! Per token, paling banyak satu Task sedang diproses worker. Event yang datang
//! saat task masih berjalan dicatat sebagai deferred dan dikirim ulang saat
//! worker melapor selesai lewat completion channel. Interest WRITABLE hanya
//! di-arm selama outbound belum kosong.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, warn};

use super::reaper::Reaper;
use super::worker::{Completions, Handler, Task, WorkerPool};
use crate::config::ServerConfig;
use crate::core::{ReadStatus, Registry, SocketOptions, WriteStatus};
use crate::error::{interrupted, would_block, Error, Result};

pub const LISTENER: Token = Token(0);
pub const WAKER: Token = Token(1);

/// Berapa kali readiness wait boleh gagal berturut-turut sebelum fatal
const MAX_POLL_FAILURES: u32 = 3;
const POLL_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Event loop milik satu shard
pub struct Reactor {
    id: usize,
    poll: Poll,
    listener: TcpListener,
    registry: Arc<Registry>,
    pool: WorkerPool,
    completions: Receiver<Token>,
    waker: Arc<Waker>,
    reaper: Reaper,
    shutdown: Arc<AtomicBool>,
    events_capacity: usize,
    max_connections: usize,
}

impl Reactor {
    /// Membuat reactor di atas listener yang sudah di-bind.
    ///
    /// Listener boleh berupa clone yang juga dipakai reactor lain.
    pub fn new(
        id: usize,
        listener: std::net::TcpListener,
        config: &ServerConfig,
        handler: Arc<dyn Handler>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        config.validate()?;

        let poll = Poll::new()?;

        listener.set_nonblocking(true)?;
        let mut listener = TcpListener::from_std(listener);
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
        let registry = Arc::new(Registry::new(
            poll.registry().try_clone()?,
            SocketOptions {
                nodelay: config.nodelay,
                buffer_size: config.socket_buffer,
            },
            config.read_chunk,
        )
        .with_outbound_limit(config.max_outbound));

        let (done_tx, done_rx) = unbounded();
        let pool = WorkerPool::spawn(
            config.workers,
            Arc::clone(&registry),
            handler,
            Completions::new(done_tx, Arc::clone(&waker)),
        )?;

        Ok(Self {
            id,
            poll,
            listener,
            registry,
            pool,
            completions: done_rx,
            waker,
            reaper: Reaper::new(config.timeout),
            shutdown,
            events_capacity: config.events_capacity,
            max_connections: config.max_connections,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Waker untuk membangunkan `run` dari thread lain (shutdown)
    pub fn waker(&self) -> Arc<Waker> {
        Arc::clone(&self.waker)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Jalankan event loop sampai shutdown diminta atau wait gagal terus.
    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(self.events_capacity);
        let mut failures = 0u32;

        info!(reactor = self.id, addr = ?self.listener.local_addr().ok(), "reactor started");

        let result = loop {
            if self.shutdown.load(Ordering::Acquire) {
                break Ok(());
            }

            let timeout = self.reaper.poll_timeout(Instant::now());
            if let Err(e) = self.poll.poll(&mut events, timeout) {
                if interrupted(&e) {
                    continue;
                }
                failures += 1;
                error!(reactor = self.id, attempt = failures, error = %e, "readiness wait failed");
                if failures >= MAX_POLL_FAILURES {
                    break Err(Error::Poll {
                        attempts: failures,
                        source: e,
                    });
                }
                thread::sleep(POLL_RETRY_DELAY);
                continue;
            }
            failures = 0;

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept(),
                    // Completion diproses setelah semua event
                    WAKER => {}
                    token => self.handle_event(token, event),
                }
            }

            self.drain_completions();
            self.reaper.sweep(&self.registry, Instant::now());
        };

        self.teardown();
        info!(reactor = self.id, "reactor stopped");
        result
    }

    /// Accept sampai `WouldBlock`. Error lain menghentikan loop, tidak fatal.
    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.registry.len() >= self.max_connections {
                        warn!(%peer, max = self.max_connections, "max connections reached, rejecting");
                        drop(stream);
                        continue;
                    }
                    if let Ok(token) = self.registry.create(peer, stream) {
                        self.reaper.track(Instant::now());
                        debug!(reactor = self.id, token = token.0, %peer, "new connection");
                    }
                }
                Err(ref e) if would_block(e) => break,
                Err(ref e) if interrupted(e) => continue,
                Err(e) => {
                    error!(reactor = self.id, error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, token: Token, event: &Event) {
        if event.is_error() {
            debug!(token = token.0, "error event, removing connection");
            self.registry.remove(token);
            return;
        }

        if event.is_readable() {
            self.on_readable(token);
        }
        if event.is_writable() {
            self.flush(token);
        }

        // Hangup: data yang sudah terbaca tetap di-dispatch di atas
        if event.is_read_closed() || event.is_write_closed() {
            self.registry.remove(token);
        }
    }

    fn on_readable(&mut self, token: Token) {
        match self.registry.receive(token) {
            Ok(ReadStatus::Open { bytes }) if bytes > 0 => self.dispatch(Task::Receive(token)),
            Ok(_) => {}
            Err(e) => warn!(token = token.0, error = %e, "read failed, connection removed"),
        }
    }

    /// Flush outbound, re-arm interest, dan kirim `Send` task jika flush selesai.
    fn flush(&mut self, token: Token) {
        let status = match self.registry.send(token, None) {
            Ok(status) => status,
            Err(e) => {
                warn!(token = token.0, error = %e, "write failed, connection removed");
                return;
            }
        };

        if self.registry.rearm(token).is_err() {
            return;
        }
        if status == WriteStatus::Complete {
            self.dispatch(Task::Send(token));
        }
    }

    /// Submit task jika tidak ada task lain untuk token ini, atau tunda.
    fn dispatch(&mut self, task: Task) {
        let token = task.token();
        let ready = self.registry.with(token, |conn| {
            if conn.in_flight {
                match task {
                    Task::Receive(_) => conn.deferred.receive = true,
                    Task::Send(_) => conn.deferred.send = true,
                }
                false
            } else {
                conn.in_flight = true;
                true
            }
        });

        if ready != Some(true) {
            return;
        }
        if let Err(e) = self.pool.submit(task) {
            error!(token = token.0, error = %e, "failed to dispatch task");
            self.registry.remove(token);
        }
    }

    fn drain_completions(&mut self) {
        while let Ok(token) = self.completions.try_recv() {
            self.on_complete(token);
        }
    }

    fn on_complete(&mut self, token: Token) {
        let deferred = self.registry.with(token, |conn| {
            conn.in_flight = false;
            std::mem::take(&mut conn.deferred)
        });
        // Koneksi sudah dihapus selama task berjalan
        let Some(deferred) = deferred else {
            return;
        };

        self.flush(token);
        if deferred.receive {
            self.dispatch(Task::Receive(token));
        }
        if deferred.send {
            self.dispatch(Task::Send(token));
        }
    }

    fn teardown(&mut self) {
        let closed = self.registry.clear();
        self.pool.shutdown();
        let _ = self.poll.registry().deregister(&mut self.listener);
        debug!(reactor = self.id, closed, "connections closed");
    }
}
