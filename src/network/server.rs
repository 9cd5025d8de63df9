//! Server bootstrap
//!
//! Bind listener, buat satu Reactor (+ Registry + WorkerPool) per shard, lalu
//! jalankan setiap reactor di thread sendiri. Semua shard berbagi clone dari
//! listening socket yang sama.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mio::Waker;
use tracing::{error, info, warn};

use super::reactor::Reactor;
use super::worker::Handler;
use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Server yang sudah di-bind tapi belum berjalan
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    handler: Arc<dyn Handler>,
}

impl Server {
    /// Bind ke `config.bind` dan siapkan server.
    ///
    /// # Errors
    /// Config tidak valid atau bind gagal (fatal saat startup).
    pub fn bind(config: ServerConfig, handler: impl Handler) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind)?;
        Self::from_listener(listener, config, handler)
    }

    /// Pakai listener yang sudah di-bind di luar (misalnya diwarisi dari parent process).
    pub fn from_listener(
        listener: TcpListener,
        config: ServerConfig,
        handler: impl Handler,
    ) -> Result<Self> {
        config.validate()?;
        listener.set_nonblocking(true)?;
        info!(addr = ?listener.local_addr().ok(), "listener initialized");

        Ok(Self {
            config,
            listener,
            handler: Arc::new(handler),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Jalankan semua reactor di background thread.
    ///
    /// Jika satu shard gagal dibuat, shard yang sudah berjalan dihentikan dan
    /// di-join sebelum error dikembalikan.
    pub fn start(self) -> Result<RunningServer> {
        let addr = self.listener.local_addr()?;
        let shards = self.config.resolved_reactors();
        let flag = Arc::new(AtomicBool::new(false));

        let mut wakers = Vec::with_capacity(shards);
        let mut threads = Vec::with_capacity(shards);

        for id in 0..shards {
            match self.spawn_shard(id, &flag) {
                Ok((waker, handle)) => {
                    wakers.push(waker);
                    threads.push(handle);
                }
                Err(e) => {
                    error!(reactor = id, error = %e, "failed to start reactor, stopping started shards");
                    let shutdown = ShutdownHandle { flag, wakers };
                    shutdown.shutdown();
                    // Error dari shard yang dihentikan tidak menggantikan penyebab awal
                    let _ = join_all(threads);
                    return Err(e);
                }
            }
        }

        info!(%addr, reactors = shards, workers = self.config.workers, "server started");
        Ok(RunningServer {
            addr,
            shutdown: ShutdownHandle { flag, wakers },
            threads,
        })
    }

    fn spawn_shard(
        &self,
        id: usize,
        flag: &Arc<AtomicBool>,
    ) -> Result<(Arc<Waker>, JoinHandle<Result<()>>)> {
        let listener = self.listener.try_clone()?;
        let mut reactor = Reactor::new(
            id,
            listener,
            &self.config,
            Arc::clone(&self.handler),
            Arc::clone(flag),
        )?;
        let waker = reactor.waker();

        let handle = thread::Builder::new()
            .name(format!("sparrow-reactor-{id}"))
            .spawn(move || reactor.run())?;
        Ok((waker, handle))
    }

    /// Jalankan server di thread ini sampai semua reactor berhenti.
    pub fn run(self) -> Result<()> {
        self.start()?.join()
    }
}

/// Handle untuk menghentikan server dari thread lain
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wakers: Vec<Arc<Waker>>,
}

impl ShutdownHandle {
    /// Minta semua reactor berhenti. Idempotent.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
        for waker in &self.wakers {
            if let Err(e) = waker.wake() {
                warn!(error = %e, "failed to wake reactor for shutdown");
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Server yang sedang berjalan
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    threads: Vec<JoinHandle<Result<()>>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Tunggu semua reactor selesai. Error pertama yang dikembalikan.
    pub fn join(self) -> Result<()> {
        join_all(self.threads)
    }

    /// Shutdown lalu join
    pub fn stop(self) -> Result<()> {
        self.shutdown.shutdown();
        self.join()
    }
}

fn join_all(threads: Vec<JoinHandle<Result<()>>>) -> Result<()> {
    let mut first_error = None;
    for handle in threads {
        let outcome = match handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "reactor thread panicked",
            ))),
        };
        if let Err(e) = outcome {
            error!(error = %e, "reactor exited with error");
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
