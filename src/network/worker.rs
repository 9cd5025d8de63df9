//! Worker Pool: N thread identik yang membaca Task dari channel bersama
//!
//! Worker tidak pernah melakukan socket I/O. Mereka hanya menjalankan
//! callback aplikasi, yang membaca inbound dan mengisi outbound lewat
//! `Registry`. Setelah setiap task, worker memberi tahu reactor lewat
//! completion channel + `mio::Waker` supaya reactor bisa flush dan re-arm.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use mio::{Token, Waker};
use tracing::{debug, error, info, warn};

use crate::core::Registry;
use crate::error::{Error, Result};

/// Unit kerja yang dikirim reactor. Hanya membawa token: payload selalu
/// dibaca ulang dari Connection saat task diproses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Data baru masuk ke inbound
    Receive(Token),
    /// Outbound selesai di-flush
    Send(Token),
}

impl Task {
    #[inline(always)]
    pub fn token(&self) -> Token {
        match *self {
            Task::Receive(t) | Task::Send(t) => t,
        }
    }
}

/// Capability yang disediakan aplikasi: dua callback.
///
/// Dipanggil dari worker thread, bisa bersamaan untuk token berbeda. Untuk
/// token yang sama, task diserialisasi oleh reactor. Koneksi bisa hilang
/// kapan saja: lookup registry yang gagal harus diperlakukan sebagai no-op.
///
/// `Err` atau panic dari callback dicatat dan koneksinya di-evict.
pub trait Handler: Send + Sync + 'static {
    /// Data tersedia di inbound (`Registry::pop_received`)
    fn on_receive(&self, registry: &Registry, token: Token) -> Result<()>;

    /// Outbound untuk koneksi ini sudah terkirim semua
    fn on_send(&self, registry: &Registry, token: Token) -> Result<()> {
        let _ = (registry, token);
        Ok(())
    }
}

/// Sisi worker dari completion channel
#[derive(Clone)]
pub struct Completions {
    tx: Sender<Token>,
    waker: Arc<Waker>,
}

impl Completions {
    pub fn new(tx: Sender<Token>, waker: Arc<Waker>) -> Self {
        Self { tx, waker }
    }

    /// Beri tahu reactor bahwa task untuk `token` selesai
    pub fn notify(&self, token: Token) {
        if self.tx.send(token).is_err() {
            // Reactor sudah berhenti
            return;
        }
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "failed to wake reactor");
        }
    }
}

/// Fixed-size pool of worker threads consuming one shared MPMC channel.
pub struct WorkerPool {
    tasks: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` worker thread.
    pub fn spawn(
        size: usize,
        registry: Arc<Registry>,
        handler: Arc<dyn Handler>,
        completions: Completions,
    ) -> Result<Self> {
        if size == 0 {
            return Err(Error::config("worker pool needs at least one worker"));
        }

        let (tx, rx) = unbounded::<Task>();
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let rx = rx.clone();
            let registry = Arc::clone(&registry);
            let handler = Arc::clone(&handler);
            let completions = completions.clone();

            let handle = thread::Builder::new()
                .name(format!("sparrow-worker-{id}"))
                .spawn(move || run_worker(id, rx, registry, handler, completions))?;
            workers.push(handle);
        }

        info!("{} workers initialized", size);
        Ok(Self {
            tasks: Some(tx),
            workers,
        })
    }

    /// Kirim task ke salah satu worker (FIFO per producer).
    pub fn submit(&self, task: Task) -> Result<()> {
        match &self.tasks {
            Some(tx) => tx.send(task).map_err(|_| Error::Shutdown),
            None => Err(Error::Shutdown),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Tutup channel lalu tunggu semua worker selesai.
    ///
    /// Task yang sudah di-queue tetap diproses sebelum worker berhenti.
    pub fn shutdown(&mut self) {
        self.tasks.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    id: usize,
    rx: Receiver<Task>,
    registry: Arc<Registry>,
    handler: Arc<dyn Handler>,
    completions: Completions,
) {
    debug!(worker = id, "worker started");

    for task in rx.iter() {
        let token = task.token();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match task {
            Task::Receive(t) => handler.on_receive(&registry, t),
            Task::Send(t) => handler.on_send(&registry, t),
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(worker = id, token = token.0, error = %e, "handler failed, evicting connection");
                registry.remove(token);
            }
            Err(payload) => {
                error!(
                    worker = id,
                    token = token.0,
                    panic = %panic_message(payload.as_ref()),
                    "handler panicked, evicting connection"
                );
                registry.remove(token);
            }
        }

        completions.notify(token);
    }

    debug!(worker = id, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
