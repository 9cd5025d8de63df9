//! Network Layer: reactor + worker pool di atas mio
//!
//! Fitur:
//! - Non-blocking I/O dengan epoll/kqueue
//! - Worker pool untuk application callback, tanpa socket I/O
//! - Idle timeout reaper
//! - Beberapa reactor shard berbagi satu listening socket

mod reactor;
mod reaper;
mod server;
mod worker;

pub use reactor::{Reactor, LISTENER, WAKER};
pub use reaper::Reaper;
pub use server::{RunningServer, Server, ShutdownHandle};
pub use worker::{Completions, Handler, Task, WorkerPool};
