//! Startup Failure Test - shard yang sudah jalan harus ikut berhenti
//!
//! Batas file descriptor diturunkan supaya hanya beberapa reactor yang bisa
//! dibuat. Test ini ada di binary sendiri karena RLIMIT_NOFILE berlaku untuk
//! seluruh process.
//!
//! Usage:
//!   cargo test --test startup_failure_test -- --nocapture

#![cfg(target_os = "linux")]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use mio::Token;
use sparrow::core::Registry;
use sparrow::{Error, Handler, Result, Server, ServerConfig};

struct Echo;

impl Handler for Echo {
    fn on_receive(&self, registry: &Registry, token: Token) -> Result<()> {
        if let Some(data) = registry.pop_received(token) {
            registry.enqueue(token, &data);
        }
        Ok(())
    }
}

fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

fn set_fd_limit(limit: &libc::rlimit) {
    // SAFETY: pointer ke struct lokal yang valid
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, limit) };
    assert_eq!(rc, 0, "setrlimit failed");
}

#[test]
fn test_failed_start_stops_started_shards() {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
        .with_reactors(64)
        .with_workers(1);
    let server = Server::bind(config, Echo).unwrap();
    let addr = server.local_addr().unwrap();

    let mut original = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: pointer ke struct lokal yang valid
    assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut original) }, 0);

    // Cukup untuk beberapa shard (poll + waker + listener clone + registry clone),
    // tidak cukup untuk 64
    let limited = libc::rlimit {
        rlim_cur: (open_fds() + 12) as libc::rlim_t,
        rlim_max: original.rlim_max,
    };
    set_fd_limit(&limited);
    let result = server.start();
    set_fd_limit(&original);

    let err = match result {
        Ok(running) => {
            let _ = running.stop();
            panic!("start should fail when descriptors run out");
        }
        Err(e) => e,
    };
    assert!(matches!(err, Error::Io(_)), "unexpected error: {}", err);

    // Semua clone listener sudah ditutup, tidak ada shard yatim yang masih melayani
    match TcpStream::connect_timeout(&addr, Duration::from_secs(1)) {
        Err(_) => {}
        Ok(mut stream) => {
            stream
                .set_read_timeout(Some(Duration::from_millis(500)))
                .unwrap();
            let _ = stream.write_all(b"ping");
            let mut buf = [0u8; 4];
            let echoed = matches!(stream.read(&mut buf), Ok(n) if n > 0);
            assert!(!echoed, "a reactor kept serving after start() failed");
        }
    }
}
