//! Registry Stress Test - create/receive/enqueue/remove dari banyak thread
//!
//! Invariant yang dicek:
//! - token tidak pernah dipakai ulang
//! - remove idempotent, tepat satu pemanggil yang "menang"
//! - setelah semua thread selesai, registry kosong dan semua socket tertutup
//!
//! Usage:
//!   cargo test --release --test registry_stress_test -- --nocapture

use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use sparrow::core::{ReadStatus, Registry, SocketOptions, WriteStatus};

const THREADS: usize = 8;
const CONNECTIONS_PER_THREAD: usize = 25;

fn registry(poll: &mio::Poll) -> Arc<Registry> {
    Arc::new(Registry::new(
        poll.registry().try_clone().unwrap(),
        SocketOptions {
            nodelay: true,
            buffer_size: None,
        },
        64,
    ))
}

/// Connect lalu accept pasangan loopback dan daftarkan sisi server.
fn open(registry: &Registry, listener: &Mutex<TcpListener>) -> (mio::Token, TcpStream) {
    let listener = listener.lock().unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, peer) = listener.accept().unwrap();
    drop(listener);

    server.set_nonblocking(true).unwrap();
    let token = registry
        .create(peer, mio::net::TcpStream::from_std(server))
        .unwrap();
    (token, client)
}

fn receive_until(registry: &Registry, token: mio::Token, expected: usize) -> Vec<u8> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut got = Vec::new();
    while got.len() < expected {
        assert!(Instant::now() < deadline, "timed out waiting for data");
        match registry.receive(token).unwrap() {
            ReadStatus::Open { .. } => {}
            ReadStatus::Closed => panic!("connection closed unexpectedly"),
        }
        got.extend(registry.pop_received(token).unwrap());
        thread::yield_now();
    }
    got
}

#[test]
fn test_concurrent_lifecycle() {
    let poll = mio::Poll::new().unwrap();
    let registry = registry(&poll);
    let listener = Arc::new(Mutex::new(TcpListener::bind("127.0.0.1:0").unwrap()));
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let done = Arc::new(AtomicBool::new(false));

    // Observer: baca snapshot registry terus-menerus selama mutasi berjalan
    let observer = {
        let registry = Arc::clone(&registry);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut scans = 0usize;
            while !done.load(Ordering::Acquire) {
                for token in registry.tokens() {
                    // Boleh hilang di antara snapshot dan lookup
                    let _ = registry.peer_addr(token);
                }
                let _ = registry.sweep(Instant::now(), Duration::from_secs(60));
                scans += 1;
            }
            scans
        })
    };

    let workers: Vec<_> = (0..THREADS)
        .map(|id| {
            let registry = Arc::clone(&registry);
            let listener = Arc::clone(&listener);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                for n in 0..CONNECTIONS_PER_THREAD {
                    let (token, mut client) = open(&registry, &listener);
                    assert!(seen.lock().unwrap().insert(token), "token reused: {:?}", token);

                    let payload = format!("thread {id} connection {n}");
                    client.write_all(payload.as_bytes()).unwrap();
                    let got = receive_until(&registry, token, payload.len());
                    assert_eq!(got, payload.as_bytes());

                    assert!(registry.enqueue(token, b"pong"));
                    assert_eq!(registry.send(token, None).unwrap(), WriteStatus::Complete);

                    let mut reply = [0u8; 4];
                    client.read_exact(&mut reply).unwrap();
                    assert_eq!(&reply, b"pong");

                    assert!(registry.remove(token));
                    assert!(!registry.remove(token));
                    assert!(!registry.contains(token));
                    assert!(!registry.enqueue(token, b"late"));
                }
            })
        })
        .collect();

    for handle in workers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let scans = observer.join().unwrap();

    assert!(registry.is_empty());
    assert_eq!(seen.lock().unwrap().len(), THREADS * CONNECTIONS_PER_THREAD);
    println!("observer completed {} scans", scans);
}

#[test]
fn test_racing_removes_close_once() {
    let poll = mio::Poll::new().unwrap();
    let registry = registry(&poll);
    let listener = Mutex::new(TcpListener::bind("127.0.0.1:0").unwrap());

    let mut clients = Vec::new();
    let mut tokens = Vec::new();
    for _ in 0..50 {
        let (token, client) = open(&registry, &listener);
        tokens.push(token);
        clients.push(client);
    }
    let tokens = Arc::new(tokens);
    let winners = Arc::new(AtomicUsize::new(0));

    let racers: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let tokens = Arc::clone(&tokens);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                for token in tokens.iter() {
                    if registry.remove(*token) {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in racers {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::Relaxed), tokens.len());
    assert!(registry.is_empty());

    // Semua socket sisi server sudah ditutup
    for mut client in clients {
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = [0u8; 8];
        let closed = match client.read(&mut buf) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) => e.kind() == std::io::ErrorKind::ConnectionReset,
        };
        assert!(closed);
    }
}
