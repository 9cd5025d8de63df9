//! Criterion benchmark untuk HTTP parser dan response formatting
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use sparrow::protocol::{parse, Parsed, Response};

const SIMPLE_GET: &[u8] = b"GET /test?p1=v1&p2=v%202 HTTP/1.1\r\n\
Host: localhost:8888\r\n\
User-Agent: bench/1.0\r\n\
Accept: */*\r\n\
\r\n";

fn post_request(body_len: usize) -> Vec<u8> {
    let mut data = format!(
        "POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
        body_len
    )
    .into_bytes();
    data.resize(data.len() + body_len, b'x');
    data
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    group.throughput(Throughput::Bytes(SIMPLE_GET.len() as u64));
    group.bench_function("simple_get", |b| {
        b.iter(|| {
            let parsed = parse(black_box(SIMPLE_GET.to_vec()), None).unwrap();
            black_box(parsed);
        });
    });

    let post = post_request(4096);
    group.throughput(Throughput::Bytes(post.len() as u64));
    group.bench_function("post_4k_body", |b| {
        b.iter(|| {
            let parsed = parse(black_box(post.clone()), None).unwrap();
            black_box(parsed);
        });
    });

    // 16 request dalam satu buffer, di-parse lewat leftover
    let pipelined = SIMPLE_GET.repeat(16);
    group.throughput(Throughput::Bytes(pipelined.len() as u64));
    group.bench_function("pipelined_16", |b| {
        b.iter(|| {
            let mut data = black_box(pipelined.clone());
            let mut count = 0;
            while !data.is_empty() {
                match parse(data, None).unwrap() {
                    Parsed::Complete { leftover, .. } => {
                        count += 1;
                        data = leftover;
                    }
                    Parsed::Incomplete { .. } => break,
                }
            }
            black_box(count);
        });
    });

    // Request tiba dalam potongan 64 byte
    let chunks: Vec<Vec<u8>> = post.chunks(64).map(|c| c.to_vec()).collect();
    group.throughput(Throughput::Bytes(post.len() as u64));
    group.bench_function("post_4k_chunked_64", |b| {
        b.iter(|| {
            let mut inbound = Vec::new();
            let mut partial = None;
            for chunk in &chunks {
                inbound.extend_from_slice(chunk);
                match parse(std::mem::take(&mut inbound), partial.take()).unwrap() {
                    Parsed::Complete { request, .. } => {
                        black_box(request);
                    }
                    Parsed::Incomplete {
                        partial: p,
                        leftover,
                    } => {
                        partial = p;
                        inbound = leftover;
                    }
                }
            }
        });
    });

    group.finish();
}

fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("response");
    group.bench_function("ok_small", |b| {
        b.iter(|| black_box(Response::ok(black_box("hello GET")).to_bytes()));
    });
    group.finish();
}

criterion_group!(benches, bench_parse, bench_format);
criterion_main!(benches);
