//! Response reader and frame decoder throughput
//!
//! Measures how fast responses are reconstructed from arbitrary read
//! boundaries:
//! - Content-Length, chunked and close-delimited HTTP/1.1 bodies
//! - delivery in 1, 64 and 16384 byte slices
//! - HTTP/2 frame splitting of DATA-heavy streams
//!
//! Run with: cargo bench --bench reader_throughput

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vharness::http::h2::codec::{self, FrameDecoder};
use vharness::http::{Http1ResponseReader, ReaderState};

fn content_length_response(body_len: usize) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 200 OK\r\nServer: bench\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body_len
    )
    .into_bytes();
    out.resize(out.len() + body_len, b'x');
    out
}

fn chunked_response(chunk: usize, count: usize) -> Vec<u8> {
    let mut out = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for _ in 0..count {
        out.extend_from_slice(format!("{:x}\r\n", chunk).as_bytes());
        out.resize(out.len() + chunk, b'y');
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

fn read_sliced(raw: &[u8], slice: usize, close: bool) -> usize {
    let mut reader = Http1ResponseReader::new();
    for part in raw.chunks(slice) {
        if let ReaderState::Complete(response) = reader.feed(part) {
            return response.body().len();
        }
    }
    match close.then(|| reader.finish()) {
        Some(ReaderState::Complete(response)) => response.body().len(),
        _ => 0,
    }
}

fn bench_http1_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("http1_reader");

    let cases = [
        ("content_length", content_length_response(64 * 1024), false),
        ("chunked", chunked_response(4096, 16), false),
        (
            "close_delimited",
            b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n"
                .iter()
                .copied()
                .chain(std::iter::repeat(b'z').take(64 * 1024))
                .collect::<Vec<u8>>(),
            true,
        ),
    ];

    for (name, raw, close) in &cases {
        group.throughput(Throughput::Bytes(raw.len() as u64));
        for slice in [64usize, 16384] {
            group.bench_with_input(BenchmarkId::new(*name, slice), &slice, |b, &slice| {
                b.iter(|| black_box(read_sliced(black_box(raw), slice, *close)));
            });
        }
    }

    let small = content_length_response(512);
    group.throughput(Throughput::Bytes(small.len() as u64));
    group.bench_function("byte_at_a_time", |b| {
        b.iter(|| black_box(read_sliced(black_box(&small), 1, false)));
    });

    group.finish();
}

fn bench_frame_decoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decoder");

    let mut wire = BytesMut::new();
    for stream in (1..=99u32).step_by(2) {
        codec::encode_headers(&mut wire, stream, &[0x88], false, 16384);
        codec::encode_data(&mut wire, stream, &[0u8; 8192], true, 16384);
    }
    let wire = wire.freeze();
    group.throughput(Throughput::Bytes(wire.len() as u64));

    for slice in [9usize, 1500, 65536] {
        group.bench_with_input(BenchmarkId::new("split", slice), &slice, |b, &slice| {
            b.iter(|| {
                let mut decoder = FrameDecoder::new();
                let mut frames = 0;
                for part in wire.chunks(slice) {
                    decoder.push(part);
                    while let Ok(Some(frame)) = decoder.next_frame() {
                        black_box(&frame);
                        frames += 1;
                    }
                }
                black_box(frames)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_http1_reader, bench_frame_decoder);
criterion_main!(benches);
