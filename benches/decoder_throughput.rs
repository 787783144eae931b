//! Decoder throughput over whole and finely split streams

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use eventsource_rs::streaming_sse::SseDecoder;
use std::hint::black_box;

fn sample_stream(events: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..events {
        out.extend_from_slice(format!("id: {i}\r\nevent: tick\r\n").as_bytes());
        out.extend_from_slice(b"data: {\"seq\":1,\"payload\":\"lorem ipsum dolor sit amet\"}\r\n");
        out.extend_from_slice(b"data: second line\r\n\r\n");
        if i % 16 == 0 {
            out.extend_from_slice(b": keepalive\n");
        }
    }
    out
}

fn bench_decoder(c: &mut Criterion) {
    let stream = sample_stream(1_000);
    let mut group = c.benchmark_group("sse_decoder");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for chunk_size in [stream.len(), 4096, 64, 7] {
        group.bench_with_input(
            BenchmarkId::new("chunk", chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut decoder = SseDecoder::new();
                    let mut count = 0usize;
                    for chunk in stream.chunks(chunk_size) {
                        count += decoder.push(black_box(chunk)).count();
                    }
                    black_box(count)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(decoder_benches, bench_decoder);
criterion_main!(decoder_benches);
