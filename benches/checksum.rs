//! Frame integrity and codec benchmarks

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use sertalk::{additive_sum, crc16_modbus, decode_packed, encode};
use std::hint::black_box;

fn checksum_benchmark(c: &mut Criterion) {
    let data: Vec<u8> = (0..1024).map(|i| (i % 256) as u8).collect();

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("crc16_modbus", |b| {
        b.iter(|| black_box(crc16_modbus(black_box(&data))))
    });

    group.bench_function("additive_sum", |b| {
        b.iter(|| black_box(additive_sum(black_box(&data))))
    });

    group.finish();
}

fn codec_benchmark(c: &mut Criterion) {
    let data: Vec<u8> = (0..1024).map(|i| (i % 256) as u8).collect();
    let text = encode(&data, false);

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("hex_encode", |b| {
        b.iter(|| black_box(encode(black_box(&data), false)))
    });

    group.bench_function("hex_decode", |b| {
        b.iter(|| black_box(decode_packed(black_box(&text)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, checksum_benchmark, codec_benchmark);
criterion_main!(benches);
