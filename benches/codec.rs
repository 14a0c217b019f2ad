use std::collections::HashMap;
use std::io;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use flowfile_pack::{Packager, Unpackager};

fn test_attributes() -> HashMap<String, String> {
    [
        ("filename", "03391067-5e15-48b2-9962-caee2b422168"),
        ("path", "./"),
        ("uuid", "03391067-5e15-48b2-9962-caee2b422168"),
    ]
    .iter()
    .map(|&(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn bench_package(c: &mut Criterion) {
    let attributes = test_attributes();
    let payload = vec![0x5au8; 64 * 1024];
    let packager = Packager::new();

    let mut group = c.benchmark_group("package");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("64k", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(payload.len() + 256);
            packager
                .package(
                    &mut &payload[..],
                    &mut out,
                    Some(&attributes),
                    payload.len() as i64,
                )
                .unwrap();
            out
        })
    });
    group.finish();
}

fn bench_unpackage(c: &mut Criterion) {
    let attributes = test_attributes();
    let payload = vec![0x5au8; 64 * 1024];
    let mut buf = Vec::new();
    Packager::new()
        .package(
            &mut &payload[..],
            &mut buf,
            Some(&attributes),
            payload.len() as i64,
        )
        .unwrap();

    let mut group = c.benchmark_group("unpackage");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("64k", |b| {
        b.iter(|| {
            let mut input = &buf[..];
            let mut unpackager = Unpackager::new();
            let attributes = unpackager.unpackage(&mut input).unwrap();
            unpackager.get_data(&mut input, &mut io::sink()).unwrap();
            attributes
        })
    });
    group.finish();
}

criterion_group!(benches, bench_package, bench_unpackage);
criterion_main!(benches);
