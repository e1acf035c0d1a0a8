use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use weft_crypto::MacPool;

fn bench_mac(c: &mut Criterion) {
    let mut group = c.benchmark_group("cbc_mac");
    let pool = MacPool::new(&[0x42u8; 16]).unwrap();

    for (label, len) in [("16B", 16usize), ("64B", 64), ("1KB", 1024)] {
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("compute_mac", label), &len, |b, &len| {
            let msg = vec![0xABu8; len];
            b.iter(|| {
                let mut buf = msg.clone();
                pool.compute_mac(&mut buf).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mac);
criterion_main!(benches);
