use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logcore::{MemoryManager, MemoryManagerConfig, SelfLog, HIGH_THROUGHPUT_CONFIG};
use std::sync::Arc;

const ALLOCATIONS_PER_ITER: u64 = 100_000;

fn bench_allocate_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_release");
    group.throughput(Throughput::Elements(ALLOCATIONS_PER_ITER));

    for size in [16usize, 64, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let manager = MemoryManager::new(MemoryManagerConfig::default(), Arc::new(SelfLog::new()));
            b.iter(|| {
                for _ in 0..ALLOCATIONS_PER_ITER {
                    let handle = manager.allocate_payload_buffer(size);
                    black_box(handle);
                    manager.release_payload_buffer(handle, false);
                }
            });
        });
    }

    group.finish();
}

fn bench_disjointed_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("disjointed_allocate");
    group.throughput(Throughput::Elements(ALLOCATIONS_PER_ITER / 10));

    group.bench_function("four_children", |b| {
        let manager = MemoryManager::new(HIGH_THROUGHPUT_CONFIG, Arc::new(SelfLog::new()));
        b.iter(|| {
            for _ in 0..(ALLOCATIONS_PER_ITER / 10) {
                let (head, children) = manager.allocate_disjointed_buffer(&[16, 32, 64, 128]).unwrap();
                black_box(&children);
                manager.release_payload_buffer(head, false);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_allocate_release, bench_disjointed_allocate);
criterion_main!(benches);
