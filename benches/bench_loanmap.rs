use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use loanmap::{Keyed, LoanMap};

struct Record {
    key: u32,
    value: u64,
}

impl Keyed for Record {
    type Key = u32;
    fn key(&self) -> u32 {
        self.key
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let count = 1u32 << 16;
    c.bench_with_input(
        BenchmarkId::new("add_into_loanmap", count),
        &count,
        |b, &count| {
            b.iter(|| {
                let map = LoanMap::with_capacity_and_shard_amount(1 << 15, 256);
                for i in 0..count {
                    map.add(Record { key: i, value: 0 });
                }
            })
        },
    );

    let count = 1u32 << 16;
    c.bench_with_input(
        BenchmarkId::new("lock_unlock_cycle", count),
        &count,
        |b, &count| {
            let map = LoanMap::with_capacity_and_shard_amount(1 << 15, 256);
            map.add(Record { key: 1, value: 0 });
            b.iter(|| {
                for _ in 0..count {
                    let mut loan = map.lock(&1).unwrap();
                    loan.value_mut().unwrap().value += 1;
                    map.unlock(&mut loan);
                }
            })
        },
    );
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
