use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use fundalloc_api::{AllocationOptimizer, Engine, OptimizerConfig, Scalar};
use fundalloc_benches::random_instance;
use rand::{rngs::SmallRng, SeedableRng};

fn solve_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_solve");
    let mut rng = SmallRng::seed_from_u64(42);
    let branch_and_bound = AllocationOptimizer::default();
    group.bench_function("bnb_n=40", |b| {
        b.iter_batched(
            || random_instance(40, &mut rng),
            |instance| {
                let _ = branch_and_bound
                    .optimize(
                        &instance.impacts,
                        &instance.costs,
                        instance.budget,
                        &instance.constraints,
                    )
                    .unwrap();
            },
            BatchSize::SmallInput,
        );
    });

    let exhaustive =
        AllocationOptimizer::new(OptimizerConfig::default().with_engine(Engine::Exhaustive));
    group.bench_function("exhaustive_n=16", |b| {
        b.iter_batched(
            || random_instance(16, &mut rng),
            |instance| {
                let _ = exhaustive
                    .optimize(
                        &instance.impacts,
                        &instance.costs,
                        instance.budget,
                        &instance.constraints,
                    )
                    .unwrap();
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn sweep_benchmark(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(7);
    let instance = random_instance(30, &mut rng);
    let budgets = (1..=8)
        .map(|step| instance.budget * step as Scalar / 4.0)
        .collect::<Vec<_>>();
    let optimizer = AllocationOptimizer::default();
    c.bench_function("budget_sweep_n=30_levels=8", |b| {
        b.iter(|| {
            optimizer.budget_sweep(
                &instance.impacts,
                &instance.costs,
                &budgets,
                &instance.constraints,
            )
        })
    });
}

criterion_group!(benches, solve_benchmark, sweep_benchmark);
criterion_main!(benches);
