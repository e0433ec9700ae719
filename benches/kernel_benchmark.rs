use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use svmkit::kernel::{LinearKernel, PolynomialKernel, RBFKernel};
use svmkit::{train, Kernel, Parameters, Problem, SparseVector, TrainingInstance};

fn random_sparse(rng: &mut SmallRng, dim: i32, density: f64) -> Vec<(i32, f64)> {
    let mut features = Vec::new();
    for index in 1..=dim {
        if rng.gen_bool(density) {
            features.push((index, rng.gen_range(-1.0..1.0)));
        }
    }
    features
}

fn random_problem(rng: &mut SmallRng, count: usize, dim: i32) -> Problem {
    let mut problem = Problem::new();
    for _ in 0..count {
        let features = random_sparse(rng, dim, 0.3);
        let margin: f64 = features.iter().map(|&(i, v)| if i % 2 == 0 { v } else { -v }).sum();
        let label = if margin > 0.0 { 1.0 } else { -1.0 };
        problem
            .add(TrainingInstance::new(label, features))
            .unwrap();
    }
    problem
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_compute");
    let mut rng = SmallRng::seed_from_u64(7);

    for dim in [32, 256, 2048] {
        let x = SparseVector::from_pairs(random_sparse(&mut rng, dim, 0.2)).unwrap();
        let y = SparseVector::from_pairs(random_sparse(&mut rng, dim, 0.2)).unwrap();

        let linear = LinearKernel::new();
        group.bench_with_input(BenchmarkId::new("linear", dim), &(&x, &y), |b, (x, y)| {
            b.iter(|| linear.compute(black_box(x), black_box(y)))
        });

        let rbf = RBFKernel::new(0.5);
        group.bench_with_input(BenchmarkId::new("rbf", dim), &(&x, &y), |b, (x, y)| {
            b.iter(|| rbf.compute(black_box(x), black_box(y)))
        });

        let (x_norm, y_norm) = (x.norm_squared(), y.norm_squared());
        group.bench_with_input(
            BenchmarkId::new("rbf_with_norms", dim),
            &(&x, &y),
            |b, (x, y)| b.iter(|| rbf.compute_with_norms(black_box(x), black_box(y), x_norm, y_norm)),
        );

        let poly = PolynomialKernel::new(3, 0.5, 1.0);
        group.bench_with_input(BenchmarkId::new("polynomial", dim), &(&x, &y), |b, (x, y)| {
            b.iter(|| poly.compute(black_box(x), black_box(y)))
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    group.sample_size(10);
    let mut rng = SmallRng::seed_from_u64(11);

    for count in [100, 400] {
        let problem = random_problem(&mut rng, count, 50);
        let linear = Parameters::new();
        let rbf = Parameters::new().rbf(0.0);

        group.bench_with_input(BenchmarkId::new("c_svc_linear", count), &problem, |b, p| {
            b.iter(|| train(black_box(p), &linear).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("c_svc_rbf", count), &problem, |b, p| {
            b.iter(|| train(black_box(p), &rbf).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(13);
    let problem = random_problem(&mut rng, 400, 50);
    let model = train(&problem, &Parameters::new().rbf(0.0)).unwrap();
    let query = SparseVector::from_pairs(random_sparse(&mut rng, 50, 0.3)).unwrap();

    c.bench_function("predict_rbf_400", |b| b.iter(|| model.predict(black_box(&query))));
}

criterion_group!(benches, bench_kernels, bench_training, bench_prediction);
criterion_main!(benches);
