use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use datalab::data::{self, sample};
use datalab::imputation::{ImputeStrategy, Imputer, StrategyMap};
use datalab::profiling::DatasetProfiler;
use datalab::training::{ModelFamily, TrainEngine, TrainingConfig};

fn bench_profiling(c: &mut Criterion) {
    let dataset = sample::water_potability().unwrap();
    let bytes = data::write_csv(&dataset).unwrap();

    c.bench_function("csv_parse_sample", |b| {
        b.iter(|| data::read_csv(black_box(&bytes)).unwrap())
    });

    c.bench_function("profile_sample", |b| {
        b.iter(|| DatasetProfiler.profile(black_box(&dataset)))
    });
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    let dataset = sample::water_potability().unwrap();
    let strategies = ["ph", "Sulfate", "Trihalomethanes"]
        .into_iter()
        .fold(StrategyMap::new(), |map, column| map.with(column, ImputeStrategy::Median));
    let cleaned = Imputer::new(strategies).transform(dataset).dataset;

    for family in ModelFamily::ALL {
        let engine = TrainEngine::new(TrainingConfig::new(family));
        group.bench_with_input(
            BenchmarkId::new("fit_evaluate", family.display_name()),
            &cleaned,
            |b, ds| b.iter(|| engine.run(black_box(ds)).unwrap()),
        );
    }

    group.finish();
}

fn bench_train_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest_rows");
    group.sample_size(10);

    for n_rows in [500, 1000, 2000] {
        let dataset = sample::generate(n_rows, 7).unwrap();
        let engine = TrainEngine::new(
            TrainingConfig::new(ModelFamily::RandomForest).with_param("n_estimators", 50),
        );
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &dataset, |b, ds| {
            b.iter(|| engine.run(black_box(ds)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_profiling, bench_training, bench_train_size);
criterion_main!(benches);
