use criterion::{Criterion, criterion_group, criterion_main};
use purchase_again::{FittedModel, PurchaseRecord, TrainerConfig, UnknownCategory, synthetic};

fn trained_model() -> FittedModel {
    let records = synthetic::generate(1_000, 0);
    FittedModel::train(&records, UnknownCategory::Ignore, &TrainerConfig::default())
        .expect("training synthetic model")
}

fn bench_predict_single(c: &mut Criterion) {
    let model = trained_model();
    let sample = PurchaseRecord::unlabeled("499", 52.0, "Male", 3.0);

    c.bench_function("predict sample customer", |b| {
        b.iter(|| {
            let _ = model.predict(&sample);
        })
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let model = trained_model();
    let test = synthetic::generate(10_000, 1);

    c.bench_function("evaluate 10k records", |b| {
        b.iter(|| {
            let _ = model.evaluate(&test);
        });
    });
}

fn bench_train(c: &mut Criterion) {
    let records = synthetic::generate(1_000, 2);

    c.bench_function("train on 1k records", |b| {
        b.iter(|| {
            let _ = FittedModel::train(
                &records,
                UnknownCategory::Ignore,
                &TrainerConfig::default(),
            );
        });
    });
}

criterion_group!(benches, bench_predict_single, bench_evaluate, bench_train);
criterion_main!(benches);
