use criterion::{black_box, criterion_group, criterion_main, Criterion};
use command_sync::{
    CommandMetadata, DomainCommand, JsonMergeConsolidator, PayloadConsolidator, PersistedCommand,
    QueueCommand, QueueInfo, RetryPolicy,
};
use serde_json::json;

fn sample_command() -> DomainCommand {
    DomainCommand::new(
        "update_profile",
        json!({"display_name": "Ada", "bio": "mathematician", "age": 36}),
        CommandMetadata::for_resource("profile-7")
            .with_context("org-1")
            .patch(),
    )
}

fn benchmark_reference_id(c: &mut Criterion) {
    let command = sample_command();
    c.bench_function("reference_id", |b| b.iter(|| black_box(&command).reference_id()));
}

fn benchmark_retry_policy(c: &mut Criterion) {
    let policy = RetryPolicy::with_max_retries(5);
    let command = sample_command();
    let info = QueueInfo::new();
    c.bench_function("retry_policy_should_retry", |b| {
        b.iter(|| policy.should_retry(black_box(&command), black_box(&info)))
    });
}

fn benchmark_consolidation(c: &mut Criterion) {
    let incoming = json!({"display_name": "Grace", "avatar": "g.png"});
    let existing = json!({"display_name": "Ada", "bio": "mathematician", "age": 36});
    c.bench_function("json_merge_consolidation", |b| {
        b.iter(|| JsonMergeConsolidator.consolidate(black_box(&incoming), black_box(&existing)))
    });
}

fn benchmark_persisted_record(c: &mut Criterion) {
    let queue_command = QueueCommand::new(sample_command());
    c.bench_function("persisted_record_encode", |b| {
        b.iter(|| PersistedCommand::from_queue_command(black_box(&queue_command)).to_value())
    });
}

criterion_group!(
    benches,
    benchmark_reference_id,
    benchmark_retry_policy,
    benchmark_consolidation,
    benchmark_persisted_record
);
criterion_main!(benches);
