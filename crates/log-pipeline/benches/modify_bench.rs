//! 필드 변환 벤치마크
//!
//! 값 매핑, 복사/이동, 와일드카드 중첩의 처리량을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use opsnorm_core::types::{Record, Value};
use opsnorm_log_pipeline::FieldModifier;
use opsnorm_log_pipeline::rule::{FieldRule, ModifierRule, NestRule};

fn flat_audit_record() -> Record {
    [
        ("level", "INFO"),
        ("node.name", "n1"),
        ("node.id", "abc"),
        ("user.name", "elastic"),
        ("user.realm", "reserved"),
        ("user.run_by.name", "root"),
        ("event.type", "rest"),
        ("event.action", "access_granted"),
        ("origin.type", "rest"),
        ("origin.address", "127.0.0.1:5432"),
        ("request.id", "r1"),
        ("request.method", "GET"),
        ("url.path", "/_cat/indices"),
        ("message", "access granted"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), Value::from(v)))
    .collect()
}

fn bench_severity_mapping(c: &mut Criterion) {
    let modifier = FieldModifier::new(vec![
        ModifierRule::Field(
            FieldRule::new("severity")
                .copy_from("level")
                .map_values([("INFO", "INFO"), ("WARN", "WARNING"), ("ERROR", "ERROR")], true),
        ),
        ModifierRule::Field(
            FieldRule::new("labels.instrumentation_source").static_value("opsnorm/bench"),
        ),
    ])
    .unwrap();
    let record = flat_audit_record();

    let mut group = c.benchmark_group("modify");
    group.throughput(Throughput::Elements(1));
    group.bench_function("severity_and_label", |b| {
        b.iter(|| modifier.apply(black_box(record.clone())))
    });
    group.finish();
}

fn bench_nest_wildcard(c: &mut Criterion) {
    let prefixes = [
        "user.run_by",
        "node",
        "event",
        "user",
        "origin",
        "request",
        "url",
    ];
    let modifier = FieldModifier::new(
        prefixes
            .iter()
            .map(|p| ModifierRule::NestWildcard(NestRule::by_prefix(p)))
            .collect(),
    )
    .unwrap();
    let record = flat_audit_record();

    let mut group = c.benchmark_group("nest_wildcard");
    group.throughput(Throughput::Elements(1));
    group.bench_function("audit_prefixes", |b| {
        b.iter(|| modifier.apply(black_box(record.clone())))
    });
    group.finish();
}

criterion_group!(benches, bench_severity_mapping, bench_nest_wildcard);
criterion_main!(benches);
