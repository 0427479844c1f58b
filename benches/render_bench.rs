//! Benchmarks for expression rendering and rule dumping
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rulesmith::ql::{self, Expr, MINUTE, SECOND};
use rulesmith::rules::{RuleBundle, SimpleAlert};

/// A left-deep chain of `depth` additions over labelled selectors
fn create_sum_chain(depth: usize) -> Expr {
    let mut expr = ql::metric("series_0").unwrap();
    for i in 1..depth {
        let next = ql::metric(format!("series_{}", i))
            .unwrap()
            .with_labels([("instance", "host-1"), ("job", "bench")])
            .unwrap();
        expr = (expr + next).unwrap();
    }
    expr
}

fn create_nested_expr() -> Expr {
    let inner = ql::metric("requests")
        .unwrap()
        .with_labels([("path", r#"/api/"quoted"\path"#)])
        .unwrap();
    let product = (inner.clone() * ql::metric("weights").unwrap()).unwrap();
    let rated = ql::rate(product.subqueried(4 * MINUTE, SECOND).unwrap()).unwrap();
    ql::avg(rated).unwrap().by(["host", "colo"]).unwrap()
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for depth in [10, 100, 1000] {
        let expr = create_sum_chain(depth);
        group.throughput(Throughput::Elements(depth as u64));

        group.bench_function(format!("raw_{}", depth), |b| {
            b.iter(|| black_box(&expr).render())
        });

        group.bench_function(format!("format_{}", depth), |b| {
            b.iter(|| ql::format(black_box(&expr)))
        });
    }

    let nested = create_nested_expr();
    group.bench_function("nested_modifiers", |b| {
        b.iter(|| ql::format(black_box(&nested)))
    });

    group.finish();
}

fn bench_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("dump");

    let mut rules = RuleBundle::new("bench");
    for i in 0..100 {
        rules
            .register_alert(&format!("bench_alert_{}", i), move || {
                let expr = ql::metric(format!("series_{}", i))?.compare_gt(i)?;
                Ok(SimpleAlert::new(expr)
                    .for_(5 * MINUTE)
                    .label("severity", "page"))
            })
            .unwrap();
    }

    group.throughput(Throughput::Elements(rules.len() as u64));
    group.bench_function("dump_100", |b| {
        b.iter(|| rules.dump().collect::<Result<Vec<_>, _>>().unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_render, bench_dump);
criterion_main!(benches);
