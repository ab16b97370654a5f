//! Query benchmarks: index narrowing against plain scans.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use entigraph_bench::populated;
use entigraph_core::{Expansion, Predicate, Query, QueryOptions};

fn compare(c: &mut Criterion, name: &str, query: &Query) {
    let mut group = c.benchmark_group(name);

    for boards in [10, 100].iter() {
        let ctx = populated(*boards, 50, 100);
        let scan = query.clone().scan_only();

        group.bench_with_input(BenchmarkId::new("indexed", boards), query, |b, query| {
            b.iter(|| black_box(ctx.query_ids(black_box(query)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("scan", boards), &scan, |b, query| {
            b.iter(|| black_box(ctx.query_ids(black_box(query)).unwrap()));
        });
    }
    group.finish();
}

/// Equality through the hash index.
fn bench_eq(c: &mut Criterion) {
    compare(c, "query_eq", &Query::new("Post").filter(Predicate::eq("author", "a7")));
}

/// Range through the sort index.
fn bench_range(c: &mut Criterion) {
    compare(c, "query_range", &Query::new("Post").filter(Predicate::ge("score", 900)));
}

/// Ordered top-k through the sort index.
fn bench_top(c: &mut Criterion) {
    compare(c, "query_top", &Query::new("Post").sort_desc("score").limit(20));
}

/// Substring and fuzzy matching through the full-text index.
fn bench_text(c: &mut Criterion) {
    compare(c, "query_contains", &Query::new("Post").filter(Predicate::contains("body", "tombst")));
    compare(c, "query_fuzzy", &Query::new("Post").filter(Predicate::matches("body", "ledgr")));
}

/// Expanding boards with their top posts.
fn bench_expand(c: &mut Criterion) {
    let ctx = populated(20, 50, 100);
    let query = Query::new("Board").with(Expansion::full("posts").options(QueryOptions::new().sort_desc("score").limit(5)));

    c.bench_function("expand_top_posts", |b| {
        b.iter(|| black_box(ctx.query(black_box(&query)).unwrap()));
    });
}

criterion_group!(benches, bench_eq, bench_range, bench_top, bench_text, bench_expand);

criterion_main!(benches);
