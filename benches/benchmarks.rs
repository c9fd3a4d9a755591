//! Performance benchmarks for treepack

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use treepack::test_utils::TestTree;
use treepack::writer::fence_for;
use treepack::{FilterConfig, Format, GitFilter, Pipeline};

const RUST_SOURCE: &str = r#"//! Module documentation

use std::path::Path;

/// Main function documentation
fn main() {
    println!("Hello, world!");
}
"#;

fn tree_with_files(file_count: usize) -> TestTree {
    let tree = TestTree::new();
    for i in 0..file_count {
        tree.add_file(&format!("src/mod_{}/file_{}.rs", i % 10, i), RUST_SOURCE);
    }
    tree
}

fn git_tree_with_files(file_count: usize) -> TestTree {
    let tree = TestTree::with_git();
    for i in 0..file_count {
        tree.add_file(&format!("file_{}.rs", i), RUST_SOURCE);
    }
    tree
}

fn bench_pipeline_concurrency(c: &mut Criterion) {
    let tree = tree_with_files(500);
    let mut group = c.benchmark_group("pipeline_concurrency");
    group.throughput(Throughput::Elements(500));

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let pipeline =
                    Pipeline::new(tree.context(Format::Json, workers), FilterConfig::default())
                        .unwrap();
                black_box(pipeline.run(Vec::new()).unwrap().output.len())
            })
        });
    }

    group.finish();
}

fn bench_pipeline_formats(c: &mut Criterion) {
    let tree = tree_with_files(200);
    let mut group = c.benchmark_group("pipeline_formats");

    for format in [Format::Json, Format::Yaml, Format::Markdown] {
        group.bench_function(format.name(), |b| {
            b.iter(|| {
                let pipeline =
                    Pipeline::new(tree.context(format, 4), FilterConfig::default()).unwrap();
                black_box(pipeline.run(Vec::new()).unwrap().output.len())
            })
        });
    }

    group.finish();
}

fn bench_fence_for(c: &mut Criterion) {
    let plain = RUST_SOURCE.repeat(100);
    let fenced = format!("{plain}\n```rust\nfn x() {{}}\n```\n").repeat(20);

    let mut group = c.benchmark_group("fence_for");
    group.bench_function("plain", |b| b.iter(|| fence_for(black_box(&plain))));
    group.bench_function("nested_fences", |b| b.iter(|| fence_for(black_box(&fenced))));
    group.finish();
}

fn bench_git_filter_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("git_filter_init");

    let small_repo = git_tree_with_files(10);
    group.bench_function("small_repo_10_files", |b| {
        b.iter(|| GitFilter::new(black_box(small_repo.path())))
    });

    let large_repo = git_tree_with_files(500);
    group.bench_function("large_repo_500_files", |b| {
        b.iter(|| GitFilter::new(black_box(large_repo.path())))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pipeline_concurrency,
    bench_pipeline_formats,
    bench_fence_for,
    bench_git_filter_init,
);
criterion_main!(benches);
