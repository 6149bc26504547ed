use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ovex_core::{Container, Document, create_markdown, extract_content, extract_sources};

fn load(name: &str) -> String {
    std::fs::read_to_string(format!("../../tests/fixtures/{}", name)).unwrap()
}

fn container(html: &str) -> Container {
    Container::find(&Document::parse(html)).unwrap().unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let collapsed = load("overview.html");
    let expanded = load("overview_expanded.html");

    let mut group = c.benchmark_group("parse");

    group.bench_with_input(BenchmarkId::new("snapshot", "collapsed"), &collapsed, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });

    group.bench_with_input(BenchmarkId::new("snapshot", "expanded"), &expanded, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });

    group.finish();
}

fn bench_content(c: &mut Criterion) {
    let container = container(&load("overview_expanded.html"));

    c.bench_function("extract_content", |b| b.iter(|| extract_content(black_box(&container))));
}

fn bench_sources(c: &mut Criterion) {
    let container = container(&load("overview_expanded.html"));

    c.bench_function("extract_sources", |b| b.iter(|| extract_sources(black_box(&container))));
}

fn bench_markdown(c: &mut Criterion) {
    let container = container(&load("overview_expanded.html"));
    let html = extract_content(&container);
    let sources = extract_sources(&container).unwrap();

    c.bench_function("create_markdown", |b| {
        b.iter(|| create_markdown(black_box(&html), black_box(&sources), Some("rust ownership")))
    });
}

criterion_group!(benches, bench_parse, bench_content, bench_sources, bench_markdown);
criterion_main!(benches);
