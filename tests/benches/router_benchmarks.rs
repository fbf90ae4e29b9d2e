//! # Viewport Router Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Parser | `parse` / `stringify` of sibling and nested instruction trees |
//! | Router | full navigation across N sibling viewports |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use router_core::ports::inbound::RouterApi;
use router_core::{
    ComponentRegistry, FnComponentFactory, InstructionParser, LoadOptions, RoutableComponent,
    Router, RouterConfig, RouterPorts, ViewportOptions,
};
use std::sync::Arc;
use std::time::Duration;

struct Plain(String);

#[async_trait::async_trait]
impl RoutableComponent for Plain {
    fn name(&self) -> &str {
        &self.0
    }
}

fn siblings(count: usize, prefix: &str) -> String {
    (0..count)
        .map(|i| format!("{prefix}{i}@slot{i}"))
        .collect::<Vec<_>>()
        .join("+")
}

fn nested(depth: usize) -> String {
    (0..depth).map(|i| format!("c{i}(p{i})")).collect::<Vec<_>>().join("/")
}

// ============================================================================
// PARSER
// ============================================================================

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("instruction-parser");
    let parser = InstructionParser::default();

    for size in [1, 8, 32] {
        let flat = siblings(size, "c");
        let deep = nested(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("parse_siblings", size), &flat, |b, text| {
            b.iter(|| black_box(parser.parse(text).is_ok()))
        });
        group.bench_with_input(BenchmarkId::new("parse_nested", size), &deep, |b, text| {
            b.iter(|| black_box(parser.parse(text).is_ok()))
        });

        let tree = parser.parse(&flat).expect("valid instructions");
        group.bench_with_input(BenchmarkId::new("stringify_siblings", size), &tree, |b, tree| {
            b.iter(|| black_box(parser.stringify(tree)))
        });
    }
    group.finish();
}

// ============================================================================
// NAVIGATION
// ============================================================================

fn bench_navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("router-navigation");
    group.measurement_time(Duration::from_secs(10));
    let runtime = tokio::runtime::Runtime::new().expect("runtime");

    for viewports in [1, 4, 16] {
        let registry = Arc::new(ComponentRegistry::new());
        for i in 0..viewports {
            for prefix in ["x", "y"] {
                let name = format!("{prefix}{i}");
                let component = name.clone();
                registry.register(Arc::new(FnComponentFactory::new(name, move || {
                    Ok(Arc::new(Plain(component.clone())) as Arc<dyn RoutableComponent>)
                })));
            }
        }
        let router = Router::new(RouterConfig::default(), RouterPorts::new(registry));
        runtime.block_on(async {
            for i in 0..viewports {
                router
                    .connect_endpoint(None, ViewportOptions::new(format!("slot{i}")).into())
                    .await
                    .expect("connect");
            }
        });

        let (first, second) = (siblings(viewports, "x"), siblings(viewports, "y"));
        group.throughput(Throughput::Elements(viewports as u64));
        group.bench_function(BenchmarkId::new("swap_all", viewports), |b| {
            b.iter(|| {
                runtime.block_on(async {
                    black_box(router.load(first.as_str(), LoadOptions::default()).await.is_ok());
                    black_box(router.load(second.as_str(), LoadOptions::default()).await.is_ok());
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parser, bench_navigation);
criterion_main!(benches);
