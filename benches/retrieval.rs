//! Benchmarks for retrieval and answer formatting.
//!
//! Benchmark targets:
//! - Entity extraction: <20µs per question
//! - Context assembly against an in-memory graph: <200µs per question
//! - Fallback formatting: <50µs for a full mapping
//!
//! These benchmarks measure the decision logic, not datastore I/O.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_possible_wrap)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use crimegraph::config::{PersonNameMode, RetrievalConfig};
use crimegraph::models::{ChatTurn, ContextMapping, HotspotRow, OrganizationRow, TopicData};
use crimegraph::services::entity_extraction::{
    LOCATION_NAMES_STATEMENT, NameUniverse, ORGANIZATION_NAMES_STATEMENT, person_candidates,
};
use crimegraph::services::{ContextAssembler, EntityExtractorService, FallbackFormatter};
use crimegraph::storage::{GraphDatastore, InMemoryDatastore, records};

const QUESTIONS: &[&str] = &[
    "Which criminal organizations operate in Chicago?",
    "Tell me more about West Side Crew",
    "Who was involved in the Loop robbery with Marcus Johnson?",
    "Show me the forensic evidence and any stolen vehicles",
];

fn location_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("District {i}")).collect()
}

fn graph(locations: usize) -> Arc<dyn GraphDatastore> {
    let names: Vec<_> = location_names(locations)
        .into_iter()
        .chain(["Loop".to_string()])
        .map(|name| json!({"name": name}))
        .collect();
    Arc::new(
        InMemoryDatastore::new()
            .with_response(LOCATION_NAMES_STATEMENT, records(json!(names)))
            .with_response(
                ORGANIZATION_NAMES_STATEMENT,
                records(json!([{"name": "West Side Crew"}, {"name": "South Side Syndicate"}])),
            ),
    )
}

// ============================================================================
// Extraction Benchmarks
// ============================================================================

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_extraction");
    group.measurement_time(Duration::from_secs(3));

    group.bench_function("person_candidates", |b| {
        b.iter(|| {
            for question in QUESTIONS {
                black_box(person_candidates(black_box(question)));
            }
        });
    });

    for size in [50usize, 500] {
        let universe = NameUniverse::from_names(
            location_names(size),
            vec!["West Side Crew".to_string()],
        );
        let extractor = EntityExtractorService::new(graph(0), PersonNameMode::Heuristic);
        group.bench_with_input(BenchmarkId::new("extract", size), &universe, |b, universe| {
            b.iter(|| {
                for question in QUESTIONS {
                    black_box(extractor.extract(black_box(question), universe));
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Assembly Benchmarks
// ============================================================================

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("context_assembly");
    group.measurement_time(Duration::from_secs(3));

    let assembler = ContextAssembler::new(graph(50), RetrievalConfig::default());
    let history: Vec<ChatTurn> = (0..6)
        .map(|i| ChatTurn::user(format!("What happened in the Loop on day {i}?")))
        .collect();

    group.bench_function("no_history", |b| {
        b.iter(|| black_box(assembler.assemble(black_box(QUESTIONS[0]), &[])));
    });
    group.bench_function("with_carry_over", |b| {
        b.iter(|| black_box(assembler.assemble(black_box("Who was involved?"), &history)));
    });

    group.finish();
}

// ============================================================================
// Formatting Benchmarks
// ============================================================================

fn bench_fallback(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback_formatter");

    let mut mapping = ContextMapping::new();
    mapping.insert(
        "all_organizations",
        TopicData::Organizations(
            (0..30)
                .map(|i| OrganizationRow {
                    name: format!("Organization {i}"),
                    org_type: Some("gang".to_string()),
                    territory: Some("West".to_string()),
                    members: 100 - i,
                    activity: Some("high".to_string()),
                })
                .collect(),
        ),
    );
    mapping.insert(
        "hotspots",
        TopicData::Hotspots(
            (0..15)
                .map(|i| HotspotRow {
                    location: format!("District {i}"),
                    district: None,
                    crimes: 50 - i,
                })
                .collect(),
        ),
    );

    group.bench_function("full_mapping", |b| {
        b.iter(|| black_box(FallbackFormatter::format(black_box(&mapping))));
    });
    group.bench_function("empty_mapping", |b| {
        let empty = ContextMapping::new();
        b.iter(|| black_box(FallbackFormatter::format(black_box(&empty))));
    });

    group.finish();
}

criterion_group!(benches, bench_extraction, bench_assembly, bench_fallback);
criterion_main!(benches);
