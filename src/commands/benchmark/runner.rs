use std::collections::HashSet;

use tracing::{info, warn};

use crate::biolink::{TypeMapping, normalize_type_hint};
use crate::cache::ContinuationCache;
use crate::commands::{WITH_TYPE, WITHOUT_TYPE, annotate_timed, column};
use crate::engines::{AnnotateProps, NerEngine};
use crate::model::{Benchmark, VariantMetrics};
use crate::scoring::{RankStats, display_rank, find_label_rank, find_rank};
use crate::tabular::Row;

pub(super) const BASE_COLUMNS: [&str; 8] = [
    "query",
    "source",
    "type",
    "correct_type",
    "correct_id",
    "correct_label",
    "type_hint",
    "notes",
];

pub(super) const VARIANT_SUFFIXES: [&str; 8] = [
    "id_rank",
    "label_rank",
    "top_id",
    "top_label",
    "top_type",
    "top_score",
    "count",
    "time_sec",
];

pub(super) fn cache_key_columns() -> Vec<String> {
    vec![
        "query".to_string(),
        "source".to_string(),
        "correct_id".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Variant {
    pub engine_index: usize,
    pub engine: String,
    pub with_type: bool,
    pub name: String,
}

pub(super) fn build_variants(engines: &[Box<dyn NerEngine>], skip_types: bool) -> Vec<Variant> {
    let mut variants = Vec::new();
    for (engine_index, engine) in engines.iter().enumerate() {
        let modes: &[bool] = if skip_types { &[false] } else { &[true, false] };
        for with_type in modes {
            let suffix = if *with_type { WITH_TYPE } else { WITHOUT_TYPE };
            variants.push(Variant {
                engine_index,
                engine: engine.name().to_string(),
                with_type: *with_type,
                name: column(engine.name(), suffix),
            });
        }
    }
    variants
}

pub(super) fn output_header(variants: &[Variant]) -> Vec<String> {
    let mut header = BASE_COLUMNS
        .iter()
        .map(|name| name.to_string())
        .collect::<Vec<String>>();
    for variant in variants {
        for suffix in VARIANT_SUFFIXES {
            header.push(column(&variant.name, suffix));
        }
    }
    header
}

#[derive(Debug, Clone)]
pub(super) struct ProcessedRow {
    pub row: Row,
    pub queried: bool,
}

pub(super) struct BenchmarkRunner<'a> {
    engines: &'a [Box<dyn NerEngine>],
    variants: Vec<Variant>,
    type_mapping: &'a TypeMapping,
    cache: &'a ContinuationCache,
    limit: usize,
    skip_umls: bool,
    unmapped_types: HashSet<String>,
    stats: RankStats,
    processed: usize,
    cached: usize,
    skipped: usize,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(
        engines: &'a [Box<dyn NerEngine>],
        type_mapping: &'a TypeMapping,
        cache: &'a ContinuationCache,
        limit: usize,
        skip_types: bool,
        skip_umls: bool,
    ) -> Self {
        Self {
            engines,
            variants: build_variants(engines, skip_types),
            type_mapping,
            cache,
            limit: limit.max(1),
            skip_umls,
            unmapped_types: HashSet::new(),
            stats: RankStats::new(),
            processed: 0,
            cached: 0,
            skipped: 0,
        }
    }

    pub fn header(&self) -> Vec<String> {
        output_header(&self.variants)
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn cached(&self) -> usize {
        self.cached
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn type_hint(&mut self, benchmark: &Benchmark) -> String {
        let expected = normalize_type_hint(&benchmark.correct_type);
        if !expected.is_empty() {
            return expected;
        }
        self.type_mapping
            .resolve_logged(&benchmark.provided_type, &mut self.unmapped_types)
    }

    fn base_row(&mut self, benchmark: &Benchmark) -> Row {
        let type_hint = self.type_hint(benchmark);
        let mut row = Row::new();
        row.insert("query".to_string(), benchmark.query.clone());
        row.insert("source".to_string(), benchmark.source.clone());
        row.insert("type".to_string(), benchmark.provided_type.clone());
        row.insert("correct_type".to_string(), benchmark.correct_type.clone());
        row.insert("correct_id".to_string(), benchmark.correct_id.clone());
        row.insert("correct_label".to_string(), benchmark.correct_label.clone());
        row.insert("type_hint".to_string(), type_hint);
        row.insert("notes".to_string(), benchmark.notes_summary());
        row
    }

    pub fn process(&mut self, benchmark: &Benchmark) -> Option<ProcessedRow> {
        if benchmark.query.trim().is_empty() {
            warn!(benchmark = %benchmark, "benchmark has no query; skipping");
            self.skipped += 1;
            return None;
        }

        let mut row = self.base_row(benchmark);
        let cache = self.cache;
        if let Some(cached) = cache.get(&row) {
            info!(query = %benchmark.query, "reusing cached result");
            self.record_cached(cached);
            self.cached += 1;
            return Some(ProcessedRow {
                row: cached.clone(),
                queried: false,
            });
        }

        let type_hint = row.get("type_hint").cloned().unwrap_or_default();
        for variant in &self.variants {
            let engine = self.engines[variant.engine_index].as_ref();
            let hint = if variant.with_type { type_hint.as_str() } else { "" };
            let props = AnnotateProps::new(hint, self.skip_umls);
            let outcome = annotate_timed(engine, &benchmark.query, &props, self.limit);

            let id_rank = find_rank(&outcome.results, &benchmark.correct_id);
            let label_rank = find_label_rank(&outcome.results, &benchmark.correct_label);
            if outcome.failed {
                self.stats.record_error(&variant.name);
            }
            self.stats.record_ranks(&variant.name, id_rank, label_rank);

            let prefix = variant.name.as_str();
            row.insert(column(prefix, "id_rank"), display_rank(id_rank));
            row.insert(column(prefix, "label_rank"), display_rank(label_rank));
            if let Some(top) = outcome.top() {
                row.insert(column(prefix, "top_id"), top.id.clone());
                row.insert(column(prefix, "top_label"), top.label.clone());
                row.insert(column(prefix, "top_type"), top.biolink_type.clone());
                row.insert(column(prefix, "top_score"), top.score_string());
            }
            row.insert(column(prefix, "count"), outcome.results.len().to_string());
            row.insert(column(prefix, "time_sec"), outcome.elapsed_string());
        }

        self.processed += 1;
        Some(ProcessedRow { row, queried: true })
    }

    fn record_cached(&mut self, cached: &Row) {
        for variant in &self.variants {
            let ran = cached
                .get(&column(&variant.name, "time_sec"))
                .is_some_and(|value| !value.is_empty());
            if !ran {
                continue;
            }
            let id_rank = parse_rank(cached.get(&column(&variant.name, "id_rank")));
            let label_rank = parse_rank(cached.get(&column(&variant.name, "label_rank")));
            self.stats.record_ranks(&variant.name, id_rank, label_rank);
        }
    }

    pub fn metrics(&self) -> Vec<VariantMetrics> {
        self.variants
            .iter()
            .map(|variant| self.stats.metrics(&variant.engine, &variant.name))
            .collect()
    }
}

fn parse_rank(value: Option<&String>) -> Option<usize> {
    value
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|rank| *rank > 0)
}
