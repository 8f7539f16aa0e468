use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{Result, bail};

use super::report::write_summary;
use super::runner::{BenchmarkRunner, build_variants, cache_key_columns, output_header};
use crate::biolink::TypeMapping;
use crate::cache::ContinuationCache;
use crate::cli::CsvDialect;
use crate::engines::{AnnotateProps, NerEngine};
use crate::model::{Annotation, Benchmark};

type CallLog = Rc<RefCell<Vec<(String, String)>>>;

struct FakeEngine {
    name: &'static str,
    results: Vec<(&'static str, &'static str)>,
    fail: bool,
    calls: CallLog,
}

impl FakeEngine {
    fn boxed(
        name: &'static str,
        results: Vec<(&'static str, &'static str)>,
        fail: bool,
    ) -> (Box<dyn NerEngine>, CallLog) {
        let calls = CallLog::default();
        let engine = Self {
            name,
            results,
            fail,
            calls: Rc::clone(&calls),
        };
        (Box::new(engine), calls)
    }
}

impl NerEngine for FakeEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn annotate(&self, text: &str, props: &AnnotateProps, limit: usize) -> Result<Vec<Annotation>> {
        self.calls
            .borrow_mut()
            .push((text.to_string(), props.biolink_type.clone()));
        if self.fail {
            bail!("service unavailable");
        }
        Ok(self
            .results
            .iter()
            .take(limit)
            .map(|(id, label)| {
                let mut annotation = Annotation::for_whole_text(
                    text,
                    id.to_string(),
                    label.to_string(),
                    String::new(),
                );
                annotation.score = Some(0.9);
                annotation
            })
            .collect())
    }
}

fn benchmark(query: &str, correct_id: &str, correct_label: &str) -> Benchmark {
    Benchmark {
        query: query.to_string(),
        source: "manual".to_string(),
        provided_type: "organ".to_string(),
        correct_type: String::new(),
        correct_id: correct_id.to_string(),
        correct_label: correct_label.to_string(),
        notes: BTreeMap::new(),
    }
}

fn mapping() -> TypeMapping {
    TypeMapping::builtin().expect("built-in mapping parses")
}

#[test]
fn kidney_is_ranked_first_by_id_and_label() {
    let (engine, calls) = FakeEngine::boxed("nameres", vec![("UBERON:0002113", "Kidney")], false);
    let engines = vec![engine];
    let mapping = mapping();
    let cache = ContinuationCache::empty(cache_key_columns());
    let mut runner = BenchmarkRunner::new(&engines, &mapping, &cache, 10, false, false);

    let processed = runner
        .process(&benchmark("kidney", "UBERON:0002113", "kidney"))
        .expect("row should be processed");
    assert!(processed.queried);
    let row = processed.row;
    assert_eq!(row.get("type_hint").map(String::as_str), Some("biolink:AnatomicalEntity"));
    assert_eq!(row.get("nameres_with_type_id_rank").map(String::as_str), Some("1"));
    assert_eq!(row.get("nameres_with_type_label_rank").map(String::as_str), Some("1"));
    assert_eq!(row.get("nameres_without_type_top_label").map(String::as_str), Some("Kidney"));
    assert_eq!(row.get("nameres_without_type_count").map(String::as_str), Some("1"));

    let calls = calls.borrow();
    assert_eq!(
        *calls,
        vec![
            ("kidney".to_string(), "biolink:AnatomicalEntity".to_string()),
            ("kidney".to_string(), String::new()),
        ]
    );

    let metrics = runner.metrics();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0].variant, "nameres_with_type");
    assert_eq!(metrics[0].average_id_rank, Some(1.0));
    assert_eq!(metrics[0].id_found_fraction, Some(1.0));
}

#[test]
fn cached_row_is_reproduced_without_remote_calls() {
    let previous = "\
query,source,correct_id,correct_label,nameres_with_type_id_rank,nameres_with_type_time_sec,extra
aspirin,manual,CHEBI:15365,aspirin,2,0.50000,kept
";
    let cache = ContinuationCache::from_reader(
        previous.as_bytes(),
        cache_key_columns(),
        CsvDialect::Excel,
    )
    .expect("continuation parses");
    let (engine, calls) = FakeEngine::boxed("nameres", vec![("CHEBI:15365", "aspirin")], false);
    let engines = vec![engine];
    let mapping = mapping();
    let mut runner = BenchmarkRunner::new(&engines, &mapping, &cache, 10, false, false);

    let processed = runner
        .process(&benchmark("aspirin", "CHEBI:15365", "aspirin"))
        .expect("cached row is emitted");
    assert!(!processed.queried);
    assert_eq!(processed.row.get("extra").map(String::as_str), Some("kept"));
    assert_eq!(
        processed.row.get("nameres_with_type_id_rank").map(String::as_str),
        Some("2")
    );
    assert!(calls.borrow().is_empty());
    assert_eq!(runner.cached(), 1);
    assert_eq!(runner.processed(), 0);

    let metrics = runner.metrics();
    assert_eq!(metrics[0].queries, 1);
    assert_eq!(metrics[0].average_id_rank, Some(2.0));
    assert_eq!(metrics[1].queries, 0);
}

#[test]
fn same_query_with_different_expected_id_is_not_served_from_cache() {
    let previous = "query,source,correct_id\naspirin,manual,CHEBI:00000\n";
    let cache = ContinuationCache::from_reader(
        previous.as_bytes(),
        cache_key_columns(),
        CsvDialect::Excel,
    )
    .expect("continuation parses");
    let (engine, calls) = FakeEngine::boxed("sapbert", vec![], false);
    let engines = vec![engine];
    let mapping = mapping();
    let mut runner = BenchmarkRunner::new(&engines, &mapping, &cache, 10, true, false);

    let processed = runner
        .process(&benchmark("aspirin", "CHEBI:15365", "aspirin"))
        .expect("row is processed");
    assert!(processed.queried);
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn failing_engine_yields_empty_ranks_and_counts_errors() {
    let (engine, _) = FakeEngine::boxed("sapbert", vec![], true);
    let engines = vec![engine];
    let mapping = mapping();
    let cache = ContinuationCache::empty(cache_key_columns());
    let mut runner = BenchmarkRunner::new(&engines, &mapping, &cache, 10, true, false);

    let row = runner
        .process(&benchmark("kidney", "UBERON:0002113", "kidney"))
        .expect("failure is not fatal")
        .row;
    assert_eq!(row.get("sapbert_without_type_id_rank").map(String::as_str), Some(""));
    assert_eq!(row.get("sapbert_without_type_count").map(String::as_str), Some("0"));
    assert!(row.get("sapbert_without_type_top_id").is_none());
    assert!(row.contains_key("sapbert_without_type_time_sec"));

    let metrics = runner.metrics();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].errors, 1);
    assert_eq!(metrics[0].queries, 1);
    assert_eq!(metrics[0].average_id_rank, None);
}

#[test]
fn uninformative_expected_type_falls_back_to_mapping() {
    let (engine, calls) = FakeEngine::boxed("nameres", vec![], false);
    let engines = vec![engine];
    let mapping = mapping();
    let cache = ContinuationCache::empty(cache_key_columns());
    let mut runner = BenchmarkRunner::new(&engines, &mapping, &cache, 10, false, false);

    let mut case = benchmark("gizmo", "X:1", "gizmo");
    case.correct_type = "biolink:NamedThing".to_string();
    case.provided_type = "widget".to_string();
    runner.process(&case).expect("row is processed");

    assert!(calls.borrow().iter().all(|(_, hint)| hint.is_empty()));
}

#[test]
fn rows_without_query_are_skipped() {
    let (engine, calls) = FakeEngine::boxed("nameres", vec![], false);
    let engines = vec![engine];
    let mapping = mapping();
    let cache = ContinuationCache::empty(cache_key_columns());
    let mut runner = BenchmarkRunner::new(&engines, &mapping, &cache, 10, false, false);

    assert!(runner.process(&benchmark("  ", "X:1", "x")).is_none());
    assert_eq!(runner.skipped(), 1);
    assert!(calls.borrow().is_empty());
}

#[test]
fn header_lists_variant_columns_per_engine() {
    let (nameres, _) = FakeEngine::boxed("nameres", vec![], false);
    let (sapbert, _) = FakeEngine::boxed("sapbert", vec![], false);
    let engines = vec![nameres, sapbert];

    let header = output_header(&build_variants(&engines, true));
    assert_eq!(header[0], "query");
    assert!(header.contains(&"nameres_without_type_id_rank".to_string()));
    assert!(header.contains(&"sapbert_without_type_time_sec".to_string()));
    assert!(!header.iter().any(|column| column.contains("_with_type_")));
    assert_eq!(header.len(), 8 + 2 * 8);

    let header = output_header(&build_variants(&engines, false));
    assert_eq!(header.len(), 8 + 4 * 8);
}

#[test]
fn summary_of_empty_run_prints_not_available() {
    let (engine, _) = FakeEngine::boxed("nameres", vec![], false);
    let engines = vec![engine];
    let mapping = mapping();
    let cache = ContinuationCache::empty(cache_key_columns());
    let runner = BenchmarkRunner::new(&engines, &mapping, &cache, 10, true, false);

    let mut output = Vec::new();
    write_summary(&mut output, &runner.metrics()).expect("summary writes");
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.starts_with("Benchmark summary\n"));
    assert!(text.contains("nameres (nameres_without_type): 0 queries, 0 errors"));
    assert!(text.contains("average id rank: n/a"));
}
