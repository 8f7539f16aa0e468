use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use super::report::{log_summary, print_summary};
use super::runner::{BenchmarkRunner, cache_key_columns};
use crate::biolink::TypeMapping;
use crate::cache::ContinuationCache;
use crate::cli::{BenchmarkArgs, CsvDialect};
use crate::engines::build_engines;
use crate::http::HttpSession;
use crate::model::BenchmarkRunManifest;
use crate::sheet::BenchmarkSheet;
use crate::tabular::RowWriter;
use crate::util::{
    now_utc_string, open_output, pause_between_rows, utc_compact_string, write_json_pretty,
};

pub fn run(args: BenchmarkArgs) -> Result<()> {
    let started_at = now_utc_string();
    let started = Instant::now();
    let run_id = format!("benchmark-{}", utc_compact_string(Utc::now()));

    let session = HttpSession::from_args(&args.engine)?;
    let sheet = match &args.benchmark_file {
        Some(path) => BenchmarkSheet::from_file(path)?,
        None => BenchmarkSheet::fetch(&session, &args.google_sheet_id, &args.sheet_name)?,
    };
    info!(sheet = %sheet, sha256 = %sheet.sha256(), "loaded benchmark sheet");
    for (category, count) in sheet.categories() {
        info!(category = %category, count, "benchmark category");
    }

    let benchmarks = sheet.benchmarks()?;
    if benchmarks.is_empty() {
        bail!("no benchmarks found in {}", sheet.source());
    }

    let type_mapping = TypeMapping::load(args.type_mapping.as_deref())?;
    let cache = ContinuationCache::load(
        args.continue_from.as_deref(),
        cache_key_columns(),
        CsvDialect::Excel,
    )?;
    let engines = build_engines(&args.engine, &session)?;
    let mut runner = BenchmarkRunner::new(
        &engines,
        &type_mapping,
        &cache,
        args.engine.limit,
        args.skip_types,
        args.engine.skip_umls,
    );

    let output = open_output(&args.output)?;
    let mut writer = RowWriter::new(output, CsvDialect::Excel, runner.header())?;
    let total = benchmarks.len();
    for (index, benchmark) in benchmarks.iter().enumerate() {
        let Some(processed) = runner.process(benchmark) else {
            continue;
        };
        writer.write_row(&processed.row)?;

        if processed.queried && index + 1 < total {
            pause_between_rows(args.engine.sleep_secs);
        }
    }
    writer
        .into_inner()?
        .flush()
        .context("failed to flush benchmark output")?;

    let metrics = runner.metrics();
    log_summary(&metrics);
    if args.output != "-" {
        print_summary(&metrics)?;
    }

    info!(
        benchmarks = total,
        processed = runner.processed(),
        cached = runner.cached(),
        skipped = runner.skipped(),
        duration_ms = started.elapsed().as_millis() as u64,
        output = %args.output,
        "benchmark completed"
    );

    if let Some(report_path) = &args.report_json {
        let manifest = BenchmarkRunManifest {
            manifest_version: 1,
            run_id,
            started_at,
            finished_at: now_utc_string(),
            source: sheet.source().to_string(),
            source_sha256: sheet.sha256().to_string(),
            benchmark_count: total,
            processed_count: runner.processed(),
            cached_count: runner.cached(),
            engines: engines.iter().map(|engine| engine.name().to_string()).collect(),
            skip_types: args.skip_types,
            limit: args.engine.limit,
            output: args.output.clone(),
            metrics,
        };
        write_json_pretty(report_path, &manifest)?;
        info!(path = %report_path.display(), "wrote benchmark report");
    }

    Ok(())
}
