use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{error, info};

use crate::biolink::normalize_type_hint;
use crate::cache::ContinuationCache;
use crate::cli::CompareArgs;
use crate::commands::{
    TOP_RESULT_SUFFIXES, WITH_TYPE, WITHOUT_TYPE, annotate_timed, column, variant_prefix,
    write_top_result,
};
use crate::engines::{AnnotateProps, NerEngine, build_engines};
use crate::http::HttpSession;
use crate::tabular::{Row, RowWriter, read_rows};
use crate::util::{open_output, pause_between_rows, sha256_file};

pub fn run(args: CompareArgs) -> Result<()> {
    let started = Instant::now();
    let input_sha256 = sha256_file(&args.input)?;
    let file = File::open(&args.input)
        .with_context(|| format!("failed to open input file {}", args.input.display()))?;
    let (input_header, rows) = read_rows(file, args.dialect)
        .with_context(|| format!("failed to parse input file {}", args.input.display()))?;
    info!(
        path = %args.input.display(),
        sha256 = %input_sha256,
        rows = rows.len(),
        dialect = args.dialect.as_str(),
        "loaded input file"
    );

    let settings = CompareSettings::resolve(&args, &input_header)?;
    let cache = ContinuationCache::load(
        args.continue_from.as_deref(),
        settings.cache_key_columns(),
        args.dialect,
    )?;
    let session = HttpSession::from_args(&args.engine)?;
    let engines = build_engines(&args.engine, &session)?;
    let mut comparator = Comparator::new(&engines, &cache, settings);

    let output = open_output(&args.output)?;
    let mut writer = RowWriter::new(
        output,
        args.dialect,
        comparator.header(&input_header),
    )?;
    let total = rows.len();
    for (index, row) in rows.into_iter().enumerate() {
        let Some(processed) = comparator.process(row) else {
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
        .context("failed to flush comparison output")?;

    for (engine, errors) in comparator.errors() {
        info!(engine = %engine, errors, "engine lookup failures");
    }
    info!(
        rows = total,
        processed = comparator.processed,
        cached = comparator.cached,
        skipped = comparator.skipped,
        duration_ms = started.elapsed().as_millis() as u64,
        output = %args.output,
        "comparison completed"
    );

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompareSettings {
    query_column: String,
    type_column: Option<String>,
    split_types: bool,
    limit: usize,
    skip_umls: bool,
}

impl CompareSettings {
    fn resolve(args: &CompareArgs, input_header: &[String]) -> Result<Self> {
        if !input_header.contains(&args.query_column) {
            bail!(
                "query column '{}' not found in input header: {}",
                args.query_column,
                input_header.join(", ")
            );
        }

        let type_column = args.type_column.trim();
        let type_column = if type_column.is_empty() {
            None
        } else if input_header.iter().any(|name| name == type_column) {
            Some(type_column.to_string())
        } else {
            bail!(
                "type column '{type_column}' not found in input header (pass --type-column '' to compare without type hints): {}",
                input_header.join(", ")
            );
        };

        if args.split_types && type_column.is_none() {
            bail!("--split-types requires a type column");
        }

        Ok(Self {
            query_column: args.query_column.clone(),
            type_column,
            split_types: args.split_types,
            limit: args.engine.limit.max(1),
            skip_umls: args.engine.skip_umls,
        })
    }

    fn cache_key_columns(&self) -> Vec<String> {
        let mut columns = vec![self.query_column.clone()];
        if let Some(type_column) = &self.type_column {
            columns.push(type_column.clone());
        }
        columns
    }

    fn variants(&self) -> Vec<(Option<&'static str>, bool)> {
        if self.split_types {
            vec![(Some(WITH_TYPE), true), (Some(WITHOUT_TYPE), false)]
        } else {
            vec![(None, self.type_column.is_some())]
        }
    }
}

#[derive(Debug, Clone)]
struct ComparedRow {
    row: Row,
    queried: bool,
}

struct Comparator<'a> {
    engines: &'a [Box<dyn NerEngine>],
    cache: &'a ContinuationCache,
    settings: CompareSettings,
    errors: BTreeMap<String, u64>,
    processed: usize,
    cached: usize,
    skipped: usize,
}

impl<'a> Comparator<'a> {
    fn new(
        engines: &'a [Box<dyn NerEngine>],
        cache: &'a ContinuationCache,
        settings: CompareSettings,
    ) -> Self {
        Self {
            engines,
            cache,
            settings,
            errors: BTreeMap::new(),
            processed: 0,
            cached: 0,
            skipped: 0,
        }
    }

    fn header(&self, input_header: &[String]) -> Vec<String> {
        let mut header = input_header.to_vec();
        for engine in self.engines {
            for (variant, _) in self.settings.variants() {
                let prefix = variant_prefix(engine.name(), variant);
                for suffix in TOP_RESULT_SUFFIXES {
                    let name = column(&prefix, suffix);
                    if !header.contains(&name) {
                        header.push(name);
                    }
                }
            }
        }
        header
    }

    fn errors(&self) -> &BTreeMap<String, u64> {
        &self.errors
    }

    fn process(&mut self, mut row: Row) -> Option<ComparedRow> {
        let text = row
            .get(&self.settings.query_column)
            .cloned()
            .unwrap_or_default();
        if text.trim().is_empty() {
            error!(row = ?row, column = %self.settings.query_column, "query missing from row; skipping");
            self.skipped += 1;
            return None;
        }

        let cache = self.cache;
        if let Some(cached) = cache.get(&row) {
            info!(text = %text, "reusing cached result");
            self.cached += 1;
            return Some(ComparedRow {
                row: cached.clone(),
                queried: false,
            });
        }

        let type_hint = self
            .settings
            .type_column
            .as_ref()
            .and_then(|name| row.get(name))
            .map(|value| normalize_type_hint(value))
            .unwrap_or_default();

        for engine in self.engines {
            for (variant, with_type) in self.settings.variants() {
                let hint = if with_type { type_hint.as_str() } else { "" };
                let props = AnnotateProps::new(hint, self.settings.skip_umls);
                let outcome = annotate_timed(engine.as_ref(), &text, &props, self.settings.limit);
                if outcome.failed {
                    *self.errors.entry(engine.name().to_string()).or_insert(0) += 1;
                }
                write_top_result(&mut row, &variant_prefix(engine.name(), variant), &outcome);
            }
        }

        self.processed += 1;
        Some(ComparedRow { row, queried: true })
    }
}
