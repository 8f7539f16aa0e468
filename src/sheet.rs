use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::info;
use url::Url;

use crate::cli::CsvDialect;
use crate::http::HttpSession;
use crate::model::Benchmark;
use crate::tabular::{Row, read_rows};
use crate::util::sha256_bytes;

pub const DEFAULT_GOOGLE_SHEET_ID: &str = "10gtARdmoOGSZBObMtuC__wmEQYjoDhkbJLb78cJK-QE";
pub const DEFAULT_SHEET_NAME: &str = "Benchmarks";
const CATEGORY_COLUMN: &str = "Category";

#[derive(Debug, Clone)]
pub struct BenchmarkSheet {
    source: String,
    sha256: String,
    rows: Vec<Row>,
}

impl fmt::Display for BenchmarkSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "benchmark sheet ({} rows from {})",
            self.rows.len(),
            self.source
        )
    }
}

pub fn export_url(sheet_id: &str, sheet_name: &str) -> Result<Url> {
    let sheet_id = sheet_id.trim();
    if sheet_id.is_empty() {
        bail!("Google Sheet id must not be empty");
    }

    Url::parse_with_params(
        &format!("https://docs.google.com/spreadsheets/d/{sheet_id}/gviz/tq"),
        &[("tqx", "out:csv"), ("sheet", sheet_name)],
    )
    .with_context(|| format!("invalid Google Sheet id: {sheet_id}"))
}

impl BenchmarkSheet {
    pub fn fetch(session: &HttpSession, sheet_id: &str, sheet_name: &str) -> Result<Self> {
        let url = export_url(sheet_id, sheet_name)?;
        info!(url = %url, "downloading benchmark sheet");

        let response = session
            .send(|client| client.get(url.clone()))
            .context("failed to download benchmark sheet")?;
        let status = response.status();
        if !status.is_success() {
            bail!("benchmark sheet download returned HTTP {status}");
        }
        let content = response
            .text()
            .context("failed to read benchmark sheet body")?;

        Self::from_csv(sheet_id.to_string(), &content)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read benchmark file {}", path.display()))?;
        Self::from_csv(path.display().to_string(), &content)
            .with_context(|| format!("failed to parse benchmark file {}", path.display()))
    }

    pub fn from_csv(source: String, content: &str) -> Result<Self> {
        let (_, rows) = read_rows(content.as_bytes(), CsvDialect::Excel)
            .context("failed to parse benchmark sheet")?;

        Ok(Self {
            source,
            sha256: sha256_bytes(content.as_bytes()),
            rows,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn benchmarks(&self) -> Result<Vec<Benchmark>> {
        let notes_pattern = notes_column_pattern()?;
        Ok(self
            .rows
            .iter()
            .filter(|row| has_nonempty_value(row))
            .map(|row| to_benchmark(row, &notes_pattern))
            .collect())
    }

    pub fn categories(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            let category = row.get(CATEGORY_COLUMN).cloned().unwrap_or_default();
            *counts.entry(category).or_insert(0) += 1;
        }
        counts
    }
}

fn notes_column_pattern() -> Result<Regex> {
    Regex::new(r"(?i)^(.*) notes$").context("failed to compile notes column regex")
}

fn has_nonempty_value(row: &Row) -> bool {
    row.values().any(|value| !value.is_empty())
}

pub fn to_benchmark(row: &Row, notes_pattern: &Regex) -> Benchmark {
    let field = |name: &str| row.get(name).cloned().unwrap_or_default();

    let notes = row
        .iter()
        .filter_map(|(header, value)| {
            notes_pattern
                .captures(header)
                .and_then(|captures| captures.get(1))
                .map(|annotator| (annotator.as_str().to_string(), value.clone()))
        })
        .collect();

    Benchmark {
        query: field("query"),
        source: field("source"),
        provided_type: field("type"),
        correct_type: field("correct_type"),
        correct_id: field("correct_id"),
        correct_label: field("correct_label"),
        notes,
    }
}
