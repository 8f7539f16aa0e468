use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Benchmark {
    pub query: String,
    pub source: String,
    pub provided_type: String,
    pub correct_type: String,
    pub correct_id: String,
    pub correct_label: String,
    pub notes: BTreeMap<String, String>,
}

impl Benchmark {
    pub fn notes_summary(&self) -> String {
        self.notes
            .iter()
            .filter(|(_, note)| !note.trim().is_empty())
            .map(|(annotator, note)| format!("{annotator}: {}", note.trim()))
            .collect::<Vec<String>>()
            .join("; ")
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "benchmark of query '{}' with type {} from source {}, which should have the correct ID {} ('{}', type {})",
            self.query,
            self.provided_type,
            self.source,
            self.correct_id,
            self.correct_label,
            self.correct_type
        )?;
        let notes = self.notes_summary();
        if !notes.is_empty() {
            write!(f, ": {notes}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub text: String,
    pub span: Span,
    pub id: String,
    pub label: String,
    pub biolink_type: String,
    pub score: Option<f64>,
    pub clique_identifier_count: Option<u64>,
}

impl Annotation {
    pub fn for_whole_text(text: &str, id: String, label: String, biolink_type: String) -> Self {
        Self {
            text: text.to_string(),
            span: Span {
                begin: 0,
                end: text.chars().count(),
            },
            id,
            label,
            biolink_type,
            score: None,
            clique_identifier_count: None,
        }
    }

    pub fn score_string(&self) -> String {
        self.score.map(|score| score.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantMetrics {
    pub engine: String,
    pub variant: String,
    pub queries: u64,
    pub errors: u64,
    pub id_found: u64,
    pub id_found_fraction: Option<f64>,
    pub average_id_rank: Option<f64>,
    pub label_found: u64,
    pub label_found_fraction: Option<f64>,
    pub average_label_rank: Option<f64>,
    pub top1_id_fraction: Option<f64>,
    pub mean_reciprocal_rank: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub source: String,
    pub source_sha256: String,
    pub benchmark_count: usize,
    pub processed_count: usize,
    pub cached_count: usize,
    pub engines: Vec<String>,
    pub skip_types: bool,
    pub limit: usize,
    pub output: String,
    pub metrics: Vec<VariantMetrics>,
}
