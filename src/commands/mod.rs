pub mod benchmark;
pub mod compare;

use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::engines::{AnnotateProps, NerEngine};
use crate::model::Annotation;
use crate::tabular::Row;
use crate::util::format_seconds;

pub const WITH_TYPE: &str = "with_type";
pub const WITHOUT_TYPE: &str = "without_type";

#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub results: Vec<Annotation>,
    pub elapsed: Duration,
    pub failed: bool,
}

impl EngineOutcome {
    pub fn top(&self) -> Option<&Annotation> {
        self.results.first()
    }

    pub fn elapsed_string(&self) -> String {
        format_seconds(self.elapsed)
    }
}

pub fn annotate_timed(
    engine: &dyn NerEngine,
    text: &str,
    props: &AnnotateProps,
    limit: usize,
) -> EngineOutcome {
    let started = Instant::now();
    let outcome = engine.annotate(text, props, limit);
    let elapsed = started.elapsed();

    match outcome {
        Ok(results) => {
            info!(
                engine = engine.name(),
                text,
                biolink_type = %props.biolink_type,
                results = results.len(),
                elapsed_sec = %format_seconds(elapsed),
                "lookup completed"
            );
            for (index, result) in results.iter().enumerate() {
                debug!(
                    engine = engine.name(),
                    text = %result.text,
                    rank = index + 1,
                    begin = result.span.begin,
                    end = result.span.end,
                    id = %result.id,
                    label = %result.label,
                    biolink_type = %result.biolink_type,
                    score = ?result.score,
                    clique_identifier_count = ?result.clique_identifier_count,
                    "lookup result"
                );
            }
            EngineOutcome {
                results,
                elapsed,
                failed: false,
            }
        }
        Err(err) => {
            error!(engine = engine.name(), text, error = %format!("{err:#}"), "lookup failed");
            EngineOutcome {
                results: Vec::new(),
                elapsed,
                failed: true,
            }
        }
    }
}

pub fn column(prefix: &str, suffix: &str) -> String {
    format!("{prefix}_{suffix}")
}

pub fn variant_prefix(engine: &str, variant: Option<&str>) -> String {
    match variant {
        Some(variant) => column(engine, variant),
        None => engine.to_string(),
    }
}

pub const TOP_RESULT_SUFFIXES: [&str; 5] = ["id", "label", "type", "score", "time_sec"];

pub fn write_top_result(row: &mut Row, prefix: &str, outcome: &EngineOutcome) {
    if let Some(top) = outcome.top() {
        row.insert(column(prefix, "id"), top.id.clone());
        row.insert(column(prefix, "label"), top.label.clone());
        row.insert(column(prefix, "type"), top.biolink_type.clone());
        row.insert(column(prefix, "score"), top.score_string());
    }
    row.insert(column(prefix, "time_sec"), outcome.elapsed_string());
}
