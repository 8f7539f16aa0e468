use std::collections::BTreeMap;

use crate::model::{Annotation, VariantMetrics};

pub const NOT_AVAILABLE: &str = "n/a";

pub fn find_rank(candidates: &[Annotation], target: &str) -> Option<usize> {
    if target.is_empty() {
        return None;
    }

    candidates
        .iter()
        .position(|candidate| candidate.id == target)
        .map(|index| index + 1)
}

pub fn find_label_rank(candidates: &[Annotation], target: &str) -> Option<usize> {
    let target = normalize_label(target);
    if target.is_empty() {
        return None;
    }

    candidates
        .iter()
        .position(|candidate| normalize_label(&candidate.label) == target)
        .map(|index| index + 1)
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

pub fn reciprocal_rank(rank: Option<usize>) -> f64 {
    match rank {
        Some(rank) if rank > 0 => 1.0 / rank as f64,
        _ => 0.0,
    }
}

pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

pub fn display_fraction(value: Option<f64>) -> String {
    value
        .map(|value| format!("{:.2}%", value * 100.0))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn display_average(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.3}"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn display_rank(rank: Option<usize>) -> String {
    rank.map(|rank| rank.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    pub sum: f64,
    pub count: u64,
}

impl Accumulator {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        ratio(self.sum, self.count as f64)
    }
}

pub const METRIC_QUERIES: &str = "queries";
pub const METRIC_ERRORS: &str = "errors";
pub const METRIC_ID_RANK: &str = "id_rank";
pub const METRIC_LABEL_RANK: &str = "label_rank";
pub const METRIC_RECIPROCAL_RANK: &str = "reciprocal_id_rank";
pub const METRIC_TOP1: &str = "top1_id";

#[derive(Debug, Clone, Default)]
pub struct RankStats {
    metrics: BTreeMap<(String, String), Accumulator>,
}

impl RankStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, variant: &str, metric: &str, value: f64) {
        self.metrics
            .entry((variant.to_string(), metric.to_string()))
            .or_default()
            .add(value);
    }

    pub fn get(&self, variant: &str, metric: &str) -> Accumulator {
        self.metrics
            .get(&(variant.to_string(), metric.to_string()))
            .copied()
            .unwrap_or_default()
    }

    pub fn record_error(&mut self, variant: &str) {
        self.add(variant, METRIC_ERRORS, 1.0);
    }

    pub fn record_ranks(&mut self, variant: &str, id_rank: Option<usize>, label_rank: Option<usize>) {
        self.add(variant, METRIC_QUERIES, 1.0);
        if let Some(rank) = id_rank {
            self.add(variant, METRIC_ID_RANK, rank as f64);
        }
        if let Some(rank) = label_rank {
            self.add(variant, METRIC_LABEL_RANK, rank as f64);
        }
        self.add(variant, METRIC_RECIPROCAL_RANK, reciprocal_rank(id_rank));
        self.add(
            variant,
            METRIC_TOP1,
            if id_rank == Some(1) { 1.0 } else { 0.0 },
        );
    }

    pub fn metrics(&self, engine: &str, variant: &str) -> VariantMetrics {
        let queries = self.get(variant, METRIC_QUERIES).count;
        let id_rank = self.get(variant, METRIC_ID_RANK);
        let label_rank = self.get(variant, METRIC_LABEL_RANK);
        let reciprocal = self.get(variant, METRIC_RECIPROCAL_RANK);
        let top1 = self.get(variant, METRIC_TOP1);

        VariantMetrics {
            engine: engine.to_string(),
            variant: variant.to_string(),
            queries,
            errors: self.get(variant, METRIC_ERRORS).count,
            id_found: id_rank.count,
            id_found_fraction: ratio(id_rank.count as f64, queries as f64),
            average_id_rank: id_rank.mean(),
            label_found: label_rank.count,
            label_found_fraction: ratio(label_rank.count as f64, queries as f64),
            average_label_rank: label_rank.mean(),
            top1_id_fraction: ratio(top1.sum, queries as f64),
            mean_reciprocal_rank: reciprocal.mean(),
        }
    }
}

pub fn summary_lines(metrics: &VariantMetrics) -> Vec<String> {
    vec![
        format!(
            "{} ({}): {} queries, {} errors",
            metrics.engine, metrics.variant, metrics.queries, metrics.errors
        ),
        format!(
            "  found id rank: {} ({}/{}), average id rank: {}",
            display_fraction(metrics.id_found_fraction),
            metrics.id_found,
            metrics.queries,
            display_average(metrics.average_id_rank)
        ),
        format!(
            "  found label rank: {} ({}/{}), average label rank: {}",
            display_fraction(metrics.label_found_fraction),
            metrics.label_found,
            metrics.queries,
            display_average(metrics.average_label_rank)
        ),
        format!(
            "  top-1 id: {}, mean reciprocal rank: {}",
            display_fraction(metrics.top1_id_fraction),
            display_average(metrics.mean_reciprocal_rank)
        ),
    ]
}
