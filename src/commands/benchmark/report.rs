use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::model::VariantMetrics;
use crate::scoring::{display_average, display_fraction, summary_lines};

pub(super) fn log_summary(metrics: &[VariantMetrics]) {
    for entry in metrics {
        info!(
            engine = %entry.engine,
            variant = %entry.variant,
            queries = entry.queries,
            errors = entry.errors,
            id_found = %display_fraction(entry.id_found_fraction),
            average_id_rank = %display_average(entry.average_id_rank),
            label_found = %display_fraction(entry.label_found_fraction),
            average_label_rank = %display_average(entry.average_label_rank),
            mrr = %display_average(entry.mean_reciprocal_rank),
            "benchmark summary"
        );
    }
}

pub(super) fn write_summary<W: Write>(output: &mut W, metrics: &[VariantMetrics]) -> Result<()> {
    writeln!(output, "Benchmark summary")?;
    for entry in metrics {
        for line in summary_lines(entry) {
            writeln!(output, "{line}")?;
        }
    }
    output.flush()?;
    Ok(())
}

pub(super) fn print_summary(metrics: &[VariantMetrics]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    write_summary(&mut output, metrics)
}
