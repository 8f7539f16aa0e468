use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::engines::nameres::DEFAULT_NAMERES_ENDPOINT;
use crate::engines::sapbert::{DEFAULT_SAPBERT_COUNT, DEFAULT_SAPBERT_URL};
use crate::sheet::{DEFAULT_GOOGLE_SHEET_ID, DEFAULT_SHEET_NAME};

#[derive(Parser, Debug)]
#[command(
    name = "ner-benchmarks",
    version,
    about = "Benchmark and compare biomedical NER web services"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Score engines against the shared benchmark spreadsheet")]
    Benchmark(BenchmarkArgs),
    #[command(about = "Annotate an arbitrary CSV file with every selected engine side by side")]
    Compare(CompareArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum)]
pub enum EngineKind {
    Nameres,
    Sapbert,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CsvDialect {
    Excel,
    ExcelTab,
    Unix,
}

impl CsvDialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excel => "excel",
            Self::ExcelTab => "excel-tab",
            Self::Unix => "unix",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    #[arg(long = "engine", short = 'e', value_enum)]
    pub engines: Vec<EngineKind>,

    #[arg(long, env = "NAMERES_ENDPOINT", default_value = DEFAULT_NAMERES_ENDPOINT)]
    pub nameres_endpoint: String,

    #[arg(long, env = "SAPBERT_URL", default_value = DEFAULT_SAPBERT_URL)]
    pub sapbert_url: String,

    #[arg(long, default_value_t = DEFAULT_SAPBERT_COUNT)]
    pub sapbert_count: usize,

    #[arg(long, default_value_t = false)]
    pub skip_umls: bool,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 5)]
    pub max_retries: u32,

    #[arg(long, default_value_t = 0.1)]
    pub backoff_factor: f64,

    #[arg(long = "retry-status", value_delimiter = ',', default_values_t = [500, 502, 503, 504, 403])]
    pub retry_statuses: Vec<u16>,

    #[arg(long, default_value_t = 2.0, value_parser = parse_sleep_secs)]
    pub sleep_secs: f64,
}

#[derive(Args, Debug, Clone)]
pub struct BenchmarkArgs {
    #[arg(long, default_value = "-")]
    pub output: String,

    #[arg(long, env = "BENCHMARK_GOOGLE_SHEET_ID", default_value = DEFAULT_GOOGLE_SHEET_ID)]
    pub google_sheet_id: String,

    #[arg(long, default_value = DEFAULT_SHEET_NAME)]
    pub sheet_name: String,

    #[arg(long, help = "Read benchmarks from a local CSV export instead of the spreadsheet")]
    pub benchmark_file: Option<PathBuf>,

    #[arg(long, help = "Only query engines without a type hint", default_value_t = false)]
    pub skip_types: bool,

    #[arg(long)]
    pub type_mapping: Option<PathBuf>,

    #[arg(long)]
    pub continue_from: Option<PathBuf>,

    #[arg(long)]
    pub report_json: Option<PathBuf>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = "-")]
    pub output: String,

    #[arg(long, default_value = "text")]
    pub query_column: String,

    #[arg(long, default_value = "biolink_type")]
    pub type_column: String,

    #[arg(long, value_enum, default_value_t = CsvDialect::Excel)]
    pub dialect: CsvDialect,

    #[arg(long)]
    pub continue_from: Option<PathBuf>,

    #[arg(long, help = "Emit separate columns for lookups with and without the type hint", default_value_t = false)]
    pub split_types: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

fn parse_sleep_secs(value: &str) -> Result<f64, String> {
    let seconds = value.parse::<f64>().map_err(|err| err.to_string())?;
    Duration::try_from_secs_f64(seconds).map_err(|err| format!("invalid pause '{value}': {err}"))?;
    Ok(seconds)
}
