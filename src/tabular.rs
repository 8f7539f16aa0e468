use std::collections::BTreeMap;
use std::io::{Read, Write};

use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use crate::cli::CsvDialect;

pub type Row = BTreeMap<String, String>;

impl CsvDialect {
    pub fn delimiter(self) -> u8 {
        match self {
            Self::Excel | Self::Unix => b',',
            Self::ExcelTab => b'\t',
        }
    }

    pub fn reader_builder(self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder.delimiter(self.delimiter()).flexible(true);
        builder
    }

    pub fn writer_builder(self) -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder.delimiter(self.delimiter());
        match self {
            Self::Excel | Self::ExcelTab => {
                builder
                    .terminator(Terminator::CRLF)
                    .quote_style(QuoteStyle::Necessary);
            }
            Self::Unix => {
                builder
                    .terminator(Terminator::Any(b'\n'))
                    .quote_style(QuoteStyle::Always);
            }
        }
        builder
    }
}

pub fn read_rows<R: Read>(reader: R, dialect: CsvDialect) -> Result<(Vec<String>, Vec<Row>)> {
    let mut reader = dialect.reader_builder().from_reader(reader);
    let header = reader
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(ToOwned::to_owned)
        .collect::<Vec<String>>();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read CSV row {}", index + 2))?;
        let row = header
            .iter()
            .enumerate()
            .map(|(column, name)| {
                (
                    name.clone(),
                    record.get(column).unwrap_or_default().to_string(),
                )
            })
            .collect::<Row>();
        rows.push(row);
    }

    Ok((header, rows))
}

pub fn project<'a>(row: &'a Row, header: &'a [String]) -> impl Iterator<Item = &'a str> + 'a {
    header
        .iter()
        .map(move |column| row.get(column).map(String::as_str).unwrap_or_default())
}

pub struct RowWriter<W: Write> {
    writer: csv::Writer<W>,
    header: Vec<String>,
}

impl<W: Write> RowWriter<W> {
    pub fn new(output: W, dialect: CsvDialect, header: Vec<String>) -> Result<Self> {
        let mut writer = dialect.writer_builder().from_writer(output);
        writer
            .write_record(&header)
            .context("failed to write CSV header")?;
        Ok(Self { writer, header })
    }

    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        self.writer
            .write_record(project(row, &self.header))
            .context("failed to write CSV row")?;
        self.writer.flush().context("failed to flush CSV output")
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("failed to finish CSV output: {}", err.error()))
    }
}
