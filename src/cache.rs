use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::CsvDialect;
use crate::tabular::{Row, read_rows};

#[derive(Debug, Clone, Default)]
pub struct ContinuationCache {
    key_columns: Vec<String>,
    rows: HashMap<Vec<String>, Row>,
}

impl ContinuationCache {
    pub fn empty(key_columns: Vec<String>) -> Self {
        Self {
            key_columns,
            rows: HashMap::new(),
        }
    }

    pub fn load(path: Option<&Path>, key_columns: Vec<String>, dialect: CsvDialect) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::empty(key_columns));
        };

        if !path.exists() {
            warn!(path = %path.display(), "continuation file missing; starting without cached rows");
            return Ok(Self::empty(key_columns));
        }

        let file = File::open(path)
            .with_context(|| format!("failed to open continuation file {}", path.display()))?;
        let cache = Self::from_reader(file, key_columns, dialect)
            .with_context(|| format!("failed to parse continuation file {}", path.display()))?;
        info!(path = %path.display(), rows = cache.len(), "loaded continuation file");
        Ok(cache)
    }

    pub fn from_reader<R: Read>(reader: R, key_columns: Vec<String>, dialect: CsvDialect) -> Result<Self> {
        let (header, rows) = read_rows(reader, dialect)?;
        for column in &key_columns {
            if !header.contains(column) {
                warn!(column = %column, "continuation file lacks key column; treating it as empty");
            }
        }

        let mut cache = Self::empty(key_columns);
        for row in rows {
            let key = cache.key_for(&row);
            cache.rows.insert(key, row);
        }
        Ok(cache)
    }

    pub fn key_for(&self, row: &Row) -> Vec<String> {
        self.key_columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or_default())
            .collect()
    }

    pub fn get(&self, row: &Row) -> Option<&Row> {
        if self.is_empty() {
            return None;
        }
        self.rows.get(&self.key_for(row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
