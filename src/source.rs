use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use polars::prelude::{ParquetReader, SerReader};

use crate::errors::SourceError;
use crate::table::Table;

/// Anything that can hand back a whole table for a path.
pub trait TableSource {
    fn load(&self, path: &Path) -> Result<Table, SourceError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetSource;

impl TableSource for ParquetSource {
    fn load(&self, path: &Path) -> Result<Table, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }
        read_parquet(path).map_err(|source| SourceError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// In-memory tables keyed by path, for callers that already hold the data.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<PathBuf, Table>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, table: Table) {
        self.tables.insert(path.into(), table);
    }

    pub fn with_table(mut self, path: impl Into<PathBuf>, table: Table) -> Self {
        self.insert(path, table);
        self
    }
}

impl TableSource for MemorySource {
    fn load(&self, path: &Path) -> Result<Table, SourceError> {
        self.tables
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(path.to_path_buf()))
    }
}

fn read_parquet(path: &Path) -> Result<Table> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let df = ParquetReader::new(file)
        .finish()
        .with_context(|| format!("decode parquet {}", path.display()))?;
    if df.width() == 0 {
        return Err(anyhow!("{} has no columns", path.display()));
    }
    Ok(Table::from(df))
}
