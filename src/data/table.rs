//! Columnar tables and the tabular-accessor contract.
//!
//! Tables are loaded whole and addressed by logical name. Column types are
//! inferred the same way for every source: a column is numeric when every
//! non-missing cell parses as a float, text otherwise. Empty cells and
//! `NA`/`na` are missing. Callers must tolerate absent optional columns by
//! treating them as having no values.

use crate::data::abundance::{OmicsCategory, TaxonomicTool};
use crate::error::{CompendiumError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Logical table names understood by the accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Samples,
    Studies,
    Omics(OmicsCategory),
    Taxonomic(TaxonomicTool),
}

impl TableKind {
    /// Every table the engine declares as a cache-freshness source.
    pub fn all() -> Vec<TableKind> {
        let mut kinds = vec![Self::Samples, Self::Studies];
        kinds.extend(OmicsCategory::all().map(Self::Omics));
        kinds.extend(TaxonomicTool::all().map(Self::Taxonomic));
        kinds
    }

    /// Logical name, also the file stem used by [`DirSource`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Samples => "samples",
            Self::Studies => "studies",
            Self::Omics(category) => category.as_str(),
            Self::Taxonomic(tool) => tool.as_str(),
        }
    }

    /// Whether the table must exist for the engine to operate.
    ///
    /// Omics and taxonomic tables are optional; an absent file is an empty
    /// table. The samples table is required.
    pub fn required(&self) -> bool {
        matches!(self, Self::Samples)
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

/// An in-memory columnar table with inferred column types.
#[derive(Debug, Clone)]
pub struct Table {
    kind: TableKind,
    column_names: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell == "NA" || cell == "na"
}

impl Table {
    /// An empty table with no columns.
    pub fn empty(kind: TableKind) -> Self {
        Self {
            kind,
            column_names: Vec::new(),
            index: HashMap::new(),
            rows: Vec::new(),
        }
    }

    /// Load a table from a TSV file.
    ///
    /// First row is the header; subsequent rows are cells split on tabs.
    /// Short rows are padded with missing values.
    pub fn from_tsv<P: AsRef<Path>>(kind: TableKind, path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        let mut header: Option<Vec<String>> = None;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<String> = line.split('\t').map(|s| s.trim().to_string()).collect();
            if header.is_none() {
                header = Some(fields);
            } else {
                raw_rows.push(fields);
            }
        }

        let column_names = header
            .ok_or_else(|| CompendiumError::EmptyData(format!("table '{}' is empty", kind.as_str())))?;
        Ok(Self::from_cells(kind, column_names, raw_rows))
    }

    /// Parse a table from TSV text. Used by tests and in-memory sources.
    pub fn from_tsv_str(kind: TableKind, tsv: &str) -> Result<Self> {
        let mut lines = tsv.lines().filter(|l| !l.trim().is_empty());
        let column_names: Vec<String> = lines
            .next()
            .ok_or_else(|| CompendiumError::EmptyData(format!("table '{}' is empty", kind.as_str())))?
            .split('\t')
            .map(|s| s.trim().to_string())
            .collect();
        let raw_rows: Vec<Vec<String>> = lines
            .map(|line| line.split('\t').map(|s| s.trim().to_string()).collect())
            .collect();
        Ok(Self::from_cells(kind, column_names, raw_rows))
    }

    fn from_cells(kind: TableKind, column_names: Vec<String>, raw_rows: Vec<Vec<String>>) -> Self {
        let n_cols = column_names.len();

        // Infer column types: numeric when every non-missing cell parses.
        let mut numeric = vec![true; n_cols];
        for row in &raw_rows {
            for (col, flag) in numeric.iter_mut().enumerate() {
                if let Some(cell) = row.get(col) {
                    if !is_missing(cell) && cell.parse::<f64>().is_err() {
                        *flag = false;
                    }
                }
            }
        }

        let rows: Vec<Vec<Value>> = raw_rows
            .into_iter()
            .map(|row| {
                (0..n_cols)
                    .map(|col| {
                        let cell = row.get(col).map(String::as_str).unwrap_or("");
                        if is_missing(cell) {
                            Value::Missing
                        } else if numeric[col] {
                            cell.parse::<f64>().map(Value::Number).unwrap_or(Value::Missing)
                        } else {
                            Value::Text(cell.to_string())
                        }
                    })
                    .collect()
            })
            .collect();

        let index = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self {
            kind,
            column_names,
            index,
            rows,
        }
    }

    /// Logical table name.
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Column names in file order.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Cell value; `Missing` when the column is absent.
    pub fn value(&self, row: usize, column: &str) -> &Value {
        self.index
            .get(column)
            .and_then(|&col| self.rows.get(row).map(|r| &r[col]))
            .unwrap_or(&Value::Missing)
    }

    /// Numeric cell value, if present. Text cells in a numeric position
    /// and absent columns both yield `None`.
    pub fn numeric(&self, row: usize, column: &str) -> Option<f64> {
        match self.value(row, column) {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text cell value, if present. Numeric columns are not stringified.
    pub fn text(&self, row: usize, column: &str) -> Option<&str> {
        match self.value(row, column) {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text cell value, empty string when missing or absent.
    pub fn text_or_empty(&self, row: usize, column: &str) -> String {
        self.text(row, column).unwrap_or("").to_string()
    }

    /// Integer cell value, zero when missing, absent, or fractional.
    pub fn integer_or_zero(&self, row: usize, column: &str) -> i64 {
        self.numeric(row, column)
            .filter(|v| v.is_finite())
            .map(|v| v as i64)
            .unwrap_or(0)
    }

    /// Require a column, erroring with the table name when absent.
    pub fn require_column(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(CompendiumError::MissingColumn {
                table: self.kind.as_str().to_string(),
                column: name.to_string(),
            })
        }
    }
}

/// The tabular-accessor contract: typed tables addressed by logical name,
/// plus a freshness oracle over the backing storage.
pub trait TableSource: Send + Sync {
    /// Load a table. Optional tables that do not exist load as empty.
    fn load(&self, kind: TableKind) -> Result<Table>;

    /// Maximum modification time (epoch seconds) across the given tables.
    /// Tables with no backing storage are skipped.
    fn max_modification_time(&self, kinds: &[TableKind]) -> Result<f64>;
}

/// A [`TableSource`] over a directory of TSV files, one per logical table
/// (`samples.tsv`, `metabolomics.tsv`, ...).
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, kind: TableKind) -> PathBuf {
        self.dir.join(format!("{}.tsv", kind.as_str()))
    }
}

/// A [`TableSource`] over in-memory TSV text, with an explicit freshness
/// clock. Useful for embedding and for tests that need to advance source
/// freshness without touching the filesystem.
///
/// Handles are cheap clones sharing the same tables and clock.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: std::sync::Arc<std::sync::Mutex<HashMap<&'static str, String>>>,
    modified: std::sync::Arc<std::sync::Mutex<f64>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a table's TSV content, builder style.
    pub fn with_table(self, kind: TableKind, tsv: &str) -> Self {
        self.set_table(kind, tsv);
        self
    }

    /// Replace a table's TSV content.
    pub fn set_table(&self, kind: TableKind, tsv: &str) {
        self.tables
            .lock()
            .expect("table lock poisoned")
            .insert(kind.as_str(), tsv.to_string());
    }

    /// Advance the freshness clock (epoch seconds).
    pub fn set_modified(&self, modified: f64) {
        *self.modified.lock().expect("clock lock poisoned") = modified;
    }
}

impl TableSource for MemorySource {
    fn load(&self, kind: TableKind) -> Result<Table> {
        let tables = self.tables.lock().expect("table lock poisoned");
        match tables.get(kind.as_str()) {
            Some(tsv) => Table::from_tsv_str(kind, tsv),
            None if kind.required() => Err(CompendiumError::MissingTable(kind.as_str().to_string())),
            None => Ok(Table::empty(kind)),
        }
    }

    fn max_modification_time(&self, _kinds: &[TableKind]) -> Result<f64> {
        Ok(*self.modified.lock().expect("clock lock poisoned"))
    }
}

impl TableSource for DirSource {
    fn load(&self, kind: TableKind) -> Result<Table> {
        let path = self.path(kind);
        if !path.exists() {
            if kind.required() {
                return Err(CompendiumError::MissingTable(kind.as_str().to_string()));
            }
            log::debug!("table '{}' absent, treating as empty", kind.as_str());
            return Ok(Table::empty(kind));
        }
        Table::from_tsv(kind, path)
    }

    fn max_modification_time(&self, kinds: &[TableKind]) -> Result<f64> {
        let mut latest = 0.0f64;
        for &kind in kinds {
            let path = self.path(kind);
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            let mtime = meta
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            latest = latest.max(mtime);
        }
        Ok(latest)
    }
}
