//! Index tables mapping image filenames to text labels.
//!
//! An index file is a CSV with a header row whose first column names an
//! image inside the image directory and whose second column holds the text
//! label. The last column is kept separately as the tokenizer text; for
//! two-column files it is the label.

use imtext_core::{ImTextError, Result};
use std::path::{Path, PathBuf};

/// Extension of candidate index files.
pub const INDEX_EXTENSION: &str = "csv";

/// One row of an index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    /// Image filename, relative to the image directory.
    pub image: String,
    /// Text label exactly as stored in the file.
    pub label: String,
    /// Last column of the row, fed to the tokenizer update pass.
    pub text: String,
}

/// Rows of an index file, in file order.
#[derive(Debug, Clone)]
pub struct IndexTable {
    path: PathBuf,
    rows: Vec<IndexRow>,
}

fn csv_error(path: &Path, err: csv::Error) -> ImTextError {
    let msg = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => ImTextError::Io(std::io::Error::new(
            io.kind(),
            format!("Failed to read index file {}: {}", path.display(), io),
        )),
        _ => ImTextError::IndexFile(format!("{}: {}", path.display(), msg)),
    }
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))
}

impl IndexTable {
    /// Load an index table from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = reader(path)?;
        let mut rows = Vec::new();

        for (row_num, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| csv_error(path, e))?;
            if record.len() < 2 {
                return Err(ImTextError::IndexFile(format!(
                    "{}: row {} has {} column(s), expected at least 2",
                    path.display(),
                    row_num + 1,
                    record.len()
                )));
            }
            rows.push(IndexRow {
                image: record[0].to_string(),
                label: record[1].to_string(),
                text: record[record.len() - 1].to_string(),
            });
        }

        tracing::debug!(path = %path.display(), rows = rows.len(), "Loaded index table");

        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    /// Create a table from in-memory rows.
    pub fn from_rows(path: impl Into<PathBuf>, rows: Vec<IndexRow>) -> Self {
        Self {
            path: path.into(),
            rows,
        }
    }

    /// Path the table was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get a row by index.
    pub fn get(&self, index: usize) -> Option<&IndexRow> {
        self.rows.get(index)
    }

    /// All rows.
    pub fn rows(&self) -> &[IndexRow] {
        &self.rows
    }

    /// The label column, in row order.
    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    /// The last column, in row order.
    pub fn texts(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Count the data rows (header excluded) of a CSV file.
pub fn count_rows<P: AsRef<Path>>(path: P) -> Result<usize> {
    let path = path.as_ref();
    let mut rdr = reader(path)?;
    let mut count = 0;
    for record in rdr.records() {
        record.map_err(|e| csv_error(path, e))?;
        count += 1;
    }
    Ok(count)
}

/// List candidate index files directly inside `dir`.
pub fn list_index_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == INDEX_EXTENSION);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Pick the index file with the most rows in `dir`.
///
/// Ties go to the reverse-lexicographically greatest filename.
pub fn select_default_index<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let mut candidates = Vec::new();
    for path in list_index_files(dir)? {
        let rows = count_rows(&path)?;
        tracing::debug!(path = %path.display(), rows, "Index file candidate");
        candidates.push((rows, path));
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    candidates
        .into_iter()
        .next()
        .map(|(_, path)| path)
        .ok_or_else(|| ImTextError::NoIndexFile(dir.to_path_buf()))
}

/// Resolve the index file for a dataset.
///
/// An explicit name is joined onto `data_dir` and used as is; otherwise the
/// default selection runs.
pub fn resolve_index_file<P: AsRef<Path>>(data_dir: P, explicit: Option<&str>) -> Result<PathBuf> {
    let data_dir = data_dir.as_ref();
    match explicit {
        Some(name) => Ok(data_dir.join(name)),
        None => select_default_index(data_dir),
    }
}
