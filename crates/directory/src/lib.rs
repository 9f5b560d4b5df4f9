mod models;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use models::{Department, DepartmentSummary, RosterView, StudentRecord};

pub const DEFAULT_DATA_PATH: &str = "data/directory.json";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed reading directory dataset at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed directory dataset: {0}")]
    DataFormat(String),
}

/// Read-only view over one loaded department dataset.
///
/// Derived views are computed on first use and kept for the lifetime of the
/// value, so repeated summary or name lookups never re-walk the dataset.
#[derive(Debug)]
pub struct Directory {
    departments: Vec<Department>,
    fingerprint: String,
    serialized: String,
    names: OnceCell<Vec<String>>,
    summaries: OnceCell<Vec<DepartmentSummary>>,
}

impl Directory {
    pub fn from_json_str(raw: &str) -> Result<Self, DirectoryError> {
        let dataset: Value = serde_json::from_str(raw).map_err(data_format)?;
        let serialized = serde_json::to_string_pretty(&dataset).map_err(data_format)?;
        let departments: Vec<Department> =
            serde_json::from_value(dataset).map_err(data_format)?;
        Self::build(departments, serialized, content_fingerprint(raw.as_bytes()))
    }

    fn build(
        departments: Vec<Department>,
        serialized: String,
        fingerprint: String,
    ) -> Result<Self, DirectoryError> {
        let mut seen = HashSet::new();
        for department in &departments {
            if !seen.insert(department.name.as_str()) {
                return Err(DirectoryError::DataFormat(format!(
                    "duplicate department name: {}",
                    department.name
                )));
            }
        }

        Ok(Self {
            departments,
            fingerprint,
            serialized,
            names: OnceCell::new(),
            summaries: OnceCell::new(),
        })
    }

    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    pub fn len(&self) -> usize {
        self.departments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    pub fn department(&self, name: &str) -> Option<&Department> {
        self.departments.iter().find(|dept| dept.name == name)
    }

    pub fn department_names(&self) -> &[String] {
        self.names.get_or_init(|| {
            self.departments
                .iter()
                .map(|dept| dept.name.clone())
                .collect()
        })
    }

    pub fn summarize(&self) -> &[DepartmentSummary] {
        self.summaries.get_or_init(|| {
            self.departments
                .iter()
                .map(DepartmentSummary::from)
                .collect()
        })
    }

    /// Unknown department names yield an empty roster.
    pub fn students_of(&self, name: &str) -> &[StudentRecord] {
        self.department(name)
            .map(|dept| dept.students.as_slice())
            .unwrap_or(&[])
    }

    pub fn roster_view<'a>(&'a self, name: &'a str) -> RosterView<'a> {
        RosterView::new(name, self.students_of(name))
    }

    /// Pretty-printed JSON of the whole dataset, used as model context.
    pub fn serialized(&self) -> &str {
        &self.serialized
    }

    /// Hex SHA-256 of the content the directory was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

pub fn load_directory(path: impl AsRef<Path>) -> Result<Directory, DirectoryError> {
    let raw = read_dataset(path.as_ref())?;
    Directory::from_json_str(&raw)
}

/// Process-wide memo of loaded datasets keyed by content hash.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    entries: Mutex<HashMap<String, Arc<Directory>>>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<Directory>, DirectoryError> {
        let raw = read_dataset(path.as_ref())?;
        let fingerprint = content_fingerprint(raw.as_bytes());

        if let Some(existing) = self.entries.lock().get(&fingerprint) {
            return Ok(existing.clone());
        }

        let directory = Arc::new(Directory::from_json_str(&raw)?);
        self.entries
            .lock()
            .entry(fingerprint)
            .or_insert_with(|| directory.clone());
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn read_dataset(path: &Path) -> Result<String, DirectoryError> {
    fs::read_to_string(path).map_err(|source| DirectoryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn data_format(err: serde_json::Error) -> DirectoryError {
    DirectoryError::DataFormat(err.to_string())
}

fn content_fingerprint(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
