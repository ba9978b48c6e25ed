//! Where the CSV text comes from.
use crate::datasets::{parse_csv, ParsedCsv};
use crate::error::DataError;
use log::info;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A fetch result: a status code in the HTTP sense plus the body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    pub body: String,
}

impl Fetched {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Supplier of the raw dataset text.
pub trait DataSource {
    /// Name shown in status messages and errors, e.g. `Iris.csv`.
    fn name(&self) -> &str;
    fn fetch(&self) -> io::Result<Fetched>;
}

/// Reads a local file. A missing file answers with status 404.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> io::Result<Fetched> {
        match fs::read_to_string(&self.path) {
            Ok(body) => Ok(Fetched::ok(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Fetched {
                status: 404,
                body: String::new(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Fixed in-memory response.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    response: Fetched,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: Fetched::ok(body),
        }
    }

    pub fn with_status(name: impl Into<String>, status: u16) -> Self {
        Self {
            name: name.into(),
            response: Fetched {
                status,
                body: String::new(),
            },
        }
    }
}

impl DataSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> io::Result<Fetched> {
        Ok(self.response.clone())
    }
}

/// Fetch and parse. Non-success statuses and read failures are [`DataError`]s
/// naming the source.
pub fn load_dataset(source: &dyn DataSource) -> Result<ParsedCsv, DataError> {
    info!("Loading {}...", source.name());
    let fetched = source.fetch().map_err(|e| DataError::Io {
        resource: source.name().to_string(),
        source: e,
    })?;
    if !fetched.is_success() {
        return Err(DataError::Unreachable {
            resource: source.name().to_string(),
            status: fetched.status,
        });
    }
    parse_csv(&fetched.body)
}
