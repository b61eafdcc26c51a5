//! Utilities for finding benchmark definitions.
//!
//! A benchmark is defined by an R fragment named `<benchmark>.r` living in a definitions directory. The fragment
//! must define `benchmark_func(benchmark_func_args)`, and may also define `setup_func` and `baseline_func`. The
//! fragment is embedded verbatim into the driver script produced by [`script::generate`].
//!
//! # Examples
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use altrep_bench::benchmarks::find_all;
//!
//! let path = PathBuf::from("benchmarks");
//!
//! let benchmarks = find_all(&path);
//! ```

use std::{
    fmt::{self, Display, Formatter},
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

pub mod script;

/// Glob pattern for benchmark definition files.
pub const FILE_PATTERN: &str = "*.r";

/// File extension of benchmark definition files.
pub const FILE_EXTENSION: &str = "r";

/// Unique identifier for a benchmark.
///
/// # Examples
///
/// ```
/// use altrep_bench::benchmarks::Identifier;
///
/// let identifier = Identifier::from("iterate-elt");
///
/// assert_eq!(identifier.to_string(), "iterate-elt");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(String);

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A benchmark that can be handed to a driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benchmark {
    /// Unique identifier for this benchmark, the file stem of its definition.
    pub identifier: Identifier,
    /// Path to the R fragment defining `benchmark_func`.
    pub definition_path: PathBuf,
}

impl Benchmark {
    /// Reads the R fragment of this benchmark.
    ///
    /// # Errors
    ///
    /// If the definition file cannot be read.
    pub fn definition(&self) -> anyhow::Result<String> {
        fs::read_to_string(&self.definition_path).with_context(|| {
            format!(
                "could not read benchmark definition {}",
                self.definition_path.display()
            )
        })
    }
}

/// Finds all benchmark definitions directly under the given path, sorted by identifier.
///
/// # Errors
///
/// If the path is not a directory or the glob pattern cannot be constructed. Entries that cannot be read are logged
/// and skipped.
pub fn find_all(path: &Path) -> anyhow::Result<Vec<Benchmark>> {
    log::info!("finding all benchmark definitions under {}...", path.display());
    if !path.is_dir() {
        return Err(Error::MissingPath {
            what: "benchmark definitions directory",
            path: path.to_path_buf(),
        }
        .into());
    }

    let mut benchmarks: Vec<Benchmark> = glob::glob(
        path.join(FILE_PATTERN)
            .to_str()
            .context("could not convert benchmark definition pattern to string")?,
    )
    .context("searching for all benchmark definition files")?
    .filter_map(|r| {
        let path = r
            .map_err(|err| {
                log::warn!("could not get globbed path: {err}, skipping...");
            })
            .ok()?;
        if !path.is_file() {
            log::debug!("{} is not a file, skipping...", path.display());
            return None;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).or_else(|| {
            log::warn!(
                "could not get benchmark name from {}, skipping...",
                path.display()
            );
            None
        })?;

        log::debug!("found benchmark definition ({})", path.display());
        Some(Benchmark {
            identifier: Identifier::from(stem),
            definition_path: path.clone(),
        })
    })
    .collect();
    benchmarks.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    log::info!("found {} benchmark definitions", benchmarks.len());
    log::trace!("benchmarks: {benchmarks:#?}");

    Ok(benchmarks)
}

/// Finds the definition of a single benchmark by name.
///
/// # Errors
///
/// If no `<name>.r` file exists under the given path.
pub fn find(path: &Path, name: &str) -> anyhow::Result<Benchmark> {
    let definition_path = path.join(format!("{name}.{FILE_EXTENSION}"));
    if !definition_path.is_file() {
        return Err(Error::BenchmarkNotFound {
            name: name.to_string(),
            path: path.to_path_buf(),
        }
        .into());
    }
    log::debug!("[{name}] using definition {}", definition_path.display());
    Ok(Benchmark {
        identifier: Identifier::from(name),
        definition_path,
    })
}
