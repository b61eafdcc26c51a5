//! Recording run results.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{CpuExt, System, SystemExt};

use crate::runs::Datapoint;

/// Description of the machine the benchmarks ran on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Host name.
    pub hostname: Option<String>,
    /// Operating system name and version.
    pub os: Option<String>,
    /// Kernel version.
    pub kernel: Option<String>,
    /// Brand string of the first CPU.
    pub cpu: Option<String>,
    /// Number of physical cores.
    pub cores: Option<usize>,
    /// Total memory in bytes.
    pub memory: u64,
}

impl SystemInfo {
    /// Collects information about the current machine.
    #[must_use]
    pub fn collect() -> Self {
        log::debug!("collecting system information...");
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        Self {
            hostname: sys.host_name(),
            os: sys.long_os_version(),
            kernel: sys.kernel_version(),
            cpu: sys.cpus().first().map(|cpu| cpu.brand().trim().to_string()),
            cores: sys.physical_core_count(),
            memory: sys.total_memory(),
        }
    }
}

/// Contents of a results file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Results {
    /// Measured datapoints.
    pub queries: Vec<Datapoint>,
    /// Machine description, if collected.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system: Option<SystemInfo>,
}

/// Name of the results file for a run started at `start_time`.
#[must_use]
pub fn file_name(start_time: DateTime<Utc>) -> String {
    format!("results.{}.json", start_time.format("%Y-%m-%dT%H-%M-%S%z"))
}

/// Writes results as pretty JSON into `output`, creating the directory if needed.
///
/// # Errors
///
/// If the directory cannot be created or the file cannot be written.
pub fn record(
    output: &Path,
    start_time: DateTime<Utc>,
    results: &Results,
) -> anyhow::Result<PathBuf> {
    let output_file_path = output.join(file_name(start_time));
    log::info!(
        "writing result output to {}...",
        output_file_path.to_string_lossy()
    );
    fs::create_dir_all(output).context("could not create output directory structure")?;
    fs::write(&output_file_path, serde_json::to_string_pretty(results)?).context(format!(
        "could not write to output file {}",
        output_file_path.to_string_lossy()
    ))?;
    Ok(output_file_path)
}
