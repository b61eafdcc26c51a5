//! Locating the R distributions benchmarks are executed on.
//!
//! The primary entrypoint for this module is [`Distribution::locate`], which validates the home directory of the
//! selected [`Driver`] and returns a handle that knows where its `R` launcher and package library are.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use altrep_bench::{config::Driver, drivers::Distribution};
//!
//! let gnur_home = PathBuf::from("/opt/R/4.0.3");
//! let distribution = Distribution::locate(Driver::Gnur, None, Some(gnur_home.as_path()))
//!     .expect("GNU-R is not installed");
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{config::Driver, errors::Error};

pub mod packages;

/// Environment variable selecting the FastR native interface backend.
pub const FASTR_RFFI_ENV: &str = "FASTR_RFFI";

/// Options FastR passes to its own option parser.
const FASTR_OPTIONS: [&str; 1] = ["--R.PrintErrorStacktracesToFile=true"];

/// Options FastR forwards to the JVM it runs on.
const FASTR_VM_OPTIONS: [&str; 4] = [
    "--vm.Dgraal.TraceTruffleCompilation=true",
    "--vm.Dgraal.CompilationFailureAction=ExitVM",
    "--vm.da",
    "--vm.dsa",
];

/// An installed R distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Which runtime this is.
    pub driver: Driver,
    /// Root of the installation, containing `bin/R` and `library/`.
    pub home: PathBuf,
}

/// How the host runtime of a benchmark is identified in datapoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostVm {
    /// Host VM name.
    pub name: String,
    /// Host VM configuration.
    pub config: String,
    /// Native interface backend, `NA` for GNU-R.
    pub backend: String,
}

impl HostVm {
    /// Derives the host identification for a driver.
    ///
    /// `rffi` is the value of [`FASTR_RFFI_ENV`], if set; `with_compiler` tells whether FastR runs with the Graal
    /// compiler.
    #[must_use]
    pub fn new(driver: Driver, with_compiler: bool, rffi: Option<&str>) -> Self {
        match driver {
            Driver::Fastr => {
                let (name, config) = if with_compiler {
                    let suffix = rffi.map(|r| format!("-{r}")).unwrap_or_default();
                    ("jvmci".to_string(), format!("compiler{suffix}"))
                } else {
                    ("default".to_string(), "default".to_string())
                };
                Self {
                    name,
                    config,
                    backend: rffi.unwrap_or("nfi").to_string(),
                }
            }
            Driver::Gnur => Self {
                name: "gnur".to_string(),
                config: "nojit".to_string(),
                backend: "NA".to_string(),
            },
        }
    }
}

impl Distribution {
    /// Validates the home directory of the selected driver.
    ///
    /// # Errors
    ///
    /// If no home was given for the driver, or it does not contain an `R` launcher.
    pub fn locate(
        driver: Driver,
        fastr_home: Option<&Path>,
        gnur_home: Option<&Path>,
    ) -> Result<Self, Error> {
        let (home, env) = match driver {
            Driver::Fastr => (fastr_home, "FASTR_HOME"),
            Driver::Gnur => (gnur_home, "GNUR_HOME"),
        };
        let home = home.ok_or_else(|| Error::HomeNotConfigured {
            driver: driver.to_string(),
            env,
        })?;
        if !home.is_dir() {
            return Err(Error::MissingPath {
                what: "R home directory",
                path: home.to_path_buf(),
            });
        }

        let distribution = Self {
            driver,
            home: home.to_path_buf(),
        };
        let executable = distribution.executable();
        if !executable.is_file() {
            return Err(Error::MissingPath {
                what: "R executable",
                path: executable,
            });
        }

        log::info!(
            "[{driver}] using R distribution at {}",
            distribution.home.display()
        );
        Ok(distribution)
    }

    /// The `R` launcher.
    #[must_use]
    pub fn executable(&self) -> PathBuf {
        self.home.join("bin").join("R")
    }

    /// Directory packages get installed into.
    #[must_use]
    pub fn library_dir(&self) -> PathBuf {
        self.home.join("library")
    }

    /// Arguments placed before the script arguments when launching a benchmark.
    #[must_use]
    pub fn launch_args(&self) -> Vec<String> {
        match self.driver {
            Driver::Fastr => FASTR_VM_OPTIONS
                .iter()
                .chain(FASTR_OPTIONS.iter())
                .map(ToString::to_string)
                .collect(),
            Driver::Gnur => Vec::new(),
        }
    }
}
