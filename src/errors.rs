//! Error taxonomy for a benchmark invocation.
//!
//! Errors fall into three groups: the environment is not set up (missing R homes, packages or definitions), the R
//! process reported a failure, or the produced measurements cannot be trusted. None of them are retried.

use std::path::PathBuf;

/// Errors raised while locating, running and scoring a benchmark.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required directory or file is not where it should be.
    #[error("could not find {what} at {path}")]
    MissingPath {
        /// Human readable description of the thing that is missing.
        what: &'static str,
        /// Path that was checked.
        path: PathBuf,
    },

    /// No home directory was given for the selected R distribution.
    #[error("no home directory configured for {driver}, pass --{driver}-home or set {env}")]
    HomeNotConfigured {
        /// Name of the driver.
        driver: String,
        /// Environment variable that can also carry the home directory.
        env: &'static str,
    },

    /// The requested benchmark has no definition file.
    #[error("unknown benchmark {name}, no definition found under {path}")]
    BenchmarkNotFound {
        /// Requested benchmark name.
        name: String,
        /// Definitions directory that was searched.
        path: PathBuf,
    },

    /// More than one benchmark was requested in a single invocation.
    #[error("only one benchmark can be run at a time, got {count}")]
    MultipleBenchmarks {
        /// Number of requested benchmarks.
        count: usize,
    },

    /// `R CMD INSTALL` did not succeed.
    #[error("installing package {package} failed with {status}")]
    InstallFailed {
        /// Path of the package that was being installed.
        package: PathBuf,
        /// Exit status of the installer.
        status: std::process::ExitStatus,
    },

    /// The R process printed a line matching one of the failure patterns.
    #[error("benchmark run failed: {line}")]
    ExecutionFailed {
        /// First offending output line.
        line: String,
    },

    /// The results marker or the line after it never showed up.
    #[error("no '{marker}' section found in the benchmark output")]
    MissingResults {
        /// Marker that was searched for.
        marker: &'static str,
    },

    /// The line following the marker is not `start end steps`.
    #[error("malformed results header '{line}', expected exactly three fields: start end steps")]
    MalformedHeader {
        /// Offending header line.
        line: String,
    },

    /// A timestamp line could not be parsed.
    #[error("malformed timestamp '{line}'")]
    MalformedTimestamp {
        /// Offending line.
        line: String,
    },

    /// The loop ran more steps than the timestamp buffer can hold.
    #[error(
        "too many iterations ({steps} > {ceiling}), the benchmark step is too fast for the configured window; \
         shorten --warmup/--measure, raise --iterations or adjust --step-ceiling"
    )]
    TooManyIterations {
        /// Reported step count.
        steps: u64,
        /// Configured ceiling.
        ceiling: u64,
    },

    /// The number of collected timestamps does not match the reported step count.
    #[error("expected {steps} timestamps but the output contained {collected}")]
    StepCountMismatch {
        /// Reported step count.
        steps: u64,
        /// Number of timestamps that were collected.
        collected: usize,
    },

    /// Not enough timestamps fell after the warmup window.
    #[error(
        "insufficient measurements: only {measurements} timestamp(s) after the {warmup}s warmup, at least 2 are \
         needed; use a longer --measure window"
    )]
    InsufficientMeasurements {
        /// Number of post-warmup timestamps.
        measurements: usize,
        /// Warmup window in seconds.
        warmup: u64,
    },

    /// Two consecutive measurement timestamps are not strictly increasing.
    #[error(
        "timestamps {previous} and {next} are not strictly increasing, the benchmark step is below the timer \
         resolution; raise --iterations"
    )]
    NonMonotonicTimestamps {
        /// Earlier timestamp.
        previous: f64,
        /// Later timestamp.
        next: f64,
    },
}
