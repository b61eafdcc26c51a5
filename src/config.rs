//! Per-invocation benchmark configuration.
//!
//! [`BenchArgs`] is parsed once from the command line and passed by reference to everything that needs it, it is
//! never mutated afterwards.

use std::fmt::{self, Display, Formatter};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Hard ceiling on the number of timed steps, also the size of the preallocated timestamp buffer.
pub const DEFAULT_STEP_CEILING: u64 = 100_000_000;

/// Longest accepted warmup or measure window, in seconds (one year).
pub const MAX_WINDOW_SECONDS: u64 = 365 * 24 * 60 * 60;

/// R distribution a benchmark is executed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// FastR, the GraalVM based R runtime under test.
    Fastr,
    /// Stock GNU-R, used as the reference.
    Gnur,
}

impl Display for Driver {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Fastr => write!(f, "fastr"),
            Driver::Gnur => write!(f, "gnur"),
        }
    }
}

/// Parameters of a single benchmark invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::Args)]
pub struct BenchArgs {
    /// Driver to run
    #[arg(short, long, value_enum, default_value_t = Driver::Fastr)]
    pub driver: Driver,

    /// Length of the data, fractional values are floored
    #[arg(short = 'l', long = "length", default_value = "1e7", value_parser = parse_data_length)]
    pub data_length: u64,

    /// Number of iterations of the outer loop inside one benchmark step
    #[arg(short, long, default_value_t = 5)]
    pub iterations: u64,

    /// Also run the baseline variant of the benchmark, if it defines one
    #[arg(short = 'b', long = "baseline")]
    pub run_with_baseline: bool,

    /// Warmup time in seconds
    #[arg(
        short,
        long,
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(..=MAX_WINDOW_SECONDS)
    )]
    pub warmup: u64,

    /// Measure time in seconds
    #[arg(
        short,
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(..=MAX_WINDOW_SECONDS)
    )]
    pub measure: u64,

    /// Maximum number of timed steps before the run is considered degenerate
    #[arg(long, default_value_t = DEFAULT_STEP_CEILING)]
    pub step_ceiling: u64,
}

impl BenchArgs {
    /// Wall-clock length of the timed loop, warmup included.
    ///
    /// Saturates instead of wrapping.
    #[must_use]
    pub fn total_seconds(&self) -> u64 {
        self.warmup.saturating_add(self.measure)
    }
}

impl Default for BenchArgs {
    fn default() -> Self {
        Self {
            driver: Driver::Fastr,
            data_length: 10_000_000,
            iterations: 5,
            run_with_baseline: false,
            warmup: 5,
            measure: 10,
            step_ceiling: DEFAULT_STEP_CEILING,
        }
    }
}

/// Parses a data length given as a float (`1e7`, `2.5`) and floors it.
///
/// # Errors
///
/// Fails on anything that is not a finite, non-negative number.
pub fn parse_data_length(s: &str) -> Result<u64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|err| format!("invalid data length '{s}': {err}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("data length must be a finite non-negative number, got '{s}'"));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value.floor() as u64)
}
