//! Orchestration for running a benchmark on a distribution.
//!
//! The primary function is [`execute_single`]: it generates the driver script, launches the R process, consumes its
//! output line by line while it runs and turns the timestamps into a [`Datapoint`]. Only one benchmark runs per
//! invocation, see [`select`].
//!
//! # Examples
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use altrep_bench::{
//!     benchmarks,
//!     config::{BenchArgs, Driver},
//!     drivers::Distribution,
//!     runs::{execute_single, RunOptions},
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let args = BenchArgs { driver: Driver::Gnur, ..BenchArgs::default() };
//! let distribution = Distribution::locate(Driver::Gnur, None, Some(PathBuf::from("/opt/R").as_path()))?;
//! let benchmark = benchmarks::find(&PathBuf::from("benchmarks"), "iterate-elt")?;
//!
//! let datapoint = execute_single(&distribution, &benchmark, &args, &RunOptions::default()).await?;
//! #     Ok(())
//! # }
//! ```

use std::{
    fmt::{self, Display, Formatter},
    io::Write,
    pin::pin,
    process::Stdio,
};

use anyhow::Context;
use futures::{stream, Stream, StreamExt};
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::Command,
};

use crate::{
    benchmarks::{
        script::{self, BASELINE_MARKER, BENCHMARK_MARKER},
        Benchmark, Identifier as BenchmarkIdentifier,
    },
    config::{BenchArgs, Driver},
    drivers::{Distribution, HostVm},
    errors::Error,
};

pub mod output;
pub mod score;

use output::OutputCapture;

/// Output lines that mark a run as failed, whatever else it printed.
pub const FAILURE_PATTERNS: [&str; 9] = [
    r"Error in",
    r"internal error:",
    r"A fatal error has been detected by the Java Runtime Environment",
    r"Compilation of .* failed",
    r"at com\.oracle\.truffle\.api\.CompilerAsserts",
    r"To disable compilation failure notifications",
    r"ERROR: benchmark has returned zero result",
    r"WARMUP ERROR",
    r"MEASURE ERROR",
];

/// Unique identifier for this run.
///
/// # Examples
///
/// ```
/// use altrep_bench::runs::Identifier;
///
/// let identifier = Identifier::from(format!("{}_{}", "gnur", "iterate-elt"));
///
/// assert_eq!(identifier.to_string(), "gnur_iterate-elt");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
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

/// Settings of a run that are not benchmark parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// FastR runs with the Graal compiler.
    pub with_compiler: bool,
    /// Value of `FASTR_RFFI`, if set.
    pub rffi: Option<String>,
}

/// One measured result, flat, the way a benchmark database stores it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Runtime that executed the benchmark.
    pub vm: Driver,
    /// `core` with the Graal compiler, `default` otherwise.
    #[serde(rename = "config.name")]
    pub config_name: String,
    /// Length of the benchmarked vector.
    #[serde(rename = "config.data-length")]
    pub data_length: u64,
    /// Warmup window in seconds.
    #[serde(rename = "config.warmup")]
    pub warmup: u64,
    /// Measure window in seconds.
    #[serde(rename = "config.measure")]
    pub measure: u64,
    /// Outer loop iterations inside one step.
    #[serde(rename = "config.iterations")]
    pub iterations: u64,
    /// Host VM name.
    #[serde(rename = "host-vm")]
    pub host_vm: String,
    /// Host VM configuration.
    #[serde(rename = "host-vm-config")]
    pub host_vm_config: String,
    /// Native interface backend.
    #[serde(rename = "host-vm-backend")]
    pub host_vm_backend: String,
    /// Benchmark name.
    pub benchmark: BenchmarkIdentifier,
    /// Always `throughput`.
    #[serde(rename = "metric.name")]
    pub metric_name: String,
    /// Steps per second.
    #[serde(rename = "metric.value")]
    pub metric_value: f64,
    /// Always `id`.
    #[serde(rename = "metric.score-function")]
    pub metric_score_function: String,
    /// Always `higher`.
    #[serde(rename = "metric.better")]
    pub metric_better: String,
    /// Always `op/s`.
    #[serde(rename = "metric.unit")]
    pub metric_unit: String,
    /// Number of post-warmup timestamps the value was computed from.
    #[serde(rename = "metric.count")]
    pub metric_count: usize,
    /// Throughput of the baseline variant, if one ran.
    #[serde(rename = "baseline.score", skip_serializing_if = "Option::is_none", default)]
    pub baseline_score: Option<f64>,
}

impl Datapoint {
    /// Builds the datapoint for a scored run.
    #[must_use]
    pub fn new(
        benchmark: &Benchmark,
        args: &BenchArgs,
        options: &RunOptions,
        score: &score::Score,
        baseline: Option<&score::Score>,
    ) -> Self {
        let host = HostVm::new(args.driver, options.with_compiler, options.rffi.as_deref());
        Self {
            vm: args.driver,
            config_name: if options.with_compiler { "core" } else { "default" }.to_string(),
            data_length: args.data_length,
            warmup: args.warmup,
            measure: args.measure,
            iterations: args.iterations,
            host_vm: host.name,
            host_vm_config: host.config,
            host_vm_backend: host.backend,
            benchmark: benchmark.identifier.clone(),
            metric_name: "throughput".to_string(),
            metric_value: score.throughput,
            metric_score_function: "id".to_string(),
            metric_better: "higher".to_string(),
            metric_unit: "op/s".to_string(),
            metric_count: score.measurements,
            baseline_score: baseline.map(|b| b.throughput),
        }
    }
}

/// Picks the single benchmark to run out of the requested names.
///
/// # Errors
///
/// If more than one name was requested.
pub fn select(names: &[String]) -> Result<Option<&str>, Error> {
    match names {
        [] => Ok(None),
        [name] => Ok(Some(name.as_str())),
        _ => Err(Error::MultipleBenchmarks { count: names.len() }),
    }
}

/// Stream an output line was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// The report and anything R prints.
    Stdout,
    /// Runtime diagnostics, compilation traces and warnings.
    Stderr,
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stdout => write!(f, "stdout"),
            Source::Stderr => write!(f, "stderr"),
        }
    }
}

/// Consumer of the combined output of one run.
///
/// Checks lines of both streams against [`FAILURE_PATTERNS`], remembering the first match. Only stdout lines reach
/// the report captures.
#[derive(Debug)]
pub struct RunOutput {
    failures: RegexSet,
    benchmark: OutputCapture,
    baseline: Option<OutputCapture>,
    failure: Option<String>,
    parse_error: Option<Error>,
}

impl RunOutput {
    /// Creates a consumer, tracking the baseline report as well if `with_baseline`.
    ///
    /// # Errors
    ///
    /// If the failure patterns do not compile.
    pub fn new(with_baseline: bool) -> anyhow::Result<Self> {
        Ok(Self {
            failures: RegexSet::new(FAILURE_PATTERNS)
                .context("could not compile failure patterns")?,
            benchmark: OutputCapture::new(BENCHMARK_MARKER),
            baseline: with_baseline.then(|| OutputCapture::new(BASELINE_MARKER)),
            failure: None,
            parse_error: None,
        })
    }

    /// Consumes one output line read from `source`.
    pub fn feed(&mut self, source: Source, line: &str) {
        if self.failure.is_none() && self.failures.is_match(line) {
            self.failure = Some(line.to_string());
        }
        if source != Source::Stdout || self.parse_error.is_some() {
            return;
        }
        let fed = self
            .baseline
            .as_mut()
            .map_or(Ok(()), |baseline| baseline.feed(line))
            .and_then(|()| self.benchmark.feed(line));
        if let Err(err) = fed {
            self.parse_error = Some(err);
        }
    }

    /// Finalizes the run once the process has exited, returning the benchmark and baseline scores.
    ///
    /// A missing baseline report is not an error, the benchmark may simply not define one.
    ///
    /// # Errors
    ///
    /// If a failure pattern matched, the output could not be parsed, or a report does not score.
    pub fn finish(self, args: &BenchArgs) -> Result<(score::Score, Option<score::Score>), Error> {
        if let Some(line) = self.failure {
            return Err(Error::ExecutionFailed { line });
        }
        if let Some(err) = self.parse_error {
            return Err(err);
        }

        let baseline = match self.baseline.map(OutputCapture::finish) {
            Some(Ok(report)) => Some(score::score(&report, args.warmup, args.step_ceiling)?),
            Some(Err(Error::MissingResults { .. })) | None => None,
            Some(Err(err)) => return Err(err),
        };
        let report = self.benchmark.finish()?;
        let benchmark = score::score(&report, args.warmup, args.step_ceiling)?;
        Ok((benchmark, baseline))
    }
}

fn lines<R: AsyncBufRead + Unpin>(reader: R) -> impl Stream<Item = std::io::Result<String>> {
    stream::unfold(reader.lines(), |mut lines| async move {
        lines.next_line().await.transpose().map(|line| (line, lines))
    })
}

/// Runs a benchmark on a distribution and scores it.
///
/// # Errors
///
/// If the definition cannot be read, the process cannot be launched, the output matches a failure pattern, or the
/// measurements are not valid. No partial result is returned in any of these cases.
pub async fn execute_single(
    distribution: &Distribution,
    benchmark: &Benchmark,
    args: &BenchArgs,
    options: &RunOptions,
) -> anyhow::Result<Datapoint> {
    let run_identifier = Identifier(format!("{}_{}", distribution.driver, benchmark.identifier));

    let text = script::generate(args, &benchmark.identifier, &benchmark.definition()?);
    let mut script_file = tempfile::Builder::new()
        .prefix("altrep-bench-")
        .suffix(".R")
        .tempfile()
        .context("could not create driver script file")?;
    script_file
        .write_all(text.as_bytes())
        .and_then(|()| script_file.flush())
        .context("could not write driver script")?;
    log::trace!("[{run_identifier}] driver script\n{text}");

    let mut cmd = distribution.launch_args();
    cmd.extend(["--slave".to_string(), "--vanilla".to_string(), "-f".to_string()]);
    cmd.push(script_file.path().display().to_string());

    log::info!(
        "[{run_identifier}] running benchmark ({}) on {} for {}s (warmup {}s)...",
        benchmark.identifier,
        distribution.driver,
        args.total_seconds(),
        args.warmup
    );
    log::debug!("[{run_identifier}] arguments: {cmd:?}");

    let mut child = Command::new(distribution.executable())
        .args(&cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("could not launch {}", distribution.executable().display()))?;
    let stdout = child.stdout.take().context("could not capture stdout")?;
    let stderr = child.stderr.take().context("could not capture stderr")?;

    let mut output = RunOutput::new(args.run_with_baseline)?;
    let mut merged = pin!(stream::select(
        lines(BufReader::new(stdout)).map(|line| (Source::Stdout, line)),
        lines(BufReader::new(stderr)).map(|line| (Source::Stderr, line)),
    ));
    while let Some((source, line)) = merged.next().await {
        let line = line.with_context(|| format!("could not read benchmark {source}"))?;
        log::debug!("[{run_identifier}] {source}: {line}");
        output.feed(source, &line);
    }

    let status = child.wait().await.context("could not wait for benchmark process")?;
    if status.success() {
        log::debug!("[{run_identifier}] process exited cleanly");
    } else {
        log::warn!(
            "[{run_identifier}] process exited with {status}, judging the run by its output..."
        );
    }

    let (score, baseline) = output.finish(args)?;
    log::info!(
        "[{run_identifier}] {} steps measured, {:.3} op/s (step {:?})",
        score.measurements,
        score.throughput,
        std::time::Duration::from_secs_f64(score.step_duration)
    );
    if let Some(baseline) = &baseline {
        log::info!(
            "[{run_identifier}] baseline score: {:.3} op/s",
            baseline.throughput
        );
    }

    Ok(Datapoint::new(
        benchmark,
        args,
        options,
        &score,
        baseline.as_ref(),
    ))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn args() -> BenchArgs {
        BenchArgs {
            warmup: 1,
            measure: 3,
            ..BenchArgs::default()
        }
    }

    fn feed_all(output: &mut RunOutput, lines: &[&str]) {
        for line in lines {
            output.feed(Source::Stdout, line);
        }
    }

    #[test]
    fn select_rejects_multiple_benchmarks() {
        assert_eq!(select(&[]).unwrap(), None);
        assert_eq!(select(&["try".to_string()]).unwrap(), Some("try"));
        assert!(matches!(
            select(&["a".to_string(), "b".to_string()]),
            Err(Error::MultipleBenchmarks { count: 2 })
        ));
    }

    #[test]
    fn scores_benchmark_report() {
        let mut output = RunOutput::new(false).unwrap();
        feed_all(
            &mut output,
            &["benchmark results:", "0 4 4", "1.0", "2.0", "2.5", "3.0"],
        );
        let (score, baseline) = output.finish(&args()).unwrap();
        assert_eq!(score.measurements, 3);
        assert!((score.throughput - 2.0).abs() < 1e-9);
        assert!(baseline.is_none());
    }

    #[test]
    fn scores_baseline_when_present() {
        let mut output = RunOutput::new(true).unwrap();
        feed_all(
            &mut output,
            &[
                "baseline results:",
                "0 4 3",
                "2",
                "3",
                "4",
                "benchmark results:",
                "10 14 3",
                "12",
                "12.5",
                "13",
            ],
        );
        let (score, baseline) = output.finish(&args()).unwrap();
        assert!((score.throughput - 2.0).abs() < 1e-9);
        assert!((baseline.unwrap().throughput - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_baseline_is_tolerated() {
        let mut output = RunOutput::new(true).unwrap();
        feed_all(&mut output, &["benchmark results:", "0 4 3", "2", "3", "4"]);
        let (_, baseline) = output.finish(&args()).unwrap();
        assert!(baseline.is_none());
    }

    #[test]
    fn failure_patterns_fail_the_run() {
        for line in [
            "Error in benchmark_func(benchmark_func_args) : object 'x' not found",
            "Compilation of RootNode@1234 failed",
            "\tat com.oracle.truffle.api.CompilerAsserts.neverPartOfCompilation(CompilerAsserts.java:52)",
            "ERROR: benchmark has returned zero result",
            "MEASURE ERROR: too many iterations (more than 100 steps)",
        ] {
            let mut output = RunOutput::new(false).unwrap();
            feed_all(
                &mut output,
                &["benchmark results:", "0 4 3", "2", "3", "4", line],
            );
            let err = output.finish(&args()).unwrap_err();
            assert!(
                matches!(&err, Error::ExecutionFailed { line: l } if l == line),
                "line {line:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn stderr_lines_do_not_reach_the_report() {
        let mut output = RunOutput::new(false).unwrap();
        feed_all(&mut output, &["benchmark results:", "0 4 4", "1.0", "2.0"]);
        output.feed(Source::Stderr, "[engine] opt done id=1 run_timed_loop");
        output.feed(Source::Stderr, "Warning message:");
        feed_all(&mut output, &["2.5", "3.0"]);

        let (score, _) = output.finish(&args()).unwrap();
        assert_eq!(score.measurements, 3);
        assert!((score.throughput - 2.0).abs() < 1e-9);
    }

    #[test]
    fn failure_on_stderr_fails_the_run() {
        let mut output = RunOutput::new(false).unwrap();
        feed_all(&mut output, &["benchmark results:", "0 4 3", "2", "3", "4"]);
        output.feed(Source::Stderr, "Compilation of run_timed_loop failed");
        assert!(matches!(
            output.finish(&args()).unwrap_err(),
            Error::ExecutionFailed { .. }
        ));
    }

    #[test]
    fn parse_errors_surface() {
        let mut output = RunOutput::new(false).unwrap();
        feed_all(&mut output, &["benchmark results:", "0 4"]);
        assert!(matches!(
            output.finish(&args()).unwrap_err(),
            Error::MalformedHeader { .. }
        ));
    }

    #[test]
    fn datapoint_fields() {
        let benchmark = Benchmark {
            identifier: BenchmarkIdentifier::from("iterate-elt"),
            definition_path: PathBuf::from("benchmarks/iterate-elt.r"),
        };
        let score = score::Score {
            throughput: 12.5,
            step_duration: 0.08,
            measurements: 40,
        };
        let datapoint = Datapoint::new(
            &benchmark,
            &BenchArgs {
                driver: Driver::Gnur,
                data_length: 1000,
                ..args()
            },
            &RunOptions::default(),
            &score,
            None,
        );

        let json = serde_json::to_value(&datapoint).unwrap();
        assert_eq!(json["vm"], "gnur");
        assert_eq!(json["config.name"], "default");
        assert_eq!(json["config.data-length"], 1000);
        assert_eq!(json["config.warmup"], 1);
        assert_eq!(json["config.measure"], 3);
        assert_eq!(json["config.iterations"], 5);
        assert_eq!(json["host-vm"], "gnur");
        assert_eq!(json["host-vm-config"], "nojit");
        assert_eq!(json["host-vm-backend"], "NA");
        assert_eq!(json["benchmark"], "iterate-elt");
        assert_eq!(json["metric.name"], "throughput");
        assert_eq!(json["metric.value"], 12.5);
        assert_eq!(json["metric.score-function"], "id");
        assert_eq!(json["metric.better"], "higher");
        assert_eq!(json["metric.unit"], "op/s");
        assert_eq!(json["metric.count"], 40);
        assert!(json.get("baseline.score").is_none());
    }

    #[test]
    fn datapoint_with_compiler_and_baseline() {
        let benchmark = Benchmark {
            identifier: BenchmarkIdentifier::from("iterate-elt"),
            definition_path: PathBuf::from("benchmarks/iterate-elt.r"),
        };
        let score = score::Score {
            throughput: 10.0,
            step_duration: 0.1,
            measurements: 5,
        };
        let baseline = score::Score {
            throughput: 20.0,
            step_duration: 0.05,
            measurements: 9,
        };
        let datapoint = Datapoint::new(
            &benchmark,
            &args(),
            &RunOptions {
                with_compiler: true,
                rffi: Some("llvm".to_string()),
            },
            &score,
            Some(&baseline),
        );
        assert_eq!(datapoint.config_name, "core");
        assert_eq!(datapoint.host_vm, "jvmci");
        assert_eq!(datapoint.host_vm_config, "compiler-llvm");
        assert_eq!(datapoint.baseline_score, Some(20.0));
    }
}
