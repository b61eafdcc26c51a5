//! Throughput benchmarks for R ALTREP vectors.
//!
//! altrep-bench measures how fast R code and native code can iterate over ALTREP (alternative representation)
//! vectors, on FastR and on stock GNU-R. It does not measure anything itself: it generates an R driver script around
//! a benchmark definition, runs it on the selected R distribution, parses the timestamps the script prints and
//! reduces them to a single throughput datapoint.
//!
//! # Suite
//! Benchmark definitions are R fragments in the `benchmarks` directory, one file per benchmark. Each fragment
//! defines `benchmark_func(benchmark_func_args)` and may define `setup_func` and `baseline_func`. The native
//! `altrepbench` package the fragments call into lives in `native_bench_pkg`, and is installed into the selected
//! distribution together with FastR's `altreprffitests` package before the first run.
//!
//! # Usage
//! altrep-bench is primarily designed to be used as an executable, but the pieces are public so the script
//! generation and scoring can be reused.
//!
//! ## As an executable
//! ```console
//! $ altrep-bench --help
//! Throughput benchmarks for R ALTREP vectors, comparing FastR against GNU-R.
//!
//! Usage: altrep-bench [OPTIONS] [BENCHMARK]...
//!
//! Arguments:
//!   [BENCHMARK]...  Benchmark to run, only one per invocation
//!
//! Options:
//!       --list                      List available benchmarks and exit
//!       --definitions <DEFINITIONS> Path to a directory containing benchmark definitions [default: benchmarks]
//!       --fastr-home <FASTR_HOME>   FastR home directory [env: FASTR_HOME=]
//!       --gnur-home <GNUR_HOME>     GNU-R home directory [env: GNUR_HOME=]
//!       --bench-pkg <BENCH_PKG>     Path to the altrepbench package sources [default: native_bench_pkg]
//!       --skip-install              Do not install missing support packages
//!       --with-compiler             FastR runs with the Graal compiler
//!   -o, --output <OUTPUT>           Path to a directory to dump outputs in [default: results]
//!       --collect-sysinfo           Collect system information (CPU, memory, ...) in the output
//!   -d, --driver <DRIVER>           Driver to run [default: fastr] [possible values: fastr, gnur]
//!   -l, --length <DATA_LENGTH>      Length of the data, fractional values are floored [default: 1e7]
//!   -i, --iterations <ITERATIONS>   Number of iterations of the outer loop inside one benchmark step [default: 5]
//!   -b, --baseline                  Also run the baseline variant of the benchmark, if it defines one
//!   -w, --warmup <WARMUP>           Warmup time in seconds [default: 5]
//!   -m, --measure <MEASURE>         Measure time in seconds [default: 10]
//!       --step-ceiling <STEP_CEILING>
//!                                   Maximum number of timed steps before the run is considered degenerate
//!   -h, --help                      Print help
//!   -V, --version                   Print version
//! ```
//!
//! ## As a library
//! ```
//! use altrep_bench::{
//!     benchmarks::{script, Identifier},
//!     config::BenchArgs,
//!     runs::{output::OutputCapture, score::score},
//! };
//!
//! let args = BenchArgs { warmup: 2, ..BenchArgs::default() };
//! let text = script::generate(
//!     &args,
//!     &Identifier::from("try"),
//!     "benchmark_func <- function(benchmark_func_args) TRUE",
//! );
//! assert!(text.contains(script::BENCHMARK_MARKER));
//!
//! let mut capture = OutputCapture::new(script::BENCHMARK_MARKER);
//! for line in ["benchmark results:", "0 5 6", "0", "1", "2", "3", "4", "5"] {
//!     capture.feed(line).unwrap();
//! }
//! let report = capture.finish().unwrap();
//! let score = score(&report, args.warmup, args.step_ceiling).unwrap();
//! assert!((score.throughput - 1.0).abs() < 1e-12);
//! ```
//!
//! # Results
//! Each run writes a `results.<timestamp>.json` file with a `queries` array holding one flat datapoint (metric, run
//! configuration, host VM identification), ready to be uploaded to a benchmark database.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod benchmarks;
pub mod config;
pub mod drivers;
pub mod errors;
pub mod results;
pub mod runs;

pub use benchmarks::Benchmark;
pub use config::{BenchArgs, Driver};
pub use drivers::Distribution;
pub use errors::Error;
pub use runs::{execute_single, Datapoint};
