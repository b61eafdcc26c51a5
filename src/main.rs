use std::{env, path::PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use altrep_bench::{
    benchmarks,
    config::{BenchArgs, Driver},
    drivers::{packages, Distribution, FASTR_RFFI_ENV},
    errors::Error,
    execute_single,
    results::{self, Results, SystemInfo},
    runs::{self, RunOptions},
};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Benchmark to run, only one per invocation
    #[arg(value_name = "BENCHMARK", required_unless_present = "list")]
    benchmarks: Vec<String>,

    /// List available benchmarks and exit
    #[arg(long)]
    list: bool,

    /// Path to a directory containing benchmark definitions
    #[arg(long, default_value = "benchmarks")]
    definitions: PathBuf,

    /// FastR home directory
    #[arg(long, env = "FASTR_HOME")]
    fastr_home: Option<PathBuf>,

    /// GNU-R home directory
    #[arg(long, env = "GNUR_HOME")]
    gnur_home: Option<PathBuf>,

    /// Path to the altrepbench package sources
    #[arg(long, default_value = "native_bench_pkg")]
    bench_pkg: PathBuf,

    /// Do not install missing support packages
    #[arg(long)]
    skip_install: bool,

    /// FastR runs with the Graal compiler
    #[arg(long)]
    with_compiler: bool,

    #[arg(short, long, default_value = "results")]
    /// Path to a directory to dump outputs in
    output: PathBuf,

    /// Collect system information (CPU, memory, ...) in the output
    #[arg(long)]
    collect_sysinfo: bool,

    #[command(flatten)]
    bench: BenchArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    human_panic::setup_panic!();
    env_logger::init();

    let args = Args::parse();

    if args.list {
        for benchmark in benchmarks::find_all(&args.definitions)? {
            println!("{}", benchmark.identifier);
        }
        return Ok(());
    }

    let start_time = Utc::now();

    let name = runs::select(&args.benchmarks)?.context("no benchmark given")?;
    let benchmark = benchmarks::find(&args.definitions, name)?;
    let distribution = Distribution::locate(
        args.bench.driver,
        args.fastr_home.as_deref(),
        args.gnur_home.as_deref(),
    )?;

    if args.skip_install {
        log::info!("skipping support package installation");
    } else {
        // altreprffitests comes from the FastR sources even when running on GNU-R.
        let fastr_home = args
            .fastr_home
            .as_deref()
            .ok_or_else(|| Error::HomeNotConfigured {
                driver: Driver::Fastr.to_string(),
                env: "FASTR_HOME",
            })?;
        packages::ensure_installed(
            &distribution,
            &packages::support_packages(fastr_home, &args.bench_pkg),
        )
        .await?;
    }

    let options = RunOptions {
        with_compiler: args.with_compiler,
        rffi: env::var(FASTR_RFFI_ENV).ok(),
    };
    let datapoint = execute_single(&distribution, &benchmark, &args.bench, &options)
        .await
        .map_err(|err| {
            log::error!("{err}");
            err
        })?;

    let results = Results {
        queries: vec![datapoint],
        system: args.collect_sysinfo.then(SystemInfo::collect),
    };
    results::record(&args.output, start_time, &results)?;

    Ok(())
}
