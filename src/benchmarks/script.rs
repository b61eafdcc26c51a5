//! Driver script generation.
//!
//! The driver script is plain R: it loads the support libraries, seeds the RNG, embeds the benchmark definition
//! verbatim and then calls `benchmark_func` in a loop until the warmup and measure windows have elapsed. Its report
//! is the only contract with [`crate::runs::output`]:
//!
//! ```text
//! benchmark results:
//! <start> <end> <steps>
//! <timestamp 1>
//! ...
//! <timestamp steps>
//! ```

use crate::{benchmarks::Identifier, config::BenchArgs};

/// First line of the main report.
pub const BENCHMARK_MARKER: &str = "benchmark results:";

/// First line of the baseline report, printed before the main one when a baseline is requested.
pub const BASELINE_MARKER: &str = "baseline results:";

/// Seed handed to `set.seed`, fixed so that baseline comparisons see the same data on every run.
pub const SEED: u32 = 42;

/// Packages every driver script attaches before the benchmark definition.
pub const SUPPORT_LIBRARIES: [&str; 2] = ["altreprffitests", "altrepbench"];

/// Printed by the script when `benchmark_func` reports failure.
pub const ZERO_RESULT_MESSAGE: &str = "ERROR: benchmark has returned zero result";

/// Printed by the script when the step ceiling is hit.
pub const TOO_MANY_ITERATIONS_MESSAGE: &str = "MEASURE ERROR: too many iterations";

const TIMED_LOOP: &str = r#"run_timed_loop <- function(func, func_args, marker, max_steps, warmup_and_measure) {
    timestamps <- numeric(max_steps)
    steps <- 0
    start_time <- as.numeric(Sys.time())
    repeat {
        if (as.numeric(Sys.time()) - start_time >= warmup_and_measure) {
            break
        }
        result <- func(func_args)
        if (is.null(result) ||
            (is.atomic(result) && length(result) == 1L && (is.na(result) || isFALSE(result)))) {
            cat("@ZERO_RESULT@\n")
            quit(save = "no", status = 1L)
        }
        steps <- steps + 1
        if (steps > max_steps) {
            cat("@TOO_MANY@ (more than", format(max_steps, scientific = FALSE), "steps)\n")
            quit(save = "no", status = 1L)
        }
        timestamps[[steps]] <- as.numeric(Sys.time())
    }
    end_time <- as.numeric(Sys.time())
    cat(marker, "\n", sep = "")
    cat(sprintf("%.6f %.6f %.0f\n", start_time, end_time, steps))
    if (steps > 0) {
        cat(sprintf("%.6f", timestamps[seq_len(steps)]), sep = "\n")
        cat("\n")
    }
    invisible(steps)
}
"#;

fn r_bool(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Formats an integer as an R integer literal when it fits, as a double otherwise.
fn r_count(value: u64) -> String {
    if i32::try_from(value).is_ok() {
        format!("{value}L")
    } else {
        format!("{value}")
    }
}

fn r_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Generates the driver script for one benchmark.
///
/// The output only depends on its inputs, so generating twice with the same arguments yields identical text.
///
/// # Examples
///
/// ```
/// use altrep_bench::benchmarks::{script, Identifier};
/// use altrep_bench::config::BenchArgs;
///
/// let text = script::generate(
///     &BenchArgs::default(),
///     &Identifier::from("try"),
///     "benchmark_func <- function(benchmark_func_args) TRUE",
/// );
///
/// assert!(text.contains("set.seed(42L)"));
/// ```
#[must_use]
pub fn generate(args: &BenchArgs, benchmark: &Identifier, definition: &str) -> String {
    let mut script = String::new();

    script.push_str(&format!("# driver script for benchmark {benchmark}\n"));
    for library in SUPPORT_LIBRARIES {
        script.push_str(&format!("library({library})\n"));
    }
    script.push('\n');
    script.push_str(&format!("set.seed({SEED}L)\n\n"));

    script.push_str(&format!(
        "benchmark_func_args <- list(\n    data_length = {},\n    iterations = {},\n    baseline = {}\n)\n\n",
        r_count(args.data_length),
        r_count(args.iterations),
        r_bool(args.run_with_baseline),
    ));

    script.push_str(&format!("# begin definition of {benchmark}\n"));
    script.push_str(definition);
    if !definition.ends_with('\n') {
        script.push('\n');
    }
    script.push_str(&format!("# end definition of {benchmark}\n\n"));

    script.push_str(
        "if (!exists(\"benchmark_func\", mode = \"function\")) {\n    \
         cat(\"Error in benchmark definition: benchmark_func is not defined\\n\")\n    \
         quit(save = \"no\", status = 1L)\n}\n",
    );
    script.push_str(
        "if (exists(\"setup_func\", mode = \"function\")) {\n    \
         benchmark_func_args <- setup_func(benchmark_func_args)\n}\n\n",
    );

    script.push_str(
        &TIMED_LOOP
            .replace("@ZERO_RESULT@", ZERO_RESULT_MESSAGE)
            .replace("@TOO_MANY@", TOO_MANY_ITERATIONS_MESSAGE),
    );
    script.push('\n');

    let loop_args = format!("{}, {}", r_count(args.step_ceiling), args.total_seconds());
    if args.run_with_baseline {
        script.push_str(&format!(
            "if (exists(\"baseline_func\", mode = \"function\")) {{\n    \
             run_timed_loop(baseline_func, benchmark_func_args, {}, {loop_args})\n}}\n",
            r_string(BASELINE_MARKER),
        ));
    }
    script.push_str(&format!(
        "run_timed_loop(benchmark_func, benchmark_func_args, {}, {loop_args})\n",
        r_string(BENCHMARK_MARKER),
    ));

    script
}
