//! Throughput scoring of a timed loop.
//!
//! Timestamps inside the warmup window are dropped. The remaining ones are reduced to the geometric mean of their
//! consecutive differences, and throughput is its reciprocal. A single slow step (a GC pause, say) moves the geometric
//! mean of durations far less than it would an arithmetic mean of per-step rates.

use serde::{Deserialize, Serialize};

use crate::{errors::Error, runs::output::Report};

/// Result of scoring one report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Steps per second.
    pub throughput: f64,
    /// Representative duration of one step in seconds.
    pub step_duration: f64,
    /// Number of timestamps after the warmup window.
    pub measurements: usize,
}

/// Geometric mean of strictly positive values.
fn geometric_mean(values: &[f64]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    (values.iter().map(|v| v.ln()).sum::<f64>() / n).exp()
}

/// Scores a report.
///
/// # Errors
///
/// - [`Error::TooManyIterations`] if the step count exceeds `step_ceiling`, checked first.
/// - [`Error::StepCountMismatch`] if the number of timestamps differs from the step count.
/// - [`Error::InsufficientMeasurements`] if fewer than two timestamps are later than `start_time + warmup`.
/// - [`Error::NonMonotonicTimestamps`] if two consecutive measurements are not strictly increasing.
///
/// # Examples
///
/// ```
/// use altrep_bench::runs::{output::Report, score::score};
///
/// let report = Report {
///     start_time: 0.0,
///     end_time: 5.0,
///     steps: 6,
///     timestamps: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
/// };
///
/// let score = score(&report, 2, 100).unwrap();
/// assert_eq!(score.measurements, 3);
/// assert!((score.throughput - 1.0).abs() < 1e-12);
/// ```
pub fn score(report: &Report, warmup: u64, step_ceiling: u64) -> Result<Score, Error> {
    if report.steps > step_ceiling {
        return Err(Error::TooManyIterations {
            steps: report.steps,
            ceiling: step_ceiling,
        });
    }
    if report.timestamps.len() as u64 != report.steps {
        return Err(Error::StepCountMismatch {
            steps: report.steps,
            collected: report.timestamps.len(),
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let warmup_end = report.start_time + warmup as f64;
    let measurements: Vec<f64> = report
        .timestamps
        .iter()
        .copied()
        .filter(|&t| t > warmup_end)
        .collect();
    if measurements.len() < 2 {
        return Err(Error::InsufficientMeasurements {
            measurements: measurements.len(),
            warmup,
        });
    }

    let differences = measurements
        .windows(2)
        .map(|pair| {
            let difference = pair[1] - pair[0];
            if difference > 0.0 {
                Ok(difference)
            } else {
                Err(Error::NonMonotonicTimestamps {
                    previous: pair[0],
                    next: pair[1],
                })
            }
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let step_duration = geometric_mean(&differences);
    Ok(Score {
        throughput: 1.0 / step_duration,
        step_duration,
        measurements: measurements.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(start_time: f64, timestamps: &[f64]) -> Report {
        Report {
            start_time,
            end_time: timestamps.last().copied().unwrap_or(start_time),
            steps: timestamps.len() as u64,
            timestamps: timestamps.to_vec(),
        }
    }

    #[test]
    fn unit_steps_give_unit_throughput() {
        let score = score(&report(0.0, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), 2, 100).unwrap();
        assert_eq!(score.measurements, 3);
        assert!((score.step_duration - 1.0).abs() < 1e-12);
        assert!((score.throughput - 1.0).abs() < 1e-12);
    }

    #[test]
    fn warmup_boundary_is_exclusive() {
        // 12.0 == start + warmup and must not count.
        let score = score(&report(10.0, &[11.0, 12.0, 12.5, 13.0]), 2, 100).unwrap();
        assert_eq!(score.measurements, 2);
        assert!((score.throughput - 2.0).abs() < 1e-9);
    }

    #[test]
    fn geometric_mean_of_differences() {
        // Differences 0.1 and 0.4, geometric mean 0.2.
        let score = score(&report(0.0, &[1.0, 1.1, 1.5]), 0, 100).unwrap();
        assert!((score.step_duration - 0.2).abs() < 1e-9);
        assert!((score.throughput - 5.0).abs() < 1e-6);
    }

    #[test]
    fn slow_outlier_has_limited_effect() {
        let mut timestamps: Vec<f64> = (0..100).map(|i| 1.0 + f64::from(i) * 0.01).collect();
        let last = *timestamps.last().unwrap();
        timestamps.push(last + 1.0);
        let score = score(&report(0.0, &timestamps), 0, 1000).unwrap();
        // The arithmetic mean of durations would put this near 51 op/s.
        assert!(score.throughput > 80.0, "throughput {}", score.throughput);
    }

    #[test]
    fn too_few_measurements_fail() {
        let err = score(&report(0.0, &[0.5, 1.0, 2.5]), 2, 100).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientMeasurements {
                measurements: 1,
                warmup: 2
            }
        ));

        let err = score(&report(0.0, &[]), 0, 100).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientMeasurements { measurements: 0, .. }
        ));
    }

    #[test]
    fn ceiling_is_checked_first() {
        let bad = Report {
            start_time: 0.0,
            end_time: 1.0,
            steps: 1_000,
            timestamps: vec![],
        };
        let err = score(&bad, 0, 999).unwrap_err();
        assert!(matches!(
            err,
            Error::TooManyIterations {
                steps: 1_000,
                ceiling: 999
            }
        ));
    }

    #[test]
    fn step_count_must_match() {
        let bad = Report {
            start_time: 0.0,
            end_time: 3.0,
            steps: 4,
            timestamps: vec![1.0, 2.0, 3.0],
        };
        assert!(matches!(
            score(&bad, 0, 100).unwrap_err(),
            Error::StepCountMismatch {
                steps: 4,
                collected: 3
            }
        ));
    }

    #[test]
    fn equal_timestamps_are_rejected() {
        let err = score(&report(0.0, &[1.0, 2.0, 2.0]), 0, 100).unwrap_err();
        assert!(matches!(err, Error::NonMonotonicTimestamps { .. }));
    }
}
