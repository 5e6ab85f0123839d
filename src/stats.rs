use crate::cfg;
use crate::chain::Probe;
use crate::error::{Error, Result};
use crate::runner::{Accumulator, Measurements};

use num::ToPrimitive;

pub fn mean(sum: f64, n: usize) -> f64 {
    sum / n.to_f64().unwrap_or(f64::NAN)
}

/// Sample standard deviation (Bessel's correction).
pub fn sample_std_dev(samples: &[f64]) -> Result<f64> {
    let n = samples.len();
    if n < 2 {
        return Err(Error::InsufficientSamples(n));
    }
    let m = mean(samples.iter().sum(), n);
    let squares: f64 = samples.iter().map(|x| (x - m) * (x - m)).sum();
    Ok((squares / (n - 1).to_f64().unwrap_or(f64::NAN)).sqrt())
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Moments {
    pub mean: f64,
    /// None when samples were not kept or there is only one
    pub std_dev: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepSummary {
    pub label: String,
    pub title: String,
    pub observed: Moments,
    pub estimated: Option<Moments>,
}

pub fn summarize(measurements: &Measurements) -> Result<Vec<StepSummary>> {
    measurements
        .steps
        .iter()
        .map(|step| {
            Ok(StepSummary {
                label: step.probe.label.clone(),
                title: step.probe.title.clone(),
                observed: moments(&step.probe, &step.observed, measurements.trials)?,
                estimated: match &step.estimated {
                    Some(acc) => Some(moments(&step.probe, acc, measurements.trials)?),
                    None => None,
                },
            })
        })
        .collect()
}

fn moments(probe: &Probe, acc: &Accumulator, trials: usize) -> Result<Moments> {
    let running = mean(acc.sum, trials);
    let std_dev = match &acc.samples {
        Some(samples) => {
            let retained = mean(samples.iter().sum(), samples.len());
            let scale = running.abs().max(1.);
            if samples.len() != trials || (running - retained).abs() > cfg::MEAN_TOLERANCE * scale {
                return Err(Error::InconsistentMeasurements {
                    step: probe.label.clone(),
                    running,
                    retained,
                });
            }
            if trials > 1 {
                Some(sample_std_dev(samples)?)
            } else {
                None
            }
        }
        None => None,
    };

    Ok(Moments {
        mean: running,
        std_dev,
    })
}

/// Trials in which the observed budget went up from `before` to `after`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetIncrease {
    pub before: String,
    pub after: String,
    pub trials: usize,
}

/// Adjacent step pairs where at least one trial gained budget.
pub fn budget_increases(measurements: &Measurements) -> Vec<BudgetIncrease> {
    measurements
        .steps
        .windows(2)
        .zip(&measurements.increases)
        .filter(|(_, count)| **count > 0)
        .map(|(pair, count)| BudgetIncrease {
            before: pair[0].probe.label.clone(),
            after: pair[1].probe.label.clone(),
            trials: *count,
        })
        .collect()
}
