use crate::backend::NoiseBackend;
use crate::cfg;
use crate::chain::{Chain, Probe};
use crate::engine::Engine;
use crate::error::{Error, Result};

use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub trials: usize,
    /// Keep every per-trial sample, needed for standard deviations and CSV
    pub retain_samples: bool,
    /// Decrypt and compare against the clear computation along the way
    pub verify: bool,
}

impl RunOptions {
    pub fn new(trials: usize) -> Self {
        RunOptions {
            trials,
            retain_samples: true,
            verify: false,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.trials == 0 || self.trials > cfg::MAX_TRIALS {
            return Err(Error::InvalidTrialCount(self.trials.to_string()));
        }
        Ok(())
    }
}

/// Running sum of one series, with the raw samples when they are retained.
#[derive(Clone, Debug, PartialEq)]
pub struct Accumulator {
    pub sum: f64,
    pub count: usize,
    pub samples: Option<Vec<f64>>,
}

impl Accumulator {
    pub fn new(retain: bool) -> Self {
        Accumulator {
            sum: 0.,
            count: 0,
            // grows with the trials actually run
            samples: if retain {
                Some(Vec::new())
            } else {
                None
            },
        }
    }

    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        if let Some(samples) = &mut self.samples {
            samples.push(value);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub probe: Probe,
    pub observed: Accumulator,
    /// Present when the backend estimates budgets without the secret key
    pub estimated: Option<Accumulator>,
}

/// Everything a run measured. Immutable once `run` returns.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurements {
    pub trials: usize,
    pub steps: Vec<StepRecord>,
    /// Per adjacent step pair, the number of trials whose observed budget
    /// went up from one step to the next
    pub increases: Vec<usize>,
}

pub fn run<B: NoiseBackend>(backend: &mut B, chain: &Chain, opts: &RunOptions) -> Result<Measurements> {
    opts.check()?;

    let estimates = backend.capabilities().estimated_budget;
    let mut steps: Vec<StepRecord> = chain
        .probes()
        .map(|probe| StepRecord {
            probe: probe.clone(),
            observed: Accumulator::new(opts.retain_samples),
            estimated: if estimates {
                Some(Accumulator::new(opts.retain_samples))
            } else {
                None
            },
        })
        .collect();

    info!(
        backend = backend.name(),
        chain = %chain.kind,
        trials = opts.trials,
        "running noise experiment"
    );
    let mut engine = Engine::new(backend, chain, opts.verify)?;
    let mut increases = vec![0; steps.len().saturating_sub(1)];

    for trial in 0..opts.trials {
        let samples = engine.run_trial(trial)?;
        for (count, pair) in increases.iter_mut().zip(samples.windows(2)) {
            if pair[1].observed > pair[0].observed {
                *count += 1;
            }
        }
        for (step, sample) in steps.iter_mut().zip(samples) {
            step.observed.push(sample.observed);
            if let (Some(acc), Some(value)) = (&mut step.estimated, sample.estimated) {
                acc.push(value);
            }
        }
        if (trial + 1) % 1000 == 0 {
            debug!("{} of {} trials done", trial + 1, opts.trials);
        }
    }

    Ok(Measurements {
        trials: opts.trials,
        steps,
        increases,
    })
}
