use crate::backend::{Capabilities, NoiseBackend};
use crate::chain::{Chain, ChainKind};
use crate::error::{Error, Result};
use crate::params::DegreeAdjustment;
use crate::runner::Measurements;
use crate::stats::{BudgetIncrease, StepSummary};

use itertools::Itertools;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// What was run, printed above the results.
pub struct RunHeader {
    pub backend: String,
    pub parameters: Vec<(String, String)>,
    pub adjustment: Option<DegreeAdjustment>,
    pub chain: ChainKind,
    /// None when only the setup is shown
    pub trials: Option<usize>,
}

impl RunHeader {
    pub fn new<B: NoiseBackend>(
        backend: &B,
        adjustment: Option<DegreeAdjustment>,
        chain: ChainKind,
        trials: Option<usize>,
    ) -> Self {
        let mut parameters = vec![("backend".to_string(), backend.backend_id().to_string())];
        parameters.extend(backend.describe());
        RunHeader {
            backend: backend.name().to_string(),
            parameters,
            adjustment,
            chain,
            trials,
        }
    }
}

pub fn write_header<W: Write>(out: &mut W, header: &RunHeader) -> Result<()> {
    if let Some(adj) = header.adjustment {
        writeln!(
            out,
            "Could not select n = {}. Using n = {} instead.",
            adj.requested, adj.used
        )?;
    }
    writeln!(out, "/")?;
    writeln!(out, "| Encryption parameters ({}):", header.backend)?;
    for (key, value) in &header.parameters {
        writeln!(out, "|   {}: {}", key, value)?;
    }
    writeln!(out, "\\")?;
    writeln!(out)?;
    match header.trials {
        Some(trials) => writeln!(out, "Chain: {}, trials: {}", header.chain, trials)?,
        None => writeln!(out, "Chain: {}", header.chain)?,
    }
    writeln!(out)?;
    Ok(())
}

pub fn write_capabilities<W: Write>(out: &mut W, caps: &Capabilities, chain: &Chain) -> Result<()> {
    writeln!(out, "Relinearization: {}", yes_no(caps.relinearize))?;
    writeln!(out, "Modulus switching: {}", yes_no(caps.mod_switch))?;
    writeln!(out, "Estimated budget: {}", yes_no(caps.estimated_budget))?;
    writeln!(out, "Exact arithmetic mod t: {}", yes_no(caps.exact_arithmetic))?;
    writeln!(out, "Steps: {}", chain.probes().map(|p| p.label.as_str()).join(", "))?;
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn write_summaries<W: Write>(
    out: &mut W,
    summaries: &[StepSummary],
    increases: &[BudgetIncrease],
    trials: usize,
) -> Result<()> {
    for summary in summaries {
        writeln!(out, "After {}:", summary.title)?;
        writeln!(out, "Mean noise budget observed: {}", summary.observed.mean)?;
        writeln!(out, "Std. dev. observed: {}", format_std_dev(summary.observed.std_dev))?;
        if let Some(estimated) = &summary.estimated {
            writeln!(out, "Mean estimated noise budget: {}", estimated.mean)?;
            writeln!(out, "Std. dev. estimated: {}", format_std_dev(estimated.std_dev))?;
        }
        writeln!(out)?;
    }

    for increase in increases {
        writeln!(
            out,
            "Warning: budget increases from {} to {} in {} of {} trials",
            increase.before, increase.after, increase.trials, trials
        )?;
    }
    Ok(())
}

fn format_std_dev(std_dev: Option<f64>) -> String {
    match std_dev {
        Some(sd) => sd.to_string(),
        None => "n/a".to_string(),
    }
}

/// Per-trial samples, one row per trial and one column per step and series.
pub fn write_samples_csv<W: Write>(writer: W, measurements: &Measurements) -> Result<()> {
    let mut columns: Vec<(String, &[f64])> = Vec::new();
    for step in &measurements.steps {
        let observed = step
            .observed
            .samples
            .as_deref()
            .ok_or(Error::SamplesNotRetained)?;
        columns.push((format!("{}_observed", step.probe.label), observed));
        if let Some(estimated) = &step.estimated {
            let samples = estimated.samples.as_deref().ok_or(Error::SamplesNotRetained)?;
            columns.push((format!("{}_estimated", step.probe.label), samples));
        }
    }

    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["trial".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    wtr.write_record(&header)?;

    for trial in 0..measurements.trials {
        let mut record = vec![trial.to_string()];
        for (name, samples) in &columns {
            let value = samples
                .get(trial)
                .ok_or_else(|| Error::InconsistentMeasurements {
                    step: name.clone(),
                    running: measurements.trials as f64,
                    retained: samples.len() as f64,
                })?;
            record.push(value.to_string());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_samples_csv<P: AsRef<Path>>(path: P, measurements: &Measurements) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    write_samples_csv(file, measurements)
}
