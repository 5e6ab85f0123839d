use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod backend;
mod cfg;
mod chain;
mod engine;
mod error;
mod io;
mod menu;
mod params;
mod report;
mod runner;
mod stats;

use backend::concrete::ConcreteBackend;
use backend::fhers::FheBackend;
use backend::mock::MockBackend;
use backend::{BackendId, NoiseBackend};
use chain::{Chain, ChainKind};
use error::{Error, Result};
use params::{DegreeAdjustment, SchemeParams};
use report::RunHeader;
use runner::RunOptions;

#[derive(Args)]
struct ExperimentArgs {
    /// Library to measure: fhe, concrete or mock
    #[clap(long, default_value = "fhe")]
    backend: BackendId,
    /// Operation chain: basic (encrypt, add, multiply, mod switch) or deep
    /// (three levels of multiplications)
    #[clap(long, default_value = "basic")]
    chain: ChainKind,
    /// Ring dimension n (default depends on the chain)
    #[clap(long)]
    degree: Option<usize>,
    /// Plaintext modulus t
    #[clap(long, short = 't')]
    plaintext_modulus: Option<u64>,
    /// Parameter file written by the params command
    #[clap(long)]
    params: Option<PathBuf>,
    /// Seed of the key and encryption RNG, for reproducible runs
    #[clap(long)]
    seed: Option<u64>,
    /// Check every decryption against the clear computation
    #[clap(long, short = 'v')]
    verbose: bool,
    /// Path to store the per-trial samples as CSV
    #[clap(long)]
    samples_csv: Option<PathBuf>,
    /// Only keep running sums (no standard deviation, no CSV)
    #[clap(long)]
    no_samples: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Runs a noise budget experiment and reports the per-step statistics
    Run {
        /// Number of trials
        #[clap(long)]
        trials: usize,
        #[clap(flatten)]
        experiment: ExperimentArgs,
    },

    /// Interactive experiment menu
    Menu {
        #[clap(flatten)]
        experiment: ExperimentArgs,
    },

    /// Prints the resolved parameters and what the backend supports
    Info {
        #[clap(flatten)]
        experiment: ExperimentArgs,
    },

    /// Generates a parameter file
    Params {
        /// Path to store the parameter file
        params_output_path: PathBuf,
        #[clap(long, default_value_t = cfg::DEFAULT_BASIC_DEGREE)]
        degree: usize,
        #[clap(long, short = 't', default_value_t = cfg::DEFAULT_PLAINTEXT_MODULUS)]
        plaintext_modulus: u64,
        /// Comma separated bit sizes of the coefficient moduli
        #[clap(long)]
        moduli: Option<String>,
    },
}

#[derive(Parser)]
#[clap(author, version, about, long_about = None, propagate_version = true)]
struct Cli {
    /// Enable debug logs
    #[clap(long, global = true)]
    debug: bool,

    /// Command to be executed
    #[clap(subcommand)]
    command: Command,
}

enum Action {
    Run(usize),
    Menu,
    Info,
}

/// Settings shared by every run of one invocation
struct Setup {
    chain: ChainKind,
    adjustment: Option<DegreeAdjustment>,
    verify: bool,
    retain_samples: bool,
    samples_csv: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(log_filter(cli.debug, EnvFilter::try_from_default_env().ok())?)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run { trials, experiment } => dispatch(&experiment, Action::Run(trials))?,
        Command::Menu { experiment } => dispatch(&experiment, Action::Menu)?,
        Command::Info { experiment } => dispatch(&experiment, Action::Info)?,
        Command::Params {
            params_output_path,
            degree,
            plaintext_modulus,
            moduli,
        } => {
            let params = SchemeParams {
                degree,
                plaintext_modulus,
                moduli_sizes: moduli.as_deref().map(parse_moduli).transpose()?,
            };
            let resolved = params.resolve()?;
            io::save_serialized(&params_output_path, &params)?;
            println!("{}", resolved.describe());
        }
    }
    Ok(())
}

/// RUST_LOG when set, warnings otherwise; --debug raises this crate to debug
/// on top of either.
fn log_filter(debug: bool, env: Option<EnvFilter>) -> anyhow::Result<EnvFilter> {
    let filter = env.unwrap_or_else(|| EnvFilter::new("he_noise_lab=warn"));
    if debug {
        return Ok(filter.add_directive("he_noise_lab=debug".parse()?));
    }
    Ok(filter)
}

fn dispatch(args: &ExperimentArgs, action: Action) -> Result<()> {
    if let Action::Run(trials) = action {
        RunOptions::new(trials).check()?;
    }
    if args.no_samples && args.samples_csv.is_some() {
        return Err(Error::SamplesNotRetained);
    }

    let mut setup = Setup {
        chain: args.chain,
        adjustment: None,
        verify: args.verbose,
        retain_samples: !args.no_samples,
        samples_csv: args.samples_csv.clone(),
    };

    match args.backend {
        BackendId::Fhe => {
            let resolved = scheme_params(args)?.resolve()?;
            setup.adjustment = resolved.adjustment;
            info!("{}", resolved.describe());
            let mut backend = FheBackend::new(&resolved, args.seed)?;
            perform(&mut backend, &setup, action)
        }
        BackendId::Concrete => {
            let scheme_args =
                args.degree.is_some() || args.plaintext_modulus.is_some() || args.params.is_some();
            if scheme_args && ConcreteBackend::is_available() {
                warn!("concrete uses its fixed LWE parameters, ignoring the scheme parameters");
            }
            let mut backend = ConcreteBackend::new()?;
            perform(&mut backend, &setup, action)
        }
        BackendId::Mock => {
            let mut backend = MockBackend::new();
            perform(&mut backend, &setup, action)
        }
    }
}

fn scheme_params(args: &ExperimentArgs) -> Result<SchemeParams> {
    let mut params = match &args.params {
        Some(path) => io::load_serialized(path)?,
        None => SchemeParams::new(
            match args.chain {
                ChainKind::Basic => cfg::DEFAULT_BASIC_DEGREE,
                ChainKind::Deep => cfg::DEFAULT_DEEP_DEGREE,
            },
            cfg::DEFAULT_PLAINTEXT_MODULUS,
        ),
    };
    if let Some(degree) = args.degree {
        params.degree = degree;
    }
    if let Some(t) = args.plaintext_modulus {
        params.plaintext_modulus = t;
    }
    Ok(params)
}

fn parse_moduli(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(|size| {
            size.trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidParameters(format!("modulus size {}", size)))
        })
        .collect()
}

fn perform<B: NoiseBackend>(backend: &mut B, setup: &Setup, action: Action) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match action {
        Action::Run(trials) => run_experiment(backend, setup, trials, &mut out),
        Action::Info => {
            let caps = backend.capabilities();
            setup.chain.check_supported(&caps)?;
            let header = RunHeader::new(&*backend, setup.adjustment, setup.chain, None);
            report::write_header(&mut out, &header)?;
            report::write_capabilities(&mut out, &caps, &Chain::for_kind(setup.chain, &caps))
        }
        Action::Menu => {
            let stdin = std::io::stdin();
            let input = stdin.lock();
            menu::menu(input, &mut out, |trials, out| {
                run_experiment(backend, setup, trials, out)
            })
        }
    }
}

fn run_experiment<B, W>(backend: &mut B, setup: &Setup, trials: usize, out: &mut W) -> Result<()>
where
    B: NoiseBackend,
    W: Write,
{
    let caps = backend.capabilities();
    setup.chain.check_supported(&caps)?;
    let chain = Chain::for_kind(setup.chain, &caps);
    if setup.chain == ChainKind::Basic && !caps.mod_switch {
        warn!("no modulus to switch to, the chain ends with the multiplication");
    }

    let header = RunHeader::new(&*backend, setup.adjustment, setup.chain, Some(trials));
    report::write_header(out, &header)?;

    let opts = RunOptions {
        trials,
        retain_samples: setup.retain_samples,
        verify: setup.verify,
    };
    let measurements = runner::run(backend, &chain, &opts)?;
    let summaries = stats::summarize(&measurements)?;
    if setup.verify {
        writeln!(out, "Check correctness: all {} trials decrypt correctly", trials)?;
        writeln!(out)?;
    }
    let increases = stats::budget_increases(&measurements);
    report::write_summaries(out, &summaries, &increases, trials)?;

    if let Some(path) = &setup.samples_csv {
        report::save_samples_csv(path, &measurements)?;
        info!("samples written to {}", path.display());
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_overrides_env_filter() {
        let env = EnvFilter::new("warn");
        let filter = log_filter(true, Some(env)).unwrap();
        assert!(filter.to_string().contains("he_noise_lab=debug"));
        assert!(filter.to_string().contains("warn"));
    }

    #[test]
    fn test_default_filter_is_quiet() {
        let filter = log_filter(false, None).unwrap();
        assert_eq!(filter.to_string(), "he_noise_lab=warn");
    }
}
