use thiserror::Error;

/// Errors surfaced by a noise experiment run.
///
/// Every variant is fatal to the current run only; the interactive menu
/// reports it and accepts a new run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid trial count: {0} (between 1 and {max} trials)", max = crate::cfg::MAX_TRIALS)]
    InvalidTrialCount(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Operation not supported by {backend}: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Noise measurement failed: {0}")]
    Measurement(String),

    #[error("Malformed chain: {0}")]
    MalformedChain(String),

    #[error("Trial {trial}, step {step}: decrypted {actual}, expected {expected}")]
    Mismatch {
        trial: usize,
        step: String,
        expected: u64,
        actual: u64,
    },

    #[error("Standard deviation needs at least 2 samples, got {0}")]
    InsufficientSamples(usize),

    #[error("Inconsistent measurements for {step}: running mean {running}, sample mean {retained}")]
    InconsistentMeasurements {
        step: String,
        running: f64,
        retained: f64,
    },

    #[error("Per-trial samples were not retained for this run")]
    SamplesNotRetained,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
