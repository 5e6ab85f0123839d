use crate::cfg;
use crate::error::{Error, Result};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Requested scheme parameters, as given on the command line or loaded from a
/// parameter file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchemeParams {
    pub degree: usize,
    pub plaintext_modulus: u64,
    /// Bit sizes of the coefficient modulus chain; the standard chain of the
    /// degree is used when absent.
    pub moduli_sizes: Option<Vec<usize>>,
}

/// A degree that had to be replaced by a supported one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DegreeAdjustment {
    pub requested: usize,
    pub used: usize,
}

/// Parameters after normalization, ready to hand to a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedParams {
    pub degree: usize,
    pub plaintext_modulus: u64,
    pub moduli_sizes: Vec<usize>,
    pub adjustment: Option<DegreeAdjustment>,
}

impl SchemeParams {
    pub fn new(degree: usize, plaintext_modulus: u64) -> Self {
        SchemeParams {
            degree,
            plaintext_modulus,
            moduli_sizes: None,
        }
    }

    pub fn resolve(&self) -> Result<ResolvedParams> {
        if self.degree < 8 || !self.degree.is_power_of_two() {
            return Err(Error::InvalidParameters(format!(
                "degree {} is not a power of two >= 8",
                self.degree
            )));
        }
        if self.plaintext_modulus < 2 {
            return Err(Error::InvalidParameters(format!(
                "plaintext modulus {} is smaller than 2",
                self.plaintext_modulus
            )));
        }

        let (degree, moduli_sizes, adjustment) = match &self.moduli_sizes {
            Some(sizes) => {
                check_moduli_sizes(sizes)?;
                (self.degree, sizes.clone(), None)
            }
            None => match cfg::standard_moduli(self.degree) {
                Some(sizes) => (self.degree, sizes.to_vec(), None),
                None => {
                    let used = nearest_supported_degree(self.degree);
                    warn!(
                        requested = self.degree,
                        used, "no standard modulus chain for degree, substituting"
                    );
                    let sizes = cfg::standard_moduli(used)
                        .ok_or_else(|| Error::InvalidParameters(format!("degree {}", used)))?;
                    (
                        used,
                        sizes.to_vec(),
                        Some(DegreeAdjustment {
                            requested: self.degree,
                            used,
                        }),
                    )
                }
            },
        };

        let log_q: usize = moduli_sizes.iter().sum();
        if (self.plaintext_modulus as f64).log2() >= log_q as f64 {
            return Err(Error::InvalidParameters(format!(
                "plaintext modulus {} does not fit below a {} bit ciphertext modulus",
                self.plaintext_modulus, log_q
            )));
        }

        Ok(ResolvedParams {
            degree,
            plaintext_modulus: self.plaintext_modulus,
            moduli_sizes,
            adjustment,
        })
    }
}

impl ResolvedParams {
    /// Number of modulus switches the chain allows.
    pub fn max_level(&self) -> usize {
        self.moduli_sizes.len() - 1
    }

    pub fn log_q(&self) -> usize {
        self.moduli_sizes.iter().sum()
    }

    pub fn describe(&self) -> String {
        format!(
            "n = {}, t = {}, log q = {} ({})",
            self.degree,
            self.plaintext_modulus,
            self.log_q(),
            self.moduli_sizes.iter().join(" + ")
        )
    }
}

fn check_moduli_sizes(sizes: &[usize]) -> Result<()> {
    if sizes.is_empty() {
        return Err(Error::InvalidParameters("empty modulus chain".into()));
    }
    if let Some(size) = sizes
        .iter()
        .find(|s| !(cfg::MIN_MODULUS_BITS..=cfg::MAX_MODULUS_BITS).contains(*s))
    {
        return Err(Error::InvalidParameters(format!(
            "modulus size {} outside {}..={} bits",
            size,
            cfg::MIN_MODULUS_BITS,
            cfg::MAX_MODULUS_BITS
        )));
    }
    Ok(())
}

fn nearest_supported_degree(degree: usize) -> usize {
    cfg::SUPPORTED_DEGREES
        .iter()
        .copied()
        .find(|d| *d >= degree)
        .unwrap_or(cfg::SUPPORTED_DEGREES[cfg::SUPPORTED_DEGREES.len() - 1])
}
