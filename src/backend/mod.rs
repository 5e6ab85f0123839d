//! Homomorphic encryption libraries the experiments run against.
//!
//! The harness never touches ciphertext internals: everything it needs is a
//! [`NoiseBackend`], which owns the scheme context, the keys and the RNG.

pub mod concrete;
pub mod fhers;
pub mod mock;

use crate::error::{Error, Result};

/// Identifies which library a backend wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
    /// fhe.rs BFV (leveled, relinearization and modulus switching)
    Fhe,
    /// concrete LWE with bootstrapped multiplication
    Concrete,
    /// Deterministic stand-in for testing the harness
    Mock,
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendId::Fhe => write!(f, "fhe"),
            BackendId::Concrete => write!(f, "concrete"),
            BackendId::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for BackendId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fhe" | "fhe.rs" | "bfv" => Ok(BackendId::Fhe),
            "concrete" | "lwe" => Ok(BackendId::Concrete),
            "mock" | "test" => Ok(BackendId::Mock),
            other => Err(Error::UnknownBackend(other.to_string())),
        }
    }
}

/// What a backend can do with the parameters it was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Products must be relinearized before they can be multiplied again
    pub relinearize: bool,
    /// A product can be an operand of another multiplication
    pub repeated_multiply: bool,
    /// A modulus switch is possible from a fresh ciphertext
    pub mod_switch: bool,
    /// `estimated_noise_budget` returns a value
    pub estimated_budget: bool,
    /// Decryption of any chain result equals the clear computation mod t
    pub exact_arithmetic: bool,
}

pub trait NoiseBackend {
    type Ciphertext;

    fn backend_id(&self) -> BackendId;

    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Modulus the clear inputs and the shadow computation are reduced by
    fn plaintext_modulus(&self) -> u64;

    /// Human readable context description, one `(key, value)` per line
    fn describe(&self) -> Vec<(String, String)>;

    fn encrypt(&mut self, value: u64) -> Result<Self::Ciphertext>;

    fn decrypt(&self, ct: &Self::Ciphertext) -> Result<u64>;

    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn multiply(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn relinearize(&self, ct: &mut Self::Ciphertext) -> Result<()>;

    fn mod_switch(&self, ct: &mut Self::Ciphertext) -> Result<()>;

    /// Remaining noise budget in bits, measured with the secret key.
    ///
    /// Only available because the experiment holds the secret key; a deployed
    /// evaluator has no such oracle.
    fn noise_budget(&self, ct: &Self::Ciphertext) -> Result<f64>;

    /// Library heuristic for the remaining budget, computed without the
    /// secret key. `None` when the library has no such estimate.
    fn estimated_noise_budget(&self, ct: &Self::Ciphertext) -> Result<Option<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_id_parse() {
        assert_eq!("fhe".parse::<BackendId>().unwrap(), BackendId::Fhe);
        assert_eq!("BFV".parse::<BackendId>().unwrap(), BackendId::Fhe);
        assert_eq!("concrete".parse::<BackendId>().unwrap(), BackendId::Concrete);
        assert_eq!("test".parse::<BackendId>().unwrap(), BackendId::Mock);
        assert!("seal".parse::<BackendId>().is_err());
    }

    #[test]
    fn test_backend_id_display_roundtrip() {
        for id in [BackendId::Fhe, BackendId::Concrete, BackendId::Mock] {
            assert_eq!(id.to_string().parse::<BackendId>().unwrap(), id);
        }
    }
}
