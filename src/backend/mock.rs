//! Mock backend for testing
//!
//! NOT A CRYPTOSYSTEM - ciphertexts carry the clear value and a budget that
//! follows fixed decrements. Makes the harness testable with exact numbers.

use crate::backend::{BackendId, Capabilities, NoiseBackend};
use crate::error::{Error, Result};

pub const MOCK_MODULUS: u64 = 257;
pub const FRESH_BUDGET: f64 = 60.;
pub const ADD_COST: f64 = 1.;
pub const MULTIPLY_COST: f64 = 20.;
pub const RELINEARIZE_COST: f64 = 0.25;
pub const MOD_SWITCH_COST: f64 = 3.;
pub const ESTIMATE_MARGIN: f64 = 2.;
pub const MAX_LEVEL: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct MockCiphertext {
    pub value: u64,
    pub budget: f64,
    pub parts: usize,
    pub level: usize,
}

#[derive(Default)]
pub struct MockBackend {
    /// Decrypt returns a wrong value once the budget is exhausted
    pub honest_decryption: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend {
            honest_decryption: true,
        }
    }
}

impl NoiseBackend for MockBackend {
    type Ciphertext = MockCiphertext;

    fn backend_id(&self) -> BackendId {
        BackendId::Mock
    }

    fn name(&self) -> &'static str {
        "Mock (TESTING ONLY)"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            relinearize: true,
            repeated_multiply: true,
            mod_switch: true,
            estimated_budget: true,
            exact_arithmetic: true,
        }
    }

    fn plaintext_modulus(&self) -> u64 {
        MOCK_MODULUS
    }

    fn describe(&self) -> Vec<(String, String)> {
        vec![
            ("scheme".into(), "mock".into()),
            ("plain_modulus".into(), MOCK_MODULUS.to_string()),
            ("levels".into(), (MAX_LEVEL + 1).to_string()),
        ]
    }

    fn encrypt(&mut self, value: u64) -> Result<MockCiphertext> {
        // spread fresh budgets a little so the standard deviation is not zero
        Ok(MockCiphertext {
            value: value % MOCK_MODULUS,
            budget: FRESH_BUDGET - (value % 4) as f64 * 0.5,
            parts: 2,
            level: 0,
        })
    }

    fn decrypt(&self, ct: &MockCiphertext) -> Result<u64> {
        if ct.budget <= 0. && !self.honest_decryption {
            return Ok((ct.value + 1) % MOCK_MODULUS);
        }
        Ok(ct.value)
    }

    fn add(&self, a: &MockCiphertext, b: &MockCiphertext) -> Result<MockCiphertext> {
        check_same_level(a, b)?;
        Ok(MockCiphertext {
            value: (a.value + b.value) % MOCK_MODULUS,
            budget: (a.budget.min(b.budget) - ADD_COST).max(0.),
            parts: a.parts.max(b.parts),
            level: a.level,
        })
    }

    fn multiply(&self, a: &MockCiphertext, b: &MockCiphertext) -> Result<MockCiphertext> {
        check_same_level(a, b)?;
        if a.parts != 2 || b.parts != 2 {
            return Err(Error::Evaluation(
                "multiplication expects relinearized inputs".into(),
            ));
        }
        Ok(MockCiphertext {
            value: (a.value * b.value) % MOCK_MODULUS,
            budget: (a.budget.min(b.budget) - MULTIPLY_COST).max(0.),
            parts: 3,
            level: a.level,
        })
    }

    fn relinearize(&self, ct: &mut MockCiphertext) -> Result<()> {
        if ct.parts > 2 {
            ct.parts = 2;
            ct.budget = (ct.budget - RELINEARIZE_COST).max(0.);
        }
        Ok(())
    }

    fn mod_switch(&self, ct: &mut MockCiphertext) -> Result<()> {
        if ct.level >= MAX_LEVEL {
            return Err(Error::Unsupported {
                backend: self.name(),
                operation: "modulus switch below the last modulus",
            });
        }
        ct.level += 1;
        ct.budget = (ct.budget - MOD_SWITCH_COST).max(0.);
        Ok(())
    }

    fn noise_budget(&self, ct: &MockCiphertext) -> Result<f64> {
        Ok(ct.budget)
    }

    fn estimated_noise_budget(&self, ct: &MockCiphertext) -> Result<Option<f64>> {
        Ok(Some((ct.budget - ESTIMATE_MARGIN).max(0.)))
    }
}

fn check_same_level(a: &MockCiphertext, b: &MockCiphertext) -> Result<()> {
    if a.level != b.level {
        return Err(Error::Evaluation(format!(
            "operands at levels {} and {}",
            a.level, b.level
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_arithmetic() {
        let mut backend = MockBackend::new();
        let a = backend.encrypt(6).unwrap();
        let b = backend.encrypt(7).unwrap();
        let sum = backend.add(&a, &b).unwrap();
        let mut product = backend.multiply(&sum, &b).unwrap();
        assert_eq!(backend.decrypt(&product).unwrap(), 91);
        assert_eq!(product.parts, 3);
        backend.relinearize(&mut product).unwrap();
        assert_eq!(product.parts, 2);
        // budgets: a = 59, b = 58.5, sum = 57.5
        assert_eq!(backend.noise_budget(&product).unwrap(), 37.25);
    }

    #[test]
    fn test_mock_mod_switch_limit() {
        let mut backend = MockBackend::new();
        let mut ct = backend.encrypt(1).unwrap();
        for _ in 0..MAX_LEVEL {
            backend.mod_switch(&mut ct).unwrap();
        }
        assert!(backend.mod_switch(&mut ct).is_err());
    }

    #[test]
    fn test_dishonest_decryption_when_exhausted() {
        let backend = MockBackend::default();
        let ct = MockCiphertext {
            value: 4,
            budget: 0.,
            parts: 2,
            level: 0,
        };
        assert_eq!(backend.decrypt(&ct).unwrap(), 5);
    }
}
