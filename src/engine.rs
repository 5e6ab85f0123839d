use crate::backend::NoiseBackend;
use crate::chain::{Chain, Node, Op, Reduction};
use crate::error::{Error, Result};

use std::collections::HashMap;
use tracing::trace;

/// A ciphertext together with the value it should decrypt to.
pub struct Slot<C> {
    pub ct: C,
    pub expected: u64,
}

/// Noise budget sampled at one probe of one trial
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub observed: f64,
    pub estimated: Option<f64>,
}

/// Executes a chain against a backend, one trial at a time.
pub struct Engine<'a, B: NoiseBackend> {
    backend: &'a mut B,
    chain: &'a Chain,
    verify: bool,
    namespace: HashMap<String, Slot<B::Ciphertext>>,
}

impl<'a, B: NoiseBackend> Engine<'a, B> {
    pub fn new(backend: &'a mut B, chain: &'a Chain, verify: bool) -> Result<Self> {
        chain.validate()?;
        Ok(Engine {
            backend,
            chain,
            verify,
            namespace: HashMap::new(),
        })
    }

    /// Runs trial `trial` and returns one sample per probe, in chain order.
    pub fn run_trial(&mut self, trial: usize) -> Result<Vec<Sample>> {
        // ciphertexts of the previous trial are dropped here
        self.reset();

        let modulus = self.backend.plaintext_modulus();
        let inputs = self.chain.inputs_for_trial(trial, modulus);
        let chain = self.chain;
        let mut samples = Vec::with_capacity(chain.probes().count());

        for node in &chain.nodes {
            self.execute_node(node, &inputs, modulus, trial)?;

            if let Some(probe) = &node.probe {
                let slot = self.get(&node.output)?;
                if self.verify && self.backend.capabilities().exact_arithmetic {
                    self.check(slot, trial, &probe.label)?;
                }
                let sample = Sample {
                    observed: self.backend.noise_budget(&slot.ct)?,
                    estimated: self.backend.estimated_noise_budget(&slot.ct)?,
                };
                trace!(trial, step = probe.label.as_str(), budget = sample.observed);
                samples.push(sample);
            }

            if let Some(reduction) = node.reduce {
                let slot = self.namespace.get_mut(&node.output).ok_or_else(|| {
                    Error::MalformedChain(format!("{} not found in namespace", node.output))
                })?;
                match reduction {
                    Reduction::Relinearize => self.backend.relinearize(&mut slot.ct)?,
                    Reduction::ModSwitch => self.backend.mod_switch(&mut slot.ct)?,
                }
            }
        }

        Ok(samples)
    }

    fn reset(&mut self) {
        self.namespace.clear();
    }

    fn execute_node(&mut self, node: &Node, inputs: &[u64], modulus: u64, trial: usize) -> Result<()> {
        let output = match node.op {
            Op::Encrypt { input } => {
                let value = inputs[input];
                let ct = self.backend.encrypt(value)?;
                let slot = Slot {
                    ct,
                    expected: value,
                };
                // round trip of every fresh input, whatever the backend
                if self.verify {
                    self.check(&slot, trial, &format!("encrypt input {}", input))?;
                }
                slot
            }
            Op::Add => {
                let (a, b) = (self.get(&node.inputs[0])?, self.get(&node.inputs[1])?);
                Slot {
                    ct: self.backend.add(&a.ct, &b.ct)?,
                    expected: (a.expected + b.expected) % modulus,
                }
            }
            Op::Multiply => {
                let (a, b) = (self.get(&node.inputs[0])?, self.get(&node.inputs[1])?);
                Slot {
                    ct: self.backend.multiply(&a.ct, &b.ct)?,
                    expected: mul_mod(a.expected, b.expected, modulus),
                }
            }
            Op::Relinearize | Op::ModSwitch => {
                let mut slot = self.take(&node.inputs[0])?;
                if node.op == Op::Relinearize {
                    self.backend.relinearize(&mut slot.ct)?;
                } else {
                    self.backend.mod_switch(&mut slot.ct)?;
                }
                slot
            }
        };

        self.namespace.insert(node.output.clone(), output);
        Ok(())
    }

    fn check(&self, slot: &Slot<B::Ciphertext>, trial: usize, step: &str) -> Result<()> {
        let actual = self.backend.decrypt(&slot.ct)?;
        if actual != slot.expected {
            return Err(Error::Mismatch {
                trial,
                step: step.to_string(),
                expected: slot.expected,
                actual,
            });
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<&Slot<B::Ciphertext>> {
        self.namespace
            .get(name)
            .ok_or_else(|| Error::MalformedChain(format!("{} not found in namespace", name)))
    }

    fn take(&mut self, name: &str) -> Result<Slot<B::Ciphertext>> {
        self.namespace
            .remove(name)
            .ok_or_else(|| Error::MalformedChain(format!("{} not found in namespace", name)))
    }
}

fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((a as u128 * b as u128) % modulus as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, MockCiphertext};
    use crate::backend::{BackendId, Capabilities};
    use crate::chain::ChainKind;

    #[test]
    fn test_basic_trial_zero() {
        let mut backend = MockBackend::new();
        let chain = Chain::for_kind(ChainKind::Basic, &backend.capabilities());
        let mut engine = Engine::new(&mut backend, &chain, true).unwrap();
        let samples = engine.run_trial(0).unwrap();

        // inputs (0, 1): fresh 60 and 59.5
        let observed: Vec<f64> = samples.iter().map(|s| s.observed).collect();
        assert_eq!(observed, vec![60., 58.5, 38.5, 35.5]);
        assert_eq!(samples[0].estimated, Some(58.));
    }

    #[test]
    fn test_deep_trial_relinearizes_between_levels() {
        let mut backend = MockBackend::new();
        let chain = Chain::for_kind(ChainKind::Deep, &backend.capabilities());
        let mut engine = Engine::new(&mut backend, &chain, true).unwrap();
        let samples = engine.run_trial(0).unwrap();
        assert_eq!(samples.len(), 4);
        for pair in samples.windows(2) {
            assert!(pair[0].observed > pair[1].observed);
        }
        // inputs 1..=8 multiply to 40320
        let root = engine.get("p30").unwrap();
        assert_eq!(root.expected, 40320 % 257);
    }

    #[test]
    fn test_namespace_is_reset_between_trials() {
        let mut backend = MockBackend::new();
        let chain = Chain::for_kind(ChainKind::Basic, &backend.capabilities());
        let mut engine = Engine::new(&mut backend, &chain, false).unwrap();
        engine.run_trial(0).unwrap();
        engine.run_trial(5).unwrap();
        assert_eq!(engine.get("x0").unwrap().expected, 5);
        assert_eq!(engine.get("prod").unwrap().expected, (5 + 6) * 6);
    }

    #[test]
    fn test_verification_detects_wrong_decryption() {
        struct Faulty(MockBackend);

        impl NoiseBackend for Faulty {
            type Ciphertext = MockCiphertext;
            fn backend_id(&self) -> BackendId {
                BackendId::Mock
            }
            fn name(&self) -> &'static str {
                "faulty"
            }
            fn capabilities(&self) -> Capabilities {
                self.0.capabilities()
            }
            fn plaintext_modulus(&self) -> u64 {
                self.0.plaintext_modulus()
            }
            fn describe(&self) -> Vec<(String, String)> {
                Vec::new()
            }
            fn encrypt(&mut self, value: u64) -> Result<MockCiphertext> {
                self.0.encrypt(value)
            }
            fn decrypt(&self, ct: &MockCiphertext) -> Result<u64> {
                // products decrypt off by one
                Ok(if ct.parts == 3 { ct.value + 1 } else { ct.value })
            }
            fn add(&self, a: &MockCiphertext, b: &MockCiphertext) -> Result<MockCiphertext> {
                self.0.add(a, b)
            }
            fn multiply(&self, a: &MockCiphertext, b: &MockCiphertext) -> Result<MockCiphertext> {
                self.0.multiply(a, b)
            }
            fn relinearize(&self, ct: &mut MockCiphertext) -> Result<()> {
                self.0.relinearize(ct)
            }
            fn mod_switch(&self, ct: &mut MockCiphertext) -> Result<()> {
                self.0.mod_switch(ct)
            }
            fn noise_budget(&self, ct: &MockCiphertext) -> Result<f64> {
                self.0.noise_budget(ct)
            }
            fn estimated_noise_budget(&self, ct: &MockCiphertext) -> Result<Option<f64>> {
                self.0.estimated_noise_budget(ct)
            }
        }

        let mut backend = Faulty(MockBackend::new());
        let chain = Chain::for_kind(ChainKind::Basic, &backend.capabilities());

        {
            let mut engine = Engine::new(&mut backend, &chain, false).unwrap();
            assert!(engine.run_trial(1).is_ok());
        }

        let mut engine = Engine::new(&mut backend, &chain, true).unwrap();
        match engine.run_trial(1) {
            Err(Error::Mismatch {
                trial,
                step,
                expected,
                actual,
            }) => {
                assert_eq!(trial, 1);
                assert_eq!(step, "mult");
                assert_eq!(expected, 6);
                assert_eq!(actual, 7);
            }
            _ => panic!("expected a mismatch"),
        }
    }

    #[test]
    fn test_rejects_malformed_chain() {
        let mut backend = MockBackend::new();
        let mut chain = Chain::for_kind(ChainKind::Basic, &backend.capabilities());
        chain.nodes.remove(1);
        assert!(Engine::new(&mut backend, &chain, false).is_err());
    }
}
