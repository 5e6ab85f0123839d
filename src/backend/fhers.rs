//! BFV backend on top of fhe.rs.
//!
//! The ciphertext level is tracked next to the library ciphertext: decoding
//! and the noise budget both depend on which moduli are still in the chain.

use crate::backend::{BackendId, Capabilities, NoiseBackend};
use crate::error::{Error, Result};
use crate::params::ResolvedParams;

use fhe::bfv::{
    BfvParameters, BfvParametersBuilder, Ciphertext, Encoding, Plaintext, PublicKey,
    RelinearizationKey, SecretKey,
};
use fhe_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::debug;

pub struct KeyChain {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    /// Key switching needs a special modulus, so a single modulus chain has
    /// no relinearization key
    pub relin_key: Option<RelinearizationKey>,
}

impl KeyChain {
    pub fn generate(params: &Arc<BfvParameters>, rng: &mut StdRng) -> Result<Self> {
        let secret_key = SecretKey::random(params, rng);
        let public_key = PublicKey::new(&secret_key, rng);
        let relin_key = if params.moduli().len() > 1 {
            Some(
                RelinearizationKey::new(&secret_key, rng)
                    .map_err(|e| Error::KeyGeneration(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(KeyChain {
            secret_key,
            public_key,
            relin_key,
        })
    }
}

#[derive(Clone)]
pub struct LeveledCiphertext {
    inner: Ciphertext,
    level: usize,
    parts: usize,
}

impl LeveledCiphertext {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn parts(&self) -> usize {
        self.parts
    }
}

pub struct FheBackend {
    params: Arc<BfvParameters>,
    keys: KeyChain,
    rng: StdRng,
    moduli_sizes: Vec<usize>,
    log_moduli: Vec<f64>,
}

impl FheBackend {
    pub fn new(params: &ResolvedParams, seed: Option<u64>) -> Result<Self> {
        let bfv_params = BfvParametersBuilder::new()
            .set_degree(params.degree)
            .set_plaintext_modulus(params.plaintext_modulus)
            .set_moduli_sizes(&params.moduli_sizes)
            .build_arc()
            .map_err(|e| Error::InvalidParameters(e.to_string()))?;

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        debug!(degree = params.degree, "generating BFV keys");
        let keys = KeyChain::generate(&bfv_params, &mut rng)?;
        let log_moduli = bfv_params
            .moduli()
            .iter()
            .map(|q| (*q as f64).log2())
            .collect();

        Ok(FheBackend {
            params: bfv_params,
            keys,
            rng,
            moduli_sizes: params.moduli_sizes.clone(),
            log_moduli,
        })
    }

    /// log2 of the ciphertext modulus once `level` moduli have been dropped
    fn log_q(&self, level: usize) -> f64 {
        self.log_moduli[..self.log_moduli.len() - level].iter().sum()
    }

    fn max_level(&self) -> usize {
        self.params.max_level()
    }
}

impl NoiseBackend for FheBackend {
    type Ciphertext = LeveledCiphertext;

    fn backend_id(&self) -> BackendId {
        BackendId::Fhe
    }

    fn name(&self) -> &'static str {
        "fhe.rs BFV"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            relinearize: self.keys.relin_key.is_some(),
            // fhe.rs products have three parts until they are relinearized
            repeated_multiply: self.keys.relin_key.is_some(),
            mod_switch: self.max_level() > 0,
            estimated_budget: false,
            exact_arithmetic: true,
        }
    }

    fn plaintext_modulus(&self) -> u64 {
        self.params.plaintext()
    }

    fn describe(&self) -> Vec<(String, String)> {
        vec![
            ("scheme".into(), "BFV".into()),
            ("poly_modulus_degree".into(), self.params.degree().to_string()),
            (
                "coeff_modulus".into(),
                format!(
                    "{} bits ({})",
                    self.moduli_sizes.iter().sum::<usize>(),
                    self.moduli_sizes.iter().join(" + ")
                ),
            ),
            ("plain_modulus".into(), self.params.plaintext().to_string()),
            ("levels".into(), (self.max_level() + 1).to_string()),
        ]
    }

    fn encrypt(&mut self, value: u64) -> Result<LeveledCiphertext> {
        let values: &[u64] = &[value];
        let pt = Plaintext::try_encode(values, Encoding::poly(), &self.params)
            .map_err(|e| Error::Encryption(e.to_string()))?;
        let inner: Ciphertext = self
            .keys
            .public_key
            .try_encrypt(&pt, &mut self.rng)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        Ok(LeveledCiphertext {
            inner,
            level: 0,
            parts: 2,
        })
    }

    fn decrypt(&self, ct: &LeveledCiphertext) -> Result<u64> {
        let pt = self
            .keys
            .secret_key
            .try_decrypt(&ct.inner)
            .map_err(|e| Error::Decryption(e.to_string()))?;
        let values = Vec::<u64>::try_decode(&pt, Encoding::poly_at_level(ct.level))
            .map_err(|e| Error::Decryption(e.to_string()))?;

        values
            .first()
            .copied()
            .ok_or_else(|| Error::Decryption("empty plaintext".into()))
    }

    fn add(&self, a: &LeveledCiphertext, b: &LeveledCiphertext) -> Result<LeveledCiphertext> {
        check_same_level(a, b)?;
        Ok(LeveledCiphertext {
            inner: &a.inner + &b.inner,
            level: a.level,
            parts: a.parts.max(b.parts),
        })
    }

    fn multiply(&self, a: &LeveledCiphertext, b: &LeveledCiphertext) -> Result<LeveledCiphertext> {
        check_same_level(a, b)?;
        if a.parts() != 2 || b.parts() != 2 {
            return Err(Error::Evaluation(
                "multiplication expects relinearized inputs".into(),
            ));
        }
        Ok(LeveledCiphertext {
            inner: &a.inner * &b.inner,
            level: a.level,
            parts: 3,
        })
    }

    fn relinearize(&self, ct: &mut LeveledCiphertext) -> Result<()> {
        if ct.parts() == 2 {
            return Ok(());
        }
        // the relinearization key is generated for fresh ciphertexts only
        if ct.level != 0 {
            return Err(Error::Evaluation(format!(
                "no relinearization key for level {}",
                ct.level
            )));
        }
        let relin_key = self.keys.relin_key.as_ref().ok_or(Error::Unsupported {
            backend: self.name(),
            operation: "relinearization with a single modulus",
        })?;
        relin_key
            .relinearizes(&mut ct.inner)
            .map_err(|e| Error::Evaluation(e.to_string()))?;
        ct.parts = 2;
        Ok(())
    }

    fn mod_switch(&self, ct: &mut LeveledCiphertext) -> Result<()> {
        // switch_down is a silent no-op on the last modulus
        if ct.level() >= self.max_level() {
            return Err(Error::Unsupported {
                backend: self.name(),
                operation: "modulus switch below the last modulus",
            });
        }
        ct.inner
            .switch_down()
            .map_err(|e| Error::Evaluation(e.to_string()))?;
        ct.level += 1;
        Ok(())
    }

    fn noise_budget(&self, ct: &LeveledCiphertext) -> Result<f64> {
        // measure_noise is variable time in the noise it measures, which only
        // matters for a deployed decryptor
        let noise_bits = unsafe { self.keys.secret_key.measure_noise(&ct.inner) }
            .map_err(|e| Error::Measurement(e.to_string()))?;
        let budget = self.log_q(ct.level)
            - (self.params.plaintext() as f64).log2()
            - 1.
            - noise_bits as f64;
        Ok(budget.max(0.))
    }

    fn estimated_noise_budget(&self, _ct: &LeveledCiphertext) -> Result<Option<f64>> {
        Ok(None)
    }
}

fn check_same_level(a: &LeveledCiphertext, b: &LeveledCiphertext) -> Result<()> {
    if a.level() != b.level() {
        return Err(Error::Evaluation(format!(
            "operands at levels {} and {}",
            a.level(), b.level()
        )));
    }
    Ok(())
}
