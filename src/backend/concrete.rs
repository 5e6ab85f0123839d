//! LWE backend on top of concrete.
//!
//! Concrete has no relinearization and no modulus chain: multiplication goes
//! through two bootstraps, and every ciphertext carries the variance of its
//! noise, which gives the estimated budget next to the observed one.

use crate::backend::{BackendId, Capabilities, NoiseBackend};
use crate::error::{Error, Result};

#[cfg(feature = "concrete")]
use crate::cfg;
#[cfg(feature = "concrete")]
use concrete::*;
#[cfg(feature = "concrete")]
use tracing::debug;

#[cfg(feature = "concrete")]
pub struct KeyChain {
    pub secret_key_in: LWESecretKey,
    pub secret_key_out: LWESecretKey,
    pub bootstrapping_key: LWEBSK,
    pub key_switching_key: LWEKSK,
}

#[cfg(feature = "concrete")]
impl KeyChain {
    pub fn generate() -> Self {
        let rlwe_params = RLWEParams {
            dimension: 1,
            polynomial_size: cfg::RLWE_SIZE,
            log2_std_dev: cfg::RLWE_NOISE,
        };
        let lwe_params = LWEParams {
            dimension: cfg::LWE_DIMENSION,
            log2_std_dev: cfg::LWE_NOISE,
        };
        let sk_rlwe = RLWESecretKey::new(&rlwe_params);
        let sk_in = LWESecretKey::new(&lwe_params);
        let sk_out = sk_rlwe.to_lwe_secret_key();
        let bsk = LWEBSK::new(&sk_in, &sk_rlwe, cfg::BASE_LOG, cfg::LEVEL);
        let ksk = LWEKSK::new(&sk_out, &sk_in, cfg::BASE_LOG, cfg::LEVEL);

        KeyChain {
            secret_key_in: sk_in,
            secret_key_out: sk_out,
            bootstrapping_key: bsk,
            key_switching_key: ksk,
        }
    }
}

/// Concrete LWE backend.
///
/// Inputs are reduced modulo `2^PRECISION` and encoded on `[0, 2^PRECISION)`.
pub struct ConcreteBackend {
    #[cfg(feature = "concrete")]
    keys: KeyChain,
    #[cfg(feature = "concrete")]
    encoder: Encoder,
    #[cfg(not(feature = "concrete"))]
    _marker: std::marker::PhantomData<()>,
}

impl ConcreteBackend {
    #[cfg(feature = "concrete")]
    pub fn new() -> Result<Self> {
        let modulus = 1u64 << cfg::PRECISION;
        let encoder = Encoder::new(0., modulus as f64, cfg::PRECISION, cfg::PADDING)
            .map_err(|e| Error::InvalidParameters(format!("{:?}", e)))?;

        debug!("generating LWE bootstrapping and key switching keys");
        let keys = KeyChain::generate();

        Ok(ConcreteBackend { keys, encoder })
    }

    #[cfg(not(feature = "concrete"))]
    pub fn new() -> Result<Self> {
        Err(Error::BackendUnavailable(
            "concrete feature not enabled. Build with --features concrete".into(),
        ))
    }

    pub fn is_available() -> bool {
        cfg!(feature = "concrete")
    }
}

#[cfg(feature = "concrete")]
impl ConcreteBackend {
    // choose the key matching the ciphertext dimension
    fn decryption_key(&self, ct: &LWE) -> &LWESecretKey {
        if ct.dimension == cfg::LWE_DIMENSION {
            &self.keys.secret_key_in
        } else {
            &self.keys.secret_key_out
        }
    }

    // bootstrapped results live under the output key
    fn to_input_key(&self, ct: &LWE) -> Result<LWE> {
        if ct.dimension == cfg::LWE_DIMENSION {
            Ok(ct.clone())
        } else {
            ct.keyswitch(&self.keys.key_switching_key)
                .map_err(|e| Error::Evaluation(format!("{:?}", e)))
        }
    }

    /// Bootstraps `ct` back to the fresh encoding, reducing its value modulo
    /// `2^PRECISION`. Sums carry less padding and a wider interval than fresh
    /// inputs, and products come out under the output key, so both operands
    /// of a multiplication go through here first.
    fn refresh(&self, ct: &LWE) -> Result<LWE> {
        let ct = self.to_input_key(ct)?;
        let modulus = self.plaintext_modulus() as i64;
        let reduce = |x: f64| (x.round() as i64).rem_euclid(modulus) as f64;
        let refreshed = ct
            .bootstrap_with_function(&self.keys.bootstrapping_key, &reduce, &self.encoder)
            .map_err(|e| Error::Evaluation(format!("{:?}", e)))?;
        self.to_input_key(&refreshed)
    }

    fn decode(&self, ct: &LWE) -> Result<f64> {
        ct.decrypt_decode(self.decryption_key(ct))
            .map_err(|e| Error::Decryption(format!("{:?}", e)))
    }
}

#[cfg(feature = "concrete")]
impl NoiseBackend for ConcreteBackend {
    type Ciphertext = LWE;

    fn backend_id(&self) -> BackendId {
        BackendId::Concrete
    }

    fn name(&self) -> &'static str {
        "concrete LWE"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            relinearize: false,
            // bootstrapped products come out as plain LWE ciphertexts
            repeated_multiply: true,
            mod_switch: false,
            estimated_budget: true,
            exact_arithmetic: false,
        }
    }

    fn plaintext_modulus(&self) -> u64 {
        1 << cfg::PRECISION
    }

    fn describe(&self) -> Vec<(String, String)> {
        vec![
            ("scheme".into(), "LWE with programmable bootstrapping".into()),
            ("lwe_dimension".into(), cfg::LWE_DIMENSION.to_string()),
            ("lwe_log2_std_dev".into(), cfg::LWE_NOISE.to_string()),
            ("rlwe_polynomial_size".into(), cfg::RLWE_SIZE.to_string()),
            ("rlwe_log2_std_dev".into(), cfg::RLWE_NOISE.to_string()),
            (
                "decomposition".into(),
                format!("base_log {}, level {}", cfg::BASE_LOG, cfg::LEVEL),
            ),
            (
                "encoder".into(),
                format!("{} bit precision, {} bit padding", cfg::PRECISION, cfg::PADDING),
            ),
        ]
    }

    fn encrypt(&mut self, value: u64) -> Result<LWE> {
        LWE::encode_encrypt(&self.keys.secret_key_in, value as f64, &self.encoder)
            .map_err(|e| Error::Encryption(format!("{:?}", e)))
    }

    fn decrypt(&self, ct: &LWE) -> Result<u64> {
        let decoded = self.decode(ct)?.round() as i64;
        Ok(decoded.rem_euclid(self.plaintext_modulus() as i64) as u64)
    }

    fn add(&self, a: &LWE, b: &LWE) -> Result<LWE> {
        a.add_with_padding(b)
            .map_err(|e| Error::Evaluation(format!("{:?}", e)))
    }

    fn multiply(&self, a: &LWE, b: &LWE) -> Result<LWE> {
        let a = self.refresh(a)?;
        let b = self.refresh(b)?;
        a.mul_from_bsk(
            &b,
            &self.keys.bootstrapping_key,
            &self.keys.key_switching_key,
        )
        .map_err(|e| Error::Evaluation(format!("{:?}", e)))
    }

    fn relinearize(&self, _ct: &mut LWE) -> Result<()> {
        Err(Error::Unsupported {
            backend: self.name(),
            operation: "relinearization",
        })
    }

    fn mod_switch(&self, _ct: &mut LWE) -> Result<()> {
        Err(Error::Unsupported {
            backend: self.name(),
            operation: "modulus switching",
        })
    }

    /// Bits left before the decoded value rounds to a wrong integer, from the
    /// observed distance to the nearest integer.
    fn noise_budget(&self, ct: &LWE) -> Result<f64> {
        let decoded = self.decode(ct)?;
        let error = (decoded - decoded.round()).abs().max(f64::EPSILON);
        Ok((0.5_f64.log2() - error.log2()).max(0.))
    }

    /// Same quantity from the variance concrete tracks for the ciphertext.
    fn estimated_noise_budget(&self, ct: &LWE) -> Result<Option<f64>> {
        let std_dev = ct.variance.sqrt()
            * ct.encoder.delta
            * 2_f64.powi(ct.encoder.nb_bit_padding as i32);
        Ok(Some((0.5_f64.log2() - std_dev.max(f64::EPSILON).log2()).max(0.)))
    }
}

/// Without the feature the backend can never be constructed; the impl keeps
/// the dispatch in `main` uniform.
#[cfg(not(feature = "concrete"))]
impl NoiseBackend for ConcreteBackend {
    type Ciphertext = ();

    fn backend_id(&self) -> BackendId {
        BackendId::Concrete
    }

    fn name(&self) -> &'static str {
        "concrete LWE (unavailable)"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            relinearize: false,
            repeated_multiply: false,
            mod_switch: false,
            estimated_budget: false,
            exact_arithmetic: false,
        }
    }

    fn plaintext_modulus(&self) -> u64 {
        2
    }

    fn describe(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn encrypt(&mut self, _value: u64) -> Result<()> {
        Err(unavailable())
    }

    fn decrypt(&self, _ct: &()) -> Result<u64> {
        Err(unavailable())
    }

    fn add(&self, _a: &(), _b: &()) -> Result<()> {
        Err(unavailable())
    }

    fn multiply(&self, _a: &(), _b: &()) -> Result<()> {
        Err(unavailable())
    }

    fn relinearize(&self, _ct: &mut ()) -> Result<()> {
        Err(unavailable())
    }

    fn mod_switch(&self, _ct: &mut ()) -> Result<()> {
        Err(unavailable())
    }

    fn noise_budget(&self, _ct: &()) -> Result<f64> {
        Err(unavailable())
    }

    fn estimated_noise_budget(&self, _ct: &()) -> Result<Option<f64>> {
        Err(unavailable())
    }
}

#[cfg(not(feature = "concrete"))]
fn unavailable() -> Error {
    Error::BackendUnavailable("concrete feature not enabled".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "concrete"))]
    #[test]
    fn test_unavailable_without_feature() {
        assert!(!ConcreteBackend::is_available());
        assert!(matches!(
            ConcreteBackend::new(),
            Err(Error::BackendUnavailable(_))
        ));
    }

    #[cfg(feature = "concrete")]
    #[test]
    fn test_encrypt_add_decrypt() {
        let mut backend = ConcreteBackend::new().unwrap();
        let a = backend.encrypt(3).unwrap();
        let b = backend.encrypt(4).unwrap();
        assert_eq!(backend.decrypt(&a).unwrap(), 3);
        let sum = backend.add(&a, &b).unwrap();
        assert_eq!(backend.decrypt(&sum).unwrap(), 7);
        assert!(backend.estimated_noise_budget(&sum).unwrap().unwrap() > 0.);
    }

    #[cfg(feature = "concrete")]
    #[test]
    fn test_multiply_sum_by_fresh_input() {
        let mut backend = ConcreteBackend::new().unwrap();
        let a = backend.encrypt(1).unwrap();
        let b = backend.encrypt(2).unwrap();
        let sum = backend.add(&a, &b).unwrap();
        // padding 1 on the sum, padding 2 on the input
        let product = backend.multiply(&sum, &b).unwrap();
        assert_eq!(backend.decrypt(&product).unwrap(), 6);
    }

    #[cfg(feature = "concrete")]
    fn run_chain(kind: crate::chain::ChainKind, trials: usize) -> crate::runner::Measurements {
        use crate::chain::Chain;
        use crate::runner::{self, RunOptions};

        let mut backend = ConcreteBackend::new().unwrap();
        let chain = Chain::for_kind(kind, &backend.capabilities());
        runner::run(&mut backend, &chain, &RunOptions::new(trials)).unwrap()
    }

    #[cfg(feature = "concrete")]
    #[test]
    fn test_basic_chain_runs() {
        let measurements = run_chain(crate::chain::ChainKind::Basic, 2);
        let labels: Vec<&str> = measurements
            .steps
            .iter()
            .map(|s| s.probe.label.as_str())
            .collect();
        assert_eq!(labels, vec!["fresh", "add", "mult"]);
        for step in &measurements.steps {
            assert_eq!(step.observed.samples.as_ref().unwrap().len(), 2);
            assert_eq!(step.estimated.as_ref().unwrap().count, 2);
        }
    }

    #[cfg(feature = "concrete")]
    #[test]
    fn test_deep_chain_runs() {
        let measurements = run_chain(crate::chain::ChainKind::Deep, 2);
        assert_eq!(measurements.steps.len(), 4);
        for step in &measurements.steps {
            assert_eq!(step.observed.count, 2);
            assert_eq!(step.estimated.as_ref().unwrap().samples.as_ref().unwrap().len(), 2);
        }
    }
}
