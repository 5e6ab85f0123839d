// Default scheme parameters of the experiments

pub const DEFAULT_BASIC_DEGREE: usize = 4096;
pub const DEFAULT_DEEP_DEGREE: usize = 8192; // three multiplicative levels exhaust n = 4096
pub const DEFAULT_PLAINTEXT_MODULUS: u64 = 65537; // = 1 mod 2n up to n = 32768

// HE standard 128 bit security coefficient modulus chains (BFV defaults)
pub const MODULI_2048: &[usize] = &[54];
pub const MODULI_4096: &[usize] = &[36, 36, 37];
pub const MODULI_8192: &[usize] = &[43, 43, 44, 44, 44];
pub const MODULI_16384: &[usize] = &[48, 48, 48, 49, 49, 49, 49, 49, 49];
pub const MODULI_32768: &[usize] = &[55; 16];

pub const SUPPORTED_DEGREES: &[usize] = &[2048, 4096, 8192, 16384, 32768];

pub fn standard_moduli(degree: usize) -> Option<&'static [usize]> {
    match degree {
        2048 => Some(MODULI_2048),
        4096 => Some(MODULI_4096),
        8192 => Some(MODULI_8192),
        16384 => Some(MODULI_16384),
        32768 => Some(MODULI_32768),
        _ => None,
    }
}

// fhe.rs accepts moduli between these sizes
pub const MIN_MODULUS_BITS: usize = 10;
pub const MAX_MODULUS_BITS: usize = 62;

// Zama whitepaper 128 bit security key parameters (concrete backend)
pub const LWE_DIMENSION: usize = 938;
pub const LWE_NOISE: i32 = -23;
pub const RLWE_SIZE: usize = 4096;
pub const RLWE_NOISE: i32 = -62;
pub const BASE_LOG: usize = 6;
pub const LEVEL: usize = 4;

pub const PRECISION: usize = 4; // message bits of the concrete encoder
pub const PADDING: usize = 2; // one bit per addition, one kept for the multiplication bootstraps

// Largest accepted trial count; samples are stored per trial and step
pub const MAX_TRIALS: usize = 1 << 24;

// Tolerance for the running sum vs. retained samples cross check
pub const MEAN_TOLERANCE: f64 = 1e-9;
