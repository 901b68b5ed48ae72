//! # Some useful functions for simulating code performance
//!
//! The [`random_bits`] function returns a given number of random bits; the [`bpsk_awgn_channel`]
//! function returns the LLR values at the output of a BPSK-AWGN channel corresponding to given
//! input bits; the [`awgn_channel`] function adds Gaussian noise to arbitrary real symbols; the
//! [`bpsk_slicer`] function slices symbols to bits; and the [`error_count`] function returns the
//! number of errors in a sequence with respect to a reference sequence.
//!
//! # Examples
//!
//! The code below illustrates the usage of the functions in this module.
//! ```
//! use fecodec::utils;
//!
//! let mut rng = rand::rng();
//! let num_bits = 40;
//! let es_over_n0_db = 10.0;
//! let bits = utils::random_bits(num_bits);
//! let bits_llr = utils::bpsk_awgn_channel(&bits, es_over_n0_db, &mut rng);
//! let bits_hat = utils::bpsk_slicer(&bits_llr);
//! let err_count = utils::error_count(&bits_hat, &bits);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::Bit;

/// Returns given number of random bits.
///
/// # Parameters
///
/// - `num_bits`: Number of random bits to be generated.
///
/// # Returns
///
/// - `bits`: Random bits.
#[must_use]
pub fn random_bits(num_bits: usize) -> Vec<Bit> {
    random_bits_from_rng(num_bits, &mut rand::rng())
}

/// Returns given number of random bits, reproducible from a seed.
#[must_use]
pub fn random_bits_with_seed(num_bits: usize, seed: u64) -> Vec<Bit> {
    random_bits_from_rng(num_bits, &mut StdRng::seed_from_u64(seed))
}

/// Returns given number of random bits drawn with the given random number generator.
pub fn random_bits_from_rng<R: Rng + ?Sized>(num_bits: usize, rng: &mut R) -> Vec<Bit> {
    (0 .. num_bits)
        .map(|_| {
            if rng.random_bool(0.5) {
                Bit::One
            } else {
                Bit::Zero
            }
        })
        .collect()
}

/// Returns LLR values at BPSK-AWGN channel output corresponding to given input bits.
///
/// # Parameters
///
/// - `bits`: Bits to be transmitted over the BPSK-AWGN channel.
///
/// - `es_over_n0_db`: Ratio (dB) of symbol energy to noise power spectral density at the BPSK-AWGN
///   channel output (if the BPSK symbols are `+1.0` and `-1.0`, then the noise variance is
///   `0.5 / 10f64.powf(0.1 * es_over_n0_db)`).
///
/// - `rng`: Random number generator to be used.
///
/// # Returns
///
/// - `bits_llr`: Log-likelihood-ratio (LLR) values at the BPSK-AWGN channel output corresponding
///   to the transmitted bits, with positive values indicating that `Zero` is more likely.
pub fn bpsk_awgn_channel<R: Rng + ?Sized>(bits: &[Bit], es_over_n0_db: f64, rng: &mut R) -> Vec<f64> {
    let es_over_n0 = 10f64.powf(0.1 * es_over_n0_db);
    let noise_var = 0.5 / es_over_n0;
    let syms: Vec<f64> = bits
        .iter()
        .map(|b| match b {
            Bit::Zero => 1f64,
            Bit::One => -1f64,
        })
        .collect();
    awgn_channel(&syms, noise_var, rng)
        .into_iter()
        .map(|y| 2.0 * y / noise_var)
        .collect()
}

/// Returns given real symbols with independent Gaussian noise of given variance added to each.
///
/// # Parameters
///
/// - `syms`: Symbols to be transmitted over the AWGN channel.
///
/// - `noise_var`: Variance of the noise added to each symbol.
///
/// - `rng`: Random number generator to be used.
pub fn awgn_channel<R: Rng + ?Sized>(syms: &[f64], noise_var: f64, rng: &mut R) -> Vec<f64> {
    let noise_std = noise_var.sqrt();
    syms.iter()
        .map(|&x| x + noise_std * rng.sample::<f64, _>(StandardNormal))
        .collect()
}

/// Returns BPSK slicer output.
///
/// # Parameters
///
/// - `syms`: Symbols to be sliced. Nonnegative values are mapped to `Zero`, and negative values to
///   `One`.
///
/// # Returns
///
/// - `bits_hat`: Bits obtained by slicing the given symbols.
#[must_use]
pub fn bpsk_slicer(syms: &[f64]) -> Vec<Bit> {
    syms.iter()
        .map(|&x| crate::llr::hard_decision(x))
        .collect()
}

/// Returns number of errors in a sequence with respect to a reference sequence.
///
/// # Parameters
///
/// - `seq`: Sequence in which errors must be counted.
///
/// - `ref_seq`: Reference sequence to which the given sequence is compared.
///
/// # Returns
///
/// - `err_count`: Number of positions in which the two sequences differ. If they are of different
///   lengths, then the longer sequence is effectively truncated to the length of the shorter one.
pub fn error_count<T: PartialEq>(seq: &[T], ref_seq: &[T]) -> usize {
    ref_seq
        .iter()
        .zip(seq.iter())
        .filter(|&(x, y)| x != y)
        .count()
}
