//! Simulator to evaluate the performance of a code over a BPSK-AWGN channel

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{utils, CodecArchive, Error};

/// Parameters for simulation of a code over a BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimParams {
    /// Code to be simulated
    pub code: CodecArchive,
    /// Ratio (dB) of symbol energy to noise power spectral density at BPSK-AWGN channel output
    pub es_over_n0_db: f64,
    /// Desired minimum number of block errors
    pub num_block_errors_min: u32,
    /// Number of blocks to be transmitted per run
    pub num_blocks_per_run: u32,
    /// Minimum number of runs of blocks to be simulated
    pub num_runs_min: u32,
    /// Maximum number of runs of blocks to be simulated
    pub num_runs_max: u32,
    /// Seed of the random number generator (a seed is drawn from the caller's generator if absent)
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Results from simulation of a code over a BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimResults {
    /// Simulation parameters
    pub params: SimParams,
    /// Number of blocks transmitted
    pub num_blocks: u32,
    /// Number of message bits transmitted
    pub num_msg_bits: u64,
    /// Number of message bit errors
    pub num_msg_bit_errors: u64,
    /// Number of block errors
    pub num_block_errors: u32,
}

impl SimResults {
    /// Returns empty results for given parameters.
    #[must_use]
    pub fn new(params: &SimParams) -> Self {
        Self {
            params: params.clone(),
            num_blocks: 0,
            num_msg_bits: 0,
            num_msg_bit_errors: 0,
            num_block_errors: 0,
        }
    }

    /// Returns message bit error rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ber(&self) -> f64 {
        if self.num_msg_bits == 0 {
            0.0
        } else {
            self.num_msg_bit_errors as f64 / self.num_msg_bits as f64
        }
    }

    /// Returns block error rate.
    #[must_use]
    pub fn bler(&self) -> f64 {
        if self.num_blocks == 0 {
            0.0
        } else {
            f64::from(self.num_block_errors) / f64::from(self.num_blocks)
        }
    }

    /// Updates results with the number of bit errors in one block.
    fn update_after_block(&mut self, num_msg_bits: usize, num_msg_bit_errors: usize) {
        self.num_blocks += 1;
        self.num_msg_bits += num_msg_bits as u64;
        self.num_msg_bit_errors += num_msg_bit_errors as u64;
        if num_msg_bit_errors > 0 {
            self.num_block_errors += 1;
        }
    }

    /// Returns `true` if enough runs have been simulated.
    fn sim_complete(&self, num_runs: u32) -> bool {
        num_runs >= self.params.num_runs_max
            || (num_runs >= self.params.num_runs_min
                && self.num_block_errors >= self.params.num_block_errors_min)
    }
}

/// Runs simulation of a code over a BPSK-AWGN channel.
///
/// Runs of blocks are transmitted until at least `num_runs_min` runs have been simulated and at
/// least `num_block_errors_min` blocks were in error, or until `num_runs_max` runs have been
/// simulated.
///
/// # Parameters
///
/// - `params`: Parameters for the simulation.
///
/// - `rng`: Random number generator to be used when `params.seed` is `None`.
///
/// # Returns
///
/// - `results`: Results from the simulation.
///
/// # Errors
///
/// Returns an error if `params.num_blocks_per_run` is `0` or if `params.num_runs_min` exceeds
/// `params.num_runs_max`.
pub fn run_bpsk_awgn_sim<R: Rng + ?Sized>(
    params: &SimParams,
    rng: &mut R,
) -> Result<SimResults, Error> {
    check_sim_params(params)?;
    match params.seed {
        Some(seed) => simulate(params, &mut StdRng::seed_from_u64(seed)),
        None => simulate(params, rng),
    }
}

/// Runs simulations of a code over a BPSK-AWGN channel and saves results to a JSON file.
///
/// The file is rewritten after each simulation, so that it holds the results obtained so far.
///
/// # Parameters
///
/// - `all_params`: Parameters for each simulation scenario of interest.
///
/// - `rng`: Random number generator to be used for scenarios without a seed.
///
/// - `json_filename`: Name of the JSON file to which all simulation results must be saved.
///
/// # Errors
///
/// Returns an error if any invalid simulation parameters are encountered, or if there is an
/// error in creating or writing the JSON file for the simulation results.
pub fn run_bpsk_awgn_sims<R: Rng + ?Sized, P: AsRef<Path>>(
    all_params: &[SimParams],
    rng: &mut R,
    json_filename: P,
) -> Result<Vec<SimResults>, Error> {
    let mut all_results = Vec::with_capacity(all_params.len());
    for params in all_params {
        let results = run_bpsk_awgn_sim(params, rng)?;
        info!(
            family = params.code.family(),
            es_over_n0_db = params.es_over_n0_db,
            num_blocks = results.num_blocks,
            ber = results.ber(),
            bler = results.bler(),
            "Simulation complete"
        );
        all_results.push(results);
        save_all_results(&all_results, json_filename.as_ref())?;
    }
    Ok(all_results)
}

/// Runs simulation with valid parameters and given random number generator.
fn simulate<R: Rng + ?Sized>(params: &SimParams, rng: &mut R) -> Result<SimResults, Error> {
    let code = params.code.codec();
    let num_blocks = params.num_blocks_per_run as usize;
    let msg_size = code.msg_size();
    let mut results = SimResults::new(params);
    let mut num_runs = 0;
    while !results.sim_complete(num_runs) {
        let msg = utils::random_bits_from_rng(num_blocks * msg_size, rng);
        let parity = code.encode(&msg)?;
        let parity_llr = utils::bpsk_awgn_channel(&parity, params.es_over_n0_db, rng);
        let msg_hat = code.decode(&parity_llr)?;
        for (block, block_hat) in msg.chunks(msg_size).zip(msg_hat.chunks(msg_size)) {
            results.update_after_block(msg_size, utils::error_count(block_hat, block));
        }
        num_runs += 1;
        debug!(
            run = num_runs,
            num_block_errors = results.num_block_errors,
            "Run complete"
        );
    }
    Ok(results)
}

/// Saves all simulation results to a JSON file.
fn save_all_results(all_results: &[SimResults], json_filename: &Path) -> Result<(), Error> {
    let writer = BufWriter::new(File::create(json_filename)?);
    serde_json::to_writer_pretty(writer, all_results)?;
    Ok(())
}

/// Checks validity of simulation parameters.
fn check_sim_params(params: &SimParams) -> Result<(), Error> {
    if params.num_blocks_per_run == 0 {
        return Err(Error::InvalidInput(
            "Number of blocks per run cannot be zero".to_string(),
        ));
    }
    if params.num_runs_min > params.num_runs_max {
        return Err(Error::InvalidInput(format!(
            "Minimum number of runs ({}) exceeds maximum number of runs ({})",
            params.num_runs_min, params.num_runs_max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests_of_functions {
    use float_eq::assert_float_eq;

    use super::*;
    use crate::{Convolutional, ConvolutionalOptions, Trellis};

    fn params_for_test() -> SimParams {
        let code = Convolutional::new(ConvolutionalOptions::new(
            Trellis::new(&[3], &[vec![0o7, 0o5]], &[]).unwrap(),
            20,
        ))
        .unwrap();
        SimParams {
            code: code.into(),
            es_over_n0_db: 10.0,
            num_block_errors_min: 5,
            num_blocks_per_run: 10,
            num_runs_min: 2,
            num_runs_max: 4,
            seed: Some(17),
        }
    }

    #[test]
    fn test_check_sim_params() {
        // Invalid input
        let mut params = params_for_test();
        params.num_blocks_per_run = 0;
        assert!(check_sim_params(&params).is_err());
        let mut params = params_for_test();
        params.num_runs_min = 5;
        assert!(check_sim_params(&params).is_err());
        // Valid input
        assert!(check_sim_params(&params_for_test()).is_ok());
    }

    #[test]
    fn test_sim_results() {
        let mut results = SimResults::new(&params_for_test());
        assert_float_eq!(results.ber(), 0.0, abs <= 1e-12);
        assert_float_eq!(results.bler(), 0.0, abs <= 1e-12);
        results.update_after_block(20, 0);
        results.update_after_block(20, 3);
        assert_eq!(results.num_blocks, 2);
        assert_eq!(results.num_block_errors, 1);
        assert_float_eq!(results.ber(), 3.0 / 40.0, abs <= 1e-12);
        assert_float_eq!(results.bler(), 0.5, abs <= 1e-12);
        assert!(!results.sim_complete(1));
        assert!(results.sim_complete(4));
    }

    #[test]
    fn test_run_bpsk_awgn_sim() {
        let mut rng = rand::rng();
        // Few errors at high SNR: the maximum number of runs is reached
        let params = params_for_test();
        let results = run_bpsk_awgn_sim(&params, &mut rng).unwrap();
        assert_eq!(results.num_blocks, 40);
        assert_eq!(results.num_msg_bits, 800);
        assert!(results.num_block_errors < 5);
        // Same seed gives the same results
        assert_eq!(run_bpsk_awgn_sim(&params, &mut rng).unwrap(), results);
        // Many errors at low SNR: the minimum number of runs is enough
        let mut params = params_for_test();
        params.es_over_n0_db = -10.0;
        params.seed = None;
        let results = run_bpsk_awgn_sim(&params, &mut rng).unwrap();
        assert_eq!(results.num_blocks, 20);
        assert!(results.num_block_errors >= 5);
    }

    #[test]
    fn test_run_bpsk_awgn_sims() {
        let path = std::env::temp_dir().join("fecodec_test_run_bpsk_awgn_sims.json");
        let mut all_params = vec![params_for_test(), params_for_test()];
        all_params[1].es_over_n0_db = 8.0;
        let all_results = run_bpsk_awgn_sims(&all_params, &mut rand::rng(), &path).unwrap();
        assert_eq!(all_results.len(), 2);
        let saved: Vec<SimResults> =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(saved, all_results);
        std::fs::remove_file(&path).unwrap();
    }
}
