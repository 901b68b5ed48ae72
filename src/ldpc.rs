//! Low-density parity-check (LDPC) code with belief propagation decoding
//!
//! The check matrix given by the user is brought to systematic form by a column permutation:
//! Gaussian elimination over GF(2) finds a set of linearly independent pivot columns, which are
//! moved to the end. A block of parity bits is then laid out as `| syst | parity |`, with the
//! message bits copied to `syst`.
//!
//! As a [`SoftCodec`], the decoder state of a block holds the check-to-variable messages of the
//! last iteration, one per nonzero element of [`Ldpc::checks`] in row-major order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{check_block_len, check_optional_block_len, SoftInput, SoftOutput};
use crate::convolutional::extrinsic_of;
use crate::llr::{boxplus, hard_decision, INF};
use crate::{
    Bit, BitMatrix, Codec, DecoderAlgorithm, Error, Permutation, SoftCodec, SparseBitMatrix,
};

/// Default maximum number of decoder iterations
const DEFAULT_ITERATIONS: usize = 50;

/// Parameters of an LDPC code
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct LdpcOptions {
    /// Check matrix, with one row per parity check
    pub checks: SparseBitMatrix,
    /// Maximum number of decoder iterations
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Check-node rule of the decoder
    #[serde(default)]
    pub algorithm: DecoderAlgorithm,
    /// Factor applied to check-node messages
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
    /// Whether decoding stops as soon as every check is satisfied
    #[serde(default = "default_early_termination")]
    pub early_termination: bool,
}

impl LdpcOptions {
    /// Returns options for given check matrix, with the default number of iterations, the
    /// approximate (min-sum) algorithm, unit scaling factor and early termination.
    #[must_use]
    pub fn new(checks: SparseBitMatrix) -> Self {
        Self {
            checks,
            iterations: default_iterations(),
            algorithm: DecoderAlgorithm::default(),
            scaling_factor: default_scaling_factor(),
            early_termination: default_early_termination(),
        }
    }

    /// Sets maximum number of decoder iterations.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets check-node rule.
    #[must_use]
    pub fn algorithm(mut self, algorithm: DecoderAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets scaling factor of check-node messages.
    #[must_use]
    pub fn scaling_factor(mut self, scaling_factor: f64) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }

    /// Sets whether decoding stops early.
    #[must_use]
    pub fn early_termination(mut self, early_termination: bool) -> Self {
        self.early_termination = early_termination;
        self
    }
}

/// Returns default number of decoder iterations.
fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

/// Returns default scaling factor.
fn default_scaling_factor() -> f64 {
    1.0
}

/// Returns default early termination flag.
fn default_early_termination() -> bool {
    true
}

/// Puncturing pattern for the parity bits of an LDPC code
///
/// Each mask is applied periodically, and an empty mask keeps every bit.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct LdpcPunctureOptions {
    /// Mask for the systematic bits
    pub syst_mask: Vec<bool>,
    /// Mask for the remaining parity bits
    pub mask: Vec<bool>,
}

/// LDPC code
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "LdpcOptions", into = "LdpcOptions")]
pub struct Ldpc {
    /// Parameters
    options: LdpcOptions,
    /// Check matrix with the pivot columns moved to the end
    checks: SparseBitMatrix,
    /// Original column of each column of `checks`
    column_order: Vec<usize>,
    /// Message positions summed into each non-systematic parity bit
    generator: SparseBitMatrix,
    /// Edge indices (row-major over `checks`) incident to each column
    col_edges: Vec<Vec<usize>>,
}

impl Ldpc {
    /// Returns LDPC code with given parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the check matrix is empty, has rank `0` or leaves no message bits, or
    /// if the scaling factor is not a positive finite number.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::{Codec, Ldpc, LdpcOptions, SparseBitMatrix};
    ///
    /// // Hamming (7, 4) code
    /// let checks = SparseBitMatrix::from_rows(
    ///     7,
    ///     &[vec![0, 2, 4, 6], vec![1, 2, 5, 6], vec![3, 4, 5, 6]],
    /// )?;
    /// let code = Ldpc::new(LdpcOptions::new(checks))?;
    /// assert_eq!(code.msg_size(), 4);
    /// assert_eq!(code.parity_size(), 7);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(options: LdpcOptions) -> Result<Self, Error> {
        let h = &options.checks;
        if h.rows() == 0 || h.cols() == 0 {
            return Err(Error::InvalidInput(
                "Check matrix cannot be empty".to_string(),
            ));
        }
        if !(options.scaling_factor.is_finite() && options.scaling_factor > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Scaling factor must be a positive number (found {})",
                options.scaling_factor
            )));
        }
        let (reduced, pivot_cols) = row_reduce(h);
        let rank = pivot_cols.len();
        if rank == 0 {
            return Err(Error::InvalidInput(
                "Check matrix has rank 0".to_string(),
            ));
        }
        if rank == h.cols() {
            return Err(Error::InvalidInput(
                "Check matrix of full column rank leaves no message bits".to_string(),
            ));
        }
        let mut is_pivot = vec![false; h.cols()];
        for &col in &pivot_cols {
            is_pivot[col] = true;
        }
        let column_order: Vec<usize> = (0 .. h.cols())
            .filter(|&col| !is_pivot[col])
            .chain(pivot_cols.iter().copied())
            .collect();
        let mut new_position = vec![0; h.cols()];
        for (pos, &col) in column_order.iter().enumerate() {
            new_position[col] = pos;
        }
        let permuted_rows: Vec<Vec<usize>> = (0 .. h.rows())
            .map(|row| h.row(row).iter().map(|&col| new_position[col]).collect())
            .collect();
        let checks = SparseBitMatrix::from_rows(h.cols(), &permuted_rows)?;
        let msg_size = h.cols() - rank;
        let generator_rows: Vec<Vec<usize>> = (0 .. rank)
            .map(|row| {
                (0 .. h.cols())
                    .filter(|&col| !is_pivot[col] && reduced.test(row, col))
                    .map(|col| new_position[col])
                    .collect()
            })
            .collect();
        let generator = SparseBitMatrix::from_rows(msg_size, &generator_rows)?;
        let mut col_edges = vec![Vec::new(); checks.cols()];
        for (edge, (_, col)) in checks.iter().enumerate() {
            col_edges[col].push(edge);
        }
        debug!(
            rows = h.rows(),
            cols = h.cols(),
            rank,
            "Check matrix brought to systematic form"
        );
        Ok(Self {
            options,
            checks,
            column_order,
            generator,
            col_edges,
        })
    }

    /// Returns parameters.
    #[must_use]
    pub fn options(&self) -> &LdpcOptions {
        &self.options
    }

    /// Returns check matrix in the column order of the parity bits.
    #[must_use]
    pub fn checks(&self) -> &SparseBitMatrix {
        &self.checks
    }

    /// Returns, for each parity bit, the column of the original check matrix it corresponds to.
    #[must_use]
    pub fn column_order(&self) -> &[usize] {
        &self.column_order
    }

    /// Returns syndrome of one block of parity bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len() != self.parity_size()`.
    pub fn syndrome(&self, parity: &[Bit]) -> Result<Vec<Bit>, Error> {
        check_block_len(parity.len(), self.parity_size(), "parity bits")?;
        Ok(self.syndrome_of(parity))
    }

    /// Returns puncturing pattern selecting the parity bits to be transmitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the masks keep no bits.
    pub fn puncturing(&self, options: &LdpcPunctureOptions) -> Result<Permutation, Error> {
        let keep = |mask: &[bool], index: usize| mask.is_empty() || mask[index % mask.len()];
        let msg_size = self.msg_size();
        let sequence: Vec<usize> = (0 .. self.parity_size())
            .filter(|&pos| {
                if pos < msg_size {
                    keep(&options.syst_mask, pos)
                } else {
                    keep(&options.mask, pos - msg_size)
                }
            })
            .collect();
        if sequence.is_empty() {
            return Err(Error::InvalidInput(
                "Puncturing masks must keep at least one bit".to_string(),
            ));
        }
        Permutation::new(&sequence, self.parity_size())
    }

    /// Returns syndrome of parity bits of the right length.
    fn syndrome_of(&self, parity: &[Bit]) -> Vec<Bit> {
        (0 .. self.checks.rows())
            .map(|row| {
                self.checks
                    .row(row)
                    .iter()
                    .fold(Bit::Zero, |acc, &col| acc ^ parity[col])
            })
            .collect()
    }

    /// Runs belief propagation from given channel LLR values and initial check-to-variable
    /// messages (all zero if `state` is empty), and returns posterior LLR values for all parity
    /// bits along with the final check-to-variable messages.
    fn run_bp_decoder(&self, channel_llr: &[f64], state: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let num_edges = self.checks.size();
        let mut check_to_var = if state.is_empty() {
            vec![0.0; num_edges]
        } else {
            state.to_vec()
        };
        let mut var_to_check = vec![0.0; num_edges];
        let mut posterior = vec![0.0; channel_llr.len()];
        let mut hard = vec![Bit::Zero; channel_llr.len()];
        self.update_variables(
            channel_llr,
            &check_to_var,
            &mut var_to_check,
            &mut posterior,
            &mut hard,
        );
        let mut incoming = Vec::new();
        let mut outgoing = Vec::new();
        for iter in 0 .. self.options.iterations {
            // Check-node update
            let mut edge_start = 0;
            for row in 0 .. self.checks.rows() {
                let degree = self.checks.row(row).len();
                let edge_range = edge_start .. edge_start + degree;
                incoming.clear();
                incoming.extend_from_slice(&var_to_check[edge_range.clone()]);
                check_node_update(&incoming, &mut outgoing, self.options.algorithm);
                for (msg, &val) in check_to_var[edge_range].iter_mut().zip(&outgoing) {
                    *msg = self.options.scaling_factor * val;
                }
                edge_start += degree;
            }
            self.update_variables(
                channel_llr,
                &check_to_var,
                &mut var_to_check,
                &mut posterior,
                &mut hard,
            );
            if self.options.early_termination
                && self.syndrome_of(&hard).iter().all(|&b| b == Bit::Zero)
            {
                debug!(iterations = iter + 1, "Belief propagation converged");
                break;
            }
        }
        (posterior, check_to_var)
    }

    /// Updates variable-to-check messages, posterior LLR values and hard decisions from the
    /// check-to-variable messages.
    fn update_variables(
        &self,
        channel_llr: &[f64],
        check_to_var: &[f64],
        var_to_check: &mut [f64],
        posterior: &mut [f64],
        hard: &mut [Bit],
    ) {
        for (col, edges) in self.col_edges.iter().enumerate() {
            let total = channel_llr[col] + edges.iter().map(|&e| check_to_var[e]).sum::<f64>();
            posterior[col] = total;
            hard[col] = hard_decision(total);
            for &edge in edges {
                var_to_check[edge] = total - check_to_var[edge];
            }
        }
    }
}

impl Codec for Ldpc {
    fn msg_size(&self) -> usize {
        self.generator.cols()
    }

    fn parity_size(&self) -> usize {
        self.checks.cols()
    }

    fn encode_block(&self, msg: &[Bit], parity: &mut [Bit]) -> Result<(), Error> {
        check_block_len(msg.len(), self.msg_size(), "message bits")?;
        check_block_len(parity.len(), self.parity_size(), "parity bits")?;
        let (syst, rest) = parity.split_at_mut(self.msg_size());
        syst.copy_from_slice(msg);
        for (row, bit) in rest.iter_mut().enumerate() {
            *bit = self
                .generator
                .row(row)
                .iter()
                .fold(Bit::Zero, |acc, &pos| acc ^ msg[pos]);
        }
        Ok(())
    }

    fn check_block(&self, parity: &[Bit]) -> Result<bool, Error> {
        Ok(self.syndrome(parity)?.iter().all(|&b| b == Bit::Zero))
    }

    fn decode_block(&self, parity_llr: &[f64], msg: &mut [Bit]) -> Result<(), Error> {
        check_block_len(parity_llr.len(), self.parity_size(), "parity LLR values")?;
        check_block_len(msg.len(), self.msg_size(), "message bits")?;
        let (posterior, _) = self.run_bp_decoder(parity_llr, &[]);
        for (bit, &llr) in msg.iter_mut().zip(&posterior) {
            *bit = hard_decision(llr);
        }
        Ok(())
    }

    fn so_decode_block(&self, parity_llr: &[f64], msg_llr: &mut [f64]) -> Result<(), Error> {
        check_block_len(parity_llr.len(), self.parity_size(), "parity LLR values")?;
        check_block_len(msg_llr.len(), self.msg_size(), "message LLR values")?;
        let (posterior, _) = self.run_bp_decoder(parity_llr, &[]);
        msg_llr.copy_from_slice(&posterior[.. self.msg_size()]);
        Ok(())
    }
}

impl SoftCodec for Ldpc {
    fn syst_size(&self) -> usize {
        self.msg_size()
    }

    fn state_size(&self) -> usize {
        self.checks.size()
    }

    fn soft_decode_block(&self, input: &SoftInput<'_>) -> Result<SoftOutput, Error> {
        check_block_len(input.parity.len(), self.parity_size(), "parity LLR values")?;
        check_optional_block_len(input.syst.len(), self.syst_size(), "systematic LLR values")?;
        check_optional_block_len(input.state.len(), self.state_size(), "state values")?;
        let mut channel_llr = input.parity.to_vec();
        for (llr, &prior) in channel_llr.iter_mut().zip(input.syst) {
            *llr += prior;
        }
        let (posterior, check_to_var) = self.run_bp_decoder(&channel_llr, input.state);
        let syst_posterior = &posterior[.. self.msg_size()];
        Ok(SoftOutput {
            msg: syst_posterior.to_vec(),
            syst: if input.syst.is_empty() {
                syst_posterior.to_vec()
            } else {
                extrinsic_of(syst_posterior, input.syst)
            },
            parity: extrinsic_of(&posterior, input.parity),
            state: check_to_var,
        })
    }
}

impl TryFrom<LdpcOptions> for Ldpc {
    type Error = Error;

    fn try_from(options: LdpcOptions) -> Result<Self, Error> {
        Self::new(options)
    }
}

impl From<Ldpc> for LdpcOptions {
    fn from(code: Ldpc) -> Self {
        code.options
    }
}

/// Returns check matrix of a regular LDPC code by Gallager's construction.
///
/// The first band of `n / wr` rows holds `wr` consecutive ones per row, covering each column
/// once. Each of the other `wc - 1` bands is a random column permutation of the first band, so
/// that every column has `wc` ones and every row `wr` ones.
///
/// # Errors
///
/// Returns an error if `wc` or `wr` is `0`, or if `n` is not a positive multiple of `wr`.
///
/// # Examples
///
/// ```
/// use fecodec::ldpc::gallager;
///
/// let h = gallager(12, 3, 4, 1)?;
/// assert_eq!(h.rows(), 9);
/// assert_eq!(h.col_sizes(), vec![3; 12]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn gallager(n: usize, wc: usize, wr: usize, seed: u64) -> Result<SparseBitMatrix, Error> {
    if wc == 0 || wr == 0 || n == 0 || n % wr != 0 {
        return Err(Error::InvalidInput(format!(
            "Invalid Gallager parameters (n = {n}, wc = {wc}, wr = {wr})"
        )));
    }
    let band_rows = n / wr;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(band_rows * wc);
    let mut perm: Vec<usize> = (0 .. n).collect();
    for band in 0 .. wc {
        if band > 0 {
            perm.shuffle(&mut rng);
        }
        for row in 0 .. band_rows {
            rows.push(perm[row * wr .. (row + 1) * wr].to_vec());
        }
    }
    SparseBitMatrix::from_rows(n, &rows)
}

/// Returns matrix in reduced row echelon form and its pivot columns, by Gaussian elimination.
fn row_reduce(h: &SparseBitMatrix) -> (BitMatrix, Vec<usize>) {
    let mut dense = BitMatrix::from_sparse(h);
    let mut pivot_cols = Vec::new();
    for col in 0 .. dense.cols() {
        let rank = pivot_cols.len();
        if rank == dense.rows() {
            break;
        }
        let Some(pivot_row) = (rank .. dense.rows()).find(|&row| dense.test(row, col)) else {
            continue;
        };
        dense.swap_rows(pivot_row, rank);
        for row in 0 .. dense.rows() {
            if row != rank && dense.test(row, col) {
                dense.row_add(rank, row);
            }
        }
        pivot_cols.push(col);
    }
    (dense, pivot_cols)
}

/// Computes the message from a check node to each neighbor, excluding that neighbor's own
/// message.
fn check_node_update(incoming: &[f64], outgoing: &mut Vec<f64>, algo: DecoderAlgorithm) {
    outgoing.clear();
    match algo {
        DecoderAlgorithm::Approximate => {
            let sign = incoming
                .iter()
                .fold(Bit::Zero, |acc, &x| acc ^ hard_decision(x));
            let (mut min1, mut min2, mut min1_idx) = (INF, INF, 0);
            for (i, &x) in incoming.iter().enumerate() {
                if x.abs() < min1 {
                    min2 = min1;
                    min1 = x.abs();
                    min1_idx = i;
                } else if x.abs() < min2 {
                    min2 = x.abs();
                }
            }
            outgoing.extend(incoming.iter().enumerate().map(|(i, &x)| {
                let magnitude = if i == min1_idx { min2 } else { min1 };
                match sign ^ hard_decision(x) {
                    Bit::Zero => magnitude,
                    Bit::One => -magnitude,
                }
            }));
        }
        DecoderAlgorithm::Exact | DecoderAlgorithm::Linear => {
            // Forward-backward recursion, with `INF` as the neutral element of box-plus
            let mut backward = vec![INF; incoming.len() + 1];
            for (i, &x) in incoming.iter().enumerate().rev() {
                backward[i] = boxplus(backward[i + 1], x, algo);
            }
            let mut forward = INF;
            for (i, &x) in incoming.iter().enumerate() {
                outgoing.push(boxplus(forward, backward[i + 1], algo));
                forward = boxplus(forward, x, algo);
            }
        }
    }
}
