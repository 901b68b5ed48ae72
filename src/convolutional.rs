//! Convolutional code with Viterbi and BCJR decoders
//!
//! A block of `length * k` message bits drives the trellis from state `0`, `k` bits per stage.
//! With [`Termination::Tail`], extra stages are appended that drive the encoder back to state `0`.
//! The parity bits are laid out stage after stage:
//!
//! `| out_1 | out_2 | ... | out_length | tail_out_1 | ... | tail_out_tail_size |`
//!
//! where each `out_t` holds the `n` output bits of stage `t`.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::codec::{check_block_len, check_optional_block_len, SoftInput, SoftOutput};
use crate::llr::{bit_metric, hard_decision, maxstar, INF};
use crate::{Bit, Codec, DecoderAlgorithm, Error, Permutation, SoftCodec, Trellis};

/// Enumeration of ways to end a block
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum Termination {
    /// Tail stages return the encoder to state `0`
    #[default]
    Tail,
    /// Encoding stops after the last message bit, in whatever state
    Truncate,
}

/// Parameters of a convolutional code
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ConvolutionalOptions {
    /// Trellis of the encoder
    pub trellis: Trellis,
    /// Number of trellis stages driven by message bits
    pub length: usize,
    /// Termination of each block
    #[serde(default)]
    pub termination: Termination,
    /// Algorithm used by the BCJR decoder
    #[serde(default)]
    pub algorithm: DecoderAlgorithm,
    /// Factor applied to extrinsic LLR values
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
}

impl ConvolutionalOptions {
    /// Returns options for given trellis and number of stages, with tail termination, the
    /// approximate decoding algorithm and unit scaling factor.
    #[must_use]
    pub fn new(trellis: Trellis, length: usize) -> Self {
        Self {
            trellis,
            length,
            termination: Termination::default(),
            algorithm: DecoderAlgorithm::default(),
            scaling_factor: default_scaling_factor(),
        }
    }

    /// Sets termination.
    #[must_use]
    pub fn termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Sets decoding algorithm.
    #[must_use]
    pub fn algorithm(mut self, algorithm: DecoderAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets extrinsic scaling factor.
    #[must_use]
    pub fn scaling_factor(mut self, scaling_factor: f64) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }
}

/// Returns default extrinsic scaling factor.
fn default_scaling_factor() -> f64 {
    1.0
}

/// Periodic puncturing pattern for the parity bits of a convolutional code
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct PunctureOptions {
    /// Whether each parity bit is kept, repeated over the whole block
    pub mask: Vec<bool>,
    /// Pattern used on the tail outputs instead of `mask`, if not empty
    pub tail_mask: Vec<bool>,
}

/// Convolutional code
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "ConvolutionalOptions", into = "ConvolutionalOptions")]
pub struct Convolutional {
    /// Parameters
    options: ConvolutionalOptions,
    /// Number of tail stages
    tail_size: usize,
    /// Input applied in each state during tail stages
    tail_inputs: Vec<usize>,
}

/// Soft outputs of the BCJR decoder for one block
#[derive(Clone, PartialEq, Debug, Default)]
pub(crate) struct MapOutput {
    /// Posterior LLR values of the message bits followed by the tail input bits
    pub(crate) posterior: Vec<f64>,
    /// Scaled difference between posterior and prior LLR values
    pub(crate) extrinsic: Vec<f64>,
    /// Posterior LLR values of the parity bits (empty unless requested)
    pub(crate) parity_posterior: Vec<f64>,
}

impl Convolutional {
    /// Returns convolutional code with given parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `options.length` is `0`, if the scaling factor is not a positive finite
    /// number, or if tail termination cannot return the encoder to state `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::{Codec, Convolutional, ConvolutionalOptions, Termination, Trellis};
    ///
    /// let trellis = Trellis::new(&[3], &[vec![0o7, 0o5]], &[])?;
    /// let code = Convolutional::new(ConvolutionalOptions::new(trellis, 4))?;
    /// assert_eq!(code.msg_size(), 4);
    /// assert_eq!(code.parity_size(), 12);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(options: ConvolutionalOptions) -> Result<Self, Error> {
        if options.length == 0 {
            return Err(Error::InvalidInput(
                "Number of trellis stages must be positive".to_string(),
            ));
        }
        if !(options.scaling_factor.is_finite() && options.scaling_factor > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Scaling factor must be a positive number (found {})",
                options.scaling_factor
            )));
        }
        let trellis = &options.trellis;
        let tail_inputs: Vec<usize> = (0 .. trellis.state_count())
            .map(|state| {
                (0 .. trellis.input_count())
                    .min_by_key(|&input| trellis.next_state(state, input).count_ones())
                    .unwrap_or(0)
            })
            .collect();
        let tail_size = match options.termination {
            Termination::Tail => trellis.max_memory_len(),
            Termination::Truncate => 0,
        };
        for start in 0 .. trellis.state_count() {
            let end = (0 .. tail_size).fold(start, |state, _| {
                trellis.next_state(state, tail_inputs[state])
            });
            if tail_size > 0 && end != 0 {
                return Err(Error::InvalidInput(format!(
                    "Tail of {tail_size} stages does not return state {start} to state 0"
                )));
            }
        }
        Ok(Self {
            options,
            tail_size,
            tail_inputs,
        })
    }

    /// Returns parameters.
    #[must_use]
    pub fn options(&self) -> &ConvolutionalOptions {
        &self.options
    }

    /// Returns trellis.
    #[must_use]
    pub fn trellis(&self) -> &Trellis {
        &self.options.trellis
    }

    /// Returns number of trellis stages driven by message bits.
    #[must_use]
    pub fn length(&self) -> usize {
        self.options.length
    }

    /// Returns termination.
    #[must_use]
    pub fn termination(&self) -> Termination {
        self.options.termination
    }

    /// Returns number of tail stages.
    #[must_use]
    pub fn tail_size(&self) -> usize {
        self.tail_size
    }

    /// Returns number of input bits applied during tail stages.
    #[must_use]
    pub fn syst_tail_size(&self) -> usize {
        self.tail_size * self.trellis().input_size()
    }

    /// Returns parity bits and tail input bits for one block of message bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `msg.len() != self.msg_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::{Bit, Convolutional, ConvolutionalOptions, Trellis};
    ///
    /// let trellis = Trellis::rsc(&[0o13, 0o15])?;
    /// let code = Convolutional::new(ConvolutionalOptions::new(trellis, 4))?;
    /// let (parity, tail) = code.encode_with_tail(&[Bit::One, Bit::Zero, Bit::Zero, Bit::Zero])?;
    /// assert_eq!(parity.len(), 14);
    /// assert_eq!(tail.len(), 3);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode_with_tail(&self, msg: &[Bit]) -> Result<(Vec<Bit>, Vec<Bit>), Error> {
        check_block_len(msg.len(), self.msg_size(), "message bits")?;
        let mut parity = vec![Bit::Zero; self.parity_size()];
        let tail = self.run_encoder(msg, &mut parity);
        Ok((parity, tail))
    }

    /// Returns posterior and extrinsic LLR values for all input bits, by the BCJR algorithm.
    ///
    /// # Parameters
    ///
    /// - `parity_llr`: LLR values for one block of parity bits.
    ///
    /// - `prior_llr`: Prior LLR values for the message bits followed by the tail input bits.
    ///
    /// # Returns
    ///
    /// - `posterior`: Posterior LLR values for the message bits followed by the tail input bits.
    ///
    /// - `extrinsic`: Difference between posterior and prior LLR values, multiplied by the
    ///   scaling factor.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity_llr.len() != self.parity_size()` or
    /// `prior_llr.len() != self.msg_size() + self.syst_tail_size()`.
    pub fn map_decode(
        &self,
        parity_llr: &[f64],
        prior_llr: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), Error> {
        let output = self.run_map_decoder(parity_llr, prior_llr, false)?;
        Ok((output.posterior, output.extrinsic))
    }

    /// Runs the BCJR algorithm, also returning posterior LLR values for the parity bits if
    /// `with_parity` is `true`.
    pub(crate) fn run_map_decoder(
        &self,
        parity_llr: &[f64],
        prior_llr: &[f64],
        with_parity: bool,
    ) -> Result<MapOutput, Error> {
        check_block_len(parity_llr.len(), self.parity_size(), "parity LLR values")?;
        check_block_len(
            prior_llr.len(),
            self.msg_size() + self.syst_tail_size(),
            "prior LLR values",
        )?;
        let all_beta_val = self.run_bcjr_backward_pass(parity_llr, prior_llr);
        Ok(self.run_bcjr_forward_pass(parity_llr, prior_llr, &all_beta_val, with_parity))
    }

    /// Returns puncturing pattern selecting the parity bits to be transmitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the masks keep no bits. An empty mask keeps every bit.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::convolutional::PunctureOptions;
    /// use fecodec::{Convolutional, ConvolutionalOptions, Trellis};
    ///
    /// let trellis = Trellis::new(&[3], &[vec![0o7, 0o5]], &[])?;
    /// let code = Convolutional::new(ConvolutionalOptions::new(trellis, 4))?;
    /// let options = PunctureOptions {
    ///     mask: vec![true, true, true, false],
    ///     tail_mask: Vec::new(),
    /// };
    /// assert_eq!(code.puncturing(&options)?.output_size(), 9);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn puncturing(&self, options: &PunctureOptions) -> Result<Permutation, Error> {
        let keep = |mask: &[bool], index: usize| mask.is_empty() || mask[index % mask.len()];
        let body_size = self.length() * self.trellis().output_size();
        let sequence: Vec<usize> = (0 .. self.parity_size())
            .filter(|&pos| {
                if pos < body_size || options.tail_mask.is_empty() {
                    keep(&options.mask, pos)
                } else {
                    keep(&options.tail_mask, pos - body_size)
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

    /// Returns number of trellis stages per block, including tail stages.
    fn stage_count(&self) -> usize {
        self.length() + self.tail_size
    }

    /// Returns inputs allowed from given state at given stage.
    fn stage_inputs(&self, stage: usize, state: usize) -> std::ops::Range<usize> {
        if stage < self.length() {
            0 .. self.trellis().input_count()
        } else {
            let input = self.tail_inputs[state];
            input .. input + 1
        }
    }

    /// Writes parity bits for given message bits, and returns tail input bits.
    fn run_encoder(&self, msg: &[Bit], parity: &mut [Bit]) -> Vec<Bit> {
        let trellis = self.trellis();
        let (k, n) = (trellis.input_size(), trellis.output_size());
        let mut state = 0;
        let mut parity_chunks = parity.chunks_exact_mut(n);
        for (input_bits, output_bits) in msg.chunks_exact(k).zip(&mut parity_chunks) {
            let input = int_from_bits(input_bits);
            bits_from_int(trellis.output(state, input), output_bits);
            state = trellis.next_state(state, input);
        }
        let mut tail = vec![Bit::Zero; self.syst_tail_size()];
        for (input_bits, output_bits) in tail.chunks_exact_mut(k).zip(parity_chunks) {
            let input = self.tail_inputs[state];
            bits_from_int(input, input_bits);
            bits_from_int(trellis.output(state, input), output_bits);
            state = trellis.next_state(state, input);
        }
        tail
    }

    /// Runs Viterbi algorithm and writes the message bits of the most likely path.
    fn run_viterbi(&self, parity_llr: &[f64], msg: &mut [Bit]) {
        let trellis = self.trellis();
        let (k, n) = (trellis.input_size(), trellis.output_size());
        let num_states = trellis.state_count();
        let mut path_metrics = vec![-INF; num_states];
        let mut next_path_metrics = vec![-INF; num_states];
        path_metrics[0] = 0.0;
        // Previous state and input of the survivor path into each state after each stage
        let mut survivors = vec![(0, 0); self.stage_count() * num_states];
        for (stage, llr) in parity_llr.chunks_exact(n).enumerate() {
            next_path_metrics.fill(-INF);
            for state in 0 .. num_states {
                if path_metrics[state] <= -INF {
                    continue;
                }
                for input in self.stage_inputs(stage, state) {
                    let next_state = trellis.next_state(state, input);
                    let cand_metric =
                        path_metrics[state] + int_metric(trellis.output(state, input), llr);
                    if cand_metric > next_path_metrics[next_state] {
                        next_path_metrics[next_state] = cand_metric;
                        survivors[stage * num_states + next_state] = (state, input);
                    }
                }
            }
            std::mem::swap(&mut path_metrics, &mut next_path_metrics);
        }
        let mut state = match self.termination() {
            Termination::Tail => 0,
            Termination::Truncate => path_metrics
                .iter()
                .position_max_by(|x, y| x.total_cmp(y))
                .unwrap_or(0),
        };
        for stage in (0 .. self.stage_count()).rev() {
            let (prev_state, input) = survivors[stage * num_states + state];
            if stage < self.length() {
                bits_from_int(input, &mut msg[stage * k .. (stage + 1) * k]);
            }
            state = prev_state;
        }
    }

    /// Returns branch metric for given state transition.
    fn branch_metric(&self, state: usize, input: usize, parity_llr: &[f64], prior_llr: &[f64]) -> f64 {
        int_metric(self.trellis().output(state, input), parity_llr) + int_metric(input, prior_llr)
    }

    /// Runs backward pass through the trellis and returns beta values for all states after every
    /// stage (index `stage * state_count + state`).
    fn run_bcjr_backward_pass(&self, parity_llr: &[f64], prior_llr: &[f64]) -> Vec<f64> {
        let trellis = self.trellis();
        let (k, n) = (trellis.input_size(), trellis.output_size());
        let num_states = trellis.state_count();
        let num_stages = self.stage_count();
        let mut all_beta_val = vec![-INF; (num_stages + 1) * num_states];
        match self.termination() {
            Termination::Tail => all_beta_val[num_stages * num_states] = 0.0,
            Termination::Truncate => all_beta_val[num_stages * num_states ..].fill(0.0),
        }
        for stage in (0 .. num_stages).rev() {
            let llr = &parity_llr[stage * n .. (stage + 1) * n];
            let prior = &prior_llr[stage * k .. (stage + 1) * k];
            let (before, after) = all_beta_val.split_at_mut((stage + 1) * num_states);
            let beta_val_prev = &mut before[stage * num_states ..];
            for (state, beta) in beta_val_prev.iter_mut().enumerate() {
                for input in self.stage_inputs(stage, state) {
                    let next_state = trellis.next_state(state, input);
                    *beta = maxstar(
                        *beta,
                        self.branch_metric(state, input, llr, prior) + after[next_state],
                        self.options.algorithm,
                    );
                }
            }
            recenter(beta_val_prev);
        }
        all_beta_val
    }

    /// Runs forward pass through the trellis and returns posterior and extrinsic LLR values.
    fn run_bcjr_forward_pass(
        &self,
        parity_llr: &[f64],
        prior_llr: &[f64],
        all_beta_val: &[f64],
        with_parity: bool,
    ) -> MapOutput {
        let trellis = self.trellis();
        let (k, n) = (trellis.input_size(), trellis.output_size());
        let num_states = trellis.state_count();
        let algo = self.options.algorithm;
        let mut alpha_val = vec![-INF; num_states];
        let mut alpha_val_next = vec![-INF; num_states];
        alpha_val[0] = 0.0;
        let mut metric_for_zero = vec![-INF; k];
        let mut metric_for_one = vec![-INF; k];
        let mut output_metric_for_zero = vec![-INF; n];
        let mut output_metric_for_one = vec![-INF; n];
        let mut posterior = Vec::with_capacity(prior_llr.len());
        let mut extrinsic = Vec::with_capacity(prior_llr.len());
        let mut parity_posterior = Vec::new();
        for stage in 0 .. self.stage_count() {
            let llr = &parity_llr[stage * n .. (stage + 1) * n];
            let prior = &prior_llr[stage * k .. (stage + 1) * k];
            let beta_val_next = &all_beta_val[(stage + 1) * num_states .. (stage + 2) * num_states];
            alpha_val_next.fill(-INF);
            metric_for_zero.fill(-INF);
            metric_for_one.fill(-INF);
            output_metric_for_zero.fill(-INF);
            output_metric_for_one.fill(-INF);
            for state in 0 .. num_states {
                if alpha_val[state] <= -INF / 2.0 {
                    continue;
                }
                for input in self.stage_inputs(stage, state) {
                    let next_state = trellis.next_state(state, input);
                    let gamma = self.branch_metric(state, input, llr, prior);
                    alpha_val_next[next_state] =
                        maxstar(alpha_val_next[next_state], alpha_val[state] + gamma, algo);
                    let cand_metric = alpha_val[state] + gamma + beta_val_next[next_state];
                    for i in 0 .. k {
                        let metric = if (input >> i) & 1 == 0 {
                            &mut metric_for_zero[i]
                        } else {
                            &mut metric_for_one[i]
                        };
                        *metric = maxstar(*metric, cand_metric, algo);
                    }
                    if with_parity {
                        let output = trellis.output(state, input);
                        for j in 0 .. n {
                            let metric = if (output >> j) & 1 == 0 {
                                &mut output_metric_for_zero[j]
                            } else {
                                &mut output_metric_for_one[j]
                            };
                            *metric = maxstar(*metric, cand_metric, algo);
                        }
                    }
                }
            }
            recenter(&mut alpha_val_next);
            std::mem::swap(&mut alpha_val, &mut alpha_val_next);
            for i in 0 .. k {
                let llr_posterior = metric_for_zero[i] - metric_for_one[i];
                posterior.push(llr_posterior);
                extrinsic.push((llr_posterior - prior[i]) * self.options.scaling_factor);
            }
            if with_parity {
                parity_posterior.extend(
                    output_metric_for_zero
                        .iter()
                        .zip(&output_metric_for_one)
                        .map(|(zero, one)| zero - one),
                );
            }
        }
        MapOutput {
            posterior,
            extrinsic,
            parity_posterior,
        }
    }
}

impl Codec for Convolutional {
    fn msg_size(&self) -> usize {
        self.length() * self.trellis().input_size()
    }

    fn parity_size(&self) -> usize {
        self.stage_count() * self.trellis().output_size()
    }

    fn encode_block(&self, msg: &[Bit], parity: &mut [Bit]) -> Result<(), Error> {
        check_block_len(msg.len(), self.msg_size(), "message bits")?;
        check_block_len(parity.len(), self.parity_size(), "parity bits")?;
        self.run_encoder(msg, parity);
        Ok(())
    }

    fn check_block(&self, parity: &[Bit]) -> Result<bool, Error> {
        check_block_len(parity.len(), self.parity_size(), "parity bits")?;
        let trellis = self.trellis();
        let mut reachable = vec![false; trellis.state_count()];
        let mut next_reachable = vec![false; trellis.state_count()];
        reachable[0] = true;
        for (stage, output_bits) in parity.chunks_exact(trellis.output_size()).enumerate() {
            let output = int_from_bits(output_bits);
            next_reachable.fill(false);
            for state in (0 .. trellis.state_count()).filter(|&state| reachable[state]) {
                for input in self.stage_inputs(stage, state) {
                    if trellis.output(state, input) == output {
                        next_reachable[trellis.next_state(state, input)] = true;
                    }
                }
            }
            std::mem::swap(&mut reachable, &mut next_reachable);
        }
        Ok(match self.termination() {
            Termination::Tail => reachable[0],
            Termination::Truncate => reachable.contains(&true),
        })
    }

    fn decode_block(&self, parity_llr: &[f64], msg: &mut [Bit]) -> Result<(), Error> {
        check_block_len(parity_llr.len(), self.parity_size(), "parity LLR values")?;
        check_block_len(msg.len(), self.msg_size(), "message bits")?;
        self.run_viterbi(parity_llr, msg);
        Ok(())
    }

    fn so_decode_block(&self, parity_llr: &[f64], msg_llr: &mut [f64]) -> Result<(), Error> {
        check_block_len(msg_llr.len(), self.msg_size(), "message LLR values")?;
        let prior_llr = vec![0.0; self.msg_size() + self.syst_tail_size()];
        let (posterior, _) = self.map_decode(parity_llr, &prior_llr)?;
        msg_llr.copy_from_slice(&posterior[.. self.msg_size()]);
        Ok(())
    }
}

impl SoftCodec for Convolutional {
    fn syst_size(&self) -> usize {
        self.msg_size() + self.syst_tail_size()
    }

    fn state_size(&self) -> usize {
        0
    }

    fn soft_decode_block(&self, input: &SoftInput<'_>) -> Result<SoftOutput, Error> {
        check_block_len(input.parity.len(), self.parity_size(), "parity LLR values")?;
        check_optional_block_len(input.syst.len(), self.syst_size(), "systematic LLR values")?;
        check_optional_block_len(input.state.len(), 0, "state values")?;
        let prior_llr = if input.syst.is_empty() {
            vec![0.0; self.syst_size()]
        } else {
            input.syst.to_vec()
        };
        let output = self.run_map_decoder(input.parity, &prior_llr, true)?;
        Ok(SoftOutput {
            msg: output.posterior[.. self.msg_size()].to_vec(),
            syst: output.extrinsic,
            parity: extrinsic_of(&output.parity_posterior, input.parity),
            state: Vec::new(),
        })
    }
}

impl TryFrom<ConvolutionalOptions> for Convolutional {
    type Error = Error;

    fn try_from(options: ConvolutionalOptions) -> Result<Self, Error> {
        Self::new(options)
    }
}

impl From<Convolutional> for ConvolutionalOptions {
    fn from(code: Convolutional) -> Self {
        code.options
    }
}

/// Returns integer whose bit `i` is `bits[i]`.
pub(crate) fn int_from_bits(bits: &[Bit]) -> usize {
    bits.iter()
        .enumerate()
        .fold(0, |num, (i, &bit)| num | (bit.index() << i))
}

/// Writes bit `i` of given integer to `bits[i]`.
pub(crate) fn bits_from_int(num: usize, bits: &mut [Bit]) {
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = Bit::from_lsb(num >> i);
    }
}

/// Returns sum of bit metrics of the bits of given integer, bit `i` having LLR value `llr[i]`.
fn int_metric(num: usize, llr: &[f64]) -> f64 {
    llr.iter()
        .enumerate()
        .map(|(i, &llr_val)| bit_metric(Bit::from_lsb(num >> i), llr_val))
        .sum()
}

/// Subtracts the largest value from all values.
fn recenter(values: &mut [f64]) {
    let max_val = values.iter().copied().fold(-INF, f64::max);
    if max_val > -INF {
        values.iter_mut().for_each(|x| *x -= max_val);
    }
}

/// Returns differences between posterior and input LLR values.
pub(crate) fn extrinsic_of(posterior: &[f64], input: &[f64]) -> Vec<f64> {
    posterior.iter().zip(input).map(|(post, inp)| post - inp).collect()
}

/// Returns hard decisions on given LLR values.
pub(crate) fn hard_decisions(llr: &[f64]) -> Vec<Bit> {
    llr.iter().map(|&x| hard_decision(x)).collect()
}

#[cfg(test)]
mod tests_of_convolutional {
    use float_eq::assert_float_eq;

    use super::*;
    use crate::utils;
    use Bit::{One, Zero};

    fn code_for_test(termination: Termination) -> Convolutional {
        let trellis = Trellis::new(&[3], &[vec![0o7, 0o5]], &[]).unwrap();
        Convolutional::new(ConvolutionalOptions::new(trellis, 4).termination(termination)).unwrap()
    }

    fn perfect_llr(bits: &[Bit]) -> Vec<f64> {
        bits.iter()
            .map(|&b| if b == Zero { 10.0 } else { -10.0 })
            .collect()
    }

    #[test]
    fn test_new() {
        let trellis = Trellis::new(&[3], &[vec![0o7, 0o5]], &[]).unwrap();
        assert!(Convolutional::new(ConvolutionalOptions::new(trellis.clone(), 0)).is_err());
        assert!(
            Convolutional::new(ConvolutionalOptions::new(trellis, 4).scaling_factor(0.0)).is_err()
        );
        let code = code_for_test(Termination::Tail);
        assert_eq!(code.msg_size(), 4);
        assert_eq!(code.tail_size(), 2);
        assert_eq!(code.syst_tail_size(), 2);
        assert_eq!(code.parity_size(), 12);
        let code = code_for_test(Termination::Truncate);
        assert_eq!(code.tail_size(), 0);
        assert_eq!(code.parity_size(), 8);
    }

    #[test]
    fn test_encode() {
        let code = code_for_test(Termination::Tail);
        assert!(code.encode(&[One, Zero, One]).is_err());
        let parity = code.encode(&[One, Zero, One, One]).unwrap();
        assert_eq!(
            parity,
            [One, One, One, Zero, Zero, Zero, Zero, One, Zero, One, One, One]
        );
        let code = code_for_test(Termination::Truncate);
        let parity = code.encode(&[One, Zero, One, One]).unwrap();
        assert_eq!(parity, [One, One, One, Zero, Zero, Zero, Zero, One]);
    }

    #[test]
    fn test_encode_with_tail() {
        let trellis = Trellis::rsc(&[0o13, 0o15]).unwrap();
        let code = Convolutional::new(ConvolutionalOptions::new(trellis, 6)).unwrap();
        let msg = [One, One, Zero, One, Zero, Zero];
        let (parity, tail) = code.encode_with_tail(&msg).unwrap();
        assert_eq!(parity.len(), 18);
        assert_eq!(tail.len(), 3);
        // Systematic output
        for (i, &bit) in msg.iter().chain(&tail).enumerate() {
            assert_eq!(parity[2 * i], bit);
        }
        assert!(code.check(&parity).unwrap());
    }

    #[test]
    fn test_check() {
        for termination in [Termination::Tail, Termination::Truncate] {
            let code = code_for_test(termination);
            let mut parity = code.encode(&[One, Zero, One, One, Zero, Zero, One, Zero]).unwrap();
            assert!(code.check(&parity).unwrap());
            parity[1] ^= One;
            assert!(!code.check(&parity).unwrap());
        }
        // Tail outputs must bring the encoder back to state 0
        let code = code_for_test(Termination::Tail);
        let mut parity = code.encode(&[One, Zero, One, One]).unwrap();
        parity[11] ^= One;
        assert!(!code.check(&parity).unwrap());
    }

    #[test]
    fn test_viterbi() {
        for termination in [Termination::Tail, Termination::Truncate] {
            let code = code_for_test(termination);
            let msg = [One, Zero, One, One];
            let parity = code.encode(&msg).unwrap();
            assert_eq!(code.decode(&perfect_llr(&parity)).unwrap(), msg);
        }
        // Single error is corrected
        let code = code_for_test(Termination::Tail);
        let msg = [One, Zero, One, One];
        let mut parity_llr = perfect_llr(&code.encode(&msg).unwrap());
        parity_llr[2] = -parity_llr[2];
        assert_eq!(code.decode(&parity_llr).unwrap(), msg);
    }

    #[test]
    fn test_map_decode() {
        let code = code_for_test(Termination::Tail);
        assert!(code.map_decode(&[0.0; 12], &[0.0; 4]).is_err());
        let msg = [One, Zero, One, One];
        let parity_llr = perfect_llr(&code.encode(&msg).unwrap());
        let prior_llr = [0.5, -0.5, 1.0, 0.0, 0.2, -0.1];
        let (posterior, extrinsic) = code.map_decode(&parity_llr, &prior_llr).unwrap();
        assert_eq!(posterior.len(), 6);
        assert_eq!(hard_decisions(&posterior[.. 4]), msg);
        for i in 0 .. 6 {
            assert_float_eq!(posterior[i], prior_llr[i] + extrinsic[i], abs <= 1e-9);
        }
        // Tail inputs of a feed-forward code are zero
        assert!(posterior[4] > 0.0 && posterior[5] > 0.0);
    }

    #[test]
    fn test_scaling_factor() {
        let trellis = Trellis::new(&[3], &[vec![0o7, 0o5]], &[]).unwrap();
        let code = Convolutional::new(ConvolutionalOptions::new(trellis, 4).scaling_factor(0.5))
            .unwrap();
        let parity_llr = perfect_llr(&code.encode(&[Zero, One, One, Zero]).unwrap());
        let prior_llr = [1.0, 0.0, 0.0, -1.0, 0.0, 0.0];
        let (posterior, extrinsic) = code.map_decode(&parity_llr, &prior_llr).unwrap();
        for i in 0 .. 6 {
            assert_float_eq!(extrinsic[i], 0.5 * (posterior[i] - prior_llr[i]), abs <= 1e-9);
        }
    }

    #[test]
    fn test_so_decode() {
        for algorithm in [
            DecoderAlgorithm::Exact,
            DecoderAlgorithm::Linear,
            DecoderAlgorithm::Approximate,
        ] {
            let trellis = Trellis::rsc(&[0o13, 0o15, 0o17]).unwrap();
            let code =
                Convolutional::new(ConvolutionalOptions::new(trellis, 20).algorithm(algorithm))
                    .unwrap();
            let msg = utils::random_bits_with_seed(40, 17);
            let parity_llr = perfect_llr(&code.encode(&msg).unwrap());
            let msg_llr = code.so_decode(&parity_llr).unwrap();
            assert_eq!(msg_llr.len(), 40);
            assert_eq!(hard_decisions(&msg_llr), msg);
        }
    }

    #[test]
    fn test_soft_decode() {
        let code = code_for_test(Termination::Tail);
        assert_eq!(code.syst_size(), 6);
        assert_eq!(code.state_size(), 0);
        let msg = [One, One, Zero, One];
        let parity = code.encode(&msg).unwrap();
        let parity_llr = perfect_llr(&parity);
        assert!(code
            .soft_decode(&SoftInput::new(&parity_llr).state(&[0.0]))
            .is_err());
        let output = code.soft_decode(&SoftInput::new(&parity_llr)).unwrap();
        assert_eq!(hard_decisions(&output.msg), msg);
        assert_eq!(output.syst.len(), 6);
        assert!(output.state.is_empty());
        let parity_posterior: Vec<f64> = parity_llr
            .iter()
            .zip(&output.parity)
            .map(|(channel, extrinsic)| channel + extrinsic)
            .collect();
        assert_eq!(hard_decisions(&parity_posterior), parity);
        // Parity bits from the prior on the message bits alone
        let mut syst_prior = perfect_llr(&msg);
        syst_prior.resize(6, 0.0);
        let erased = vec![0.0; code.parity_size()];
        let output = code
            .soft_decode(&SoftInput::new(&erased).syst(&syst_prior))
            .unwrap();
        assert_eq!(hard_decisions(&output.msg), msg);
        assert_eq!(hard_decisions(&output.parity), parity);
        for extrinsic in &output.syst[.. 4] {
            assert_float_eq!(*extrinsic, 0.0, abs <= 1e-9);
        }
    }

    #[test]
    fn test_noisy_channel() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let trellis = Trellis::new(&[7], &[vec![0o171, 0o133]], &[]).unwrap();
        let code = Convolutional::new(ConvolutionalOptions::new(trellis, 64)).unwrap();
        let mut rng = StdRng::seed_from_u64(2024);
        let msg = utils::random_bits_from_rng(128, &mut rng);
        let parity = code.encode(&msg).unwrap();
        let parity_llr = utils::bpsk_awgn_channel(&parity, 7.0, &mut rng);
        assert_eq!(code.decode(&parity_llr).unwrap(), msg);
        assert_eq!(hard_decisions(&code.so_decode(&parity_llr).unwrap()), msg);
    }

    #[test]
    fn test_multiple_inputs() {
        let trellis =
            Trellis::new(&[3, 2], &[vec![0o7, 0o5, 0o0], vec![0o0, 0o3, 0o2]], &[]).unwrap();
        let code = Convolutional::new(ConvolutionalOptions::new(trellis, 5)).unwrap();
        assert_eq!(code.msg_size(), 10);
        assert_eq!(code.tail_size(), 2);
        assert_eq!(code.syst_tail_size(), 4);
        assert_eq!(code.parity_size(), 21);
        let msg = [One, Zero, One, One, Zero, Zero, One, Zero, Zero, One];
        let (parity, tail) = code.encode_with_tail(&msg).unwrap();
        assert_eq!(tail, [Zero; 4]);
        assert!(code.check(&parity).unwrap());
        let parity_llr = perfect_llr(&parity);
        assert_eq!(code.decode(&parity_llr).unwrap(), msg);
        assert_eq!(hard_decisions(&code.so_decode(&parity_llr).unwrap()), msg);
    }

    #[test]
    fn test_puncturing() {
        let code = code_for_test(Termination::Tail);
        let mut options = PunctureOptions {
            mask: vec![false, false],
            tail_mask: Vec::new(),
        };
        assert!(code.puncturing(&options).is_err());
        let all_kept = code.puncturing(&PunctureOptions::default()).unwrap();
        assert_eq!(all_kept, Permutation::identity(code.parity_size()));
        // Tail outputs survive a body mask that keeps nothing
        options.tail_mask = vec![true];
        let tail_only = code.puncturing(&options).unwrap();
        assert_eq!(tail_only.sequence(), [8, 9, 10, 11]);
        options.tail_mask = Vec::new();
        options.mask = vec![true, true, true, false];
        let perm = code.puncturing(&options).unwrap();
        assert_eq!(perm.sequence(), [0, 1, 2, 4, 5, 6, 8, 9, 10]);
        options.tail_mask = vec![true, false];
        let perm = code.puncturing(&options).unwrap();
        assert_eq!(perm.sequence(), [0, 1, 2, 4, 5, 6, 8, 10]);
        // Punctured positions are erasures for the decoder
        let msg = [One, Zero, One, One];
        let parity = code.encode(&msg).unwrap();
        let received = perm.permute(&perfect_llr(&parity)).unwrap();
        assert_eq!(code.decode(&perm.depermute(&received).unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_serde() {
        let code = code_for_test(Termination::Truncate);
        let json = serde_json::to_string(&code).unwrap();
        let recovered: Convolutional = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, code);
        assert_eq!(recovered.termination(), Termination::Truncate);
        // Blocks are tail-terminated unless stated otherwise
        let json = r#"{
            "trellis": {"constraint_lengths": [3], "generators": [[7, 5]], "feedback": []},
            "length": 4
        }"#;
        let with_defaults: Convolutional = serde_json::from_str(json).unwrap();
        assert_eq!(with_defaults, code_for_test(Termination::Tail));
    }
}
