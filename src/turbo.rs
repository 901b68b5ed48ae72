//! Turbo code: parallel concatenation of convolutional constituents
//!
//! Each constituent encodes the message bits permuted by its own interleaver. The parity bits of
//! a block are laid out as
//!
//! `| syst | syst_tail_1 | syst_tail_2 | ... | conv_1 | conv_2 | ... |`
//!
//! where `syst` holds the message bits, `syst_tail_i` the tail input bits of constituent `i`, and
//! `conv_i` all parity bits of constituent `i` (tail outputs included).
//!
//! As a [`SoftCodec`], the decoder state of a block holds the extrinsic LLR values of every
//! constituent in message order, `| extrinsic_1 | extrinsic_2 | ... |`, whatever the scheduling.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{check_block_len, check_optional_block_len, SoftInput, SoftOutput};
use crate::convolutional::{extrinsic_of, hard_decisions};
use crate::llr::hard_decision;
use crate::{
    Bit, Codec, Convolutional, ConvolutionalOptions, DecoderAlgorithm, Error, Permutation,
    SoftCodec, Termination, Trellis,
};

/// Default number of decoder iterations
const DEFAULT_ITERATIONS: usize = 6;

/// Enumeration of schedules for exchanging extrinsic information between constituents
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum Scheduling {
    /// Constituents are decoded in turn, each using the latest extrinsic information of the
    /// others
    #[default]
    Serial,
    /// All constituents are decoded with the extrinsic information of the previous iteration
    Parallel,
}

impl std::fmt::Display for Scheduling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheduling::Serial => write!(f, "Serial"),
            Scheduling::Parallel => write!(f, "Parallel"),
        }
    }
}

/// Parameters of a turbo code
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct TurboOptions {
    /// Trellis shared by all constituents, or one trellis per constituent
    pub trellises: Vec<Trellis>,
    /// Interleaver of each constituent (an empty permutation stands for the identity)
    pub interleavers: Vec<Permutation>,
    /// Termination shared by all constituents, or one termination per constituent
    #[serde(default = "default_terminations")]
    pub terminations: Vec<Termination>,
    /// Maximum number of decoder iterations
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Schedule of the decoder
    #[serde(default)]
    pub scheduling: Scheduling,
    /// Algorithm used by the constituent decoders
    #[serde(default)]
    pub algorithm: DecoderAlgorithm,
    /// Factor applied to the extrinsic LLR values of the constituent decoders
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
    /// Whether decoding stops as soon as all constituents agree
    #[serde(default = "default_early_termination")]
    pub early_termination: bool,
}

impl TurboOptions {
    /// Returns options for given trellises and interleavers, with tail termination, the default
    /// number of iterations, serial scheduling, the approximate decoding algorithm and early
    /// termination.
    #[must_use]
    pub fn new(trellises: Vec<Trellis>, interleavers: Vec<Permutation>) -> Self {
        Self {
            trellises,
            interleavers,
            terminations: default_terminations(),
            iterations: default_iterations(),
            scheduling: Scheduling::default(),
            algorithm: DecoderAlgorithm::default(),
            scaling_factor: default_scaling_factor(),
            early_termination: default_early_termination(),
        }
    }

    /// Sets terminations.
    #[must_use]
    pub fn terminations(mut self, terminations: Vec<Termination>) -> Self {
        self.terminations = terminations;
        self
    }

    /// Sets maximum number of decoder iterations.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets decoder schedule.
    #[must_use]
    pub fn scheduling(mut self, scheduling: Scheduling) -> Self {
        self.scheduling = scheduling;
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

    /// Sets whether decoding stops early.
    #[must_use]
    pub fn early_termination(mut self, early_termination: bool) -> Self {
        self.early_termination = early_termination;
        self
    }
}

/// Returns default terminations.
fn default_terminations() -> Vec<Termination> {
    vec![Termination::Tail]
}

/// Returns default number of decoder iterations.
fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

/// Returns default extrinsic scaling factor.
fn default_scaling_factor() -> f64 {
    1.0
}

/// Returns default early termination flag.
fn default_early_termination() -> bool {
    true
}

/// Enumeration of orders of the transmitted bits after puncturing
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum BitOrdering {
    /// Each systematic bit is followed by the parity bits of the same trellis stage of every
    /// constituent; tail bits come last
    #[default]
    Alternate,
    /// All systematic bits, then all systematic tail bits, then the parity bits of each
    /// constituent in turn
    Group,
}

/// Puncturing pattern for the parity bits of a turbo code
///
/// Each mask is applied periodically. An empty list of masks keeps every bit, except for
/// `syst_tail_masks` and `tail_masks`, which then continue the systematic and parity masks
/// respectively. A list holding a single mask shares it between all constituents.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct TurboPunctureOptions {
    /// Order of the transmitted bits
    pub bit_ordering: BitOrdering,
    /// Mask for the systematic bits
    pub syst_mask: Vec<bool>,
    /// Masks for the systematic tail bits
    pub syst_tail_masks: Vec<Vec<bool>>,
    /// Masks for the parity bits of each constituent
    pub parity_masks: Vec<Vec<bool>>,
    /// Masks for the tail outputs of each constituent
    pub tail_masks: Vec<Vec<bool>>,
}

/// Turbo code
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "TurboOptions", into = "TurboOptions")]
pub struct Turbo {
    /// Parameters
    options: TurboOptions,
    /// Number of message bits per block
    msg_size: usize,
    /// Interleaver of each constituent, with identities made explicit
    interleavers: Vec<Permutation>,
    /// Constituent codes
    constituents: Vec<Convolutional>,
}

/// Soft results of the iterative decoder for one block
struct TurboDecoding {
    /// Posterior LLR values of the message bits
    posterior: Vec<f64>,
    /// Extrinsic LLR values of each constituent, in message order
    extrinsic: Vec<Vec<f64>>,
    /// Posterior LLR values of the tail input bits of each constituent
    tail_posteriors: Vec<Vec<f64>>,
    /// Posterior LLR values of the parity bits of each constituent (channel values unless
    /// requested)
    conv_posteriors: Vec<Vec<f64>>,
}

impl Turbo {
    /// Returns turbo code with given parameters.
    ///
    /// The number of message bits per block is the input size of the interleavers.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of trellises or terminations is neither `1` nor the number
    /// of interleavers, if the interleavers disagree on their input size, or if the output size of
    /// an interleaver is not a positive multiple of the input size of its trellis.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::{Codec, Permutation, Trellis, Turbo, TurboOptions};
    ///
    /// // Rate-1/3 turbo code of LTE with 40 message bits
    /// let trellis = Trellis::recursive_parity(&[0o13, 0o15])?;
    /// let interleavers = vec![Permutation::default(), Permutation::qpp(40, 3, 10)?];
    /// let code = Turbo::new(TurboOptions::new(vec![trellis], interleavers))?;
    /// assert_eq!(code.msg_size(), 40);
    /// assert_eq!(code.parity_size(), 132);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(options: TurboOptions) -> Result<Self, Error> {
        let num_constituents = options.interleavers.len();
        if num_constituents == 0 {
            return Err(Error::InvalidInput(
                "Turbo code needs at least one interleaver".to_string(),
            ));
        }
        if options.trellises.len() != 1 && options.trellises.len() != num_constituents {
            return Err(Error::InvalidInput(format!(
                "Expected 1 or {num_constituents} trellises (found {})",
                options.trellises.len()
            )));
        }
        if options.terminations.len() != 1 && options.terminations.len() != num_constituents {
            return Err(Error::InvalidInput(format!(
                "Expected 1 or {num_constituents} terminations (found {})",
                options.terminations.len()
            )));
        }
        let msg_size = options
            .interleavers
            .iter()
            .map(Permutation::input_size)
            .max()
            .unwrap_or(0);
        if msg_size == 0 {
            return Err(Error::InvalidInput(
                "At least one interleaver must have a nonempty input".to_string(),
            ));
        }
        let mut interleavers = Vec::with_capacity(num_constituents);
        let mut constituents = Vec::with_capacity(num_constituents);
        for (i, interleaver) in options.interleavers.iter().enumerate() {
            let interleaver = match interleaver.output_size() {
                0 => Permutation::identity(msg_size),
                _ if interleaver.input_size() == msg_size => interleaver.clone(),
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "Interleaver {i} has input size {} instead of {msg_size}",
                        interleaver.input_size()
                    )))
                }
            };
            let trellis = &options.trellises[i.min(options.trellises.len() - 1)];
            let termination = options.terminations[i.min(options.terminations.len() - 1)];
            if interleaver.output_size() % trellis.input_size() != 0 {
                return Err(Error::InvalidInput(format!(
                    "Output size {} of interleaver {i} is not a multiple of trellis input size {}",
                    interleaver.output_size(),
                    trellis.input_size()
                )));
            }
            let length = interleaver.output_size() / trellis.input_size();
            constituents.push(Convolutional::new(
                ConvolutionalOptions::new(trellis.clone(), length)
                    .termination(termination)
                    .algorithm(options.algorithm)
                    .scaling_factor(options.scaling_factor),
            )?);
            interleavers.push(interleaver);
        }
        Ok(Self {
            options,
            msg_size,
            interleavers,
            constituents,
        })
    }

    /// Returns parameters.
    #[must_use]
    pub fn options(&self) -> &TurboOptions {
        &self.options
    }

    /// Returns constituent codes.
    #[must_use]
    pub fn constituents(&self) -> &[Convolutional] {
        &self.constituents
    }

    /// Returns interleavers, with identities made explicit.
    #[must_use]
    pub fn interleavers(&self) -> &[Permutation] {
        &self.interleavers
    }

    /// Returns total number of systematic tail bits.
    #[must_use]
    pub fn syst_tail_size(&self) -> usize {
        self.constituents
            .iter()
            .map(Convolutional::syst_tail_size)
            .sum()
    }

    /// Returns puncturing pattern selecting the parity bits to be transmitted.
    ///
    /// # Errors
    ///
    /// Returns an error if a list of masks holds neither `0`, `1` nor one mask per constituent, or
    /// if the masks keep no bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::turbo::{BitOrdering, TurboPunctureOptions};
    /// use fecodec::{Permutation, Trellis, Turbo, TurboOptions};
    ///
    /// let trellis = Trellis::recursive_parity(&[0o13, 0o15])?;
    /// let interleavers = vec![Permutation::default(), Permutation::qpp(40, 3, 10)?];
    /// let code = Turbo::new(TurboOptions::new(vec![trellis], interleavers))?;
    /// // Rate 1/2 by keeping every other parity bit of each constituent
    /// let options = TurboPunctureOptions {
    ///     bit_ordering: BitOrdering::Alternate,
    ///     parity_masks: vec![vec![true, false], vec![false, true]],
    ///     ..Default::default()
    /// };
    /// let puncturing = code.puncturing(&options)?;
    /// assert_eq!(puncturing.output_size(), 40 + 6 + 20 + 1 + 20 + 2);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn puncturing(&self, options: &TurboPunctureOptions) -> Result<Permutation, Error> {
        let num_constituents = self.constituents.len();
        let syst_mask = if options.syst_mask.is_empty() {
            vec![true]
        } else {
            options.syst_mask.clone()
        };
        let syst_tail_masks = per_constituent_masks(&options.syst_tail_masks, num_constituents)?;
        let parity_masks = per_constituent_masks(&options.parity_masks, num_constituents)?
            .unwrap_or_else(|| vec![vec![true]; num_constituents]);
        let tail_masks = per_constituent_masks(&options.tail_masks, num_constituents)?;
        let keep = |mask: &[bool], index: usize| mask[index % mask.len()];

        // Decision for every parity position, in the layout of the parity bits
        let mut kept = vec![false; self.parity_size()];
        for (pos, kept_bit) in kept[.. self.msg_size].iter_mut().enumerate() {
            *kept_bit = keep(&syst_mask, pos);
        }
        let mut syst_pos = self.msg_size;
        let mut parity_pos = self.syst_size();
        for (i, constituent) in self.constituents.iter().enumerate() {
            for tail_index in 0 .. constituent.syst_tail_size() {
                kept[syst_pos] = match &syst_tail_masks {
                    Some(masks) => keep(&masks[i], tail_index),
                    None => keep(&syst_mask, syst_pos),
                };
                syst_pos += 1;
            }
            let body_size = constituent.length() * constituent.trellis().output_size();
            for index in 0 .. constituent.parity_size() {
                kept[parity_pos + index] = match &tail_masks {
                    Some(masks) if index >= body_size => keep(&masks[i], index - body_size),
                    _ => keep(&parity_masks[i], index),
                };
            }
            parity_pos += constituent.parity_size();
        }

        let order = match options.bit_ordering {
            BitOrdering::Alternate => self.alternate_order(),
            BitOrdering::Group => (0 .. self.parity_size()).collect(),
        };
        let sequence: Vec<usize> = order.into_iter().filter(|&pos| kept[pos]).collect();
        if sequence.is_empty() {
            return Err(Error::InvalidInput(
                "Puncturing masks must keep at least one bit".to_string(),
            ));
        }
        Permutation::new(&sequence, self.parity_size())
    }

    /// Returns all parity positions, with each systematic bit followed by the outputs of the
    /// same trellis stage of every constituent, and the tail bits of each constituent last.
    fn alternate_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.parity_size());
        let max_length = self
            .constituents
            .iter()
            .map(Convolutional::length)
            .max()
            .unwrap_or(0);
        for stage in 0 .. self.msg_size.max(max_length) {
            if stage < self.msg_size {
                order.push(stage);
            }
            let mut parity_pos = self.syst_size();
            for constituent in &self.constituents {
                let n = constituent.trellis().output_size();
                if stage < constituent.length() {
                    order.extend(parity_pos + stage * n .. parity_pos + (stage + 1) * n);
                }
                parity_pos += constituent.parity_size();
            }
        }
        let mut syst_pos = self.msg_size;
        let mut parity_pos = self.syst_size();
        for constituent in &self.constituents {
            let (k, n) = (
                constituent.trellis().input_size(),
                constituent.trellis().output_size(),
            );
            let tail_start = parity_pos + constituent.length() * n;
            for stage in 0 .. constituent.tail_size() {
                order.extend(syst_pos + stage * k .. syst_pos + (stage + 1) * k);
                order.extend(tail_start + stage * n .. tail_start + (stage + 1) * n);
            }
            syst_pos += constituent.syst_tail_size();
            parity_pos += constituent.parity_size();
        }
        order
    }

    /// Splits systematic values into the message part and the tail part of each constituent.
    fn split_syst<'a, T>(&self, syst: &'a [T]) -> (&'a [T], Vec<&'a [T]>) {
        let (msg, mut rest) = syst.split_at(self.msg_size);
        let mut syst_tails = Vec::with_capacity(self.constituents.len());
        for constituent in &self.constituents {
            let (syst_tail, remainder) = rest.split_at(constituent.syst_tail_size());
            syst_tails.push(syst_tail);
            rest = remainder;
        }
        (msg, syst_tails)
    }

    /// Splits a block into its systematic part, the systematic tail of each constituent, and the
    /// parity part of each constituent.
    fn split_block<'a, T>(&self, block: &'a [T]) -> (&'a [T], Vec<&'a [T]>, Vec<&'a [T]>) {
        let (syst, mut rest) = block.split_at(self.syst_size());
        let (msg, syst_tails) = self.split_syst(syst);
        let mut conv_parts = Vec::with_capacity(self.constituents.len());
        for constituent in &self.constituents {
            let (conv_part, remainder) = rest.split_at(constituent.parity_size());
            conv_parts.push(conv_part);
            rest = remainder;
        }
        (msg, syst_tails, conv_parts)
    }

    /// Runs iterative decoder on one block.
    ///
    /// `syst_prior` holds prior LLR values for the systematic bits and `state` the extrinsic LLR
    /// values of each constituent from an earlier run; either may be empty.
    fn run_turbo_decoder(
        &self,
        parity_llr: &[f64],
        syst_prior: &[f64],
        state: &[f64],
        with_parity: bool,
    ) -> Result<TurboDecoding, Error> {
        let (channel_syst, channel_syst_tails, conv_llr) = self.split_block(parity_llr);
        let num_constituents = self.constituents.len();
        let mut syst_llr = channel_syst.to_vec();
        let mut tail_posteriors: Vec<Vec<f64>> =
            channel_syst_tails.iter().map(|tail| tail.to_vec()).collect();
        if !syst_prior.is_empty() {
            let (msg_prior, tail_priors) = self.split_syst(syst_prior);
            add_assign(&mut syst_llr, msg_prior);
            for (tail, tail_prior) in tail_posteriors.iter_mut().zip(tail_priors) {
                add_assign(tail, tail_prior);
            }
        }
        let syst_tail_llr = tail_posteriors.clone();
        let mut conv_posteriors: Vec<Vec<f64>> =
            conv_llr.iter().map(|llr| llr.to_vec()).collect();
        let mut extrinsic = if state.is_empty() {
            vec![vec![0.0; self.msg_size]; num_constituents]
        } else {
            state.chunks_exact(self.msg_size).map(<[f64]>::to_vec).collect()
        };
        let mut decisions: Vec<Vec<Bit>> = vec![Vec::new(); num_constituents];
        let mut posterior = self.msg_posterior(&syst_llr, &extrinsic);
        for iter in 0 .. self.options.iterations {
            let previous = match self.options.scheduling {
                Scheduling::Serial => None,
                Scheduling::Parallel => Some(extrinsic.clone()),
            };
            for i in 0 .. num_constituents {
                let source = previous.as_ref().unwrap_or(&extrinsic);
                let prior_msg: Vec<f64> = (0 .. self.msg_size)
                    .map(|pos| {
                        syst_llr[pos]
                            + (0 .. num_constituents)
                                .filter(|&j| j != i)
                                .map(|j| source[j][pos])
                                .sum::<f64>()
                    })
                    .collect();
                let mut prior = self.interleavers[i].permute(&prior_msg)?;
                prior.extend_from_slice(&syst_tail_llr[i]);
                let output =
                    self.constituents[i].run_map_decoder(conv_llr[i], &prior, with_parity)?;
                // Deinterleave by accumulation, since an interleaver may repeat message bits
                let msg_extrinsic = &mut extrinsic[i];
                msg_extrinsic.fill(0.0);
                for (&pos, &val) in self.interleavers[i].sequence().iter().zip(&output.extrinsic) {
                    msg_extrinsic[pos] += val;
                }
                let num_inputs = self.interleavers[i].output_size();
                decisions[i] = hard_decisions(&output.posterior[.. num_inputs]);
                tail_posteriors[i] = output.posterior[num_inputs ..].to_vec();
                if with_parity {
                    conv_posteriors[i] = output.parity_posterior;
                }
            }
            posterior = self.msg_posterior(&syst_llr, &extrinsic);
            if self.options.early_termination && self.decisions_agree(&decisions, &posterior) {
                debug!(iterations = iter + 1, "Turbo decoder converged");
                break;
            }
        }
        Ok(TurboDecoding {
            posterior,
            extrinsic,
            tail_posteriors,
            conv_posteriors,
        })
    }

    /// Returns posterior LLR values for the message bits.
    fn msg_posterior(&self, syst_llr: &[f64], extrinsic: &[Vec<f64>]) -> Vec<f64> {
        (0 .. self.msg_size)
            .map(|pos| syst_llr[pos] + extrinsic.iter().map(|ext| ext[pos]).sum::<f64>())
            .collect()
    }

    /// Returns `true` if the decisions of every constituent agree with the posterior LLR values.
    fn decisions_agree(&self, decisions: &[Vec<Bit>], posterior: &[f64]) -> bool {
        self.interleavers
            .iter()
            .zip(decisions)
            .all(|(interleaver, constituent_decisions)| {
                interleaver
                    .sequence()
                    .iter()
                    .zip(constituent_decisions)
                    .all(|(&pos, &bit)| hard_decision(posterior[pos]) == bit)
            })
    }
}

impl Codec for Turbo {
    fn msg_size(&self) -> usize {
        self.msg_size
    }

    fn parity_size(&self) -> usize {
        self.syst_size()
            + self
                .constituents
                .iter()
                .map(Codec::parity_size)
                .sum::<usize>()
    }

    fn encode_block(&self, msg: &[Bit], parity: &mut [Bit]) -> Result<(), Error> {
        check_block_len(msg.len(), self.msg_size, "message bits")?;
        check_block_len(parity.len(), self.parity_size(), "parity bits")?;
        let (syst, rest) = parity.split_at_mut(self.msg_size);
        syst.copy_from_slice(msg);
        let (mut syst_tails, mut conv_parts) = rest.split_at_mut(self.syst_tail_size());
        for (interleaver, constituent) in self.interleavers.iter().zip(&self.constituents) {
            let (conv_parity, syst_tail) =
                constituent.encode_with_tail(&interleaver.permute(msg)?)?;
            let (syst_tail_out, syst_tails_rest) =
                std::mem::take(&mut syst_tails).split_at_mut(syst_tail.len());
            syst_tail_out.copy_from_slice(&syst_tail);
            syst_tails = syst_tails_rest;
            let (conv_out, conv_rest) =
                std::mem::take(&mut conv_parts).split_at_mut(conv_parity.len());
            conv_out.copy_from_slice(&conv_parity);
            conv_parts = conv_rest;
        }
        Ok(())
    }

    fn check_block(&self, parity: &[Bit]) -> Result<bool, Error> {
        check_block_len(parity.len(), self.parity_size(), "parity bits")?;
        let mut expected = vec![Bit::Zero; self.parity_size()];
        self.encode_block(&parity[.. self.msg_size], &mut expected)?;
        Ok(expected == parity)
    }

    fn decode_block(&self, parity_llr: &[f64], msg: &mut [Bit]) -> Result<(), Error> {
        check_block_len(msg.len(), self.msg_size, "message bits")?;
        let mut msg_llr = vec![0.0; self.msg_size];
        self.so_decode_block(parity_llr, &mut msg_llr)?;
        for (bit, &llr) in msg.iter_mut().zip(&msg_llr) {
            *bit = hard_decision(llr);
        }
        Ok(())
    }

    fn so_decode_block(&self, parity_llr: &[f64], msg_llr: &mut [f64]) -> Result<(), Error> {
        check_block_len(parity_llr.len(), self.parity_size(), "parity LLR values")?;
        check_block_len(msg_llr.len(), self.msg_size, "message LLR values")?;
        let decoding = self.run_turbo_decoder(parity_llr, &[], &[], false)?;
        msg_llr.copy_from_slice(&decoding.posterior);
        Ok(())
    }
}

impl SoftCodec for Turbo {
    fn syst_size(&self) -> usize {
        self.msg_size + self.syst_tail_size()
    }

    fn state_size(&self) -> usize {
        self.msg_size * self.constituents.len()
    }

    fn soft_decode_block(&self, input: &SoftInput<'_>) -> Result<SoftOutput, Error> {
        check_block_len(input.parity.len(), self.parity_size(), "parity LLR values")?;
        check_optional_block_len(input.syst.len(), self.syst_size(), "systematic LLR values")?;
        check_optional_block_len(input.state.len(), self.state_size(), "state values")?;
        let decoding = self.run_turbo_decoder(input.parity, input.syst, input.state, true)?;
        let mut posterior = Vec::with_capacity(self.parity_size());
        posterior.extend_from_slice(&decoding.posterior);
        decoding.tail_posteriors.iter().for_each(|tail| posterior.extend_from_slice(tail));
        decoding.conv_posteriors.iter().for_each(|conv| posterior.extend_from_slice(conv));
        let syst_posterior = &posterior[.. self.syst_size()];
        Ok(SoftOutput {
            syst: if input.syst.is_empty() {
                syst_posterior.to_vec()
            } else {
                extrinsic_of(syst_posterior, input.syst)
            },
            parity: extrinsic_of(&posterior, input.parity),
            msg: decoding.posterior,
            state: decoding.extrinsic.concat(),
        })
    }
}

impl TryFrom<TurboOptions> for Turbo {
    type Error = Error;

    fn try_from(options: TurboOptions) -> Result<Self, Error> {
        Self::new(options)
    }
}

impl From<Turbo> for TurboOptions {
    fn from(code: Turbo) -> Self {
        code.options
    }
}

/// Adds values element-wise to a slice.
fn add_assign(values: &mut [f64], other: &[f64]) {
    values.iter_mut().zip(other).for_each(|(val, &add)| *val += add);
}

/// Returns one mask per constituent from a list holding no mask, one shared mask or one mask per
/// constituent (empty masks keep every bit).
fn per_constituent_masks(
    masks: &[Vec<bool>],
    num_constituents: usize,
) -> Result<Option<Vec<Vec<bool>>>, Error> {
    let expanded = match masks.len() {
        0 => return Ok(None),
        1 => vec![masks[0].clone(); num_constituents],
        len if len == num_constituents => masks.to_vec(),
        len => {
            return Err(Error::InvalidInput(format!(
                "Expected 0, 1 or {num_constituents} puncturing masks (found {len})"
            )))
        }
    };
    Ok(Some(
        expanded
            .into_iter()
            .map(|mask| if mask.is_empty() { vec![true] } else { mask })
            .collect(),
    ))
}
