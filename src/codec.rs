//! Interface shared by all codes
//!
//! A code works on blocks: [`Codec::msg_size`] message bits are encoded into
//! [`Codec::parity_size`] parity bits. The provided methods accept any whole number of blocks and
//! process the blocks in parallel.
//!
//! Codes implementing [`SoftCodec`] also accept prior information on their systematic bits and
//! report extrinsic information on every bit, so that they can serve as components of iterative
//! receivers (turbo equalization, serial concatenation).

use rayon::prelude::*;

use crate::{Bit, Error};

/// Encoder and decoder of a block code
pub trait Codec: Sync {
    /// Returns number of message bits per block.
    fn msg_size(&self) -> usize;

    /// Returns number of parity (codeword) bits per block.
    fn parity_size(&self) -> usize;

    /// Encodes one block of message bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `msg.len() != self.msg_size()` or `parity.len() != self.parity_size()`.
    fn encode_block(&self, msg: &[Bit], parity: &mut [Bit]) -> Result<(), Error>;

    /// Returns `true` if one block of parity bits is a codeword.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len() != self.parity_size()`.
    fn check_block(&self, parity: &[Bit]) -> Result<bool, Error>;

    /// Decodes one block of parity LLR values into message bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity_llr.len() != self.parity_size()` or
    /// `msg.len() != self.msg_size()`.
    fn decode_block(&self, parity_llr: &[f64], msg: &mut [Bit]) -> Result<(), Error>;

    /// Decodes one block of parity LLR values into message LLR values.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity_llr.len() != self.parity_size()` or
    /// `msg_llr.len() != self.msg_size()`.
    fn so_decode_block(&self, parity_llr: &[f64], msg_llr: &mut [f64]) -> Result<(), Error>;

    /// Returns parity bits for any number of message blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if `msg.len()` is not a positive multiple of `self.msg_size()`.
    fn encode(&self, msg: &[Bit]) -> Result<Vec<Bit>, Error> {
        let num_blocks = num_blocks(msg.len(), self.msg_size(), "message bits")?;
        let mut parity = vec![Bit::Zero; num_blocks * self.parity_size()];
        msg.par_chunks(self.msg_size())
            .zip(parity.par_chunks_mut(self.parity_size()))
            .try_for_each(|(msg_block, parity_block)| self.encode_block(msg_block, parity_block))?;
        Ok(parity)
    }

    /// Returns `true` if every block of parity bits is a codeword.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity.len()` is not a positive multiple of `self.parity_size()`.
    fn check(&self, parity: &[Bit]) -> Result<bool, Error> {
        num_blocks(parity.len(), self.parity_size(), "parity bits")?;
        let checks: Vec<bool> = parity
            .par_chunks(self.parity_size())
            .map(|parity_block| self.check_block(parity_block))
            .collect::<Result<_, _>>()?;
        Ok(checks.into_iter().all(|valid| valid))
    }

    /// Returns decoded message bits for any number of blocks of parity LLR values.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity_llr.len()` is not a positive multiple of `self.parity_size()`.
    fn decode(&self, parity_llr: &[f64]) -> Result<Vec<Bit>, Error> {
        let num_blocks = num_blocks(parity_llr.len(), self.parity_size(), "parity LLR values")?;
        let mut msg = vec![Bit::Zero; num_blocks * self.msg_size()];
        parity_llr
            .par_chunks(self.parity_size())
            .zip(msg.par_chunks_mut(self.msg_size()))
            .try_for_each(|(llr_block, msg_block)| self.decode_block(llr_block, msg_block))?;
        Ok(msg)
    }

    /// Returns message LLR values for any number of blocks of parity LLR values.
    ///
    /// # Errors
    ///
    /// Returns an error if `parity_llr.len()` is not a positive multiple of `self.parity_size()`.
    fn so_decode(&self, parity_llr: &[f64]) -> Result<Vec<f64>, Error> {
        let num_blocks = num_blocks(parity_llr.len(), self.parity_size(), "parity LLR values")?;
        let mut msg_llr = vec![0.0; num_blocks * self.msg_size()];
        parity_llr
            .par_chunks(self.parity_size())
            .zip(msg_llr.par_chunks_mut(self.msg_size()))
            .try_for_each(|(llr_block, msg_block)| self.so_decode_block(llr_block, msg_block))?;
        Ok(msg_llr)
    }
}

/// Soft inputs of a soft-in soft-out decoder, for one or more blocks
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct SoftInput<'a> {
    /// Channel LLR values of the parity bits
    pub parity: &'a [f64],
    /// Prior LLR values of the systematic bits, or empty for none
    pub syst: &'a [f64],
    /// Decoder state returned by an earlier call, or empty to start afresh
    pub state: &'a [f64],
}

impl<'a> SoftInput<'a> {
    /// Returns soft inputs holding only channel LLR values for the parity bits.
    #[must_use]
    pub fn new(parity: &'a [f64]) -> Self {
        Self {
            parity,
            ..Default::default()
        }
    }

    /// Sets prior LLR values of the systematic bits.
    #[must_use]
    pub fn syst(mut self, syst: &'a [f64]) -> Self {
        self.syst = syst;
        self
    }

    /// Sets decoder state.
    #[must_use]
    pub fn state(mut self, state: &'a [f64]) -> Self {
        self.state = state;
        self
    }
}

/// Soft outputs of a soft-in soft-out decoder, for one or more blocks
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SoftOutput {
    /// Posterior LLR values of the message bits
    pub msg: Vec<f64>,
    /// Extrinsic LLR values of the systematic bits (posterior minus prior)
    pub syst: Vec<f64>,
    /// Extrinsic LLR values of the parity bits (posterior minus channel)
    pub parity: Vec<f64>,
    /// Decoder state, to be passed back in with the same channel LLR values
    pub state: Vec<f64>,
}

impl SoftOutput {
    /// Appends the outputs of another block.
    fn append(&mut self, block: SoftOutput) {
        self.msg.extend(block.msg);
        self.syst.extend(block.syst);
        self.parity.extend(block.parity);
        self.state.extend(block.state);
    }
}

/// Soft-in soft-out decoder of a block code
///
/// The systematic bits of a block are its message bits followed by any tail bits the encoder
/// appends to terminate its trellises.
pub trait SoftCodec: Codec {
    /// Returns number of systematic bits per block.
    fn syst_size(&self) -> usize;

    /// Returns number of decoder state values per block.
    fn state_size(&self) -> usize;

    /// Decodes one block of soft inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if `input.parity.len() != self.parity_size()`, or if `input.syst` or
    /// `input.state` is neither empty nor of length `self.syst_size()` or `self.state_size()`
    /// respectively.
    fn soft_decode_block(&self, input: &SoftInput<'_>) -> Result<SoftOutput, Error>;

    /// Decodes soft inputs for any number of blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if `input.parity.len()` is not a positive multiple of
    /// `self.parity_size()`, or if `input.syst` or `input.state` is neither empty nor of the
    /// matching length for that many blocks.
    fn soft_decode(&self, input: &SoftInput<'_>) -> Result<SoftOutput, Error> {
        let num_blocks = num_blocks(input.parity.len(), self.parity_size(), "parity LLR values")?;
        let syst_blocks =
            optional_blocks(input.syst, num_blocks, self.syst_size(), "systematic LLR values")?;
        let state_blocks =
            optional_blocks(input.state, num_blocks, self.state_size(), "state values")?;
        let block_outputs: Vec<SoftOutput> = input
            .parity
            .par_chunks(self.parity_size())
            .zip(syst_blocks.par_iter())
            .zip(state_blocks.par_iter())
            .map(|((parity, &syst), &state)| {
                self.soft_decode_block(&SoftInput {
                    parity,
                    syst,
                    state,
                })
            })
            .collect::<Result<_, _>>()?;
        let mut output = SoftOutput::default();
        for block_output in block_outputs {
            output.append(block_output);
        }
        Ok(output)
    }
}

/// Returns number of blocks of given size in a sequence, which must hold at least one block.
fn num_blocks(len: usize, block_size: usize, what: &str) -> Result<usize, Error> {
    if block_size == 0 || len == 0 || len % block_size != 0 {
        return Err(Error::InvalidInput(format!(
            "Number of {what} ({len}) must be a positive multiple of {block_size}"
        )));
    }
    Ok(len / block_size)
}

/// Splits an optional sequence into blocks, returning empty blocks if the sequence is empty.
fn optional_blocks<'a>(
    values: &'a [f64],
    num_blocks: usize,
    block_size: usize,
    what: &str,
) -> Result<Vec<&'a [f64]>, Error> {
    if values.is_empty() {
        return Ok(vec![values; num_blocks]);
    }
    if values.len() != num_blocks * block_size {
        return Err(Error::InvalidInput(format!(
            "Expected no {what} or {} of them (found {})",
            num_blocks * block_size,
            values.len()
        )));
    }
    Ok(values.chunks_exact(block_size).collect())
}

/// Checks that an optional block is either empty or has the expected length.
pub(crate) fn check_optional_block_len(
    len: usize,
    expected: usize,
    what: &str,
) -> Result<(), Error> {
    if len == 0 || len == expected {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Wrong number of {what} in block (expected 0 or {expected}, found {len})"
        )))
    }
}

/// Checks that a block has the expected length.
pub(crate) fn check_block_len(len: usize, expected: usize, what: &str) -> Result<(), Error> {
    if len == expected {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Wrong number of {what} in block (expected {expected}, found {len})"
        )))
    }
}

#[cfg(test)]
mod tests_of_codec {
    use super::*;

    /// Repetition code sending each message bit three times
    struct Repetition;

    impl Codec for Repetition {
        fn msg_size(&self) -> usize {
            1
        }

        fn parity_size(&self) -> usize {
            3
        }

        fn encode_block(&self, msg: &[Bit], parity: &mut [Bit]) -> Result<(), Error> {
            check_block_len(msg.len(), 1, "message bits")?;
            parity.fill(msg[0]);
            Ok(())
        }

        fn check_block(&self, parity: &[Bit]) -> Result<bool, Error> {
            Ok(parity.iter().all(|&b| b == parity[0]))
        }

        fn decode_block(&self, parity_llr: &[f64], msg: &mut [Bit]) -> Result<(), Error> {
            let mut msg_llr = [0.0];
            self.so_decode_block(parity_llr, &mut msg_llr)?;
            msg[0] = crate::llr::hard_decision(msg_llr[0]);
            Ok(())
        }

        fn so_decode_block(&self, parity_llr: &[f64], msg_llr: &mut [f64]) -> Result<(), Error> {
            check_block_len(parity_llr.len(), 3, "parity LLR values")?;
            msg_llr[0] = parity_llr.iter().sum();
            Ok(())
        }
    }

    impl SoftCodec for Repetition {
        fn syst_size(&self) -> usize {
            1
        }

        fn state_size(&self) -> usize {
            0
        }

        fn soft_decode_block(&self, input: &SoftInput<'_>) -> Result<SoftOutput, Error> {
            check_block_len(input.parity.len(), 3, "parity LLR values")?;
            check_optional_block_len(input.syst.len(), 1, "systematic LLR values")?;
            let channel: f64 = input.parity.iter().sum();
            let total = channel + input.syst.iter().sum::<f64>();
            Ok(SoftOutput {
                msg: vec![total],
                syst: vec![channel],
                parity: input.parity.iter().map(|llr| total - llr).collect(),
                state: Vec::new(),
            })
        }
    }

    #[test]
    fn test_encode() {
        let code = Repetition;
        assert!(code.encode(&[]).is_err());
        let parity = code.encode(&[Bit::One, Bit::Zero]).unwrap();
        assert_eq!(
            parity,
            [Bit::One, Bit::One, Bit::One, Bit::Zero, Bit::Zero, Bit::Zero]
        );
    }

    #[test]
    fn test_check() {
        let code = Repetition;
        assert!(code.check(&[Bit::One; 2]).is_err());
        assert!(code.check(&[Bit::One; 6]).unwrap());
        assert!(!code
            .check(&[Bit::One, Bit::One, Bit::One, Bit::Zero, Bit::One, Bit::Zero])
            .unwrap());
    }

    #[test]
    fn test_decode() {
        let code = Repetition;
        assert!(code.decode(&[1.0; 4]).is_err());
        let msg = code.decode(&[1.0, -0.5, 2.0, -1.0, -1.0, 1.5]).unwrap();
        assert_eq!(msg, [Bit::Zero, Bit::One]);
        let msg_llr = code.so_decode(&[1.0, -0.5, 2.0, -1.0, -1.0, 1.5]).unwrap();
        assert_eq!(msg_llr, [2.5, -0.5]);
    }

    #[test]
    fn test_soft_decode() {
        let code = Repetition;
        let parity_llr = [1.0, -0.5, 2.0, -1.0, -1.0, 1.5];
        assert!(code.soft_decode(&SoftInput::new(&parity_llr[.. 4])).is_err());
        assert!(code
            .soft_decode(&SoftInput::new(&parity_llr).syst(&[1.0]))
            .is_err());
        assert!(code
            .soft_decode(&SoftInput::new(&parity_llr).state(&[1.0, 1.0]))
            .is_err());
        let output = code.soft_decode(&SoftInput::new(&parity_llr)).unwrap();
        assert_eq!(output.msg, [2.5, -0.5]);
        assert_eq!(output.syst, [2.5, -0.5]);
        assert_eq!(output.parity, [1.5, 3.0, 0.5, 0.5, 0.5, -2.0]);
        assert!(output.state.is_empty());
        let output = code
            .soft_decode(&SoftInput::new(&parity_llr).syst(&[-3.0, 1.0]))
            .unwrap();
        assert_eq!(output.msg, [-0.5, 0.5]);
        assert_eq!(output.syst, [2.5, -0.5]);
    }

    #[test]
    fn test_check_block_len() {
        assert!(check_block_len(3, 3, "bits").is_ok());
        assert!(check_block_len(2, 3, "bits").is_err());
        assert!(check_optional_block_len(0, 3, "bits").is_ok());
        assert!(check_optional_block_len(2, 3, "bits").is_err());
    }
}
