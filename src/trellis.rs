//! Trellis describing the state machine of a convolutional encoder

use serde::{Deserialize, Serialize};

use crate::common::bitxor;
use crate::Error;

/// Maximum total number of memory bits in a trellis
const MAX_STATE_SIZE: usize = 20;

/// Maximum number of input bits per trellis stage
const MAX_INPUT_SIZE: usize = 8;

/// Polynomial description from which a [`Trellis`] is built
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
struct TrellisDefinition {
    /// Constraint length of the shift register of each input
    constraint_lengths: Vec<usize>,
    /// Generator polynomial from each input register to each output
    generators: Vec<Vec<usize>>,
    /// Feedback polynomial of each input register (empty for a feed-forward encoder)
    feedback: Vec<usize>,
}

/// Trellis of a (possibly recursive) convolutional encoder with `k` inputs and `n` outputs
///
/// Inputs and outputs of a stage, as well as states, are handled as integers whose bit `i` holds
/// input `i`, output `i` and memory bit `i` respectively.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "TrellisDefinition", into = "TrellisDefinition")]
pub struct Trellis {
    /// Polynomial description
    definition: TrellisDefinition,
    /// Memory length of each input register
    memory_lens: Vec<usize>,
    /// Total number of memory bits
    state_size: usize,
    /// Next state for each state and input (index `state * input_count + input`)
    next_states: Vec<usize>,
    /// Output for each state and input (index `state * input_count + input`)
    outputs: Vec<usize>,
}

impl Trellis {
    /// Returns trellis for given polynomial description.
    ///
    /// # Parameters
    ///
    /// - `constraint_lengths`: Constraint length `L_i` of the shift register of each input `i`. Its
    ///   length is the number of inputs `k` per trellis stage.
    ///
    /// - `generators`: Integer representation of the generator polynomial connecting the register
    ///   of input `i` to output `j`, in `generators[i][j]`. Each row must have the same length,
    ///   which is the number of outputs `n` per trellis stage. Bit `L_i - 1` (the MSB) taps the
    ///   register input and bit `0` taps the oldest memory bit.
    ///
    /// - `feedback`: Either empty (feed-forward encoder) or one feedback polynomial per input. A
    ///   feedback polynomial must have its MSB (bit `L_i - 1`) set; the register input is then the
    ///   XOR of the encoder input and the memory bits tapped by the other bits of the polynomial.
    ///
    /// # Errors
    ///
    /// Returns an error if the description is inconsistent, if any polynomial has taps beyond its
    /// constraint length, or if the trellis would be too large.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::Trellis;
    ///
    /// // Rate-1/2 feed-forward code with constraint length 3
    /// let trellis = Trellis::new(&[3], &[vec![0o7, 0o5]], &[])?;
    /// assert_eq!(trellis.state_count(), 4);
    /// assert_eq!(trellis.output_size(), 2);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        constraint_lengths: &[usize],
        generators: &[Vec<usize>],
        feedback: &[usize],
    ) -> Result<Self, Error> {
        Self::try_from(TrellisDefinition {
            constraint_lengths: constraint_lengths.to_vec(),
            generators: generators.to_vec(),
            feedback: feedback.to_vec(),
        })
    }

    /// Returns trellis of a systematic recursive convolutional (RSC) encoder.
    ///
    /// # Parameters
    ///
    /// - `code_polynomials`: Integer representations of the generator polynomials for the code.
    ///   The first element is taken as the feedback polynomial (this corresponds to the systematic
    ///   output bit), and all subsequent ones as the feedforward polynomials (these correspond to
    ///   the parity bits). For a code of constraint length `L`, the feedback polynomial must be in
    ///   the range `(2^(L-1), 2^L)`, and each feedforward polynomial must be in the range
    ///   `[1, 2^L)` and different from the feedback polynomial.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_polynomials` is invalid.
    pub fn rsc(code_polynomials: &[usize]) -> Result<Self, Error> {
        let constraint_len = constraint_length(code_polynomials)?;
        Self::new(
            &[constraint_len],
            &[code_polynomials.to_vec()],
            &code_polynomials[.. 1],
        )
    }

    /// Returns trellis of a recursive convolutional encoder that outputs only the parity bits.
    ///
    /// This is the usual constituent of a turbo code, whose systematic bits are sent separately.
    /// The meaning of `code_polynomials` is the same as for [`Trellis::rsc`].
    ///
    /// # Errors
    ///
    /// Returns an error if `code_polynomials` is invalid.
    pub fn recursive_parity(code_polynomials: &[usize]) -> Result<Self, Error> {
        let constraint_len = constraint_length(code_polynomials)?;
        Self::new(
            &[constraint_len],
            &[code_polynomials[1 ..].to_vec()],
            &code_polynomials[.. 1],
        )
    }

    /// Returns number of input bits per trellis stage.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.definition.constraint_lengths.len()
    }

    /// Returns number of output bits per trellis stage.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.definition.generators[0].len()
    }

    /// Returns total number of memory bits.
    #[must_use]
    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Returns number of stages needed to flush the longest input register.
    #[must_use]
    pub fn max_memory_len(&self) -> usize {
        self.memory_lens.iter().copied().max().unwrap_or(0)
    }

    /// Returns number of states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        1 << self.state_size
    }

    /// Returns number of distinct inputs per trellis stage.
    #[must_use]
    pub fn input_count(&self) -> usize {
        1 << self.input_size()
    }

    /// Returns number of distinct outputs per trellis stage.
    #[must_use]
    pub fn output_count(&self) -> usize {
        1 << self.output_size()
    }

    /// Returns next state from given state and input.
    #[must_use]
    pub fn next_state(&self, state: usize, input: usize) -> usize {
        self.next_states[state * self.input_count() + input]
    }

    /// Returns output from given state and input.
    #[must_use]
    pub fn output(&self, state: usize, input: usize) -> usize {
        self.outputs[state * self.input_count() + input]
    }

    /// Returns constraint length of each input register.
    #[must_use]
    pub fn constraint_lengths(&self) -> &[usize] {
        &self.definition.constraint_lengths
    }

    /// Returns generator polynomials.
    #[must_use]
    pub fn generators(&self) -> &[Vec<usize>] {
        &self.definition.generators
    }

    /// Returns feedback polynomials (empty for a feed-forward encoder).
    #[must_use]
    pub fn feedback(&self) -> &[usize] {
        &self.definition.feedback
    }
}

impl TryFrom<TrellisDefinition> for Trellis {
    type Error = Error;

    fn try_from(definition: TrellisDefinition) -> Result<Self, Error> {
        check_definition(&definition)?;
        let memory_lens: Vec<usize> = definition
            .constraint_lengths
            .iter()
            .map(|&len| len - 1)
            .collect();
        let state_size: usize = memory_lens.iter().sum();
        let input_count = 1usize << definition.constraint_lengths.len();
        let state_count = 1usize << state_size;
        let mut next_states = Vec::with_capacity(state_count * input_count);
        let mut outputs = Vec::with_capacity(state_count * input_count);
        for state in 0 .. state_count {
            for input in 0 .. input_count {
                let (next_state, output) = transition(&definition, &memory_lens, state, input);
                next_states.push(next_state);
                outputs.push(output);
            }
        }
        Ok(Self {
            definition,
            memory_lens,
            state_size,
            next_states,
            outputs,
        })
    }
}

impl From<Trellis> for TrellisDefinition {
    fn from(trellis: Trellis) -> Self {
        trellis.definition
    }
}

/// Checks validity of polynomial description.
fn check_definition(definition: &TrellisDefinition) -> Result<(), Error> {
    let num_inputs = definition.constraint_lengths.len();
    if num_inputs == 0 || num_inputs > MAX_INPUT_SIZE {
        return Err(Error::InvalidInput(format!(
            "Expected between 1 and {MAX_INPUT_SIZE} constraint lengths (found {num_inputs})"
        )));
    }
    if definition.constraint_lengths.contains(&0) {
        return Err(Error::InvalidInput(
            "Constraint lengths must be positive".to_string(),
        ));
    }
    let state_size: usize = definition.constraint_lengths.iter().map(|&len| len - 1).sum();
    if state_size > MAX_STATE_SIZE {
        return Err(Error::InvalidInput(format!(
            "Total memory of {state_size} bits exceeds maximum of {MAX_STATE_SIZE} bits"
        )));
    }
    if definition.generators.len() != num_inputs {
        return Err(Error::InvalidInput(format!(
            "Expected one row of generator polynomials per input ({num_inputs}), found {}",
            definition.generators.len()
        )));
    }
    let num_outputs = definition.generators[0].len();
    if num_outputs == 0 || num_outputs >= usize::BITS as usize {
        return Err(Error::InvalidInput(format!(
            "Invalid number of outputs per trellis stage ({num_outputs})"
        )));
    }
    for (row, &len) in definition.generators.iter().zip(&definition.constraint_lengths) {
        if row.len() != num_outputs {
            return Err(Error::InvalidInput(format!(
                "Every input must have {num_outputs} generator polynomials (found {})",
                row.len()
            )));
        }
        if let Some(poly) = row.iter().find(|&&poly| poly >= 1 << len) {
            return Err(Error::InvalidInput(format!(
                "Generator polynomial {poly:o} (octal) exceeds constraint length {len}"
            )));
        }
    }
    if !definition.feedback.is_empty() {
        if definition.feedback.len() != num_inputs {
            return Err(Error::InvalidInput(format!(
                "Expected no feedback polynomials or one per input ({num_inputs}), found {}",
                definition.feedback.len()
            )));
        }
        for (&poly, &len) in definition.feedback.iter().zip(&definition.constraint_lengths) {
            if poly >= 1 << len || poly & (1 << (len - 1)) == 0 {
                return Err(Error::InvalidInput(format!(
                    "Feedback polynomial {poly:o} (octal) must have its MSB at constraint \
                    length {len}"
                )));
            }
        }
    }
    Ok(())
}

/// Returns next state and output for given state and input.
fn transition(
    definition: &TrellisDefinition,
    memory_lens: &[usize],
    state: usize,
    input: usize,
) -> (usize, usize) {
    let mut next_state = 0;
    let mut output = 0;
    let mut offset = 0;
    for (i, &memory_len) in memory_lens.iter().enumerate() {
        let sub_state = (state >> offset) & ((1 << memory_len) - 1);
        let mut register_input = (input >> i) & 1;
        if let Some(&poly) = definition.feedback.get(i) {
            register_input ^= bitxor(poly & sub_state).index();
        }
        let register = (register_input << memory_len) | sub_state;
        for (j, &poly) in definition.generators[i].iter().enumerate() {
            output ^= bitxor(register & poly).index() << j;
        }
        next_state |= (register >> 1) << offset;
        offset += memory_len;
    }
    (next_state, output)
}

/// Returns constraint length corresponding to given RSC code polynomials.
fn constraint_length(code_polynomials: &[usize]) -> Result<usize, Error> {
    if code_polynomials.len() < 2 {
        return Err(Error::InvalidInput(
            "Expected at least two code polynomials".to_string(),
        ));
    }
    let feedback_poly = code_polynomials[0];
    if feedback_poly == 0 || feedback_poly & (feedback_poly - 1) == 0 {
        return Err(Error::InvalidInput(
            "Feedback polynomial cannot be 0 or a power of 2".to_string(),
        ));
    }
    // OK to cast `u32` to `usize`: Numbers involved will always be small enough.
    let constraint_len = (usize::BITS - feedback_poly.leading_zeros()) as usize;
    let two_pow_constraint_len = 1usize << constraint_len;
    if code_polynomials[1 ..]
        .iter()
        .any(|&x| x == 0 || x == feedback_poly || x >= two_pow_constraint_len)
    {
        return Err(Error::InvalidInput(format!(
            "For constraint length of {constraint_len}, each feedforward polynomial \
            must be in the range [1, {two_pow_constraint_len}), and cannot equal the \
            feedback polynomial {feedback_poly}",
        )));
    }
    Ok(constraint_len)
}

#[cfg(test)]
mod tests_of_trellis {
    use super::*;

    #[test]
    fn test_new() {
        // Invalid input
        assert!(Trellis::new(&[], &[], &[]).is_err());
        assert!(Trellis::new(&[0], &[vec![1]], &[]).is_err());
        assert!(Trellis::new(&[3], &[vec![0o7, 0o5], vec![0o7]], &[]).is_err());
        assert!(Trellis::new(&[3], &[vec![0o17]], &[]).is_err());
        assert!(Trellis::new(&[3], &[vec![0o7, 0o5]], &[0o3]).is_err());
        assert!(Trellis::new(&[3, 3], &[vec![0o7], vec![0o5]], &[0o7]).is_err());
        assert!(Trellis::new(&[22], &[vec![1]], &[]).is_err());
        // Valid input
        let trellis = Trellis::new(&[3, 2], &[vec![0o7, 0o5], vec![0o2, 0o3]], &[]).unwrap();
        assert_eq!(trellis.input_size(), 2);
        assert_eq!(trellis.output_size(), 2);
        assert_eq!(trellis.state_size(), 3);
        assert_eq!(trellis.max_memory_len(), 2);
        assert_eq!(trellis.state_count(), 8);
        assert_eq!(trellis.input_count(), 4);
        assert_eq!(trellis.output_count(), 4);
    }

    #[test]
    fn test_feedforward_transitions() {
        let trellis = Trellis::new(&[3], &[vec![0o7, 0o5]], &[]).unwrap();
        // Register is (input, s1, s0) with s1 the most recent bit
        assert_eq!(trellis.next_state(0, 0), 0);
        assert_eq!(trellis.output(0, 0), 0b00);
        assert_eq!(trellis.next_state(0, 1), 2);
        assert_eq!(trellis.output(0, 1), 0b11);
        assert_eq!(trellis.next_state(2, 0), 1);
        assert_eq!(trellis.output(2, 0), 0b01);
        assert_eq!(trellis.next_state(3, 1), 3);
        assert_eq!(trellis.output(3, 1), 0b01);
    }

    #[test]
    fn test_recursive_transitions() {
        let trellis = Trellis::rsc(&[0o13, 0o15, 0o17]).unwrap();
        let correct_output_for_zero = [0b000, 0b000, 0b010, 0b010, 0b110, 0b110, 0b100, 0b100];
        let correct_next_state_for_zero = [0, 4, 5, 1, 2, 6, 7, 3];
        let correct_output_for_one = [0b111, 0b111, 0b101, 0b101, 0b001, 0b001, 0b011, 0b011];
        let correct_next_state_for_one = [4, 0, 1, 5, 6, 2, 3, 7];
        for state in 0 .. trellis.state_count() {
            assert_eq!(trellis.output(state, 0), correct_output_for_zero[state]);
            assert_eq!(trellis.next_state(state, 0), correct_next_state_for_zero[state]);
            assert_eq!(trellis.output(state, 1), correct_output_for_one[state]);
            assert_eq!(trellis.next_state(state, 1), correct_next_state_for_one[state]);
        }
    }

    #[test]
    fn test_recursive_parity() {
        let full = Trellis::rsc(&[0o13, 0o15]).unwrap();
        let parity = Trellis::recursive_parity(&[0o13, 0o15]).unwrap();
        assert_eq!(parity.output_size(), 1);
        for state in 0 .. full.state_count() {
            for input in 0 .. 2 {
                assert_eq!(full.output(state, input) & 1, input);
                assert_eq!(parity.output(state, input), full.output(state, input) >> 1);
                assert_eq!(parity.next_state(state, input), full.next_state(state, input));
            }
        }
    }

    #[test]
    fn test_serde() {
        let trellis = Trellis::rsc(&[0o13, 0o15]).unwrap();
        let json = serde_json::to_string(&trellis).unwrap();
        assert!(json.contains("constraint_lengths"));
        let recovered: Trellis = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, trellis);
        let bad = r#"{"constraint_lengths":[3],"generators":[[15]],"feedback":[]}"#;
        assert!(serde_json::from_str::<Trellis>(bad).is_err());
    }
}
