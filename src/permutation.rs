//! Index mappings between sequences: interleavers and puncturing patterns

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Serialised form of a [`Permutation`]
#[derive(Clone, Debug, Deserialize, Serialize)]
struct PermutationDefinition {
    sequence: Vec<usize>,
    input_size: usize,
}

/// Mapping from an input sequence to an output sequence, where each output element is copied
/// from a given input index
///
/// A permutation need not be bijective: selecting a subset of the input indices describes a
/// puncturing pattern, and repeating indices describes repetition. Interleavers are the special
/// case of a bijection.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(try_from = "PermutationDefinition", into = "PermutationDefinition")]
pub struct Permutation {
    /// Input index for each output index
    sequence: Vec<usize>,
    /// Length of input sequence
    input_size: usize,
}

impl Permutation {
    /// Returns permutation copying `input[sequence[i]]` to output index `i`.
    ///
    /// # Errors
    ///
    /// Returns an error if any element of `sequence` is not less than `input_size`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::Permutation;
    ///
    /// let puncturing = Permutation::new(&[0, 1, 3], 4)?;
    /// assert_eq!(puncturing.permute(&['a', 'b', 'c', 'd'])?, ['a', 'b', 'd']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(sequence: &[usize], input_size: usize) -> Result<Self, Error> {
        if let Some(&index) = sequence.iter().find(|&&index| index >= input_size) {
            return Err(Error::InvalidInput(format!(
                "Index {index} is out of range for input sequence of length {input_size}"
            )));
        }
        Ok(Self {
            sequence: sequence.to_vec(),
            input_size,
        })
    }

    /// Returns interleaver corresponding to a given permutation.
    ///
    /// # Parameters
    ///
    /// - `perm`: Permutation of integers in `[0, L)` for some positive integer `L`. If the
    ///   interleaver input is the sequence `x[0], x[1], ..., x[L-1]`, then its output is the
    ///   sequence `x[perm[0]], x[perm[1]], ..., x[perm[L-1]]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `perm` is not a permutation of the integers in `[0, L)` for some
    /// positive integer `L`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::Permutation;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Permutation::interleaver(&perm)?;
    /// assert!(interleaver.is_bijective());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn interleaver(perm: &[usize]) -> Result<Self, Error> {
        if perm.is_empty() {
            return Err(Error::InvalidInput(
                "Permutation defining interleaver cannot be empty".to_string(),
            ));
        }
        let mut perm_sorted = perm.to_vec();
        perm_sorted.sort_unstable();
        if !perm_sorted.into_iter().eq(0 .. perm.len()) {
            return Err(Error::InvalidInput(format!(
                "Expected permutation of all integers in the range [0, {}), found {:?}",
                perm.len(),
                perm
            )));
        }
        Ok(Self {
            sequence: perm.to_vec(),
            input_size: perm.len(),
        })
    }

    /// Returns identity permutation for sequences of a given length.
    #[must_use]
    pub fn identity(length: usize) -> Self {
        Self {
            sequence: (0 .. length).collect(),
            input_size: length,
        }
    }

    /// Returns random interleaver for sequences of a given length.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` is `0`.
    pub fn random(length: usize) -> Result<Self, Error> {
        Self::random_with_rng(length, &mut rand::rng())
    }

    /// Returns random interleaver for sequences of a given length, reproducible from a seed.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` is `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::Permutation;
    ///
    /// let first = Permutation::random_with_seed(16, 7)?;
    /// let second = Permutation::random_with_seed(16, 7)?;
    /// assert_eq!(first, second);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn random_with_seed(length: usize, seed: u64) -> Result<Self, Error> {
        Self::random_with_rng(length, &mut StdRng::seed_from_u64(seed))
    }

    /// Returns quadratic permutation polynomial (QPP) interleaver.
    ///
    /// Output index `i` is taken from input index `(f1 * i + f2 * i^2) mod length`, as in the
    /// internal interleaver of the LTE turbo code (3GPP TS 36.212, Table 5.1.3-3).
    ///
    /// # Errors
    ///
    /// Returns an error if the coefficients do not define a permutation of `[0, length)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::Permutation;
    ///
    /// let interleaver = Permutation::qpp(40, 3, 10)?;
    /// assert_eq!(interleaver.output_size(), 40);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn qpp(length: usize, f1: usize, f2: usize) -> Result<Self, Error> {
        let perm: Vec<usize> = (0 .. length)
            .map(|out_index| ((f1 + f2 * out_index) % length * out_index) % length)
            .collect();
        Self::interleaver(&perm)
    }

    /// Returns length of input sequence.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Returns length of output sequence.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.sequence.len()
    }

    /// Returns input index for each output index.
    #[must_use]
    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    /// Returns `true` if every input index appears exactly once in the output.
    #[must_use]
    pub fn is_bijective(&self) -> bool {
        if self.sequence.len() != self.input_size {
            return false;
        }
        let mut seen = vec![false; self.input_size];
        self.sequence
            .iter()
            .all(|&index| !std::mem::replace(&mut seen[index], true))
    }

    /// Returns inverse permutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the permutation is not bijective.
    pub fn inverse(&self) -> Result<Self, Error> {
        if !self.is_bijective() {
            return Err(Error::InvalidInput(
                "Only a bijective permutation has an inverse".to_string(),
            ));
        }
        let mut sequence = vec![0; self.input_size];
        for (out_index, &in_index) in self.sequence.iter().enumerate() {
            sequence[in_index] = out_index;
        }
        Ok(Self {
            sequence,
            input_size: self.input_size,
        })
    }

    /// Generates permutation output given its input.
    ///
    /// # Parameters
    ///
    /// - `input`: Permutation input.
    ///
    /// - `output`: Buffer for permutation output (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` is not equal to `self.input_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::Permutation;
    ///
    /// let interleaver = Permutation::interleaver(&[0, 3, 2, 5, 4, 7, 6, 1])?;
    /// let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
    /// let mut output = Vec::new();
    /// interleaver.permute_into(&input, &mut output)?;
    /// assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn permute_into<T: Copy>(&self, input: &[T], output: &mut Vec<T>) -> Result<(), Error> {
        if input.len() != self.input_size {
            return Err(Error::InvalidInput(format!(
                "Invalid permutation input length (expected {}, found {})",
                self.input_size,
                input.len()
            )));
        }
        output.clear();
        output.extend(self.sequence.iter().map(|&in_index| input[in_index]));
        Ok(())
    }

    /// Returns permutation output given its input.
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` is not equal to `self.input_size()`.
    pub fn permute<T: Copy>(&self, input: &[T]) -> Result<Vec<T>, Error> {
        let mut output = Vec::with_capacity(self.output_size());
        self.permute_into(input, &mut output)?;
        Ok(output)
    }

    /// Generates permutation input given its output.
    ///
    /// Input positions that do not appear in the output (such as punctured positions) are set to
    /// `T::default()`, which is an erasure for LLR values. If an input position appears several
    /// times, the last occurrence wins.
    ///
    /// # Parameters
    ///
    /// - `output`: Permutation output.
    ///
    /// - `input`: Buffer for permutation input (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` is not equal to `self.output_size()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::Permutation;
    ///
    /// let puncturing = Permutation::new(&[0, 2, 3], 4)?;
    /// let mut llr = Vec::new();
    /// puncturing.depermute_into(&[1.5, -2.0, 0.5], &mut llr)?;
    /// assert_eq!(llr, [1.5, 0.0, -2.0, 0.5]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn depermute_into<T: Copy + Default>(
        &self,
        output: &[T],
        input: &mut Vec<T>,
    ) -> Result<(), Error> {
        if output.len() != self.output_size() {
            return Err(Error::InvalidInput(format!(
                "Invalid permutation output length (expected {}, found {})",
                self.output_size(),
                output.len()
            )));
        }
        input.clear();
        input.resize(self.input_size, T::default());
        for (&in_index, &value) in self.sequence.iter().zip(output) {
            input[in_index] = value;
        }
        Ok(())
    }

    /// Returns permutation input given its output.
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` is not equal to `self.output_size()`.
    pub fn depermute<T: Copy + Default>(&self, output: &[T]) -> Result<Vec<T>, Error> {
        let mut input = Vec::with_capacity(self.input_size);
        self.depermute_into(output, &mut input)?;
        Ok(input)
    }

    /// Returns permutation output for several consecutive input blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` is not a multiple of `self.input_size()`.
    pub fn permute_blocks<T: Copy>(&self, input: &[T]) -> Result<Vec<T>, Error> {
        let num_blocks = num_blocks(input.len(), self.input_size)?;
        let mut output = Vec::with_capacity(num_blocks * self.output_size());
        let mut block_output = Vec::with_capacity(self.output_size());
        for block in input.chunks_exact(self.input_size.max(1)).take(num_blocks) {
            self.permute_into(block, &mut block_output)?;
            output.extend_from_slice(&block_output);
        }
        Ok(output)
    }

    /// Returns permutation input for several consecutive output blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` is not a multiple of `self.output_size()`.
    pub fn depermute_blocks<T: Copy + Default>(&self, output: &[T]) -> Result<Vec<T>, Error> {
        let num_blocks = num_blocks(output.len(), self.output_size())?;
        let mut input = Vec::with_capacity(num_blocks * self.input_size);
        let mut block_input = Vec::with_capacity(self.input_size);
        for block in output.chunks_exact(self.output_size().max(1)).take(num_blocks) {
            self.depermute_into(block, &mut block_input)?;
            input.extend_from_slice(&block_input);
        }
        Ok(input)
    }

    /// Returns random interleaver drawn with the given random number generator.
    fn random_with_rng<R: rand::Rng>(length: usize, rng: &mut R) -> Result<Self, Error> {
        if length == 0 {
            return Err(Error::InvalidInput(
                "Length of interleaver must be a positive integer".to_string(),
            ));
        }
        let mut perm_vec: Vec<usize> = (0 .. length).collect();
        perm_vec.shuffle(rng);
        Ok(Self {
            sequence: perm_vec,
            input_size: length,
        })
    }
}

impl TryFrom<PermutationDefinition> for Permutation {
    type Error = Error;

    fn try_from(definition: PermutationDefinition) -> Result<Self, Error> {
        Self::new(&definition.sequence, definition.input_size)
    }
}

impl From<Permutation> for PermutationDefinition {
    fn from(perm: Permutation) -> Self {
        Self {
            sequence: perm.sequence,
            input_size: perm.input_size,
        }
    }
}

/// Returns number of blocks of given size in a sequence of given length.
fn num_blocks(len: usize, block_size: usize) -> Result<usize, Error> {
    if block_size == 0 {
        return if len == 0 {
            Ok(0)
        } else {
            Err(Error::InvalidInput(
                "Cannot split a nonempty sequence into empty blocks".to_string(),
            ))
        };
    }
    if len % block_size != 0 {
        return Err(Error::InvalidInput(format!(
            "Sequence length {len} is not a multiple of block size {block_size}"
        )));
    }
    Ok(len / block_size)
}

#[cfg(test)]
mod tests_of_permutation {
    use super::*;

    #[test]
    fn test_new() {
        assert!(Permutation::new(&[0, 4], 4).is_err());
        let perm = Permutation::new(&[1, 1, 3], 4).unwrap();
        assert_eq!(perm.input_size(), 4);
        assert_eq!(perm.output_size(), 3);
        assert!(!perm.is_bijective());
        assert!(Permutation::new(&[], 0).unwrap().is_bijective());
    }

    #[test]
    fn test_serde() {
        let perm = Permutation::new(&[2, 0, 2], 4).unwrap();
        let json = serde_json::to_string(&perm).unwrap();
        assert_eq!(json, r#"{"sequence":[2,0,2],"input_size":4}"#);
        assert_eq!(serde_json::from_str::<Permutation>(&json).unwrap(), perm);
        let out_of_range = r#"{"sequence":[0,1,2,99],"input_size":4}"#;
        assert!(serde_json::from_str::<Permutation>(out_of_range).is_err());
    }

    #[test]
    fn test_interleaver() {
        // Invalid input
        assert!(Permutation::interleaver(&[]).is_err());
        assert!(Permutation::interleaver(&[1, 2, 3, 4]).is_err());
        assert!(Permutation::interleaver(&[0, 1, 2, 4]).is_err());
        assert!(Permutation::interleaver(&[0, 0, 1, 2]).is_err());
        // Valid input
        let interleaver = Permutation::interleaver(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        assert_eq!(interleaver.input_size(), 8);
        assert_eq!(interleaver.sequence(), [0, 3, 2, 5, 4, 7, 6, 1]);
        assert!(interleaver.is_bijective());
    }

    #[test]
    fn test_random() {
        assert!(Permutation::random(0).is_err());
        let length = 8;
        let interleaver = Permutation::random(length).unwrap();
        let mut o2i = interleaver.sequence().to_vec();
        o2i.sort_unstable();
        assert!(o2i == (0 .. length).collect::<Vec<usize>>());
        assert_eq!(
            Permutation::random_with_seed(64, 1).unwrap(),
            Permutation::random_with_seed(64, 1).unwrap()
        );
    }

    #[test]
    fn test_qpp() {
        let interleaver = Permutation::qpp(40, 3, 10).unwrap();
        assert!(interleaver.is_bijective());
        assert_eq!(interleaver.sequence()[.. 4], [0, 13, 6, 19]);
        // Not a permutation polynomial for this length
        assert!(Permutation::qpp(40, 2, 10).is_err());
    }

    #[test]
    fn test_inverse() {
        let interleaver = Permutation::interleaver(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let inverse = interleaver.inverse().unwrap();
        assert_eq!(inverse.sequence(), [0, 7, 2, 1, 4, 3, 6, 5]);
        assert!(Permutation::new(&[0, 1], 3).unwrap().inverse().is_err());
    }

    #[test]
    fn test_permute() {
        let interleaver = Permutation::interleaver(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let mut output = Vec::new();
        // Invalid input
        let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];
        assert!(interleaver.permute_into(&input, &mut output).is_err());
        // Valid input
        let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
        for _ in 0 .. 2 {
            interleaver.permute_into(&input, &mut output).unwrap();
            assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
        }
    }

    #[test]
    fn test_depermute() {
        let interleaver = Permutation::interleaver(&[0, 3, 2, 5, 4, 7, 6, 1]).unwrap();
        let mut input = Vec::new();
        // Invalid output
        let output = [0, 3, 2, 5, 4, 7, 6];
        assert!(interleaver.depermute_into(&output, &mut input).is_err());
        // Valid output
        let output = [10, 13, 12, 15, 14, 17, 16, 11];
        for _ in 0 .. 2 {
            interleaver.depermute_into(&output, &mut input).unwrap();
            assert_eq!(input, [10, 11, 12, 13, 14, 15, 16, 17]);
        }
        // Punctured positions become erasures
        let puncturing = Permutation::new(&[3, 0], 4).unwrap();
        assert_eq!(puncturing.depermute(&[2.5, -1.0]).unwrap(), [-1.0, 0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_blocks() {
        let puncturing = Permutation::new(&[0, 2], 3).unwrap();
        assert!(puncturing.permute_blocks(&[1, 2, 3, 4]).is_err());
        let output = puncturing.permute_blocks(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(output, [1, 3, 4, 6]);
        assert!(puncturing.depermute_blocks(&[1, 3, 4]).is_err());
        let input = puncturing.depermute_blocks(&output).unwrap();
        assert_eq!(input, [1, 0, 3, 4, 0, 6]);
        assert!(puncturing.permute_blocks::<u8>(&[]).unwrap().is_empty());
    }
}
