//! Binary matrices over GF(2), in sparse and dense form
//!
//! [`SparseBitMatrix`] stores the column indices of the ones in each row, which suits the
//! parity-check matrices of LDPC codes. [`BitMatrix`] packs each row into 64-bit words, which suits
//! row operations during Gaussian elimination.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Number of bits in a word of [`BitMatrix`]
const WORD_BITS: usize = u64::BITS as usize;

/// Serialised form of a [`SparseBitMatrix`]
#[derive(Clone, Debug, Deserialize, Serialize)]
struct SparseBitMatrixDefinition {
    cols: usize,
    row_elements: Vec<Vec<usize>>,
}

/// Sparse binary matrix holding, for each row, the sorted column indices of its ones
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(try_from = "SparseBitMatrixDefinition", into = "SparseBitMatrixDefinition")]
pub struct SparseBitMatrix {
    /// Number of columns
    cols: usize,
    /// Sorted column indices of ones in each row
    row_elements: Vec<Vec<usize>>,
}

impl SparseBitMatrix {
    /// Returns all-zero matrix of given size.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            cols,
            row_elements: vec![Vec::new(); rows],
        }
    }

    /// Returns matrix whose row `i` has ones at the column indices listed in `rows[i]`.
    ///
    /// # Errors
    ///
    /// Returns an error if any column index is not less than `cols`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::SparseBitMatrix;
    ///
    /// let h = SparseBitMatrix::from_rows(4, &[vec![0, 1, 2], vec![3, 1]])?;
    /// assert_eq!(h.row(1), [1, 3]);
    /// assert_eq!(h.size(), 5);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_rows(cols: usize, rows: &[Vec<usize>]) -> Result<Self, Error> {
        let mut matrix = Self::new(rows.len(), cols);
        for (row, elements) in rows.iter().enumerate() {
            for &col in elements {
                if col >= cols {
                    return Err(Error::InvalidInput(format!(
                        "Column index {col} is out of range for matrix with {cols} columns"
                    )));
                }
                matrix.set(row, col, true);
            }
        }
        Ok(matrix)
    }

    /// Returns matrix with ones where `dense` holds `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows of `dense` do not all have the same length.
    pub fn from_dense(dense: &[Vec<bool>]) -> Result<Self, Error> {
        let cols = dense.first().map_or(0, Vec::len);
        if dense.iter().any(|row| row.len() != cols) {
            return Err(Error::InvalidInput(
                "All rows of a dense matrix must have the same length".to_string(),
            ));
        }
        let row_elements = dense
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter_map(|(col, &val)| val.then_some(col))
                    .collect()
            })
            .collect();
        Ok(Self { cols, row_elements })
    }

    /// Returns number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.row_elements.len()
    }

    /// Returns number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns number of ones in the matrix.
    #[must_use]
    pub fn size(&self) -> usize {
        self.row_elements.iter().map(Vec::len).sum()
    }

    /// Returns `true` if the element at given row and column is one.
    #[must_use]
    pub fn test(&self, row: usize, col: usize) -> bool {
        self.row_elements[row].binary_search(&col).is_ok()
    }

    /// Sets the element at given row and column to given value.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of range.
    pub fn set(&mut self, row: usize, col: usize, val: bool) {
        assert!(col < self.cols, "Column index {col} is out of range");
        let elements = &mut self.row_elements[row];
        match (elements.binary_search(&col), val) {
            (Err(pos), true) => elements.insert(pos, col),
            (Ok(pos), false) => {
                elements.remove(pos);
            }
            _ => {}
        }
    }

    /// Returns sorted column indices of ones in given row.
    #[must_use]
    pub fn row(&self, row: usize) -> &[usize] {
        &self.row_elements[row]
    }

    /// Returns number of ones in each row.
    #[must_use]
    pub fn row_sizes(&self) -> Vec<usize> {
        self.row_elements.iter().map(Vec::len).collect()
    }

    /// Returns number of ones in each column.
    #[must_use]
    pub fn col_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.cols];
        for &col in self.row_elements.iter().flatten() {
            sizes[col] += 1;
        }
        sizes
    }

    /// Swaps two rows.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        self.row_elements.swap(a, b);
    }

    /// Swaps two columns.
    pub fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for elements in &mut self.row_elements {
            let has_a = elements.binary_search(&a).is_ok();
            let has_b = elements.binary_search(&b).is_ok();
            if has_a != has_b {
                let (from, to) = if has_a { (a, b) } else { (b, a) };
                if let Ok(pos) = elements.binary_search(&from) {
                    elements.remove(pos);
                }
                if let Err(pos) = elements.binary_search(&to) {
                    elements.insert(pos, to);
                }
            }
        }
    }

    /// Returns transposed matrix.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut row_elements = vec![Vec::new(); self.cols];
        for (row, elements) in self.row_elements.iter().enumerate() {
            for &col in elements {
                row_elements[col].push(row);
            }
        }
        Self {
            cols: self.rows(),
            row_elements,
        }
    }

    /// Returns dense representation as rows of booleans.
    #[must_use]
    pub fn to_dense(&self) -> Vec<Vec<bool>> {
        self.row_elements
            .iter()
            .map(|elements| {
                let mut row = vec![false; self.cols];
                for &col in elements {
                    row[col] = true;
                }
                row
            })
            .collect()
    }

    /// Returns iterator over the `(row, col)` positions of ones, in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.row_elements
            .iter()
            .enumerate()
            .flat_map(|(row, elements)| elements.iter().map(move |&col| (row, col)))
    }
}

impl TryFrom<SparseBitMatrixDefinition> for SparseBitMatrix {
    type Error = Error;

    fn try_from(definition: SparseBitMatrixDefinition) -> Result<Self, Error> {
        Self::from_rows(definition.cols, &definition.row_elements)
    }
}

impl From<SparseBitMatrix> for SparseBitMatrixDefinition {
    fn from(matrix: SparseBitMatrix) -> Self {
        Self {
            cols: matrix.cols,
            row_elements: matrix.row_elements,
        }
    }
}

/// Dense binary matrix with each row packed into 64-bit words
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct BitMatrix {
    /// Number of rows
    rows: usize,
    /// Number of columns
    cols: usize,
    /// Number of words per row
    row_words: usize,
    /// Words of all rows, row after row
    words: Vec<u64>,
}

impl BitMatrix {
    /// Returns all-zero matrix of given size.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        let row_words = cols.div_ceil(WORD_BITS);
        Self {
            rows,
            cols,
            row_words,
            words: vec![0; rows * row_words],
        }
    }

    /// Returns dense copy of a sparse matrix.
    #[must_use]
    pub fn from_sparse(sparse: &SparseBitMatrix) -> Self {
        let mut matrix = Self::new(sparse.rows(), sparse.cols());
        for (row, col) in sparse.iter() {
            matrix.set(row, col, true);
        }
        matrix
    }

    /// Returns number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns `true` if the element at given row and column is one.
    #[must_use]
    pub fn test(&self, row: usize, col: usize) -> bool {
        let (word, mask) = self.locate(row, col);
        self.words[word] & mask != 0
    }

    /// Sets the element at given row and column to given value.
    pub fn set(&mut self, row: usize, col: usize, val: bool) {
        let (word, mask) = self.locate(row, col);
        if val {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }

    /// Adds (XORs) row `src` into row `dest`.
    pub fn row_add(&mut self, src: usize, dest: usize) {
        if src == dest {
            self.words[dest * self.row_words .. (dest + 1) * self.row_words].fill(0);
            return;
        }
        let (src_start, dest_start) = (src * self.row_words, dest * self.row_words);
        for i in 0 .. self.row_words {
            let word = self.words[src_start + i];
            self.words[dest_start + i] ^= word;
        }
    }

    /// Swaps two rows.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for i in 0 .. self.row_words {
            self.words.swap(a * self.row_words + i, b * self.row_words + i);
        }
    }

    /// Swaps two columns.
    pub fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for row in 0 .. self.rows {
            let (val_a, val_b) = (self.test(row, a), self.test(row, b));
            if val_a != val_b {
                self.set(row, a, val_b);
                self.set(row, b, val_a);
            }
        }
    }

    /// Returns sparse copy of the matrix.
    #[must_use]
    pub fn to_sparse(&self) -> SparseBitMatrix {
        let mut sparse = SparseBitMatrix::new(self.rows, self.cols);
        for row in 0 .. self.rows {
            sparse.row_elements[row] = (0 .. self.cols).filter(|&col| self.test(row, col)).collect();
        }
        sparse
    }

    /// Returns word index and bit mask of given element.
    fn locate(&self, row: usize, col: usize) -> (usize, u64) {
        assert!(
            row < self.rows && col < self.cols,
            "Element ({row}, {col}) is out of range"
        );
        (
            row * self.row_words + col / WORD_BITS,
            1 << (col % WORD_BITS),
        )
    }
}

#[cfg(test)]
mod tests_of_sparse_bit_matrix {
    use super::*;

    fn matrix_for_test() -> SparseBitMatrix {
        SparseBitMatrix::from_rows(5, &[vec![0, 2, 4], vec![1, 2], vec![4, 3]]).unwrap()
    }

    #[test]
    fn test_from_rows() {
        assert!(SparseBitMatrix::from_rows(3, &[vec![0, 3]]).is_err());
        let matrix = matrix_for_test();
        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.cols(), 5);
        assert_eq!(matrix.size(), 7);
        assert_eq!(matrix.row(2), [3, 4]);
        assert!(matrix.test(0, 4));
        assert!(!matrix.test(1, 4));
    }

    #[test]
    fn test_dense() {
        assert!(SparseBitMatrix::from_dense(&[vec![true], vec![true, false]]).is_err());
        let matrix = matrix_for_test();
        let dense = matrix.to_dense();
        assert_eq!(dense[1], [false, true, true, false, false]);
        assert_eq!(SparseBitMatrix::from_dense(&dense).unwrap(), matrix);
    }

    #[test]
    fn test_set() {
        let mut matrix = matrix_for_test();
        matrix.set(1, 0, true);
        matrix.set(1, 2, false);
        matrix.set(1, 2, false);
        assert_eq!(matrix.row(1), [0, 1]);
    }

    #[test]
    fn test_sizes() {
        let matrix = matrix_for_test();
        assert_eq!(matrix.row_sizes(), [3, 2, 2]);
        assert_eq!(matrix.col_sizes(), [1, 1, 2, 1, 2]);
    }

    #[test]
    fn test_swaps() {
        let mut matrix = matrix_for_test();
        matrix.swap_cols(0, 3);
        assert_eq!(matrix.row(0), [2, 3, 4]);
        assert_eq!(matrix.row(2), [0, 4]);
        matrix.swap_cols(2, 4);
        assert_eq!(matrix.row(0), [2, 3, 4]);
        assert_eq!(matrix.row(1), [1, 4]);
        matrix.swap_rows(0, 2);
        assert_eq!(matrix.row(0), [0, 2]);
    }

    #[test]
    fn test_transpose() {
        let matrix = matrix_for_test();
        let transposed = matrix.transpose();
        assert_eq!(transposed.rows(), 5);
        assert_eq!(transposed.cols(), 3);
        assert_eq!(transposed.row(2), [0, 1]);
        assert_eq!(transposed.row(4), [0, 2]);
        assert_eq!(transposed.transpose(), matrix);
    }

    #[test]
    fn test_serde() {
        let matrix = matrix_for_test();
        let json = serde_json::to_string(&matrix).unwrap();
        assert_eq!(json, r#"{"cols":5,"row_elements":[[0,2,4],[1,2],[3,4]]}"#);
        assert_eq!(serde_json::from_str::<SparseBitMatrix>(&json).unwrap(), matrix);
        // Rows are sorted and repeated indices merged
        let unsorted = r#"{"cols":5,"row_elements":[[4,0,2,0],[2,1],[4,3]]}"#;
        assert_eq!(serde_json::from_str::<SparseBitMatrix>(unsorted).unwrap(), matrix);
        let out_of_range = r#"{"cols":4,"row_elements":[[0,1,7]]}"#;
        assert!(serde_json::from_str::<SparseBitMatrix>(out_of_range).is_err());
    }

    #[test]
    fn test_iter() {
        let matrix = matrix_for_test();
        let ones: Vec<(usize, usize)> = matrix.iter().collect();
        assert_eq!(ones, [(0, 0), (0, 2), (0, 4), (1, 1), (1, 2), (2, 3), (2, 4)]);
    }
}

#[cfg(test)]
mod tests_of_bit_matrix {
    use super::*;

    #[test]
    fn test_set_and_test() {
        let mut matrix = BitMatrix::new(2, 130);
        matrix.set(1, 129, true);
        matrix.set(0, 64, true);
        assert!(matrix.test(1, 129));
        assert!(matrix.test(0, 64));
        assert!(!matrix.test(0, 63));
        matrix.set(1, 129, false);
        assert!(!matrix.test(1, 129));
    }

    #[test]
    fn test_row_ops() {
        let sparse = SparseBitMatrix::from_rows(70, &[vec![0, 65], vec![65, 69]]).unwrap();
        let mut matrix = BitMatrix::from_sparse(&sparse);
        matrix.row_add(0, 1);
        assert_eq!(matrix.to_sparse().row(1), [0, 69]);
        matrix.swap_rows(0, 1);
        assert_eq!(matrix.to_sparse().row(0), [0, 69]);
        matrix.swap_cols(0, 66);
        assert_eq!(matrix.to_sparse().row(0), [66, 69]);
        assert_eq!(matrix.to_sparse().row(1), [65, 66]);
        matrix.row_add(1, 1);
        assert!(matrix.to_sparse().row(1).is_empty());
    }

    #[test]
    fn test_sparse_round_trip() {
        let sparse = SparseBitMatrix::from_rows(5, &[vec![0, 2, 4], vec![1, 2]]).unwrap();
        let dense = BitMatrix::from_sparse(&sparse);
        assert_eq!(dense.rows(), 2);
        assert_eq!(dense.cols(), 5);
        assert_eq!(dense.to_sparse(), sparse);
    }
}
