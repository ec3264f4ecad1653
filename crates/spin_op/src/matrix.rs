// This code is part of Qiskit.
//
// (C) Copyright IBM 2025
//
// This code is licensed under the Apache License, Version 2.0. You may
// obtain a copy of this license in the LICENSE.txt file in the root directory
// of this source tree or at http://www.apache.org/licenses/LICENSE-2.0.
//
// Any modifications or derivative works of this code must retain this
// copyright notice, and modified files need to carry a notice indicating
// that they have been altered from the originals.

use std::ops::Range;

use itertools::Itertools;
use ndarray::{Array2, Axis, linalg::kron};
use num_complex::Complex64;
use num_traits::Zero;
use rayon::prelude::*;
use thiserror::Error;

use crate::getenv_use_multiple_threads;
use crate::spin_op::SpinOperator;
use crate::term::{SpinTermView, phase_factor};

/// The largest operator we will materialise as a dense matrix.  A 14q operator is already a
/// 4 GiB allocation of `Complex64`.
pub const MAX_DENSE_QUBITS: u32 = 14;
/// The largest operator we will materialise in sparse form.  Even a single diagonal term stores
/// one entry per row, so this is 16M entries (512 MiB of COO data) at the least.
pub const MAX_SPARSE_QUBITS: u32 = 24;
/// The most entries a sparse matrix may need before we refuse to build it.  Each stored entry
/// costs 32 bytes, so this is a 2 GiB ceiling.
pub const MAX_SPARSE_ENTRIES: usize = 1 << 26;

// Below this, the per-row work is too small for it to be worth spinning up the threadpool.
const PARALLEL_THRESHOLD: u32 = 12;
// Rows handed to a single rayon task by the parallel sparse build.
const SPARSE_ROW_BLOCK: usize = 1 << 12;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatrixError {
    #[error("{num_qubits} is too many qubits to convert to a matrix (the limit is {max})")]
    TooManyQubits { num_qubits: u32, max: u32 },
    #[error("the sparse matrix could need {bound} entries, more than the limit of {max}")]
    TooManyEntries { bound: usize, max: usize },
}

/// A matrix in coordinate format: `values[i]` is the entry at `(rows[i], cols[i])`.
///
/// Entries are in row-major order, no coordinate appears twice, and exact zeros are not stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CooMatrix {
    pub dim: usize,
    pub values: Vec<Complex64>,
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

impl CooMatrix {
    /// The number of explicitly stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Expand into a dense matrix.
    pub fn to_dense(&self) -> Array2<Complex64> {
        let mut out = Array2::zeros((self.dim, self.dim));
        for ((value, row), col) in self.values.iter().zip(&self.rows).zip(&self.cols) {
            out[[*row, *col]] += value;
        }
        out
    }
}

/// Temporary bit-compressed storage of the Pauli strings.  The `coeffs` are reinterpreted to
/// include the factors of `i` stemming from `Y` components.  The result is that the `coeffs` now
/// more directly represent entries in a matrix, while `x_like` and `z_like` are no longer direct
/// measures of `X` and `Z` elements, but are instead only a marker of the column and parity
/// respectively.
///
/// Basis states are labelled with qubit `k` in bit `k` of the index.  A Pauli string maps the
/// basis state `col` to `i^ys (-1)^|col & z| |col ^ x>`, so in other words, `row ^ x_like` gives
/// the column number of an element in row `row`, while `((row ^ x_like) & z_like).count_ones()`
/// counts multiplicative factors of `-1` to be applied to `coeff` when placing it there.
struct MatrixCompressedPaulis {
    num_qubits: u32,
    x_like: Vec<usize>,
    z_like: Vec<usize>,
    coeffs: Vec<Complex64>,
}

impl MatrixCompressedPaulis {
    fn new(op: &SpinOperator, max: u32) -> Result<Self, MatrixError> {
        let num_qubits = op.num_qubits();
        if num_qubits > max {
            return Err(MatrixError::TooManyQubits { num_qubits, max });
        }
        let (mut x_like, mut z_like, mut coeffs) = (
            Vec::with_capacity(op.num_terms()),
            Vec::with_capacity(op.num_terms()),
            Vec::with_capacity(op.num_terms()),
        );
        for term in op.iter() {
            // `max` is small enough that every key fits in its first word.
            let (x, z) = term.key.words();
            x_like.push(x.first().copied().unwrap_or(0) as usize);
            z_like.push(z.first().copied().unwrap_or(0) as usize);
            coeffs.push(term.coeff * phase_factor((term.key.num_ys() % 4) as u8));
        }
        Ok(Self {
            num_qubits,
            x_like,
            z_like,
            coeffs,
        })
    }

    fn dim(&self) -> usize {
        1 << self.num_qubits
    }

    /// The contributions of every term to a single row, as `(col, value)`.  The same column can
    /// appear more than once if several terms share an `x_like`.
    fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, Complex64)> + '_ {
        self.x_like
            .iter()
            .zip(self.z_like.iter())
            .zip(self.coeffs.iter())
            .map(move |((x_like, z_like), coeff)| {
                let col = row ^ x_like;
                if (col & z_like).count_ones() % 2 == 1 {
                    (col, -coeff)
                } else {
                    (col, *coeff)
                }
            })
    }

    fn to_dense(&self) -> Array2<Complex64> {
        let dim = self.dim();
        let mut out = Array2::<Complex64>::zeros((dim, dim));
        let fill_row = |(row, mut out_row): (usize, ndarray::ArrayViewMut1<Complex64>)| {
            for (col, value) in self.row_entries(row) {
                out_row[col] += value;
            }
        };
        if self.num_qubits < PARALLEL_THRESHOLD || !getenv_use_multiple_threads() {
            ::tracing::trace!(num_qubits = self.num_qubits, "building dense matrix serially");
            out.axis_iter_mut(Axis(0)).enumerate().for_each(fill_row);
        } else {
            ::tracing::trace!(num_qubits = self.num_qubits, "building dense matrix in parallel");
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(fill_row);
        }
        out
    }

    /// An upper bound on the stored entries of the sparse matrix: every row holds at most one
    /// entry per distinct `x_like`.
    fn max_sparse_entries(&self) -> usize {
        self.x_like.iter().unique().count().saturating_mul(self.dim())
    }

    /// Append the combined, column-sorted, non-zero entries of a single row to `out`.  `scratch`
    /// is reused between rows.
    fn push_sparse_row(
        &self,
        row: usize,
        scratch: &mut Vec<(usize, Complex64)>,
        out: &mut CooMatrix,
    ) {
        scratch.clear();
        scratch.extend(self.row_entries(row));
        scratch.sort_unstable_by_key(|(col, _)| *col);
        let entries = scratch
            .drain(..)
            .coalesce(|(col_a, val_a), (col_b, val_b)| {
                if col_a == col_b {
                    Ok((col_a, val_a + val_b))
                } else {
                    Err(((col_a, val_a), (col_b, val_b)))
                }
            })
            .filter(|(_, value)| !value.is_zero());
        for (col, value) in entries {
            out.rows.push(row);
            out.cols.push(col);
            out.values.push(value);
        }
    }

    fn sparse_block(&self, rows: Range<usize>) -> CooMatrix {
        let mut out = CooMatrix {
            dim: self.dim(),
            ..Default::default()
        };
        let mut scratch = Vec::with_capacity(self.coeffs.len());
        for row in rows {
            self.push_sparse_row(row, &mut scratch, &mut out);
        }
        out
    }

    fn to_sparse(&self) -> CooMatrix {
        let dim = self.dim();
        if self.num_qubits < PARALLEL_THRESHOLD || !getenv_use_multiple_threads() {
            ::tracing::trace!(num_qubits = self.num_qubits, "building sparse matrix serially");
            return self.sparse_block(0..dim);
        }
        ::tracing::trace!(num_qubits = self.num_qubits, "building sparse matrix in parallel");
        let blocks: Vec<CooMatrix> = (0..dim.div_ceil(SPARSE_ROW_BLOCK))
            .into_par_iter()
            .map(|block| {
                let start = block * SPARSE_ROW_BLOCK;
                self.sparse_block(start..(start + SPARSE_ROW_BLOCK).min(dim))
            })
            .collect();
        let nnz = blocks.iter().map(CooMatrix::nnz).sum();
        let mut out = CooMatrix {
            dim,
            values: Vec::with_capacity(nnz),
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
        };
        for mut block in blocks {
            out.values.append(&mut block.values);
            out.rows.append(&mut block.rows);
            out.cols.append(&mut block.cols);
        }
        out
    }
}

impl SpinOperator {
    /// The dense `2**n x 2**n` matrix of the operator, where `n` is its width.
    ///
    /// Basis states are labelled with qubit `k` in bit `k` of the row and column index, so in the
    /// tensor-product picture qubit 0 is the rightmost factor.
    pub fn to_matrix(&self) -> Result<Array2<Complex64>, MatrixError> {
        ::tracing::debug!(
            num_qubits = self.num_qubits(),
            num_terms = self.num_terms(),
            "materialising dense matrix"
        );
        Ok(MatrixCompressedPaulis::new(self, MAX_DENSE_QUBITS)?.to_dense())
    }

    /// The operator in coordinate format, with the same index convention as
    /// [to_matrix](Self::to_matrix).  Every non-zero entry of the dense matrix appears exactly
    /// once.
    ///
    /// Besides the qubit limit, the build is refused up front if the matrix could hold more than
    /// [MAX_SPARSE_ENTRIES] entries.
    pub fn to_sparse_matrix(&self) -> Result<CooMatrix, MatrixError> {
        ::tracing::debug!(
            num_qubits = self.num_qubits(),
            num_terms = self.num_terms(),
            "materialising sparse matrix"
        );
        let compressed = MatrixCompressedPaulis::new(self, MAX_SPARSE_QUBITS)?;
        let bound = compressed.max_sparse_entries();
        if bound > MAX_SPARSE_ENTRIES {
            return Err(MatrixError::TooManyEntries {
                bound,
                max: MAX_SPARSE_ENTRIES,
            });
        }
        Ok(compressed.to_sparse())
    }
}

impl SpinTermView<'_> {
    /// The dense matrix of this single term, built directly as the Kronecker product of the
    /// single-qubit matrices (highest qubit leftmost), scaled by the coefficient.
    pub fn to_matrix(&self) -> Result<Array2<Complex64>, MatrixError> {
        if self.num_qubits > MAX_DENSE_QUBITS {
            return Err(MatrixError::TooManyQubits {
                num_qubits: self.num_qubits,
                max: MAX_DENSE_QUBITS,
            });
        }
        let scalar = Array2::from_elem((1, 1), self.coeff);
        Ok((0..self.num_qubits)
            .rev()
            .fold(scalar, |acc, qubit| kron(&acc, &self.pauli(qubit).matrix())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pauli::Pauli;
    use approx::assert_abs_diff_eq;
    use ndarray::aview2;

    fn c64(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn single_qubit_matrices() {
        for pauli in [Pauli::I, Pauli::X, Pauli::Y, Pauli::Z] {
            let op = SpinOperator::single(0, pauli);
            assert_eq!(op.to_matrix().unwrap(), pauli.matrix());
        }
    }

    #[test]
    fn qubit_zero_is_the_least_significant_bit() {
        // Z on qubit 0 of 2 flips the sign of the odd basis states.
        let op = SpinOperator::z(0) * SpinOperator::i(1);
        let one = c64(1.0, 0.0);
        let zero = c64(0.0, 0.0);
        let expected = [
            [one, zero, zero, zero],
            [zero, -one, zero, zero],
            [zero, zero, one, zero],
            [zero, zero, zero, -one],
        ];
        assert_eq!(op.to_matrix().unwrap(), aview2(&expected));
    }

    #[test]
    fn compressed_build_matches_kronecker_products() {
        let op = c64(0.5, -1.0) * SpinOperator::from_word("XYZ").unwrap()
            + 2.0 * SpinOperator::from_word("YIY").unwrap()
            - SpinOperator::from_word("IZX").unwrap()
            + 0.25;
        let mut expected = Array2::<Complex64>::zeros((8, 8));
        for term in op.iter() {
            expected += &term.to_matrix().unwrap();
        }
        assert_abs_diff_eq!(op.to_matrix().unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn sparse_matches_dense() {
        // `XX + YY` has cancelling entries on the `00 <-> 11` block, which must not be stored.
        let op = SpinOperator::x(0) * SpinOperator::x(1)
            + SpinOperator::y(0) * SpinOperator::y(1)
            + SpinOperator::z(0);
        let dense = op.to_matrix().unwrap();
        let sparse = op.to_sparse_matrix().unwrap();
        assert_eq!(sparse.dim, 4);
        assert_eq!(sparse.nnz(), 6);
        for ((value, row), col) in sparse.values.iter().zip(&sparse.rows).zip(&sparse.cols) {
            assert_eq!(dense[[*row, *col]], *value);
        }
        assert_eq!(sparse.to_dense(), dense);
    }

    #[test]
    fn empty_and_scalar_operators() {
        assert_eq!(
            SpinOperator::empty().to_matrix().unwrap(),
            Array2::<Complex64>::zeros((1, 1))
        );
        let scalar = SpinOperator::empty() + 2.5;
        assert_eq!(
            scalar.to_matrix().unwrap(),
            Array2::from_elem((1, 1), c64(2.5, 0.0))
        );
    }

    #[test]
    fn too_many_qubits() {
        let op = SpinOperator::z(MAX_DENSE_QUBITS);
        assert_eq!(
            op.to_matrix(),
            Err(MatrixError::TooManyQubits {
                num_qubits: MAX_DENSE_QUBITS + 1,
                max: MAX_DENSE_QUBITS
            })
        );
        assert!(op.term(0).to_matrix().is_err());
    }

    #[test]
    fn sparse_limits_are_checked_before_building() {
        assert_eq!(
            SpinOperator::z(MAX_SPARSE_QUBITS).to_sparse_matrix(),
            Err(MatrixError::TooManyQubits {
                num_qubits: MAX_SPARSE_QUBITS + 1,
                max: MAX_SPARSE_QUBITS
            })
        );
        // Five distinct column offsets on 24 qubits bound the output at 5 * 2**24 entries.
        let op: SpinOperator = (0..4)
            .map(SpinOperator::x)
            .chain([SpinOperator::z(MAX_SPARSE_QUBITS - 1)])
            .sum();
        assert_eq!(op.num_qubits(), MAX_SPARSE_QUBITS);
        assert_eq!(
            op.to_sparse_matrix(),
            Err(MatrixError::TooManyEntries {
                bound: 5 << MAX_SPARSE_QUBITS,
                max: MAX_SPARSE_ENTRIES
            })
        );
    }

    #[test]
    fn sparse_blocks_concatenate_in_row_order() {
        let op = SpinOperator::from_word("XIY").unwrap() + SpinOperator::z(1) * 0.5;
        let compressed = MatrixCompressedPaulis::new(&op, MAX_SPARSE_QUBITS).unwrap();
        let whole = compressed.sparse_block(0..8);
        let mut parts = compressed.sparse_block(0..3);
        let mut tail = compressed.sparse_block(3..8);
        parts.values.append(&mut tail.values);
        parts.rows.append(&mut tail.rows);
        parts.cols.append(&mut tail.cols);
        assert_eq!(parts, whole);
        assert!(whole.rows.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(whole.to_dense(), op.to_matrix().unwrap());
    }
}
