//! Generator-matrix construction and inversion over GF(2^16)
//!
//! The generator matrix is built as a non-systematic Vandermonde matrix and
//! then systematised with column operations, which preserve the code while
//! turning the top `k x k` block into the identity. Decoding inverts the
//! survivor submatrix with Gauss-Jordan elimination.

use crate::error::{Error, Result};
use crate::gf::gf16;

/// Dense row-major matrix over GF(2^16).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Matrix {
    pub rows: usize,
    pub cols: usize,
    data: Vec<u32>,
}

impl Matrix {
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeroed(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1;
        }
        m
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: u32) {
        self.data[row * self.cols + col] = val;
    }

    pub fn row(&self, row: usize) -> &[u32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    fn swap_rows(&mut self, r1: usize, r2: usize) {
        if r1 == r2 {
            return;
        }
        for col in 0..self.cols {
            self.data.swap(r1 * self.cols + col, r2 * self.cols + col);
        }
    }

    /// Scale a whole column by `elem`
    fn col_mult(&mut self, elem: u32, col: usize) {
        for row in 0..self.rows {
            let v = self.get(row, col);
            self.set(row, col, gf16::mult(v, elem));
        }
    }

    /// Scale a whole row by `elem`
    fn row_mult(&mut self, elem: u32, row: usize) {
        for col in 0..self.cols {
            let v = self.get(row, col);
            self.set(row, col, gf16::mult(v, elem));
        }
    }

    /// `col_to += elem * col_from`
    fn col_mult_and_add(&mut self, elem: u32, from: usize, to: usize) {
        for row in 0..self.rows {
            let add = gf16::mult(self.get(row, from), elem);
            let v = self.get(row, to);
            self.set(row, to, v ^ add);
        }
    }

    /// `row_to += elem * row_from`
    fn row_mult_and_add(&mut self, elem: u32, from: usize, to: usize) {
        for col in 0..self.cols {
            let add = gf16::mult(self.get(from, col), elem);
            let v = self.get(to, col);
            self.set(to, col, v ^ add);
        }
    }

    /// Lowest-numbered row at or below `row` with a non-zero entry in
    /// column `row`
    fn nonzero_diagonal_row(&self, row: usize) -> Option<usize> {
        (row..self.rows).find(|&r| self.get(r, row) != 0)
    }
}

/// The `(k+m) x k` non-systematic Vandermonde matrix: `V[i][j] = i^j`, with
/// row 0 fixed to `(1, 0, ..., 0)`.
fn vandermonde(k: usize, m: usize) -> Matrix {
    let mut matrix = Matrix::zeroed(k + m, k);
    matrix.set(0, 0, 1);
    for i in 1..k + m {
        let mut acc: u32 = 1;
        for j in 0..k {
            matrix.set(i, j, acc);
            acc = gf16::mult(acc, i as u32);
        }
    }
    matrix
}

/// Build the systematic generator matrix for `(k, m)`.
///
/// Column operations preserve the code: each pivot column is scaled by the
/// pivot's inverse and folded into every other column with a non-zero entry
/// in the pivot row. A final pass rescales the parity sub-columns so the
/// first parity row is the all-ones XOR parity.
pub(crate) fn make_systematic_matrix(k: usize, m: usize) -> Result<Matrix> {
    let mut matrix = vandermonde(k, m);

    // Row 0 is already (1, 0, ..., 0)
    for i in 1..k {
        let next_row = matrix.nonzero_diagonal_row(i).ok_or_else(|| {
            Error::BackendInitError(format!(
                "no pivot for column {} while systematising a ({}, {}) matrix",
                i, k, m
            ))
        })?;
        matrix.swap_rows(next_row, i);

        let diag = matrix.get(i, i);
        if diag != 1 {
            matrix.col_mult(gf16::inverse(diag), i);
        }

        // Zero out the rest of row i through column operations
        for j in 0..k {
            let row_val = matrix.get(i, j);
            if i != j && row_val != 0 {
                matrix.col_mult_and_add(row_val, i, j);
            }
        }
    }

    // Normalise the first parity row to all ones; only the parity rows are
    // touched since the data rows have a single 1 per column.
    for i in 0..k {
        let row_val = matrix.get(k, i);
        if row_val != 1 {
            let inv = gf16::inverse(row_val);
            for row in k..k + m {
                let v = matrix.get(row, i);
                matrix.set(row, i, gf16::mult(v, inv));
            }
        }
    }

    Ok(matrix)
}

/// Copy the generator rows of the first `k` surviving fragments into a
/// `k x k` decoding matrix. `missing` is a bitmap over all `k+m` indices.
pub(crate) fn create_decoding_matrix(
    gen: &Matrix,
    missing: &[bool],
    k: usize,
) -> Result<Matrix> {
    let mut dec = Matrix::zeroed(k, k);
    let mut row = 0;
    for i in 0..gen.rows {
        if row == k {
            break;
        }
        if !missing[i] {
            for col in 0..k {
                dec.set(row, col, gen.get(i, col));
            }
            row += 1;
        }
    }
    if row != k {
        return Err(Error::InsufficientFragments {
            available: row,
            required: k,
        });
    }
    Ok(dec)
}

/// Invert `matrix` in place via Gauss-Jordan elimination, returning the
/// inverse. Fails only on a singular input, which for a Vandermonde-derived
/// decoding matrix means the survivor set does not span the data.
pub(crate) fn gaussj_inversion(matrix: &mut Matrix) -> Result<Matrix> {
    let n = matrix.rows;
    let mut inverse = Matrix::identity(n);

    for i in 0..n {
        let next_row = matrix.nonzero_diagonal_row(i).ok_or({
            Error::InsufficientFragments {
                available: i,
                required: n,
            }
        })?;
        matrix.swap_rows(next_row, i);
        inverse.swap_rows(next_row, i);

        let diag = matrix.get(i, i);
        if diag != 1 {
            let inv = gf16::inverse(diag);
            matrix.row_mult(inv, i);
            inverse.row_mult(inv, i);
        }

        for j in 0..n {
            if i != j {
                let val = matrix.get(j, i);
                if val != 0 {
                    matrix.row_mult_and_add(val, i, j);
                    inverse.row_mult_and_add(val, i, j);
                }
            }
        }
    }

    Ok(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_multiply(a: &Matrix, b: &Matrix) -> Matrix {
        let n = a.rows;
        let mut prod = Matrix::zeroed(n, n);
        for i in 0..n {
            for j in 0..n {
                let mut p = 0;
                for l in 0..n {
                    p ^= gf16::mult(a.get(j, l), b.get(l, i));
                }
                prod.set(j, i, p);
            }
        }
        prod
    }

    fn is_identity(m: &Matrix) -> bool {
        let n = m.rows;
        (0..n).all(|i| (0..n).all(|j| m.get(i, j) == if i == j { 1 } else { 0 }))
    }

    #[test]
    fn test_systematic_matrix_has_identity_prefix() {
        for (k, m) in [(4, 2), (10, 4), (12, 6)] {
            let gen = make_systematic_matrix(k, m).unwrap();
            for i in 0..k {
                for j in 0..k {
                    assert_eq!(
                        gen.get(i, j),
                        if i == j { 1 } else { 0 },
                        "(k={}, m={}) at ({}, {})",
                        k,
                        m,
                        i,
                        j
                    );
                }
            }
        }
    }

    #[test]
    fn test_first_parity_row_is_all_ones() {
        for (k, m) in [(4, 2), (10, 4), (12, 6)] {
            let gen = make_systematic_matrix(k, m).unwrap();
            assert!(gen.row(k).iter().all(|&v| v == 1));
        }
    }

    #[test]
    fn test_parity_rows_have_no_zero_coefficients() {
        // An MDS parity row touching every data shard must be fully dense.
        let gen = make_systematic_matrix(10, 4).unwrap();
        for row in 10..14 {
            assert!(gen.row(row).iter().all(|&v| v != 0), "row {}", row);
        }
    }

    #[test]
    fn test_decoding_matrix_inversion_roundtrip() {
        let k = 10;
        let m = 4;
        let gen = make_systematic_matrix(k, m).unwrap();

        // Knock out up to m fragments in a few shapes: leading data, mixed,
        // parity-only.
        let missing_sets: [&[usize]; 4] = [&[0, 1, 2, 3], &[0, 5, 11], &[10, 11, 12, 13], &[9]];
        for missing_set in missing_sets {
            let mut missing = vec![false; k + m];
            for &i in missing_set {
                missing[i] = true;
            }
            let dec = create_decoding_matrix(&gen, &missing, k).unwrap();
            let mut scratch = dec.clone();
            let inverse = gaussj_inversion(&mut scratch).unwrap();
            assert!(
                is_identity(&square_multiply(&dec, &inverse)),
                "D * D^-1 != I for missing {:?}",
                missing_set
            );
        }
    }

    #[test]
    fn test_decoding_matrix_needs_k_survivors() {
        let k = 4;
        let m = 2;
        let gen = make_systematic_matrix(k, m).unwrap();
        let missing = vec![true, true, true, false, false, false];
        assert!(create_decoding_matrix(&gen, &missing, k).is_err());
    }
}
