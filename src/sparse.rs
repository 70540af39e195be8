//! Minimal compressed-sparse-column container with exact fill bookkeeping.
//!
//! The builder appends entries column by column and closes each column
//! explicitly, so the final array lengths can be checked against the
//! nonzero count computed up front.

use crate::types::{LinkageError, Result};
use ndarray::Array2;
use sprs::{CsMat, TriMat};

/// CSC matrix with known row / column / nonzero counts.
///
/// `indptr[c]..indptr[c + 1]` indexes the row indices and values of column
/// `c`.  Rows within a column appear in stencil order (ascending segment).
#[derive(Debug, Clone, PartialEq)]
pub struct SparseColumnMatrix {
    nrows: usize,
    ncols: usize,
    nnz: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl SparseColumnMatrix {
    /// Allocate an empty matrix expecting `nnz` entries; column 0 begins at 0.
    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Self {
        let mut indptr = Vec::with_capacity(ncols + 1);
        indptr.push(0);
        Self {
            nrows,
            ncols,
            nnz,
            indptr,
            indices: Vec::with_capacity(nnz),
            data: Vec::with_capacity(nnz),
        }
    }

    /// Append an entry to the column currently being filled.
    pub fn push(&mut self, row: usize, value: f64) {
        debug_assert!(row < self.nrows, "row index out of bounds");
        self.indices.push(row);
        self.data.push(value);
    }

    /// Close the current column.
    pub fn finish_column(&mut self) {
        self.indptr.push(self.indices.len());
    }

    pub fn rows(&self) -> usize {
        self.nrows
    }

    pub fn cols(&self) -> usize {
        self.ncols
    }

    /// Nonzero count declared at allocation.
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Row indices and values of column `c`.
    pub fn column(&self, c: usize) -> (&[usize], &[f64]) {
        let range = self.indptr[c]..self.indptr[c + 1];
        (&self.indices[range.clone()], &self.data[range])
    }

    /// Check the fill against the declared shape.
    ///
    /// `data` and `indices` must hold exactly `nnz` entries, `indptr` exactly
    /// `ncols + 1` non-decreasing offsets from 0 to `nnz`, and every row
    /// index must be in range.
    pub fn validate(&self) -> Result<()> {
        if self.data.len() != self.nnz {
            return Err(LinkageError::FillMismatch {
                array: "values (Ax)",
                expected: self.nnz,
                found: self.data.len(),
            });
        }
        if self.indices.len() != self.nnz {
            return Err(LinkageError::FillMismatch {
                array: "row indices (Ai)",
                expected: self.nnz,
                found: self.indices.len(),
            });
        }
        if self.indptr.len() != self.ncols + 1 {
            return Err(LinkageError::FillMismatch {
                array: "column offsets (Ap)",
                expected: self.ncols + 1,
                found: self.indptr.len(),
            });
        }
        let monotone = self.indptr.windows(2).all(|w| w[0] <= w[1]);
        if self.indptr[0] != 0 || !monotone || self.indptr[self.ncols] != self.nnz {
            return Err(LinkageError::Shape(
                "column offsets must rise monotonically from 0 to nnz".into(),
            ));
        }
        if let Some(&row) = self.indices.iter().find(|&&r| r >= self.nrows) {
            return Err(LinkageError::Shape(format!(
                "row index {row} out of range for {} rows",
                self.nrows
            )));
        }
        Ok(())
    }

    /// Convert to an `sprs` CSC matrix.
    ///
    /// Goes through triplets so that repeated rows inside one column (two
    /// segments closing a loop control both of each other's joints) are
    /// summed rather than rejected.
    pub fn to_csmat(&self) -> CsMat<f64> {
        let mut tri = TriMat::with_capacity((self.nrows, self.ncols), self.indices.len());
        for col in 0..self.ncols {
            for nz in self.indptr[col]..self.indptr[col + 1] {
                tri.add_triplet(self.indices[nz], col, self.data[nz]);
            }
        }
        tri.to_csc()
    }

    /// Dense copy (rows × cols).
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::<f64>::zeros((self.nrows, self.ncols));
        for col in 0..self.ncols {
            for nz in self.indptr[col]..self.indptr[col + 1] {
                dense[[self.indices[nz], col]] += self.data[nz];
            }
        }
        dense
    }
}
