//! Apply the rest-length map and its transpose.
//!
//! With `Mt` the stored transpose (segments × edges):
//!   1. Edge rest lengths:     ℓ = Mtᵀ s
//!   2. Gradient pull-back:    dJ/ds = Mt · dJ/dℓ
//!   3. Hessian pull-back:     d²J/ds² = Mt · H_ℓ · Mtᵀ
//!
//! The map is linear and frozen, so (3) carries no second-derivative term
//! of its own.

use crate::restlen_map::RestLenMap;
use crate::types::{LinkageError, Result};
use sprs::CsMat;

fn check_len(what: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(LinkageError::Shape(format!(
            "{what}: expected length {expected}, got {found}"
        )));
    }
    Ok(())
}

/// Per-edge rest lengths for the given per-segment rest lengths.
pub fn edge_rest_lengths(map: &RestLenMap, segment_rest_lengths: &[f64]) -> Result<Vec<f64>> {
    let mt = &map.matrix;
    check_len("segment rest lengths", mt.rows(), segment_rest_lengths.len())?;

    let indptr = mt.indptr();
    let mut out = vec![0.0; mt.cols()];
    for (col, value) in out.iter_mut().enumerate() {
        for nz in indptr[col]..indptr[col + 1] {
            *value += mt.data()[nz] * segment_rest_lengths[mt.indices()[nz]];
        }
    }
    Ok(out)
}

/// Pull a gradient w.r.t. edge rest lengths back to segment rest lengths.
pub fn segment_gradient(map: &RestLenMap, edge_gradient: &[f64]) -> Result<Vec<f64>> {
    let mt = &map.matrix;
    check_len("edge gradient", mt.cols(), edge_gradient.len())?;

    let indptr = mt.indptr();
    let mut out = vec![0.0; mt.rows()];
    for (col, &g) in edge_gradient.iter().enumerate() {
        for nz in indptr[col]..indptr[col + 1] {
            out[mt.indices()[nz]] += mt.data()[nz] * g;
        }
    }
    Ok(out)
}

/// Pull a Hessian w.r.t. edge rest lengths back to segment rest lengths.
pub fn segment_hessian(map: &RestLenMap, edge_hessian: &CsMat<f64>) -> Result<CsMat<f64>> {
    let ne = map.num_edges();
    if edge_hessian.rows() != ne || edge_hessian.cols() != ne {
        return Err(LinkageError::Shape(format!(
            "edge Hessian: expected {ne}×{ne}, got {}×{}",
            edge_hessian.rows(),
            edge_hessian.cols()
        )));
    }

    let mt = map.matrix.to_csmat();
    let m = mt.transpose_view().to_csc();
    let mt_h = &mt * edge_hessian;
    let hs = &mt_h * &m;
    Ok(hs.to_csc())
}
