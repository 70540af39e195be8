//! Build the segment rest length → edge rest length map.
//!
//! The map is stored as its *transpose* (segments × edges, CSC) because the
//! Hessian chain-rule term iterates over edge columns.  Output edge order:
//! the free edges of every segment (segment order, then edge order),
//! followed by two joint edges per joint (side A, side B).
//!
//! The operator is fixed for the lifetime of the topology: controllers are
//! frozen on the first build and reused by
//! [`build_rest_len_map_with_controllers`].

use crate::controllers::{ideal_edge_lengths, resolve_controllers};
use crate::influence::{emit_free_edge_columns, neighbour_controls, segment_stencil};
use crate::sparse::SparseColumnMatrix;
use crate::types::{
    validate_topology, ControllerAssignment, JointSide, LinkageError, LinkageTopologyView,
    MapOptions, Result, SegmentEnd,
};
use tracing::debug;

// ─────────────────────────────────────────────────────────────
//  Result
// ─────────────────────────────────────────────────────────────

/// Built map plus the controller decision it was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct RestLenMap {
    /// Transpose of the map (segments × edges).
    pub matrix: SparseColumnMatrix,
    pub controllers: ControllerAssignment,
    pub num_free_edges: usize,
}

impl RestLenMap {
    pub fn num_segments(&self) -> usize {
        self.matrix.rows()
    }

    /// Total edge-length outputs (free edges + joint edges).
    pub fn num_edges(&self) -> usize {
        self.matrix.cols()
    }

    pub fn num_joint_edges(&self) -> usize {
        self.num_edges() - self.num_free_edges
    }

    /// Output column of joint `ji`'s edge on `side`.
    pub fn joint_edge_column(&self, ji: usize, side: JointSide) -> usize {
        self.num_free_edges + 2 * ji + side.offset()
    }
}

// ─────────────────────────────────────────────────────────────
//  Build
// ─────────────────────────────────────────────────────────────

/// Build the map, deciding controllers from the current rest-length
/// estimates.
pub fn build_rest_len_map<T: LinkageTopologyView + ?Sized>(
    view: &T,
    options: &MapOptions,
) -> Result<RestLenMap> {
    if options.validate_topology {
        validate_topology(view)?;
    }
    let ideal = ideal_edge_lengths(view);
    let controllers = resolve_controllers(view, &ideal);
    assemble(view, controllers)
}

/// Rebuild the map for the same topology with a frozen controller
/// assignment (typically the one returned by the first build).
pub fn build_rest_len_map_with_controllers<T: LinkageTopologyView + ?Sized>(
    view: &T,
    controllers: &ControllerAssignment,
    options: &MapOptions,
) -> Result<RestLenMap> {
    if options.validate_topology {
        validate_topology(view)?;
    }
    if controllers.len() != view.num_joints() {
        return Err(LinkageError::ControllerCountMismatch {
            expected: view.num_joints(),
            found: controllers.len(),
        });
    }
    for (ji, jc) in controllers.joints.iter().enumerate() {
        for segment in [jc.a, jc.b].into_iter().flatten() {
            if segment >= view.num_segments() {
                return Err(LinkageError::UnknownSegment { joint: ji, segment });
            }
        }
    }
    assemble(view, controllers.clone())
}

/// Exact nonzero count and free-edge total.
///
/// Each free edge holds its own segment's entry plus one entry per end
/// controlled by a neighbour; each joint contributes two single-entry
/// columns.
fn count_nonzeros<T: LinkageTopologyView + ?Sized>(
    view: &T,
    controllers: &ControllerAssignment,
) -> Result<(usize, usize)> {
    let mut total_free_edges = 0;
    let mut nz = 0;
    for si in 0..view.num_segments() {
        let free = view.segment(si).num_free_edges();
        total_free_edges += free;
        nz += free;
        for end in SegmentEnd::BOTH {
            if neighbour_controls(view, controllers, si, end)? {
                nz += free;
            }
        }
    }
    nz += 2 * view.num_joints();
    Ok((total_free_edges, nz))
}

fn assemble<T: LinkageTopologyView + ?Sized>(
    view: &T,
    controllers: ControllerAssignment,
) -> Result<RestLenMap> {
    let ns = view.num_segments();
    let nj = view.num_joints();
    let num_edges: Vec<usize> = (0..ns).map(|si| view.segment(si).num_edges).collect();

    let (total_free_edges, nz) = count_nonzeros(view, &controllers)?;
    let ncols = total_free_edges + 2 * nj;
    debug!(
        segments = ns,
        joints = nj,
        free_edges = total_free_edges,
        nnz = nz,
        "assembling rest-length map transpose"
    );

    let mut matrix = SparseColumnMatrix::with_capacity(ns, ncols, nz);

    // Free-edge columns, segment by segment.
    let mut free_entries = 0;
    for si in 0..ns {
        if view.segment(si).num_free_edges() == 0 {
            continue;
        }
        let stencil = segment_stencil(view, si, &controllers, &num_edges)?;
        free_entries += emit_free_edge_columns(view, si, &stencil, &mut matrix);
    }
    if free_entries + 2 * nj != nz {
        return Err(LinkageError::FillMismatch {
            array: "free-edge entries",
            expected: nz - 2 * nj,
            found: free_entries,
        });
    }

    // Joint-edge columns: one entry each, the controller's ideal share.
    for ji in 0..nj {
        for side in JointSide::BOTH {
            let c = controllers.controller(ji, side)?;
            matrix.push(c, 1.0 / (num_edges[c] as f64 - 1.0));
            matrix.finish_column();
        }
    }

    matrix.validate()?;

    Ok(RestLenMap {
        matrix,
        controllers,
        num_free_edges: total_free_edges,
    })
}
