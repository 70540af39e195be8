//! Per-segment influence stencils for the free edges.
//!
//! A segment is split into (ne − 1) intervals between its end nodes, with
//! half an interval reaching past each joint.  Each incident joint edge
//! takes half an interval of the controlling segment's ideal length; the
//! remaining length is spread evenly over the free intervals.  Every free
//! edge of a segment therefore sees the same stencil:
//!
//! ```text
//!   +-----+-----+-----+
//!            ^
//!   [start controller]  [own segment]  [end controller]
//! ```

use crate::sparse::SparseColumnMatrix;
use crate::types::{
    ControllerAssignment, InfluenceEntry, JointSide, LinkageError, LinkageTopologyView, Result,
    SegmentEnd,
};

/// Own entry plus up to one neighbouring controller per end, sorted by
/// segment index (absent slots first).
pub type Stencil = [InfluenceEntry; 3];

/// Side of joint `ji` that segment `si` sits on.
pub fn joint_side<T: LinkageTopologyView + ?Sized>(view: &T, ji: usize, si: usize) -> Result<JointSide> {
    view.joint(ji)
        .side_of(si)
        .ok_or(LinkageError::NotIncident { segment: si, joint: ji })
}

/// Controller of the joint at `end` of segment `si`, with the joint index.
/// `Ok(None)` when that end has no joint.
pub fn end_controller<T: LinkageTopologyView + ?Sized>(
    view: &T,
    controllers: &ControllerAssignment,
    si: usize,
    end: SegmentEnd,
) -> Result<Option<(usize, usize)>> {
    let Some(ji) = view.segment(si).joint_at(end) else {
        return Ok(None);
    };
    let side = joint_side(view, ji, si)?;
    let controller = controllers.controller(ji, side)?;
    Ok(Some((ji, controller)))
}

/// Whether a segment other than `si` controls the joint at `end`.
///
/// Each such end adds one stencil entry to every free edge of `si`.
pub fn neighbour_controls<T: LinkageTopologyView + ?Sized>(
    view: &T,
    controllers: &ControllerAssignment,
    si: usize,
    end: SegmentEnd,
) -> Result<bool> {
    Ok(matches!(end_controller(view, controllers, si, end)?, Some((_, c)) if c != si))
}

/// Influence stencil shared by all free edges of segment `si`.
///
/// The segment must have at least one free edge; otherwise the number of
/// free intervals is zero and the stencil is undefined.
pub fn segment_stencil<T: LinkageTopologyView + ?Sized>(
    view: &T,
    si: usize,
    controllers: &ControllerAssignment,
    num_edges: &[usize],
) -> Result<Stencil> {
    let segment = view.segment(si);
    debug_assert!(segment.num_free_edges() > 0, "segment {si} has no free edges");

    let ne = num_edges[si];
    let free_intervals = segment.num_free_intervals();

    let mut stencil: Stencil = [InfluenceEntry::ABSENT; 3];
    stencil[0] = InfluenceEntry::new(si, 1.0 / free_intervals);

    // Incident joint edges take half their length out of the free intervals.
    for end in SegmentEnd::BOTH {
        let Some((_, controller)) = end_controller(view, controllers, si, end)? else {
            continue;
        };
        if controller == si {
            stencil[0].coeff -= (0.5 / (ne as f64 - 1.0)) / free_intervals;
        } else {
            let nc = num_edges[controller] as f64;
            stencil[end.stencil_slot()] =
                InfluenceEntry::new(controller, -(0.5 / (nc - 1.0)) / free_intervals);
        }
    }

    stencil.sort_by_key(|entry| entry.segment);
    Ok(stencil)
}

/// Append one column per free edge of segment `si`, each holding the
/// present stencil entries.  Returns the number of entries written.
pub fn emit_free_edge_columns<T: LinkageTopologyView + ?Sized>(
    view: &T,
    si: usize,
    stencil: &Stencil,
    matrix: &mut SparseColumnMatrix,
) -> usize {
    let mut written = 0;
    for _edge in view.segment(si).free_edges() {
        for entry in stencil {
            if let Some(row) = entry.segment {
                matrix.push(row, entry.coeff);
                written += 1;
            }
        }
        matrix.finish_column();
    }
    written
}
