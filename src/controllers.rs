//! Decide which segment controls each joint-edge length.
//!
//! The shorter ideal edge length wins so that a long edge meeting a short
//! one at a joint cannot flip.  The decision is made once, from the initial
//! rest-length estimates, which keeps the rest-length map a fixed linear
//! operator instead of a non-differentiable minimum.

use crate::types::{ControllerAssignment, JointControllers, JointSide, LinkageTopologyView};
use tracing::debug;

/// Ideal edge length of every segment: rest length / (edges − 1).
pub fn ideal_edge_lengths<T: LinkageTopologyView + ?Sized>(view: &T) -> Vec<f64> {
    (0..view.num_segments())
        .map(|si| view.segment(si).ideal_edge_length())
        .collect()
}

/// Pick the controller among up to two candidates.
///
/// The first present candidate is taken; a later one replaces it only when
/// its ideal length is strictly smaller, so ties keep the first listed.
/// An unordered (NaN) comparison also keeps the current candidate.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn pick_controller(candidates: &[Option<usize>; 2], ideal_edge_len: &[f64]) -> Option<usize> {
    candidates.iter().flatten().fold(None, |best, &si| match best {
        Some(b) if !(ideal_edge_len[si] < ideal_edge_len[b]) => Some(b),
        _ => Some(si),
    })
}

/// Resolve the controllers of every joint, side A and side B independently.
pub fn resolve_controllers<T: LinkageTopologyView + ?Sized>(
    view: &T,
    ideal_edge_len: &[f64],
) -> ControllerAssignment {
    let joints: Vec<JointControllers> = (0..view.num_joints())
        .map(|ji| {
            let joint = view.joint(ji);
            JointControllers {
                a: pick_controller(joint.segments(JointSide::A), ideal_edge_len),
                b: pick_controller(joint.segments(JointSide::B), ideal_edge_len),
            }
        })
        .collect();

    let unresolved = joints
        .iter()
        .filter(|c| c.a.is_none() || c.b.is_none())
        .count();
    debug!(joints = joints.len(), unresolved, "resolved joint controllers");

    ControllerAssignment { joints }
}
