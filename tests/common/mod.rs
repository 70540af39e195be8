//! Woven grid linkages shared by the integration tests.

use rodnet::types::{Joint, JointSide, RodLinkage, Segment};

fn side_slots(joint: &mut Joint, side: JointSide) -> &mut [Option<usize>; 2] {
    match side {
        JointSide::A => &mut joint.segments_a,
        JointSide::B => &mut joint.segments_b,
    }
}

/// Add one rod passing through `stops` (joint ids, in order), with a free
/// segment before the first and after the last joint.
pub fn add_rod(
    segments: &mut Vec<Segment>,
    joints: &mut [Joint],
    stops: &[usize],
    side: JointSide,
    edges: &[usize],
    lengths: &[f64],
) {
    let mut prev = None;
    for k in 0..=stops.len() {
        let end = stops.get(k).copied();
        let si = segments.len();
        segments.push(Segment::new(
            edges[si % edges.len()],
            lengths[si % lengths.len()],
            prev,
            end,
        ));
        if let Some(ji) = prev {
            side_slots(&mut joints[ji], side)[1] = Some(si);
        }
        if let Some(ji) = end {
            side_slots(&mut joints[ji], side)[0] = Some(si);
        }
        prev = end;
    }
}

pub fn woven_grid(rows: usize, cols: usize, edges: &[usize], lengths: &[f64]) -> RodLinkage {
    let mut joints = vec![Joint::new([None; 2], [None; 2]); rows * cols];
    let mut segments = Vec::new();
    for i in 0..rows {
        let stops: Vec<usize> = (0..cols).map(|j| i * cols + j).collect();
        add_rod(&mut segments, &mut joints, &stops, JointSide::A, edges, lengths);
    }
    for j in 0..cols {
        let stops: Vec<usize> = (0..rows).map(|i| i * cols + j).collect();
        add_rod(&mut segments, &mut joints, &stops, JointSide::B, edges, lengths);
    }
    RodLinkage::new(segments, joints)
}
