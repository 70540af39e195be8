use std::fmt;
use std::ops::Range;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────
//  Error type
// ─────────────────────────────────────────────────────────────

/// Unified error type for all fallible operations in the crate.
///
/// Topology precondition failures (`TooFewEdges` … `UnknownJoint`) are the
/// caller's fault.  `NotIncident`, `MissingController` and `FillMismatch`
/// are internal-consistency faults: the build is aborted and no partial
/// matrix is returned.  The FFI layer translates all of them into integer
/// return codes + a thread-local error message.
#[derive(Debug, Error)]
pub enum LinkageError {
    /// A segment must be discretised into at least two edges.
    #[error("segment {segment} has {num_edges} edges (at least 2 required)")]
    TooFewEdges { segment: usize, num_edges: usize },
    /// Rest-length estimates must be finite and positive.
    #[error("segment {segment} has invalid rest length {rest_length}")]
    InvalidRestLength { segment: usize, rest_length: f64 },
    /// A joint lists a segment id that does not exist.
    #[error("joint {joint} references unknown segment {segment}")]
    UnknownSegment { joint: usize, segment: usize },
    /// A segment lists a joint id that does not exist.
    #[error("segment {segment} references unknown joint {joint}")]
    UnknownJoint { segment: usize, joint: usize },
    /// A segment claims a joint that does not list it on either side.
    #[error("segment {segment} is not incident to joint {joint}")]
    NotIncident { segment: usize, joint: usize },
    /// No controlling segment could be found for a joint side.
    #[error("joint {joint} has no controlling segment on side {side}")]
    MissingController { joint: usize, side: JointSide },
    /// A frozen controller assignment does not match the topology.
    #[error("controller assignment covers {found} joints, linkage has {expected}")]
    ControllerCountMismatch { expected: usize, found: usize },
    /// Final fill of a sparse array disagrees with the precomputed count.
    #[error("invalid fill of {array}: expected {expected} entries, found {found}")]
    FillMismatch {
        array: &'static str,
        expected: usize,
        found: usize,
    },
    /// Shape mismatch in input data.
    #[error("shape error: {0}")]
    Shape(String),
    /// Sparse storage rejected by `sprs`.
    #[error("sparse structure error: {0}")]
    Sparse(#[from] sprs::errors::StructureError),
}

pub type Result<T> = std::result::Result<T, LinkageError>;

// ─────────────────────────────────────────────────────────────
//  Joint sides / segment ends
// ─────────────────────────────────────────────────────────────

/// The two rod families meeting at a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointSide {
    A,
    B,
}

impl JointSide {
    pub const BOTH: [JointSide; 2] = [JointSide::A, JointSide::B];

    /// Offset of this side in per-joint pairs (0 = A, 1 = B).
    pub fn offset(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl fmt::Display for JointSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Which end of a segment a joint sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEnd {
    Start,
    End,
}

impl SegmentEnd {
    pub const BOTH: [SegmentEnd; 2] = [SegmentEnd::Start, SegmentEnd::End];

    /// Stencil slot used for a neighbouring controller at this end.
    pub(crate) fn stencil_slot(self) -> usize {
        match self {
            Self::Start => 1,
            Self::End => 2,
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Segments
// ─────────────────────────────────────────────────────────────

/// One rod segment between zero, one or two joints.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Number of discrete edges (≥ 2).
    pub num_edges: usize,
    /// Rest-length estimate; only used to decide joint controllers.
    pub rest_length: f64,
    pub start_joint: Option<usize>,
    pub end_joint: Option<usize>,
}

impl Segment {
    pub fn new(
        num_edges: usize,
        rest_length: f64,
        start_joint: Option<usize>,
        end_joint: Option<usize>,
    ) -> Self {
        Self { num_edges, rest_length, start_joint, end_joint }
    }

    /// A segment with no joints at either end.
    pub fn free(num_edges: usize, rest_length: f64) -> Self {
        Self::new(num_edges, rest_length, None, None)
    }

    pub fn has_start_joint(&self) -> usize {
        usize::from(self.start_joint.is_some())
    }

    pub fn has_end_joint(&self) -> usize {
        usize::from(self.end_joint.is_some())
    }

    pub fn joint_at(&self, end: SegmentEnd) -> Option<usize> {
        match end {
            SegmentEnd::Start => self.start_joint,
            SegmentEnd::End => self.end_joint,
        }
    }

    /// Rest length per subdivision interval if the segment were split evenly.
    pub fn ideal_edge_length(&self) -> f64 {
        self.rest_length / (self.num_edges as f64 - 1.0)
    }

    /// Edges not governed by a joint.
    pub fn num_free_edges(&self) -> usize {
        self.num_edges.saturating_sub(self.has_start_joint() + self.has_end_joint())
    }

    /// Subdivision intervals left after half an interval is reserved for
    /// each incident joint edge.
    pub fn num_free_intervals(&self) -> f64 {
        (self.num_edges as f64 - 1.0)
            - 0.5 * (self.has_start_joint() + self.has_end_joint()) as f64
    }

    /// Local indices of the free edges.
    pub fn free_edges(&self) -> Range<usize> {
        let start = self.has_start_joint();
        start..self.num_edges.saturating_sub(self.has_end_joint()).max(start)
    }
}

// ─────────────────────────────────────────────────────────────
//  Joints
// ─────────────────────────────────────────────────────────────

/// A node where segments of two rod families meet.
///
/// Each side holds up to two segments: the one arriving at the joint and the
/// one leaving it along the same rod.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub segments_a: [Option<usize>; 2],
    pub segments_b: [Option<usize>; 2],
}

impl Joint {
    pub fn new(segments_a: [Option<usize>; 2], segments_b: [Option<usize>; 2]) -> Self {
        Self { segments_a, segments_b }
    }

    pub fn segments(&self, side: JointSide) -> &[Option<usize>; 2] {
        match side {
            JointSide::A => &self.segments_a,
            JointSide::B => &self.segments_b,
        }
    }

    /// Number of segments present on one side.
    pub fn num_segments(&self, side: JointSide) -> usize {
        self.segments(side).iter().flatten().count()
    }

    /// Whether segment `si` belongs to rod A or rod B at this joint.
    pub fn side_of(&self, si: usize) -> Option<JointSide> {
        JointSide::BOTH
            .into_iter()
            .find(|&side| self.segments(side).contains(&Some(si)))
    }

    /// The segment that continues the rod of segment `si` through this
    /// joint (`Ok(None)` when the rod terminates here).
    pub fn continuation_segment(&self, joint: usize, si: usize) -> Result<Option<usize>> {
        let side = self.side_of(si).ok_or(LinkageError::NotIncident { segment: si, joint })?;
        let [first, second] = *self.segments(side);
        Ok(if first == Some(si) { second } else { first })
    }
}

// ─────────────────────────────────────────────────────────────
//  Topology view  (read-only; implement for external models)
// ─────────────────────────────────────────────────────────────

/// Read-only access to a linkage's segment / joint topology.
///
/// The map builder only ever reads through this trait, so any host model
/// that exposes per-segment edge counts and per-joint incidence can be
/// plugged in without copying.
pub trait LinkageTopologyView {
    fn num_segments(&self) -> usize;
    fn num_joints(&self) -> usize;
    fn segment(&self, si: usize) -> &Segment;
    fn joint(&self, ji: usize) -> &Joint;
}

/// Owned linkage topology.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RodLinkage {
    pub segments: Vec<Segment>,
    pub joints: Vec<Joint>,
}

impl RodLinkage {
    pub fn new(segments: Vec<Segment>, joints: Vec<Joint>) -> Self {
        Self { segments, joints }
    }

    /// Replace the rest-length estimates (one per segment).
    pub fn set_rest_lengths(&mut self, rest_lengths: &[f64]) -> Result<()> {
        if rest_lengths.len() != self.segments.len() {
            return Err(LinkageError::Shape(format!(
                "expected {} rest lengths, got {}",
                self.segments.len(),
                rest_lengths.len()
            )));
        }
        for (segment, &len) in self.segments.iter_mut().zip(rest_lengths) {
            segment.rest_length = len;
        }
        Ok(())
    }
}

impl LinkageTopologyView for RodLinkage {
    fn num_segments(&self) -> usize {
        self.segments.len()
    }

    fn num_joints(&self) -> usize {
        self.joints.len()
    }

    fn segment(&self, si: usize) -> &Segment {
        &self.segments[si]
    }

    fn joint(&self, ji: usize) -> &Joint {
        &self.joints[ji]
    }
}

/// Current rest length of every segment (the design vector of the map).
pub fn per_segment_rest_lengths<T: LinkageTopologyView + ?Sized>(view: &T) -> Vec<f64> {
    (0..view.num_segments())
        .map(|si| view.segment(si).rest_length)
        .collect()
}

/// Check the topology preconditions the map builder relies on.
///
/// Empty joint sides are not rejected here; they surface as
/// `MissingController` when the builder needs the controller.
pub fn validate_topology<T: LinkageTopologyView + ?Sized>(view: &T) -> Result<()> {
    let ns = view.num_segments();
    let nj = view.num_joints();

    for si in 0..ns {
        let s = view.segment(si);
        if s.num_edges < 2 {
            return Err(LinkageError::TooFewEdges { segment: si, num_edges: s.num_edges });
        }
        if !(s.rest_length.is_finite() && s.rest_length > 0.0) {
            return Err(LinkageError::InvalidRestLength { segment: si, rest_length: s.rest_length });
        }
        for end in SegmentEnd::BOTH {
            let Some(ji) = s.joint_at(end) else { continue };
            if ji >= nj {
                return Err(LinkageError::UnknownJoint { segment: si, joint: ji });
            }
            if view.joint(ji).side_of(si).is_none() {
                return Err(LinkageError::NotIncident { segment: si, joint: ji });
            }
        }
    }

    for ji in 0..nj {
        let j = view.joint(ji);
        for side in JointSide::BOTH {
            for &si in j.segments(side).iter().flatten() {
                if si >= ns {
                    return Err(LinkageError::UnknownSegment { joint: ji, segment: si });
                }
            }
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────
//  Controller assignment  (frozen at construction)
// ─────────────────────────────────────────────────────────────

/// Segment controlling each side's joint-edge length (`None` = no candidate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JointControllers {
    pub a: Option<usize>,
    pub b: Option<usize>,
}

impl JointControllers {
    pub fn get(&self, side: JointSide) -> Option<usize> {
        match side {
            JointSide::A => self.a,
            JointSide::B => self.b,
        }
    }
}

/// One [`JointControllers`] per joint, decided once from the initial
/// rest-length estimates and reused for every rebuild of the map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerAssignment {
    pub joints: Vec<JointControllers>,
}

impl ControllerAssignment {
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Controller of `side` at joint `ji`; a missing one is a consistency fault.
    pub fn controller(&self, ji: usize, side: JointSide) -> Result<usize> {
        self.joints
            .get(ji)
            .and_then(|c| c.get(side))
            .ok_or(LinkageError::MissingController { joint: ji, side })
    }
}

// ─────────────────────────────────────────────────────────────
//  Influence stencil entries
// ─────────────────────────────────────────────────────────────

/// How much one segment's rest-length variable contributes to an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfluenceEntry {
    pub segment: Option<usize>,
    pub coeff: f64,
}

impl InfluenceEntry {
    pub const ABSENT: InfluenceEntry = InfluenceEntry { segment: None, coeff: 0.0 };

    pub fn new(segment: usize, coeff: f64) -> Self {
        Self { segment: Some(segment), coeff }
    }

    pub fn is_present(&self) -> bool {
        self.segment.is_some()
    }
}

impl Default for InfluenceEntry {
    fn default() -> Self {
        Self::ABSENT
    }
}

// ─────────────────────────────────────────────────────────────
//  Build options
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MapOptions {
    /// Run [`validate_topology`] before building.  Disable only for views
    /// already known to be well formed.
    pub validate_topology: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            validate_topology: true,
        }
    }
}
