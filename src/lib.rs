//! **rodnet**: segment rest length → edge rest length maps for elastic rod
//! linkages.
//!
//! A linkage is a network of rods joined at joints; each rod segment between
//! joints is discretised into edges, and each segment's rest length is a
//! design variable.  This crate builds the fixed linear operator that spreads
//! those per-segment variables over every discrete edge:
//!
//! 1. **Controllers** (`controllers`): decide once which segment sets each
//!    joint-edge length (shorter ideal edge wins, ties keep the first listed).
//! 2. **Stencils** (`influence`): per-segment influence of the segment and
//!    its controlling neighbours on the free edges.
//! 3. **Assembly** (`restlen_map`): CSC transpose of the map with exact
//!    nonzero bookkeeping (`sparse`).
//! 4. **Chain rule** (`gradients`): apply the map / pull back gradients and
//!    Hessians.
//! 5. **FFI** (`ffi`): C-compatible API for Grasshopper / C# P/Invoke.

pub mod types;
pub mod sparse;
pub mod controllers;
pub mod influence;
pub mod restlen_map;
pub mod gradients;
pub mod ffi;

pub use restlen_map::{build_rest_len_map, build_rest_len_map_with_controllers, RestLenMap};
pub use sparse::SparseColumnMatrix;
pub use types::{
    ControllerAssignment, Joint, JointControllers, JointSide, LinkageError, LinkageTopologyView,
    MapOptions, RodLinkage, Segment, SegmentEnd,
};
