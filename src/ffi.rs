//! C-compatible FFI for Grasshopper (C# P/Invoke).
//!
//! All functions are `#[no_mangle] extern "C"` so they can be called from
//! C# via `[DllImport("rodnet")]`.
//!
//! Memory convention:
//!   - Caller allocates flat arrays and passes pointers + lengths.
//!   - The opaque `*mut LinkageHandle` is created by Rust and freed by Rust
//!     via `rodnet_free`.
//!   - Absent joint / segment ids are `-1` on this side of the boundary.
//!   - Fallible calls return 0 on success, 1 on error; the message is kept
//!     per thread and read back with `rodnet_last_error`.

use crate::gradients::{edge_rest_lengths, segment_gradient};
use crate::restlen_map::{build_rest_len_map, build_rest_len_map_with_controllers, RestLenMap};
use crate::types::*;
use std::cell::RefCell;
use std::slice;
use tracing::warn;

thread_local! {
    static LAST_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

fn set_last_error(err: &LinkageError) {
    warn!(error = %err, "rodnet call failed");
    LAST_ERROR.with(|e| *e.borrow_mut() = err.to_string());
}

fn clear_last_error() {
    LAST_ERROR.with(|e| e.borrow_mut().clear());
}

fn report(result: Result<()>) -> i32 {
    match result {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(err) => {
            set_last_error(&err);
            1
        }
    }
}

fn index_from_ffi(raw: i64) -> Option<usize> {
    usize::try_from(raw).ok()
}

// ─────────────────────────────────────────────────────────────
//  Handle
// ─────────────────────────────────────────────────────────────

/// Linkage topology plus the map built from it, once built.
pub struct LinkageHandle {
    pub linkage: RodLinkage,
    pub options: MapOptions,
    pub map: Option<RestLenMap>,
}

impl LinkageHandle {
    /// Build the map; later calls keep the controllers frozen by the first.
    pub fn build(&mut self) -> Result<&RestLenMap> {
        let map = match &self.map {
            Some(prev) => {
                build_rest_len_map_with_controllers(&self.linkage, &prev.controllers, &self.options)?
            }
            None => build_rest_len_map(&self.linkage, &self.options)?,
        };
        Ok(&*self.map.insert(map))
    }

    fn built(&self) -> Result<&RestLenMap> {
        self.map
            .as_ref()
            .ok_or_else(|| LinkageError::Shape("rest-length map not built".into()))
    }
}

// ─────────────────────────────────────────────────────────────
//  Construction
// ─────────────────────────────────────────────────────────────

/// Create a linkage from raw arrays.
///
/// Per segment: edge count, rest length, start / end joint (`-1` = none).
/// Per joint: two segment ids for side A and two for side B, row-major
/// (`num_joints × 2`), `-1` = absent.
///
/// # Safety
/// All pointers must be valid for the given lengths.
#[no_mangle]
pub unsafe extern "C" fn rodnet_create(
    num_segments: usize,
    segment_num_edges: *const usize,
    segment_rest_lengths: *const f64,
    segment_start_joints: *const i64,
    segment_end_joints: *const i64,
    num_joints: usize,
    joint_segments_a: *const i64, // num_joints × 2
    joint_segments_b: *const i64, // num_joints × 2
) -> *mut LinkageHandle {
    let num_edges = slice::from_raw_parts(segment_num_edges, num_segments);
    let rest = slice::from_raw_parts(segment_rest_lengths, num_segments);
    let starts = slice::from_raw_parts(segment_start_joints, num_segments);
    let ends = slice::from_raw_parts(segment_end_joints, num_segments);
    let seg_a = slice::from_raw_parts(joint_segments_a, num_joints * 2);
    let seg_b = slice::from_raw_parts(joint_segments_b, num_joints * 2);

    let segments = (0..num_segments)
        .map(|i| {
            Segment::new(
                num_edges[i],
                rest[i],
                index_from_ffi(starts[i]),
                index_from_ffi(ends[i]),
            )
        })
        .collect();

    let joints = (0..num_joints)
        .map(|j| {
            Joint::new(
                [index_from_ffi(seg_a[2 * j]), index_from_ffi(seg_a[2 * j + 1])],
                [index_from_ffi(seg_b[2 * j]), index_from_ffi(seg_b[2 * j + 1])],
            )
        })
        .collect();

    Box::into_raw(Box::new(LinkageHandle {
        linkage: RodLinkage::new(segments, joints),
        options: MapOptions::default(),
        map: None,
    }))
}

/// Free a handle.
///
/// # Safety
/// `handle` must be a pointer returned by `rodnet_create`.
#[no_mangle]
pub unsafe extern "C" fn rodnet_free(handle: *mut LinkageHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Replace the per-segment rest lengths.  The next build reuses the
/// controllers frozen by the first one.
///
/// # Safety
/// Valid handle; `rest_lengths` valid for `num_segments` values.
#[no_mangle]
pub unsafe extern "C" fn rodnet_set_rest_lengths(
    handle: *mut LinkageHandle,
    rest_lengths: *const f64,
    num_segments: usize,
) -> i32 {
    let h = &mut *handle;
    let lengths = slice::from_raw_parts(rest_lengths, num_segments);
    report(h.linkage.set_rest_lengths(lengths))
}

// ─────────────────────────────────────────────────────────────
//  Map construction / export
// ─────────────────────────────────────────────────────────────

/// Build (or rebuild) the segment → edge rest-length map transpose.
///
/// # Safety
/// Valid handle.
#[no_mangle]
pub unsafe extern "C" fn rodnet_build_rest_len_map(handle: *mut LinkageHandle) -> i32 {
    let h = &mut *handle;
    report(h.build().map(|_| ()))
}

/// Dimensions of the built map: rows (segments), columns (edges), nonzeros.
///
/// # Safety
/// Valid handle and output pointers.
#[no_mangle]
pub unsafe extern "C" fn rodnet_rest_len_map_dims(
    handle: *const LinkageHandle,
    out_m: *mut usize,
    out_n: *mut usize,
    out_nz: *mut usize,
) -> i32 {
    let h = &*handle;
    report(h.built().map(|map| {
        *out_m = map.matrix.rows();
        *out_n = map.matrix.cols();
        *out_nz = map.matrix.nnz();
    }))
}

/// Copy the CSC arrays of the built map into caller buffers sized from
/// `rodnet_rest_len_map_dims`: `Ax` (nz), `Ai` (nz), `Ap` (n + 1).
///
/// # Safety
/// Valid handle and output buffers of the sizes above.
#[no_mangle]
pub unsafe extern "C" fn rodnet_rest_len_map_copy(
    handle: *const LinkageHandle,
    out_ax: *mut f64,
    out_ai: *mut i64,
    out_ap: *mut i64,
) -> i32 {
    let h = &*handle;
    report(h.built().map(|map| {
        let mt = &map.matrix;
        slice::from_raw_parts_mut(out_ax, mt.nnz()).copy_from_slice(mt.data());
        let ai = slice::from_raw_parts_mut(out_ai, mt.nnz());
        for (dst, &src) in ai.iter_mut().zip(mt.indices()) {
            *dst = src as i64;
        }
        let ap = slice::from_raw_parts_mut(out_ap, mt.cols() + 1);
        for (dst, &src) in ap.iter_mut().zip(mt.indptr()) {
            *dst = src as i64;
        }
    }))
}

// ─────────────────────────────────────────────────────────────
//  Map application
// ─────────────────────────────────────────────────────────────

/// Edge rest lengths for the given segment rest lengths.
///
/// # Safety
/// Valid handle; `segment_lengths` holds `num_segments` values and
/// `out_edge_lengths` has room for `num_edges`.
#[no_mangle]
pub unsafe extern "C" fn rodnet_edge_rest_lengths(
    handle: *const LinkageHandle,
    segment_lengths: *const f64,
    num_segments: usize,
    out_edge_lengths: *mut f64,
    num_edges: usize,
) -> i32 {
    let h = &*handle;
    let input = slice::from_raw_parts(segment_lengths, num_segments);
    report(h.built().and_then(|map| {
        let lengths = edge_rest_lengths(map, input)?;
        if lengths.len() != num_edges {
            return Err(LinkageError::Shape(format!(
                "output buffer holds {num_edges} edges, map has {}",
                lengths.len()
            )));
        }
        slice::from_raw_parts_mut(out_edge_lengths, num_edges).copy_from_slice(&lengths);
        Ok(())
    }))
}

/// Pull an edge rest-length gradient back to the segments.
///
/// # Safety
/// Valid handle; `edge_gradient` holds `num_edges` values and
/// `out_segment_gradient` has room for `num_segments`.
#[no_mangle]
pub unsafe extern "C" fn rodnet_segment_gradient(
    handle: *const LinkageHandle,
    edge_gradient: *const f64,
    num_edges: usize,
    out_segment_gradient: *mut f64,
    num_segments: usize,
) -> i32 {
    let h = &*handle;
    let input = slice::from_raw_parts(edge_gradient, num_edges);
    report(h.built().and_then(|map| {
        let grad = segment_gradient(map, input)?;
        if grad.len() != num_segments {
            return Err(LinkageError::Shape(format!(
                "output buffer holds {num_segments} segments, map has {}",
                grad.len()
            )));
        }
        slice::from_raw_parts_mut(out_segment_gradient, num_segments).copy_from_slice(&grad);
        Ok(())
    }))
}

// ─────────────────────────────────────────────────────────────
//  Errors
// ─────────────────────────────────────────────────────────────

/// Copy the last error message of this thread into `buf` (UTF-8, not
/// NUL-terminated, truncated to `len`).  Returns the number of bytes
/// written; 0 when there is no pending error.
///
/// # Safety
/// `buf` must be valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rodnet_last_error(buf: *mut u8, len: usize) -> i32 {
    LAST_ERROR.with(|e| {
        let msg = e.borrow();
        let n = msg.len().min(len);
        slice::from_raw_parts_mut(buf, n).copy_from_slice(&msg.as_bytes()[..n]);
        n as i32
    })
}
