//! Chain-rule application of the rest-length map against a dense reference.
//!
//! The map is built for a 2 × 3 woven grid (two rods of family A crossing
//! three rods of family B), densified with `to_dense`, and every operation
//! in `gradients` is compared with the equivalent dense product.

use approx::assert_relative_eq;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodnet::gradients::{edge_rest_lengths, segment_gradient, segment_hessian};
use rodnet::types::*;
use rodnet::{build_rest_len_map, RestLenMap};
use sprs::TriMat;

mod common;

use common::woven_grid;

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

fn grid_map() -> (RodLinkage, RestLenMap) {
    let linkage = woven_grid(2, 3, &[3, 5, 2, 4, 6], &[1.0, 2.5, 0.7, 3.0, 1.8, 2.2]);
    let map = build_rest_len_map(&linkage, &MapOptions::default()).unwrap();
    (linkage, map)
}

fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-0.5..0.5)).collect()
}

// ─────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────

#[test]
fn grid_has_expected_shape() {
    let (linkage, map) = grid_map();
    // 2 rods × 4 segments + 3 rods × 3 segments
    assert_eq!(linkage.segments.len(), 17);
    assert_eq!(map.num_segments(), 17);
    assert_eq!(map.num_joint_edges(), 12);
    let free: usize = linkage.segments.iter().map(Segment::num_free_edges).sum();
    assert_eq!(map.num_free_edges, free);
    assert_eq!(map.num_edges(), free + 12);
}

#[test]
fn edge_rest_lengths_match_dense_product() {
    let (linkage, map) = grid_map();
    let dense = map.matrix.to_dense();
    let s = Array1::from(per_segment_rest_lengths(&linkage));

    let reference = dense.t().dot(&s);
    let lengths = edge_rest_lengths(&map, s.as_slice().unwrap()).unwrap();
    for (got, want) in lengths.iter().zip(reference.iter()) {
        assert_relative_eq!(*got, *want, epsilon = 1e-12);
    }
}

/// Joint edges come out at the controller's ideal edge length.
#[test]
fn joint_edges_take_controller_ideal_length() {
    let (linkage, map) = grid_map();
    let lengths = edge_rest_lengths(&map, &per_segment_rest_lengths(&linkage)).unwrap();
    for ji in 0..linkage.joints.len() {
        for side in JointSide::BOTH {
            let c = map.controllers.controller(ji, side).unwrap();
            let col = map.joint_edge_column(ji, side);
            assert_relative_eq!(
                lengths[col],
                linkage.segments[c].ideal_edge_length(),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn gradient_is_adjoint_of_map() {
    let (_, map) = grid_map();
    let s = random_vector(map.num_segments(), 7);
    let g = random_vector(map.num_edges(), 11);

    let ms = edge_rest_lengths(&map, &s).unwrap();
    let mtg = segment_gradient(&map, &g).unwrap();

    let lhs: f64 = g.iter().zip(&ms).map(|(a, b)| a * b).sum();
    let rhs: f64 = s.iter().zip(&mtg).map(|(a, b)| a * b).sum();
    assert_relative_eq!(lhs, rhs, epsilon = 1e-12, max_relative = 1e-12);

    let dense = map.matrix.to_dense();
    let reference = dense.dot(&Array1::from(g));
    for (got, want) in mtg.iter().zip(reference.iter()) {
        assert_relative_eq!(*got, *want, epsilon = 1e-12);
    }
}

#[test]
fn hessian_pull_back_matches_dense_product() {
    let (_, map) = grid_map();
    let ne = map.num_edges();
    let ns = map.num_segments();

    // Tridiagonal SPD edge Hessian.
    let mut tri = TriMat::new((ne, ne));
    let mut h_dense = Array2::<f64>::zeros((ne, ne));
    for i in 0..ne {
        tri.add_triplet(i, i, 2.0 + i as f64 * 0.1);
        h_dense[[i, i]] = 2.0 + i as f64 * 0.1;
        if i + 1 < ne {
            tri.add_triplet(i, i + 1, -0.5);
            tri.add_triplet(i + 1, i, -0.5);
            h_dense[[i, i + 1]] = -0.5;
            h_dense[[i + 1, i]] = -0.5;
        }
    }
    let h = tri.to_csc();

    let hs = segment_hessian(&map, &h).unwrap();
    assert_eq!(hs.rows(), ns);
    assert_eq!(hs.cols(), ns);

    let d = map.matrix.to_dense();
    let reference = d.dot(&h_dense).dot(&d.t());
    for r in 0..ns {
        for c in 0..ns {
            let got = hs.get(r, c).copied().unwrap_or(0.0);
            assert_relative_eq!(got, reference[[r, c]], epsilon = 1e-10);
        }
    }
}

#[test]
fn shape_mismatches_are_reported() {
    let (_, map) = grid_map();
    assert!(matches!(edge_rest_lengths(&map, &[1.0]), Err(LinkageError::Shape(_))));
    assert!(matches!(segment_gradient(&map, &[1.0]), Err(LinkageError::Shape(_))));

    let h = TriMat::<f64>::new((2, 2)).to_csc();
    assert!(matches!(segment_hessian(&map, &h), Err(LinkageError::Shape(_))));
}
