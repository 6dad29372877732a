//! Geometric predicates for triangle validation and plane clustering.

pub mod se3;

pub use se3::SE3;

use nalgebra::Vector3;
use tracing::warn;

/// Aperture below which two triangle edges are considered aligned
/// (1e-3 === 2.5 degrees).
const ALIGNMENT_EPSILON: f64 = 1e-3;

/// Computes the unit normal of the triangle (p1, p2, p3).
///
/// Returns `None` for degenerate configurations: coincident vertices or
/// edges aligned within [`ALIGNMENT_EPSILON`], where the cross product is
/// numerically meaningless.
pub fn triangle_normal(
    p1: &Vector3<f64>,
    p2: &Vector3<f64>,
    p3: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let v21 = p2 - p1;
    let v31 = p3 - p1;

    let v21_norm = v21.norm();
    let v31_norm = v31.norm();
    if v21_norm == 0.0 || v31_norm == 0.0 {
        warn!("triangle with coincident vertices");
        return None;
    }
    let v21 = v21 / v21_norm;
    let v31 = v31 / v31_norm;

    // Dot product close to 1.0 or -1.0 means aligned vectors.
    if v21.dot(&v31).abs() >= 1.0 - ALIGNMENT_EPSILON {
        warn!("cross product of aligned vectors");
        return None;
    }

    let normal = v21.cross(&v31);
    Some(normal / normal.norm())
}

/// Longitude (azimuth) of a direction about `vertical`, from the `atan2` of
/// its projection onto the equatorial plane. Range (-pi, pi].
///
/// Returns `None` when the equatorial projection vanishes (direction
/// parallel to `vertical`), where the azimuth is undefined.
pub fn longitude(normal: &Vector3<f64>, vertical: &Vector3<f64>) -> Option<f64> {
    debug_assert!((normal.norm() - 1.0).abs() < 1e-5);
    debug_assert!((vertical.norm() - 1.0).abs() < 1e-5);
    let equatorial_proj = normal - vertical * vertical.dot(normal);
    if equatorial_proj.x == 0.0 && equatorial_proj.y == 0.0 {
        return None;
    }
    Some(equatorial_proj.y.atan2(equatorial_proj.x))
}

/// Whether `normal` is aligned with `axis` (or its antipode) within
/// `tolerance`: |n . a| > 1 - tolerance. Tolerance must be in (0, 1).
#[inline]
pub fn is_normal_around_axis(axis: &Vector3<f64>, normal: &Vector3<f64>, tolerance: f64) -> bool {
    debug_assert!((axis.norm() - 1.0).abs() < 1e-5);
    debug_assert!((normal.norm() - 1.0).abs() < 1e-5);
    debug_assert!(tolerance > 0.0 && tolerance < 1.0);
    normal.dot(axis).abs() > 1.0 - tolerance
}

/// Whether `normal` is perpendicular to `axis` within `tolerance`:
/// |n . a| < tolerance. Tolerance must be in (0, 1).
#[inline]
pub fn is_normal_perpendicular_to_axis(
    axis: &Vector3<f64>,
    normal: &Vector3<f64>,
    tolerance: f64,
) -> bool {
    debug_assert!((axis.norm() - 1.0).abs() < 1e-5);
    debug_assert!((normal.norm() - 1.0).abs() < 1e-5);
    debug_assert!(tolerance > 0.0 && tolerance < 1.0);
    normal.dot(axis).abs() < tolerance
}

/// Whether `point` lies within `distance_tolerance` of the plane
/// {x : x . plane_normal = plane_distance}.
#[inline]
pub fn is_point_at_distance_from_plane(
    point: &Vector3<f64>,
    plane_distance: f64,
    plane_normal: &Vector3<f64>,
    distance_tolerance: f64,
) -> bool {
    debug_assert!((plane_normal.norm() - 1.0).abs() < 1e-5);
    debug_assert!(distance_tolerance >= 0.0);
    (plane_distance - point.dot(plane_normal)).abs() <= distance_tolerance
}

/// Side-length summary of a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideRatio {
    /// min_side / max_side, in [0, 1] for non-degenerate triangles.
    pub ratio: f64,
    pub min_side: f64,
    pub max_side: f64,
}

/// Ratio between the smallest and largest side of a triangle with side
/// lengths `d12`, `d23`, `d31` (how elongated it is).
pub fn side_ratio(d12: f64, d23: f64, d31: f64) -> SideRatio {
    let min_side = d12.min(d23).min(d31);
    let max_side = d12.max(d23).max(d31);
    SideRatio {
        ratio: min_side / max_side,
        min_side,
        max_side,
    }
}

/// Ratio between the tangential and radial displacement of a triangle given
/// in the camera frame (z = optical axis).
///
/// Tangential displacement is the largest pairwise distance in the image
/// plane (x, y); radial displacement is the depth spread along z. A triangle
/// stretched along the viewing ray scores low; a fronto-parallel triangle
/// has no depth spread and scores `f64::MAX`.
pub fn ratio_between_tangential_and_radial_displacement(points: &[Vector3<f64>; 3]) -> f64 {
    let mut min_z = f64::INFINITY;
    let mut max_z = f64::NEG_INFINITY;
    for p in points {
        min_z = min_z.min(p.z);
        max_z = max_z.max(p.z);
    }
    let radial = max_z - min_z;

    let mut tangential: f64 = 0.0;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let dx = points[i].x - points[j].x;
            let dy = points[i].y - points[j].y;
            tangential = tangential.max((dx * dx + dy * dy).sqrt());
        }
    }

    if radial <= f64::EPSILON {
        return f64::MAX;
    }
    tangential / radial
}
