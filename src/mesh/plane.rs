//! Plane model shared between the segmenter and the backend optimizer.

use std::fmt;

use nalgebra::Vector3;

use crate::frame::LandmarkIds;
use crate::geometry;

/// Identity of a plane: a character tag plus a monotonically increasing
/// index. Indices are assigned by the segmenter's counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneSymbol {
    pub chr: char,
    pub index: u64,
}

impl PlaneSymbol {
    pub fn new(chr: char, index: u64) -> Self {
        Self { chr, index }
    }
}

impl fmt::Display for PlaneSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chr, self.index)
    }
}

/// Visualization/grouping tag of a plane cluster; not an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterType {
    Wall,
    Horizontal,
}

impl ClusterType {
    /// Numeric tag: 1 = wall, 2 = horizontal.
    pub fn id(self) -> i32 {
        match self {
            ClusterType::Wall => 1,
            ClusterType::Horizontal => 2,
        }
    }
}

/// Faces of the mesh grouped into a cluster, referenced by polygon index.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleCluster {
    pub cluster_id: ClusterType,
    pub triangle_ids: Vec<usize>,
}

impl TriangleCluster {
    pub fn new(cluster_id: ClusterType) -> Self {
        Self {
            cluster_id,
            triangle_ids: Vec::new(),
        }
    }
}

/// A segmented plane: the locus {x : x . normal = distance}.
///
/// The symbol is immutable; landmark ids and the triangle cluster are
/// cleared and repopulated on every segmentation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    symbol: PlaneSymbol,
    /// Unit normal.
    pub normal: Vector3<f64>,
    pub distance: f64,
    /// Landmarks currently clustered onto the plane.
    pub lmk_ids: LandmarkIds,
    pub triangle_cluster: TriangleCluster,
}

impl Plane {
    pub fn new(
        symbol: PlaneSymbol,
        normal: Vector3<f64>,
        distance: f64,
        lmk_ids: LandmarkIds,
        cluster_type: ClusterType,
    ) -> Self {
        debug_assert!((normal.norm() - 1.0).abs() < 1e-5);
        Self {
            symbol,
            normal,
            distance,
            lmk_ids,
            triangle_cluster: TriangleCluster::new(cluster_type),
        }
    }

    pub fn symbol(&self) -> PlaneSymbol {
        self.symbol
    }

    /// Whether two planes describe the same geometric locus within the
    /// given tolerances. Antipodal normals are equivalent (the same plane
    /// with flipped orientation and negated distance), so distances are
    /// compared in absolute value.
    pub fn geometric_equal(
        &self,
        other: &Plane,
        normal_tolerance: f64,
        distance_tolerance: f64,
    ) -> bool {
        geometry::is_normal_around_axis(&self.normal, &other.normal, normal_tolerance)
            && (self.distance.abs() - other.distance.abs()).abs() <= distance_tolerance
    }
}
