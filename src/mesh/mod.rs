//! 3D mesh maintenance and plane segmentation.

pub mod config;
pub mod histogram;
pub mod mesh_3d;
pub mod mesher;
pub mod plane;

pub use config::MesherConfig;
pub use histogram::{Histogram1D, Histogram2D, PeakInfo, PeakInfo2D};
pub use mesh_3d::{Mesh3D, Polygon, Vertex, MESH_POLYGON_DIM};
pub use mesher::{
    cluster_normals_around_axis, cluster_normals_perpendicular_to_axis, is_bad_triangle,
    is_polygon_at_distance_from_plane, Mesher,
};
pub use plane::{ClusterType, Plane, PlaneSymbol, TriangleCluster};
