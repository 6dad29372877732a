//! Front-end contracts consumed by the mesher: landmark identifiers and
//! the per-frame interfaces that supply 2D triangulations and stereo points.

use std::collections::HashMap;

use anyhow::Result;
use nalgebra::Vector3;
use opencv::core::{Mat, Point2f, Vec6f};

/// Stable integer identifier of a tracked 3D point across frames.
pub type LandmarkId = i64;

/// Sentinel returned by [`Frame::find_lmk_id_from_pixel`] when a pixel has
/// no tracked landmark.
pub const INVALID_LANDMARK_ID: LandmarkId = -1;

/// Ordered list of landmark ids.
pub type LandmarkIds = Vec<LandmarkId>;

/// Landmark positions in the world frame, keyed by landmark id.
///
/// When built from the backend optimizer this holds exactly the landmarks in
/// the current time horizon.
pub type PointsWithIdMap = HashMap<LandmarkId, Vector3<f64>>;

/// A single (left) camera frame with tracked keypoints.
pub trait Frame {
    /// Returns the landmark id tracked at `pixel`, or
    /// [`INVALID_LANDMARK_ID`] if the pixel is not a tracked keypoint.
    fn find_lmk_id_from_pixel(&self, pixel: Point2f) -> LandmarkId;
}

/// A rectified stereo frame able to triangulate its keypoints in 2D and 3D.
///
/// 2D mesh triangles are sextuples `(x1, y1, x2, y2, x3, y3)` of image-plane
/// vertex coordinates, the format produced by OpenCV's Subdiv2D Delaunay
/// triangulation.
pub trait StereoFrame {
    type Left: Frame;

    fn left_frame(&self) -> &Self::Left;

    /// Builds a 2D Delaunay triangulation over the keypoints whose landmark
    /// ids appear in `points_with_id`.
    fn create_mesh_2d_vio(&self, points_with_id: &PointsWithIdMap) -> Result<Vec<Vec6f>>;

    /// Drops triangles spanning an image gradient larger than `max_grad`.
    /// A `max_grad` <= 0 disables the filter and returns the input unchanged.
    fn filter_triangles_with_gradients(
        &self,
        mesh_2d: &[Vec6f],
        max_grad: f64,
    ) -> Result<Vec<Vec6f>>;

    /// Draws the 2D mesh over the left image for debugging.
    fn visualize_mesh_2d_stereo(&self, mesh_2d: &[Vec6f], title: &str) -> Result<Mat>;

    /// Stereo-triangulated keypoints with a valid right-image match, as
    /// (landmark id, 3D point in the left-camera frame).
    fn stereo_points_in_camera(&self) -> Vec<(LandmarkId, Vector3<f64>)>;
}
