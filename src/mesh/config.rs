//! Mesher configuration.

use serde::{Deserialize, Serialize};

/// Every tunable of the mesher, accepted by value at construction.
///
/// Defaults are the production values. Triangle-filter thresholds <= 0
/// disable the corresponding check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesherConfig {
    /// Add stereo-only triangulated landmarks to the mesh. Computationally
    /// expensive.
    pub add_extra_lmks_from_stereo: bool,
    /// Drop polygons whose landmarks fell out of the optimization's time
    /// horizon.
    pub reduce_mesh_to_time_horizon: bool,
    /// Return a drawing of the unfiltered 2D mesh from `update_mesh_3d`.
    pub visualize_mesh_2d: bool,
    /// Return a drawing of the gradient-filtered 2D mesh instead.
    pub visualize_mesh_2d_filtered: bool,

    /// Maximum allowed image gradient inside a 2D triangle, applied by the
    /// front-end filter. <= 0 disables.
    pub max_grad_in_triangle: f64,
    /// Minimum ratio between the smallest and largest triangle side.
    pub min_ratio_btw_largest_smallest_side: f64,
    /// Minimum tangential/radial elongation ratio in the camera frame.
    pub min_elongation_ratio: f64,
    /// Maximum allowed triangle side length.
    pub max_triangle_side: f64,

    /// Tolerance for a polygon normal and a plane normal to be considered
    /// equal (0.011 === 8.5 deg. aperture).
    pub normal_tolerance_polygon_plane_association: f64,
    /// Tolerance for polygon vertices to be considered close to a plane.
    pub distance_tolerance_polygon_plane_association: f64,
    /// Normal tolerance for a plane to be associated to another plane.
    pub normal_tolerance_plane_plane_association: f64,
    /// Distance tolerance for a plane to be associated to another plane.
    pub distance_tolerance_plane_plane_association: f64,
    /// Allow a backend plane to be associated with multiple segmented
    /// planes. Otherwise the segmented plane keeps searching for another
    /// backend plane.
    pub do_double_association: bool,

    /// Normal tolerance for a polygon to be considered parallel to the
    /// ground.
    pub normal_tolerance_horizontal_surface: f64,
    /// Normal tolerance for a polygon to be considered perpendicular to the
    /// vertical direction.
    pub normal_tolerance_walls: f64,
    /// Only feed the histograms with polygons not already clustered in a
    /// plane.
    pub only_use_non_clustered_points: bool,

    pub z_histogram_bins: usize,
    pub z_histogram_min_range: f64,
    pub z_histogram_max_range: f64,
    /// Sliding-window size for local-maximum detection.
    pub z_histogram_window_size: usize,
    /// Extra peaks are only kept when at least this fraction of the
    /// strongest peak.
    pub z_histogram_peak_per: f64,
    /// Minimum votes for a z value to be considered a peak.
    pub z_histogram_min_support: f64,
    /// Peaks closer than this keep only the better-supported one; < 0
    /// disables the collapse.
    pub z_histogram_min_separation: f64,
    /// Gaussian kernel for z-histogram smoothing; must be odd.
    pub z_histogram_gaussian_kernel_size: i32,
    pub z_histogram_max_number_of_peaks_to_select: usize,

    /// Gaussian kernel for 2D-histogram blurring; must be odd.
    pub hist_2d_gaussian_kernel_size: i32,
    pub hist_2d_nr_of_local_max: usize,
    pub hist_2d_min_support: f64,
    /// Minimum distance, in bins, between 2D local maxima.
    pub hist_2d_min_dist_btw_local_max: f64,
    pub hist_2d_theta_bins: usize,
    pub hist_2d_distance_bins: usize,
    pub hist_2d_theta_range_min: f64,
    pub hist_2d_theta_range_max: f64,
    pub hist_2d_distance_range_min: f64,
    pub hist_2d_distance_range_max: f64,
}

impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            add_extra_lmks_from_stereo: false,
            reduce_mesh_to_time_horizon: true,
            visualize_mesh_2d: false,
            visualize_mesh_2d_filtered: false,

            max_grad_in_triangle: -1.0,
            min_ratio_btw_largest_smallest_side: 0.5,
            min_elongation_ratio: 0.5,
            max_triangle_side: 0.5,

            normal_tolerance_polygon_plane_association: 0.011,
            distance_tolerance_polygon_plane_association: 0.10,
            normal_tolerance_plane_plane_association: 0.011,
            distance_tolerance_plane_plane_association: 0.20,
            do_double_association: true,

            normal_tolerance_horizontal_surface: 0.011,
            normal_tolerance_walls: 0.0165,
            only_use_non_clustered_points: true,

            z_histogram_bins: 512,
            z_histogram_min_range: -0.75,
            z_histogram_max_range: 3.0,
            z_histogram_window_size: 3,
            z_histogram_peak_per: 0.5,
            z_histogram_min_support: 50.0,
            z_histogram_min_separation: 0.1,
            z_histogram_gaussian_kernel_size: 5,
            z_histogram_max_number_of_peaks_to_select: 3,

            hist_2d_gaussian_kernel_size: 3,
            hist_2d_nr_of_local_max: 2,
            hist_2d_min_support: 20.0,
            hist_2d_min_dist_btw_local_max: 5.0,
            hist_2d_theta_bins: 40,
            hist_2d_distance_bins: 40,
            hist_2d_theta_range_min: 0.0,
            hist_2d_theta_range_max: std::f64::consts::PI,
            hist_2d_distance_range_min: -6.0,
            hist_2d_distance_range_max: 6.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_values() {
        let config = MesherConfig::default();
        assert!(config.reduce_mesh_to_time_horizon);
        assert!(!config.add_extra_lmks_from_stereo);
        assert_eq!(config.z_histogram_bins, 512);
        assert_eq!(config.hist_2d_theta_bins, 40);
        assert!(config.max_grad_in_triangle < 0.0);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: MesherConfig =
            serde_json::from_str(r#"{"max_triangle_side": 2.0}"#).unwrap();
        assert_eq!(config.max_triangle_side, 2.0);
        assert_eq!(config.z_histogram_bins, 512);
    }
}
