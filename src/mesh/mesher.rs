//! Mesh maintenance and plane segmentation.
//!
//! Per frame, the mesher lifts the front-end's 2D Delaunay triangulation
//! into a 3D mesh restricted to the backend's time horizon, then segments
//! horizontal planes and walls from the mesh with histogram mode detection
//! and reconciles them with the planes the backend already knows.

use anyhow::{ensure, Context, Result};
use nalgebra::Vector3;
use opencv::core::{Mat, Point2f, Vec6f};
use tracing::{debug, error, trace, warn};

use crate::frame::{
    Frame, LandmarkIds, PointsWithIdMap, StereoFrame, INVALID_LANDMARK_ID,
};
use crate::geometry::{self, SE3};

use super::config::MesherConfig;
use super::histogram::{Histogram1D, Histogram2D, PeakInfo2D};
use super::mesh_3d::{Mesh3D, Polygon, Vertex, MESH_POLYGON_DIM};
use super::plane::{ClusterType, Plane, PlaneSymbol, TriangleCluster};

/// Vertical direction in the world frame (gravity-aligned).
fn vertical() -> Vector3<f64> {
    Vector3::z()
}

/// Whether all vertices of `polygon` lie within `distance_tolerance` of the
/// plane {x : x . plane_normal = plane_distance}.
pub fn is_polygon_at_distance_from_plane(
    polygon: &Polygon,
    plane_distance: f64,
    plane_normal: &Vector3<f64>,
    distance_tolerance: f64,
) -> bool {
    polygon.iter().all(|vertex| {
        geometry::is_point_at_distance_from_plane(
            &vertex.position,
            plane_distance,
            plane_normal,
            distance_tolerance,
        )
    })
}

/// Composite outlier test for a triangle.
///
/// A triangle is bad when it fails any enabled check: side ratio below
/// `min_ratio_between_largest_and_smallest_side`, camera-frame elongation
/// below `min_elongation_ratio`, or longest side above `max_triangle_side`.
/// A threshold <= 0 (0 and -1 alike) disables its check, which then always
/// passes.
pub fn is_bad_triangle(
    polygon: &Polygon,
    left_camera_pose: &SE3,
    min_ratio_between_largest_and_smallest_side: f64,
    min_elongation_ratio: f64,
    max_triangle_side: f64,
) -> bool {
    let p1 = &polygon[0].position;
    let p2 = &polygon[1].position;
    let p3 = &polygon[2].position;

    let d12 = (p1 - p2).norm();
    let d23 = (p2 - p3).norm();
    let d31 = (p3 - p1).norm();

    let ratio_ok = if min_ratio_between_largest_and_smallest_side > 0.0 {
        geometry::side_ratio(d12, d23, d31).ratio >= min_ratio_between_largest_and_smallest_side
    } else {
        true
    };

    let elongation_ok = if min_elongation_ratio > 0.0 {
        // Elongation is only meaningful in the current camera frame.
        let points_in_camera = [
            left_camera_pose.transform_to(p1),
            left_camera_pose.transform_to(p2),
            left_camera_pose.transform_to(p3),
        ];
        geometry::ratio_between_tangential_and_radial_displacement(&points_in_camera)
            >= min_elongation_ratio
    } else {
        true
    };

    let max_side_ok = if max_triangle_side > 0.0 {
        d12.max(d23).max(d31) <= max_triangle_side
    } else {
        true
    };

    !(ratio_ok && elongation_ok && max_side_ok)
}

/// Indices of `normals` aligned with `axis` within `tolerance`.
pub fn cluster_normals_around_axis(
    axis: &Vector3<f64>,
    normals: &[Vector3<f64>],
    tolerance: f64,
) -> Vec<usize> {
    normals
        .iter()
        .enumerate()
        .filter(|(_, normal)| geometry::is_normal_around_axis(axis, normal, tolerance))
        .map(|(idx, _)| idx)
        .collect()
}

/// Indices of `normals` perpendicular to `axis` within `tolerance`.
pub fn cluster_normals_perpendicular_to_axis(
    axis: &Vector3<f64>,
    normals: &[Vector3<f64>],
    tolerance: f64,
) -> Vec<usize> {
    normals
        .iter()
        .enumerate()
        .filter(|(_, normal)| geometry::is_normal_perpendicular_to_axis(axis, normal, tolerance))
        .map(|(idx, _)| idx)
        .collect()
}

/// The mesh-maintenance and plane-segmentation engine.
///
/// Owns the 3D mesh, both segmentation histograms (reused across frames and
/// reset inside `calculate`) and the monotonic plane-id counter. Single
/// caller, single thread; `&mut self` rules out reentrancy.
pub struct Mesher {
    config: MesherConfig,
    mesh: Mesh3D,
    z_hist: Histogram1D,
    hist_2d: Histogram2D,
    /// Next plane-symbol index. Never decremented, never reset.
    next_plane_index: u64,
}

impl Mesher {
    pub fn new(config: MesherConfig) -> Result<Self> {
        let z_hist = Histogram1D::new(
            config.z_histogram_bins,
            (config.z_histogram_min_range, config.z_histogram_max_range),
        )?;
        let hist_2d = Histogram2D::new(
            (config.hist_2d_theta_bins, config.hist_2d_distance_bins),
            (config.hist_2d_theta_range_min, config.hist_2d_theta_range_max),
            (
                config.hist_2d_distance_range_min,
                config.hist_2d_distance_range_max,
            ),
        )?;
        Ok(Self {
            config,
            mesh: Mesh3D::new(),
            z_hist,
            hist_2d,
            next_plane_index: 0,
        })
    }

    /// The current 3D mesh.
    pub fn mesh(&self) -> &Mesh3D {
        &self.mesh
    }

    /// Runs the per-frame mesh update: optionally augments the landmark
    /// table with stereo-only points, builds the 2D mesh through the
    /// front-end, lifts it to 3D and prunes to the time horizon.
    ///
    /// Returns a drawing of the 2D mesh when one of the visualization flags
    /// is set.
    pub fn update_mesh_3d<S: StereoFrame>(
        &mut self,
        points_with_id_vio: &PointsWithIdMap,
        stereo_frame: &S,
        left_camera_pose: &SE3,
    ) -> Result<Option<Mat>> {
        trace!("starting update_mesh_3d");

        // Stereo landmarks are only added where VIO has none: insertion
        // order matters, VIO points win on shared ids.
        let stereo_augmented = if self.config.add_extra_lmks_from_stereo {
            let mut all = points_with_id_vio.clone();
            Self::append_non_vio_stereo_points(stereo_frame, left_camera_pose, &mut all);
            debug!(
                n_all = all.len(),
                n_vio = points_with_id_vio.len(),
                "landmarks used for the mesh"
            );
            Some(all)
        } else {
            None
        };
        let points_with_id_all = stereo_augmented.as_ref().unwrap_or(points_with_id_vio);

        let mesh_2d = stereo_frame.create_mesh_2d_vio(points_with_id_all)?;
        let mesh_2d_filtered = stereo_frame
            .filter_triangles_with_gradients(&mesh_2d, self.config.max_grad_in_triangle)?;

        let mesh_2d_img = if self.config.visualize_mesh_2d {
            Some(stereo_frame.visualize_mesh_2d_stereo(&mesh_2d, "2D Mesh")?)
        } else if self.config.visualize_mesh_2d_filtered {
            Some(stereo_frame.visualize_mesh_2d_stereo(&mesh_2d_filtered, "2D Mesh Filtered")?)
        } else {
            None
        };

        self.populate_3d_mesh_time_horizon(
            &mesh_2d_filtered,
            points_with_id_all,
            stereo_frame.left_frame(),
            left_camera_pose,
        )?;

        trace!("finished update_mesh_3d");
        Ok(mesh_2d_img)
    }

    /// Inserts stereo-triangulated points into `points`, without overriding
    /// landmarks already present.
    fn append_non_vio_stereo_points<S: StereoFrame>(
        stereo_frame: &S,
        left_camera_pose: &SE3,
        points: &mut PointsWithIdMap,
    ) {
        for (lmk_id, point_in_camera) in stereo_frame.stereo_points_in_camera() {
            if lmk_id == INVALID_LANDMARK_ID {
                continue;
            }
            let point_global = left_camera_pose.transform_point(&point_in_camera);
            points.entry(lmk_id).or_insert(point_global);
        }
    }

    /// Builds the 3D mesh from the 2D triangulation, then prunes and
    /// refreshes it against the time horizon.
    fn populate_3d_mesh_time_horizon<F: Frame>(
        &mut self,
        mesh_2d: &[Vec6f],
        points_with_id_map: &PointsWithIdMap,
        frame: &F,
        left_camera_pose: &SE3,
    ) -> Result<()> {
        trace!("starting populate_3d_mesh");
        self.populate_3d_mesh(mesh_2d, points_with_id_map, frame, left_camera_pose)?;
        trace!("finished populate_3d_mesh");

        trace!("starting update_polygon_mesh_to_time_horizon");
        self.update_polygon_mesh_to_time_horizon(
            points_with_id_map,
            left_camera_pose,
            self.config.reduce_mesh_to_time_horizon,
        )?;
        trace!("finished update_polygon_mesh_to_time_horizon");
        Ok(())
    }

    /// Lifts each 2D triangle into 3D. A pixel without a landmark id is a
    /// hard error; a landmark missing from the table drops the triangle;
    /// survivors must pass the triangle filter.
    fn populate_3d_mesh<F: Frame>(
        &mut self,
        mesh_2d: &[Vec6f],
        points_with_id_map: &PointsWithIdMap,
        frame: &F,
        left_camera_pose: &SE3,
    ) -> Result<()> {
        for triangle_2d in mesh_2d {
            let Some(v1) = Self::vertex_from_pixel(triangle_2d, 0, frame, points_with_id_map)?
            else {
                continue;
            };
            let Some(v2) = Self::vertex_from_pixel(triangle_2d, 1, frame, points_with_id_map)?
            else {
                continue;
            };
            let Some(v3) = Self::vertex_from_pixel(triangle_2d, 2, frame, points_with_id_map)?
            else {
                continue;
            };
            let polygon: Polygon = [v1, v2, v3];

            if !is_bad_triangle(
                &polygon,
                left_camera_pose,
                self.config.min_ratio_btw_largest_smallest_side,
                self.config.min_elongation_ratio,
                self.config.max_triangle_side,
            ) {
                self.mesh.add_polygon_to_mesh(&polygon);
            }
        }
        Ok(())
    }

    /// Resolves vertex `j` of a 2D triangle to a landmark and its world
    /// position. `Ok(None)` when the landmark is outside the table (the
    /// whole triangle is then abandoned).
    fn vertex_from_pixel<F: Frame>(
        triangle_2d: &Vec6f,
        j: usize,
        frame: &F,
        points_with_id_map: &PointsWithIdMap,
    ) -> Result<Option<Vertex>> {
        debug_assert!(j < MESH_POLYGON_DIM);
        let pixel = Point2f::new(triangle_2d[2 * j], triangle_2d[2 * j + 1]);
        let lmk_id = frame.find_lmk_id_from_pixel(pixel);
        ensure!(
            lmk_id != INVALID_LANDMARK_ID,
            "no landmark id for pixel ({}, {})",
            pixel.x,
            pixel.y
        );
        match points_with_id_map.get(&lmk_id) {
            Some(point) => Ok(Some(Vertex::new(lmk_id, *point))),
            None => {
                error!(
                    lmk_id,
                    "landmark could not be found in the time horizon, but it should have been"
                );
                Ok(None)
            }
        }
    }

    /// Walks every polygon, refreshing vertex positions with the newest
    /// landmark coordinates and (when `reduce_mesh_to_time_horizon`)
    /// dropping polygons with out-of-horizon landmarks. Survivors are
    /// re-filtered with the elongation check disabled, since elongation is
    /// only defined for landmarks seen in the current frame. The live mesh
    /// is replaced wholesale at the end.
    fn update_polygon_mesh_to_time_horizon(
        &mut self,
        points_with_id_map: &PointsWithIdMap,
        left_camera_pose: &SE3,
        reduce_mesh_to_time_horizon: bool,
    ) -> Result<()> {
        let mut mesh_output = Mesh3D::new();

        for mut polygon in self.mesh.polygons() {
            let mut save_polygon = true;
            for vertex in polygon.iter_mut() {
                match points_with_id_map.get(&vertex.lmk_id) {
                    Some(point) => vertex.position = *point,
                    None => {
                        if reduce_mesh_to_time_horizon {
                            save_polygon = false;
                            break;
                        }
                    }
                }
            }

            if save_polygon
                && !is_bad_triangle(
                    &polygon,
                    left_camera_pose,
                    self.config.min_ratio_btw_largest_smallest_side,
                    -1.0,
                    self.config.max_triangle_side,
                )
            {
                mesh_output.add_polygon_to_mesh(&polygon);
            }
        }

        self.mesh = mesh_output;
        Ok(())
    }

    /// Rebuilds the mesh dropping every triangle failing the filter.
    pub fn filter_out_bad_triangles(
        &mut self,
        left_camera_pose: &SE3,
        min_ratio_between_largest_and_smallest_side: f64,
        min_elongation_ratio: f64,
        max_triangle_side: f64,
    ) {
        let mut mesh_output = Mesh3D::new();
        for polygon in self.mesh.polygons() {
            if !is_bad_triangle(
                &polygon,
                left_camera_pose,
                min_ratio_between_largest_and_smallest_side,
                min_elongation_ratio,
                max_triangle_side,
            ) {
                mesh_output.add_polygon_to_mesh(&polygon);
            }
        }
        self.mesh = mesh_output;
    }

    /// World-frame unit normal of every face. A degenerate face is an
    /// error here, unlike in segmentation where it is skipped.
    pub fn calculate_normals(&self) -> Result<Vec<Vector3<f64>>> {
        let mut normals = Vec::with_capacity(self.mesh.number_of_polygons());
        for (i, polygon) in self.mesh.polygons().enumerate() {
            let normal = geometry::triangle_normal(
                &polygon[0].position,
                &polygon[1].position,
                &polygon[2].position,
            )
            .with_context(|| format!("degenerate face {i} in mesh"))?;
            normals.push(normal);
        }
        Ok(normals)
    }

    /// Re-populates the seed planes from the mesh, segments new planes from
    /// the unclustered remainder, associates them against the seeds, and
    /// appends the non-associated ones (with consistent landmark ids) to
    /// `planes`.
    pub fn cluster_planes_from_mesh(
        &mut self,
        planes: &mut Vec<Plane>,
        points_with_id_vio: &PointsWithIdMap,
    ) -> Result<()> {
        trace!("starting plane segmentation");
        let new_planes = self.segment_planes_in_mesh(planes, points_with_id_vio)?;
        trace!("finished plane segmentation");

        trace!("starting plane association");
        let mut new_non_associated_planes = self.associate_planes(new_planes, planes);
        trace!("finished plane association");

        if !new_non_associated_planes.is_empty() {
            // New planes come out of the histograms without landmark ids;
            // backfill them with another mesh walk before exposing them.
            self.update_planes_lmk_ids_from_mesh(
                &mut new_non_associated_planes,
                self.config.normal_tolerance_polygon_plane_association,
                self.config.distance_tolerance_polygon_plane_association,
                points_with_id_vio,
            )?;
            planes.extend(new_non_associated_planes);
        } else {
            trace!("no new non-associated planes to update");
        }
        Ok(())
    }

    /// Single mesh walk: clusters polygons onto the seed planes and
    /// accumulates histogram votes for the rest, then segments new planes
    /// from the histograms.
    fn segment_planes_in_mesh(
        &mut self,
        seed_planes: &mut [Plane],
        points_with_id_vio: &PointsWithIdMap,
    ) -> Result<Vec<Plane>> {
        // Seed planes are re-hydrated from backend state each frame; their
        // clusters are rebuilt from scratch.
        for seed_plane in seed_planes.iter_mut() {
            seed_plane.lmk_ids.clear();
            seed_plane.triangle_cluster.triangle_ids.clear();
        }

        let normal_tolerance = self.config.normal_tolerance_polygon_plane_association;
        let distance_tolerance = self.config.distance_tolerance_polygon_plane_association;
        let vertical = vertical();

        let mut z_components: Vec<f64> = Vec::new();
        let mut walls: Vec<(f64, f64)> = Vec::new();

        for (i, polygon) in self.mesh.polygons().enumerate() {
            let p1 = polygon[0].position;
            let p2 = polygon[1].position;
            let p3 = polygon[2].position;

            // Normals are in the world frame of reference.
            let Some(triangle_normal) = geometry::triangle_normal(&p1, &p2, &p3) else {
                warn!(polygon = i, "skipping degenerate polygon in segmentation");
                continue;
            };

            let is_polygon_on_a_plane = self.update_planes_lmk_ids_from_polygon(
                seed_planes,
                &polygon,
                i,
                &triangle_normal,
                normal_tolerance,
                distance_tolerance,
                points_with_id_vio,
            );

            let use_polygon = !self.config.only_use_non_clustered_points || !is_polygon_on_a_plane;

            // Vertical-normal polygons vote with their z coordinates for
            // horizontal-plane detection.
            if use_polygon
                && geometry::is_normal_around_axis(
                    &vertical,
                    &triangle_normal,
                    self.config.normal_tolerance_horizontal_surface,
                )
            {
                z_components.extend([p1.z, p2.z, p3.z]);
            }

            // Horizontal-normal polygons vote with (theta, distance) for
            // wall detection.
            if use_polygon
                && geometry::is_normal_perpendicular_to_axis(
                    &vertical,
                    &triangle_normal,
                    self.config.normal_tolerance_walls,
                )
            {
                let Some(theta) = geometry::longitude(&triangle_normal, &vertical) else {
                    warn!(polygon = i, "wall normal with undefined longitude");
                    continue;
                };
                let distance = p1.dot(&triangle_normal);
                // A negative theta describes the same wall as theta + pi
                // with flipped distance; normalize so each wall votes in a
                // single bin.
                let (theta, distance) = if theta < 0.0 {
                    (theta + std::f64::consts::PI, -distance)
                } else {
                    (theta, distance)
                };
                walls.push((theta, distance));
            }
        }

        debug!(
            n_wall_votes = walls.len(),
            n_z_votes = z_components.len(),
            "histogram votes accumulated"
        );

        self.segment_new_planes(&z_components, &walls)
    }

    /// Appends the polygon's landmark ids and triangle index to every plane
    /// it lies on. A polygon may be clustered into multiple planes.
    #[allow(clippy::too_many_arguments)]
    fn update_planes_lmk_ids_from_polygon(
        &self,
        planes: &mut [Plane],
        polygon: &Polygon,
        triangle_id: usize,
        triangle_normal: &Vector3<f64>,
        normal_tolerance: f64,
        distance_tolerance: f64,
        points_with_id_vio: &PointsWithIdMap,
    ) -> bool {
        let mut is_polygon_on_a_plane = false;
        for plane in planes.iter_mut() {
            if geometry::is_normal_around_axis(&plane.normal, triangle_normal, normal_tolerance)
                && is_polygon_at_distance_from_plane(
                    polygon,
                    plane.distance,
                    &plane.normal,
                    distance_tolerance,
                )
            {
                self.append_lmk_ids_of_polygon(polygon, &mut plane.lmk_ids, points_with_id_vio);
                plane.triangle_cluster.triangle_ids.push(triangle_id);
                is_polygon_on_a_plane = true;
            }
        }
        is_polygon_on_a_plane
    }

    /// Re-walks the mesh to populate the landmark ids and triangle clusters
    /// of `planes` with the polygon-on-plane predicate.
    fn update_planes_lmk_ids_from_mesh(
        &self,
        planes: &mut [Plane],
        normal_tolerance: f64,
        distance_tolerance: f64,
        points_with_id_vio: &PointsWithIdMap,
    ) -> Result<()> {
        for (i, polygon) in self.mesh.polygons().enumerate() {
            let Some(triangle_normal) = geometry::triangle_normal(
                &polygon[0].position,
                &polygon[1].position,
                &polygon[2].position,
            ) else {
                warn!(polygon = i, "skipping degenerate polygon");
                continue;
            };
            self.update_planes_lmk_ids_from_polygon(
                planes,
                &polygon,
                i,
                &triangle_normal,
                normal_tolerance,
                distance_tolerance,
                points_with_id_vio,
            );
        }
        Ok(())
    }

    /// Segments horizontal planes from the z votes and walls from the
    /// (theta, distance) votes. Every new plane gets a fresh 'P' symbol
    /// from the monotonic counter.
    fn segment_new_planes(
        &mut self,
        z_components: &[f64],
        walls: &[(f64, f64)],
    ) -> Result<Vec<Plane>> {
        let mut new_segmented_planes = Vec::new();
        self.segment_horizontal_planes(&mut new_segmented_planes, z_components)?;
        self.segment_walls(&mut new_segmented_planes, walls)?;
        Ok(new_segmented_planes)
    }

    fn next_plane_symbol(&mut self) -> PlaneSymbol {
        let symbol = PlaneSymbol::new('P', self.next_plane_index);
        self.next_plane_index += 1;
        symbol
    }

    /// Peak-detects the z histogram and emits one horizontal plane per
    /// selected peak.
    fn segment_horizontal_planes(
        &mut self,
        horizontal_planes: &mut Vec<Plane>,
        z_components: &[f64],
    ) -> Result<()> {
        self.z_hist.calculate(z_components)?;
        let mut peaks = self.z_hist.local_maxima_1d(
            self.config.z_histogram_gaussian_kernel_size,
            self.config.z_histogram_window_size,
            self.config.z_histogram_peak_per,
            self.config.z_histogram_min_support,
        )?;
        debug!(n_peaks = peaks.len(), "peaks in z histogram");

        // Remove duplicates and, for peaks that are too close, keep the one
        // with maximum support. Peaks arrive ordered by bin.
        let min_separation = self.config.z_histogram_min_separation;
        let mut idx = 1;
        while idx < peaks.len() {
            if peaks[idx] == peaks[idx - 1] {
                warn!(bin = peaks[idx].pos, "deleting repeated peak");
                peaks.remove(idx);
                continue;
            }
            if min_separation >= 0.0
                && (peaks[idx].value - peaks[idx - 1].value).abs() < min_separation
            {
                if peaks[idx - 1].support < peaks[idx].support {
                    warn!(bin = peaks[idx - 1].pos, "deleting peak with less support");
                    peaks.remove(idx - 1);
                } else {
                    warn!(bin = peaks[idx].pos, "deleting too close peak");
                    peaks.remove(idx);
                }
                // Re-compare the survivor against its new neighbor.
                if idx > 1 {
                    idx -= 1;
                }
                continue;
            }
            idx += 1;
        }

        // Pick peaks in order of maximum support.
        for _ in 0..self.config.z_histogram_max_number_of_peaks_to_select {
            let Some(best) = peaks
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.support.total_cmp(&b.support))
                .map(|(i, _)| i)
            else {
                trace!("no more peaks available");
                break;
            };
            let peak = peaks.remove(best);

            let plane_symbol = self.next_plane_symbol();
            debug!(
                symbol = %plane_symbol,
                distance = peak.value,
                support = peak.support,
                "segmented a horizontal plane"
            );
            horizontal_planes.push(Plane::new(
                plane_symbol,
                vertical(),
                peak.value,
                LandmarkIds::new(),
                ClusterType::Horizontal,
            ));
        }
        Ok(())
    }

    /// Peak-detects the 2D histogram and emits one wall plane per peak,
    /// with normal (cos theta, sin theta, 0).
    fn segment_walls(&mut self, wall_planes: &mut Vec<Plane>, walls: &[(f64, f64)]) -> Result<()> {
        self.hist_2d.calculate(walls)?;
        let peaks: Vec<PeakInfo2D> = self.hist_2d.local_maxima_2d(
            self.config.hist_2d_gaussian_kernel_size,
            self.config.hist_2d_nr_of_local_max,
            self.config.hist_2d_min_support,
            self.config.hist_2d_min_dist_btw_local_max,
        )?;
        debug!(n_peaks = peaks.len(), "peaks in 2D histogram");

        for peak in peaks {
            let plane_theta = peak.x_value;
            let plane_distance = peak.y_value;
            let plane_normal = Vector3::new(plane_theta.cos(), plane_theta.sin(), 0.0);

            let plane_symbol = self.next_plane_symbol();
            debug!(
                symbol = %plane_symbol,
                theta = plane_theta,
                distance = plane_distance,
                support = peak.support,
                "segmented a wall plane"
            );
            wall_planes.push(Plane::new(
                plane_symbol,
                plane_normal,
                plane_distance,
                LandmarkIds::new(),
                ClusterType::Wall,
            ));
        }
        Ok(())
    }

    /// Matches segmented planes against the backend planes; returns the
    /// ones that could not be associated, symbols untouched.
    ///
    /// A backend plane is used at most once, unless double association is
    /// enabled; a rejected duplicate keeps searching the remaining backend
    /// planes.
    fn associate_planes(&self, segmented_planes: Vec<Plane>, planes: &[Plane]) -> Vec<Plane> {
        if planes.is_empty() {
            debug!(
                n_segmented = segmented_planes.len(),
                "no planes in backend, skipping data association"
            );
            return segmented_planes;
        }
        if segmented_planes.is_empty() {
            warn!("no segmented planes");
        }

        let normal_tolerance = self.config.normal_tolerance_plane_plane_association;
        let distance_tolerance = self.config.distance_tolerance_plane_plane_association;

        let mut non_associated_planes = Vec::new();
        let mut associated_plane_ids: Vec<u64> = Vec::new();
        for segmented_plane in segmented_planes {
            let mut is_segmented_plane_associated = false;
            for plane_backend in planes {
                if !plane_backend.geometric_equal(
                    &segmented_plane,
                    normal_tolerance,
                    distance_tolerance,
                ) {
                    continue;
                }
                let backend_plane_index = plane_backend.symbol().index;
                if !associated_plane_ids.contains(&backend_plane_index) {
                    trace!(
                        backend = %plane_backend.symbol(),
                        segmented = %segmented_plane.symbol(),
                        "associated planes"
                    );
                    associated_plane_ids.push(backend_plane_index);
                    is_segmented_plane_associated = true;
                    break;
                }
                error!(
                    backend = %plane_backend.symbol(),
                    segmented = %segmented_plane.symbol(),
                    "double plane association of backend plane"
                );
                if self.config.do_double_association {
                    is_segmented_plane_associated = true;
                    break;
                }
                // Keep searching for another possible backend plane for
                // this segmented plane.
            }

            if !is_segmented_plane_associated {
                debug!(
                    plane = %segmented_plane.symbol(),
                    "adding segmented plane as a new plane for the backend"
                );
                non_associated_planes.push(segmented_plane);
            }
        }
        non_associated_planes
    }

    /// Landmark ids of every triangle in `cluster`, deduplicated. When
    /// stereo landmarks augment the mesh, only ids inside the VIO time
    /// horizon are emitted.
    pub fn extract_lmk_ids_from_triangle_cluster(
        &self,
        triangle_cluster: &TriangleCluster,
        points_with_id_vio: &PointsWithIdMap,
    ) -> Result<LandmarkIds> {
        let mut lmk_ids = LandmarkIds::new();
        for &polygon_idx in &triangle_cluster.triangle_ids {
            let polygon = self
                .mesh
                .get_polygon(polygon_idx)
                .with_context(|| format!("polygon {polygon_idx} is not in the mesh"))?;
            self.append_lmk_ids_of_polygon(&polygon, &mut lmk_ids, points_with_id_vio);
        }
        Ok(lmk_ids)
    }

    /// Multi-cluster variant of
    /// [`Self::extract_lmk_ids_from_triangle_cluster`].
    pub fn extract_lmk_ids_from_vector_of_triangle_clusters(
        &self,
        triangle_clusters: &[TriangleCluster],
        points_with_id_vio: &PointsWithIdMap,
    ) -> Result<LandmarkIds> {
        let mut lmk_ids = LandmarkIds::new();
        for triangle_cluster in triangle_clusters {
            let cluster_lmk_ids =
                self.extract_lmk_ids_from_triangle_cluster(triangle_cluster, points_with_id_vio)?;
            for lmk_id in cluster_lmk_ids {
                if !lmk_ids.contains(&lmk_id) {
                    lmk_ids.push(lmk_id);
                }
            }
        }
        Ok(lmk_ids)
    }

    /// Appends the polygon's landmark ids to `lmk_ids`, skipping ids
    /// already present. With stereo-augmented meshes only ids in the VIO
    /// time horizon are appended.
    fn append_lmk_ids_of_polygon(
        &self,
        polygon: &Polygon,
        lmk_ids: &mut LandmarkIds,
        points_with_id_vio: &PointsWithIdMap,
    ) {
        for vertex in polygon {
            if lmk_ids.contains(&vertex.lmk_id) {
                continue;
            }
            if self.config.add_extra_lmks_from_stereo
                && !points_with_id_vio.contains_key(&vertex.lmk_id)
            {
                continue;
            }
            lmk_ids.push(vertex.lmk_id);
        }
    }

    /// Vertex matrix for downstream visualization.
    pub fn get_vertices_mesh(&self) -> Result<Mat> {
        self.mesh.convert_vertices_mesh_to_mat()
    }

    /// Polygon matrix for downstream visualization.
    pub fn get_polygons_mesh(&self) -> Result<Mat> {
        self.mesh.convert_polygons_mesh_to_mat()
    }
}
