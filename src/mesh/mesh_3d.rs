//! Indexed triangular 3D mesh with stable landmark-keyed vertices.
//!
//! Vertex slots decouple polygon topology from landmark positions, so the
//! time-horizon update can refresh positions without rebuilding polygons.

use std::collections::HashMap;

use anyhow::{bail, Result};
use nalgebra::Vector3;
use opencv::core::{Mat, Scalar, CV_32F, CV_32S};
use opencv::prelude::*;

use crate::frame::LandmarkId;

/// Number of vertices per mesh face. The mesh is triangular throughout.
pub const MESH_POLYGON_DIM: usize = 3;

/// A mesh vertex: landmark identity plus its current world-frame position.
///
/// Identity is the landmark id and never changes; the position is
/// overwritten whenever fresher landmark coordinates arrive.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub lmk_id: LandmarkId,
    pub position: Vector3<f64>,
}

impl Vertex {
    pub fn new(lmk_id: LandmarkId, position: Vector3<f64>) -> Self {
        Self { lmk_id, position }
    }
}

/// A triangular face, ordered.
pub type Polygon = [Vertex; MESH_POLYGON_DIM];

/// Indexed triangular mesh keyed by landmark identity.
///
/// Each landmark owns exactly one vertex slot; polygons reference slots.
/// Faces are not de-duplicated: adding the same triangle twice stores it
/// twice (and refreshes the shared slot positions).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh3D {
    slot_by_lmk_id: HashMap<LandmarkId, usize>,
    lmk_ids: Vec<LandmarkId>,
    positions: Vec<Vector3<f64>>,
    polygons: Vec<[usize; MESH_POLYGON_DIM]>,
}

impl Mesh3D {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a polygon. Vertices of not-yet-seen landmarks get fresh
    /// slots; known landmarks have their slot position overwritten with the
    /// supplied value.
    pub fn add_polygon_to_mesh(&mut self, polygon: &Polygon) {
        let mut slots = [0usize; MESH_POLYGON_DIM];
        for (slot, vertex) in slots.iter_mut().zip(polygon.iter()) {
            *slot = self.upsert_vertex(vertex);
        }
        self.polygons.push(slots);
    }

    fn upsert_vertex(&mut self, vertex: &Vertex) -> usize {
        match self.slot_by_lmk_id.get(&vertex.lmk_id) {
            Some(&slot) => {
                self.positions[slot] = vertex.position;
                slot
            }
            None => {
                let slot = self.lmk_ids.len();
                self.slot_by_lmk_id.insert(vertex.lmk_id, slot);
                self.lmk_ids.push(vertex.lmk_id);
                self.positions.push(vertex.position);
                slot
            }
        }
    }

    /// Returns polygon `idx` as a freshly-built vertex triple carrying the
    /// current slot positions, or `None` past the end of the mesh.
    pub fn get_polygon(&self, idx: usize) -> Option<Polygon> {
        let slots = self.polygons.get(idx)?;
        Some([
            self.vertex_at(slots[0]),
            self.vertex_at(slots[1]),
            self.vertex_at(slots[2]),
        ])
    }

    fn vertex_at(&self, slot: usize) -> Vertex {
        Vertex::new(self.lmk_ids[slot], self.positions[slot])
    }

    /// Walks all faces in insertion order.
    pub fn polygons(&self) -> impl Iterator<Item = Polygon> + '_ {
        self.polygons.iter().map(move |slots| {
            [
                self.vertex_at(slots[0]),
                self.vertex_at(slots[1]),
                self.vertex_at(slots[2]),
            ]
        })
    }

    pub fn number_of_polygons(&self) -> usize {
        self.polygons.len()
    }

    pub fn number_of_vertices(&self) -> usize {
        self.lmk_ids.len()
    }

    /// Vertices per face; fixed to 3.
    pub fn polygon_dimension(&self) -> usize {
        MESH_POLYGON_DIM
    }

    /// Overwrites the position slot of `lmk_id`. Errors if the landmark has
    /// no vertex slot in the mesh.
    pub fn set_vertex_position(
        &mut self,
        lmk_id: LandmarkId,
        position: Vector3<f64>,
    ) -> Result<()> {
        match self.slot_by_lmk_id.get(&lmk_id) {
            Some(&slot) => {
                self.positions[slot] = position;
                Ok(())
            }
            None => bail!("landmark {lmk_id} has no vertex slot in the mesh"),
        }
    }

    /// Vertex positions as an N x 3 CV_32F matrix, one row per slot, for
    /// downstream visualization.
    pub fn convert_vertices_mesh_to_mat(&self) -> Result<Mat> {
        let mut mat = Mat::new_rows_cols_with_default(
            self.positions.len() as i32,
            3,
            CV_32F,
            Scalar::all(0.0),
        )?;
        for (i, p) in self.positions.iter().enumerate() {
            *mat.at_2d_mut::<f32>(i as i32, 0)? = p.x as f32;
            *mat.at_2d_mut::<f32>(i as i32, 1)? = p.y as f32;
            *mat.at_2d_mut::<f32>(i as i32, 2)? = p.z as f32;
        }
        Ok(mat)
    }

    /// Faces as an M x 4 CV_32S matrix of rows `[3, slot1, slot2, slot3]`,
    /// the polygon layout expected by the visualizer.
    pub fn convert_polygons_mesh_to_mat(&self) -> Result<Mat> {
        let mut mat = Mat::new_rows_cols_with_default(
            self.polygons.len() as i32,
            4,
            CV_32S,
            Scalar::all(0.0),
        )?;
        for (i, slots) in self.polygons.iter().enumerate() {
            *mat.at_2d_mut::<i32>(i as i32, 0)? = MESH_POLYGON_DIM as i32;
            for (j, &slot) in slots.iter().enumerate() {
                *mat.at_2d_mut::<i32>(i as i32, (j + 1) as i32)? = slot as i32;
            }
        }
        Ok(mat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle(ids: [LandmarkId; 3], positions: [[f64; 3]; 3]) -> Polygon {
        [
            Vertex::new(ids[0], Vector3::from(positions[0])),
            Vertex::new(ids[1], Vector3::from(positions[1])),
            Vertex::new(ids[2], Vector3::from(positions[2])),
        ]
    }

    #[test]
    fn test_add_polygon_allocates_one_slot_per_landmark() {
        let mut mesh = Mesh3D::new();
        mesh.add_polygon_to_mesh(&triangle(
            [1, 2, 3],
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        ));
        mesh.add_polygon_to_mesh(&triangle(
            [2, 3, 4],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
        ));

        // Landmarks 2 and 3 are shared: 4 slots, 2 faces.
        assert_eq!(mesh.number_of_vertices(), 4);
        assert_eq!(mesh.number_of_polygons(), 2);
        assert_eq!(mesh.polygon_dimension(), 3);
    }

    #[test]
    fn test_re_adding_polygon_updates_positions_not_slots() {
        let mut mesh = Mesh3D::new();
        mesh.add_polygon_to_mesh(&triangle(
            [1, 2, 3],
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        ));
        mesh.add_polygon_to_mesh(&triangle(
            [1, 2, 3],
            [[0.5, 0.0, 0.0], [1.5, 0.0, 0.0], [0.5, 1.0, 0.0]],
        ));

        // Duplicate faces are kept; slots are shared and refreshed.
        assert_eq!(mesh.number_of_vertices(), 3);
        assert_eq!(mesh.number_of_polygons(), 2);
        let first = mesh.get_polygon(0).unwrap();
        assert_relative_eq!(
            first[0].position,
            Vector3::new(0.5, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_get_polygon_out_of_range() {
        let mesh = Mesh3D::new();
        assert!(mesh.get_polygon(0).is_none());
    }

    #[test]
    fn test_set_vertex_position() {
        let mut mesh = Mesh3D::new();
        mesh.add_polygon_to_mesh(&triangle(
            [1, 2, 3],
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        ));

        mesh.set_vertex_position(2, Vector3::new(9.0, 9.0, 9.0)).unwrap();
        let polygon = mesh.get_polygon(0).unwrap();
        assert_relative_eq!(
            polygon[1].position,
            Vector3::new(9.0, 9.0, 9.0),
            epsilon = 1e-12
        );

        assert!(mesh.set_vertex_position(99, Vector3::zeros()).is_err());
    }

    #[test]
    fn test_matrix_views() {
        let mut mesh = Mesh3D::new();
        mesh.add_polygon_to_mesh(&triangle(
            [1, 2, 3],
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        ));

        let vertices = mesh.convert_vertices_mesh_to_mat().unwrap();
        assert_eq!(vertices.rows(), 3);
        assert_eq!(vertices.cols(), 3);
        assert_eq!(*vertices.at_2d::<f32>(1, 0).unwrap(), 1.0);

        let polygons = mesh.convert_polygons_mesh_to_mat().unwrap();
        assert_eq!(polygons.rows(), 1);
        assert_eq!(polygons.cols(), 4);
        assert_eq!(*polygons.at_2d::<i32>(0, 0).unwrap(), 3);
    }
}
