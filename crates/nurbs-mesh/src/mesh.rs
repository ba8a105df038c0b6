use nurbs_core::Tolerance;
use nurbs_math::{Aabb3, Point2, Point3, Vector3};

/// GPU-ready triangle mesh with per-vertex normals and uvs.
///
/// `uvs` are the surface parameters remapped to `[0, 1]` over the domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub positions: Vec<Point3>,
    pub normals: Vec<Vector3>,
    pub indices: Vec<u32>,
    pub uvs: Vec<Point2>,
}

impl TriangleMesh {
    /// Number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn push_vertex(&mut self, position: Point3, normal: Vector3, uv: Point2) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        index
    }

    /// Add triangle `[a, b, c]` unless its area is below `tol`.
    ///
    /// Returns whether the triangle was kept.
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32, tol: Tolerance) -> bool {
        let area = triangle_area(
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        );
        if area <= tol.linear * tol.linear {
            return false;
        }
        self.indices.extend_from_slice(&[a, b, c]);
        true
    }

    /// Replace the normals of `vertices` with the area-weighted average of
    /// their adjacent face normals.
    ///
    /// Vertices without any adjacent triangle keep their current normal.
    pub fn smooth_normals_at(&mut self, vertices: &[u32]) {
        if vertices.is_empty() {
            return;
        }
        let mut accumulated = vec![Vector3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let p0 = self.positions[i0];
            let normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);
            accumulated[i0] += normal;
            accumulated[i1] += normal;
            accumulated[i2] += normal;
        }
        for &v in vertices {
            if let Some(n) = accumulated[v as usize].try_normalize() {
                self.normals[v as usize] = n;
            }
        }
    }

    /// Compute smooth normals for every vertex from the triangles.
    pub fn compute_normals(&mut self) {
        self.normals.clear();
        self.normals.resize(self.positions.len(), Vector3::ZERO);
        let all: Vec<u32> = (0..self.positions.len() as u32).collect();
        self.smooth_normals_at(&all);
    }

    /// Total surface area.
    pub fn area(&self) -> f64 {
        self.indices
            .chunks_exact(3)
            .map(|tri| {
                triangle_area(
                    self.positions[tri[0] as usize],
                    self.positions[tri[1] as usize],
                    self.positions[tri[2] as usize],
                )
            })
            .sum()
    }

    /// Compute the axis-aligned bounding box of all positions.
    pub fn bounding_box(&self) -> Aabb3 {
        Aabb3::from_points(self.positions.iter().copied())
            .unwrap_or(Aabb3::new(Point3::ZERO, Point3::ZERO))
    }
}

fn triangle_area(a: Point3, b: Point3, c: Point3) -> f64 {
    0.5 * (b - a).cross(c - a).length()
}
