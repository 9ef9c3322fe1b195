use base::math::DVec3;

/// Triangle mesh with 1-based face indices, as stored in OBJ files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<DVec3>,
    /// Triangles; each entry holds three 1-based vertex indices.
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Creates a mesh from its parts without checking the indices.
    pub fn new(vertices: Vec<DVec3>, faces: Vec<[u32; 3]>) -> Self { Self { vertices, faces } }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize { self.vertices.len() }

    /// Number of triangles.
    pub fn face_count(&self) -> usize { self.faces.len() }

    /// Corner positions of the triangle, `None` if an index is out of range.
    pub fn triangle(&self, face: usize) -> Option<[DVec3; 3]> {
        let f = self.faces.get(face)?;
        let corner = |i: u32| {
            (i as usize)
                .checked_sub(1)
                .and_then(|i| self.vertices.get(i))
                .copied()
        };
        Some([corner(f[0])?, corner(f[1])?, corner(f[2])?])
    }

    /// Unnormalised geometric normal of a triangle (counter-clockwise
    /// winding), twice its area in length.
    pub fn face_normal(&self, face: usize) -> Option<DVec3> {
        let [a, b, c] = self.triangle(face)?;
        Some((b - a).cross(c - a))
    }

    /// Corners `(min, max)` of the axis-aligned bounding box.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }

    /// Checks the face indices and looks for zero-area triangles.
    pub fn validate(&self) -> MeshValidationReport {
        let n = self.vertices.len() as u32;
        let mut issues = Vec::new();
        for (face, indices) in self.faces.iter().enumerate() {
            let mut in_range = true;
            for &index in indices {
                if index == 0 || index > n {
                    issues.push(MeshValidationIssue::IndexOutOfBounds { face, index });
                    in_range = false;
                }
            }
            if !in_range {
                continue;
            }
            let degenerate = indices[0] == indices[1]
                || indices[1] == indices[2]
                || indices[0] == indices[2]
                || self
                    .face_normal(face)
                    .map_or(true, |normal| normal.length_squared() <= f64::EPSILON * f64::EPSILON);
            if degenerate {
                issues.push(MeshValidationIssue::DegenerateTriangle { face });
            }
        }
        MeshValidationReport {
            vertex_count: self.vertices.len(),
            face_count: self.faces.len(),
            issues,
        }
    }
}

/// Problems found by [`TriangleMesh::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshValidationIssue {
    /// A face refers to a vertex outside `[1, vertex_count]`.
    IndexOutOfBounds {
        /// Face position (0-based).
        face: usize,
        /// Offending 1-based index.
        index: u32,
    },
    /// A face has zero area.
    DegenerateTriangle {
        /// Face position (0-based).
        face: usize,
    },
}

/// Outcome of a mesh validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshValidationReport {
    /// Number of vertices.
    pub vertex_count: usize,
    /// Number of faces.
    pub face_count: usize,
    /// Everything that was found wrong.
    pub issues: Vec<MeshValidationIssue>,
}

impl MeshValidationReport {
    /// Whether no issue was found.
    pub fn is_clean(&self) -> bool { self.issues.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base::math::dvec3;

    #[test]
    fn test_validate_reports_issues() {
        let mesh = TriangleMesh::new(
            vec![
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(0.0, 1.0, 0.0),
                dvec3(2.0, 0.0, 0.0),
            ],
            vec![[1, 2, 3], [1, 2, 4], [1, 2, 5], [0, 1, 2], [3, 3, 1]],
        );
        let report = mesh.validate();
        assert_eq!(report.vertex_count, 4);
        assert_eq!(report.face_count, 5);
        assert_eq!(
            report.issues,
            vec![
                MeshValidationIssue::DegenerateTriangle { face: 1 },
                MeshValidationIssue::IndexOutOfBounds { face: 2, index: 5 },
                MeshValidationIssue::IndexOutOfBounds { face: 3, index: 0 },
                MeshValidationIssue::DegenerateTriangle { face: 4 },
            ]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn test_face_normal_follows_winding() {
        let mesh = TriangleMesh::new(
            vec![
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(0.0, 1.0, 0.0),
            ],
            vec![[1, 2, 3], [1, 3, 2]],
        );
        assert_eq!(mesh.face_normal(0), Some(dvec3(0.0, 0.0, 1.0)));
        assert_eq!(mesh.face_normal(1), Some(dvec3(0.0, 0.0, -1.0)));
        assert_eq!(mesh.face_normal(2), None);
        assert_eq!(
            mesh.bounds(),
            Some((dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 0.0)))
        );
    }
}
