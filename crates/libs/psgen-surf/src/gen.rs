//! Parametric shape generators.
//!
//! All generators are deterministic and produce outward-facing,
//! counter-clockwise triangles.

use crate::mesh::TriangleMesh;
use base::{math::dvec3, Error};
use serde::{Deserialize, Serialize};
use std::{
    f64::consts::{PI, TAU},
    fmt,
};

/// Kind of generated shape.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Latitude/longitude sphere.
    Sphere,
    /// Axis-aligned cube.
    Cube,
    /// Subdivided square in the XZ plane.
    Plane,
    /// Capped cylinder along Y.
    Cylinder,
    /// Torus around Y.
    Torus,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sphere => "Sphere",
            Self::Cube => "Cube",
            Self::Plane => "Plane",
            Self::Cylinder => "Cylinder",
            Self::Torus => "Torus",
        };
        f.write_str(name)
    }
}

/// A shape together with its parameters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Shape {
    /// Sphere centred at the origin.
    Sphere {
        /// Radius.
        radius: f64,
        /// Number of latitude bands; there are twice as many longitude
        /// segments.
        subdivisions: u32,
    },
    /// Cube centred at the origin.
    Cube {
        /// Edge length.
        size: f64,
    },
    /// Plane at `y = 0` facing `+Y`.
    Plane {
        /// Extent along X.
        width: f64,
        /// Extent along Z.
        height: f64,
        /// Number of cells along each side.
        subdivisions: u32,
    },
    /// Cylinder centred at the origin.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Extent along Y.
        height: f64,
        /// Number of rim vertices per cap.
        subdivisions: u32,
    },
    /// Torus centred at the origin.
    Torus {
        /// Distance from the centre to the centre of the tube.
        major_radius: f64,
        /// Radius of the tube.
        minor_radius: f64,
        /// Segments around the Y axis.
        major_subdivisions: u32,
        /// Segments around the tube.
        minor_subdivisions: u32,
    },
}

impl Shape {
    /// Kind of the shape.
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Sphere { .. } => ShapeKind::Sphere,
            Self::Cube { .. } => ShapeKind::Cube,
            Self::Plane { .. } => ShapeKind::Plane,
            Self::Cylinder { .. } => ShapeKind::Cylinder,
            Self::Torus { .. } => ShapeKind::Torus,
        }
    }

    /// Default parameters for a kind of shape.
    pub fn default_of(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Sphere => Self::Sphere {
                radius: 1.0,
                subdivisions: 32,
            },
            ShapeKind::Cube => Self::Cube { size: 1.0 },
            ShapeKind::Plane => Self::Plane {
                width: 2.0,
                height: 2.0,
                subdivisions: 1,
            },
            ShapeKind::Cylinder => Self::Cylinder {
                radius: 1.0,
                height: 2.0,
                subdivisions: 32,
            },
            ShapeKind::Torus => Self::Torus {
                major_radius: 1.0,
                minor_radius: 0.3,
                major_subdivisions: 32,
                minor_subdivisions: 16,
            },
        }
    }

    /// Parameter lines written as comments in the OBJ header.
    pub fn describe(&self) -> Vec<String> {
        match *self {
            Self::Sphere {
                radius,
                subdivisions,
            } => vec![format!(
                "Radius: {:?}, Subdivisions: {}",
                radius, subdivisions
            )],
            Self::Cube { size } => vec![format!("Size: {:?}", size)],
            Self::Plane {
                width,
                height,
                subdivisions,
            } => vec![format!(
                "Width: {:?}, Height: {:?}, Subdivisions: {}",
                width, height, subdivisions
            )],
            Self::Cylinder {
                radius,
                height,
                subdivisions,
            } => vec![format!(
                "Radius: {:?}, Height: {:?}, Subdivisions: {}",
                radius, height, subdivisions
            )],
            Self::Torus {
                major_radius,
                minor_radius,
                major_subdivisions,
                minor_subdivisions,
            } => vec![
                format!(
                    "Major radius: {:?}, Minor radius: {:?}",
                    major_radius, minor_radius
                ),
                format!(
                    "Major subdivisions: {}, Minor subdivisions: {}",
                    major_subdivisions, minor_subdivisions
                ),
            ],
        }
    }

    /// Generates the mesh.
    pub fn generate(&self) -> Result<TriangleMesh, Error> {
        let mesh = match *self {
            Self::Sphere {
                radius,
                subdivisions,
            } => sphere(radius, subdivisions),
            Self::Cube { size } => cube(size),
            Self::Plane {
                width,
                height,
                subdivisions,
            } => plane(width, height, subdivisions),
            Self::Cylinder {
                radius,
                height,
                subdivisions,
            } => cylinder(radius, height, subdivisions),
            Self::Torus {
                major_radius,
                minor_radius,
                major_subdivisions,
                minor_subdivisions,
            } => torus(
                major_radius,
                minor_radius,
                major_subdivisions,
                minor_subdivisions,
            ),
        }?;
        log::debug!(
            "Generated {}: {} vertices, {} faces",
            self.kind(),
            mesh.vertex_count(),
            mesh.face_count()
        );
        Ok(mesh)
    }
}

/// The standard set of test objects with their file stems.
pub fn presets() -> [(&'static str, Shape); 6] {
    [
        ("sphere", Shape::Sphere {
            radius: 1.0,
            subdivisions: 32,
        }),
        ("sphere_lowpoly", Shape::Sphere {
            radius: 1.0,
            subdivisions: 16,
        }),
        ("cube", Shape::Cube { size: 1.5 }),
        ("plane", Shape::Plane {
            width: 2.0,
            height: 2.0,
            subdivisions: 4,
        }),
        ("cylinder", Shape::Cylinder {
            radius: 0.8,
            height: 2.0,
            subdivisions: 24,
        }),
        ("torus", Shape::Torus {
            major_radius: 1.0,
            minor_radius: 0.3,
            major_subdivisions: 24,
            minor_subdivisions: 12,
        }),
    ]
}

fn check_positive(name: &'static str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::parameter(
            name,
            format!("must be finite and positive, got {}", value),
        ))
    }
}

fn check_at_least(name: &'static str, value: u32, min: u32) -> Result<(), Error> {
    if value >= min {
        Ok(())
    } else {
        Err(Error::parameter(
            name,
            format!("must be at least {}, got {}", min, value),
        ))
    }
}

/// Number of vertices and faces of a sphere with `s` latitude bands.
///
/// Degenerate band counts below 2 give no faces.
pub const fn sphere_counts(s: u32) -> (usize, usize) {
    let s = s as usize;
    ((s + 1) * 2 * s, 4 * s * s.saturating_sub(1))
}

/// Latitude/longitude sphere.
///
/// Row `i` holds `2s` vertices at `theta = i·π/s`, so the first and last rows
/// collapse onto the poles. Quads touching a pole become a single triangle
/// using only one pole vertex; the others are split along the same
/// diagonal.
pub fn sphere(radius: f64, subdivisions: u32) -> Result<TriangleMesh, Error> {
    check_positive("radius", radius)?;
    check_at_least("subdivisions", subdivisions, 2)?;

    let s = subdivisions;
    let cols = 2 * s;
    let (n_vertices, n_faces) = sphere_counts(s);
    let mut vertices = Vec::with_capacity(n_vertices);
    for i in 0..=s {
        let theta = i as f64 * PI / s as f64;
        let (sin_theta, cos_theta) = theta.sin_cos();
        for j in 0..cols {
            let phi = j as f64 * TAU / cols as f64;
            let (sin_phi, cos_phi) = phi.sin_cos();
            vertices.push(dvec3(sin_theta * cos_phi, cos_theta, sin_theta * sin_phi) * radius);
        }
    }

    let mut faces = Vec::with_capacity(n_faces);
    for i in 0..s {
        for j in 0..cols {
            let v1 = i * cols + j + 1;
            let v2 = i * cols + (j + 1) % cols + 1;
            let v3 = (i + 1) * cols + (j + 1) % cols + 1;
            let v4 = (i + 1) * cols + j + 1;
            if i == 0 {
                // v1 and v2 are both the north pole.
                faces.push([v1, v3, v4]);
            } else if i == s - 1 {
                // v3 and v4 are both the south pole.
                faces.push([v1, v2, v4]);
            } else {
                faces.push([v1, v2, v4]);
                faces.push([v2, v3, v4]);
            }
        }
    }
    Ok(TriangleMesh::new(vertices, faces))
}

/// Cube from a literal table.
pub fn cube(size: f64) -> Result<TriangleMesh, Error> {
    check_positive("size", size)?;
    let h = size / 2.0;
    let vertices = vec![
        dvec3(-h, -h, -h),
        dvec3(h, -h, -h),
        dvec3(h, h, -h),
        dvec3(-h, h, -h),
        dvec3(-h, -h, h),
        dvec3(h, -h, h),
        dvec3(h, h, h),
        dvec3(-h, h, h),
    ];
    #[rustfmt::skip]
    let faces = vec![
        [6, 7, 8], [6, 8, 5], // +Z
        [2, 4, 3], [2, 1, 4], // -Z
        [3, 7, 6], [3, 6, 2], // +X
        [5, 8, 4], [5, 4, 1], // -X
        [4, 8, 7], [4, 7, 3], // +Y
        [1, 2, 6], [1, 6, 5], // -Y
    ];
    Ok(TriangleMesh::new(vertices, faces))
}

/// Grid in the XZ plane facing `+Y`.
pub fn plane(width: f64, height: f64, subdivisions: u32) -> Result<TriangleMesh, Error> {
    check_positive("width", width)?;
    check_positive("height", height)?;
    check_at_least("subdivisions", subdivisions, 1)?;

    let s = subdivisions;
    let row = s + 1;
    let mut vertices = Vec::with_capacity((row * row) as usize);
    for i in 0..=s {
        for j in 0..=s {
            vertices.push(dvec3(
                (j as f64 / s as f64 - 0.5) * width,
                0.0,
                (i as f64 / s as f64 - 0.5) * height,
            ));
        }
    }

    let mut faces = Vec::with_capacity((2 * s * s) as usize);
    for i in 0..s {
        for j in 0..s {
            let v1 = i * row + j + 1;
            let v2 = v1 + 1;
            let v3 = (i + 1) * row + j + 2;
            let v4 = (i + 1) * row + j + 1;
            faces.push([v1, v4, v2]);
            faces.push([v2, v4, v3]);
        }
    }
    Ok(TriangleMesh::new(vertices, faces))
}

/// Capped cylinder along Y.
///
/// Vertex 1 is the bottom centre followed by the bottom rim, then the top
/// centre and the top rim.
pub fn cylinder(radius: f64, height: f64, subdivisions: u32) -> Result<TriangleMesh, Error> {
    check_positive("radius", radius)?;
    check_positive("height", height)?;
    check_at_least("subdivisions", subdivisions, 3)?;

    let s = subdivisions;
    let half = height / 2.0;
    let mut vertices = Vec::with_capacity(2 * s as usize + 2);
    for y in [-half, half] {
        vertices.push(dvec3(0.0, y, 0.0));
        for i in 0..s {
            let (sin, cos) = (TAU * i as f64 / s as f64).sin_cos();
            vertices.push(dvec3(radius * cos, y, radius * sin));
        }
    }

    let bottom = 1;
    let top = s + 2;
    let rim = |center: u32, i: u32| center + 1 + i % s;
    let mut faces = Vec::with_capacity(4 * s as usize);
    // The bottom cap faces -Y, so its fan runs the other way round.
    for i in 0..s {
        faces.push([bottom, rim(bottom, i), rim(bottom, i + 1)]);
    }
    for i in 0..s {
        faces.push([top, rim(top, i + 1), rim(top, i)]);
    }
    for i in 0..s {
        let v1 = rim(bottom, i);
        let v2 = rim(bottom, i + 1);
        let v3 = rim(top, i + 1);
        let v4 = rim(top, i);
        faces.push([v1, v4, v2]);
        faces.push([v2, v4, v3]);
    }
    Ok(TriangleMesh::new(vertices, faces))
}

/// Torus around Y, periodic in both directions.
pub fn torus(
    major_radius: f64,
    minor_radius: f64,
    major_subdivisions: u32,
    minor_subdivisions: u32,
) -> Result<TriangleMesh, Error> {
    check_positive("major_radius", major_radius)?;
    check_positive("minor_radius", minor_radius)?;
    if minor_radius >= major_radius {
        return Err(Error::parameter(
            "minor_radius",
            format!(
                "must be smaller than the major radius {}, got {}",
                major_radius, minor_radius
            ),
        ));
    }
    check_at_least("major_subdivisions", major_subdivisions, 3)?;
    check_at_least("minor_subdivisions", minor_subdivisions, 3)?;

    let (big, small) = (major_subdivisions, minor_subdivisions);
    let mut vertices = Vec::with_capacity((big * small) as usize);
    for i in 0..big {
        let (sin_theta, cos_theta) = (TAU * i as f64 / big as f64).sin_cos();
        for j in 0..small {
            let (sin_phi, cos_phi) = (TAU * j as f64 / small as f64).sin_cos();
            let ring = major_radius + minor_radius * cos_phi;
            vertices.push(dvec3(ring * cos_theta, minor_radius * sin_phi, ring * sin_theta));
        }
    }

    let index = |i: u32, j: u32| (i % big) * small + j % small + 1;
    let mut faces = Vec::with_capacity(2 * (big * small) as usize);
    for i in 0..big {
        for j in 0..small {
            let v1 = index(i, j);
            let v2 = index(i, j + 1);
            let v3 = index(i + 1, j + 1);
            let v4 = index(i + 1, j);
            faces.push([v1, v2, v4]);
            faces.push([v2, v3, v4]);
        }
    }
    Ok(TriangleMesh::new(vertices, faces))
}
