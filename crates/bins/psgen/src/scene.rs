//! Renderer-agnostic scene description.
//!
//! A [`SceneDescription`] is built fresh for every render task and handed to
//! a [`Renderer`](crate::render::Renderer); it is serialised as JSON when it
//! crosses a process boundary.

use base::math::{dvec3, DVec3};
use bxdf::AnalyticMaterial;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Eye position.
    pub position: DVec3,
    /// Point looked at.
    pub target: DVec3,
    /// Up vector.
    pub up: DVec3,
    /// Horizontal field of view in degrees.
    pub fov: f64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: dvec3(0.0, 0.0, 5.0),
            target: DVec3::ZERO,
            up: DVec3::Y,
            fov: 45.0,
            width: 256,
            height: 256,
        }
    }
}

impl Camera {
    /// Pinhole intrinsics matching this camera.
    ///
    /// The focal length in pixels follows from the horizontal field of view
    /// unless `focal_length` overrides it.
    pub fn intrinsics(&self, focal_length: Option<f64>) -> Intrinsics {
        let f = focal_length.unwrap_or_else(|| {
            (self.width as f64 / 2.0) / (self.fov.to_radians() / 2.0).tan()
        });
        Intrinsics {
            fx: f,
            fy: f,
            cx: self.width as f64 / 2.0,
            cy: self.height as f64 / 2.0,
        }
    }
}

/// Camera intrinsic parameters in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Focal length along x.
    pub fx: f64,
    /// Focal length along y.
    pub fy: f64,
    /// Principal point x.
    pub cx: f64,
    /// Principal point y.
    pub cy: f64,
}

/// Light transport algorithm requested from the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Integrator {
    /// Direct illumination only.
    #[default]
    Direct,
    /// Unidirectional path tracing.
    Path {
        /// Maximum path length.
        max_depth: u32,
    },
    /// Shading normals encoded as colour.
    Normals,
}

/// A light source of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Emitter {
    /// Isotropic point light.
    Point {
        /// Position in world space.
        position: DVec3,
        /// Radiant intensity.
        intensity: f64,
    },
    /// Light at infinity.
    Directional {
        /// Direction the light travels in.
        direction: DVec3,
        /// Irradiance.
        irradiance: f64,
    },
    /// Constant environment light.
    Ambient {
        /// Radiance.
        radiance: f64,
    },
}

/// Shape of the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// Triangle mesh stored in an OBJ file.
    Mesh {
        /// Location of the OBJ file.
        path: PathBuf,
    },
    /// Analytic sphere.
    Sphere {
        /// Centre.
        center: DVec3,
        /// Radius.
        radius: f64,
    },
}

impl Geometry {
    /// The sphere used in place of missing meshes.
    pub const fn unit_sphere() -> Self {
        Self::Sphere {
            center: DVec3::ZERO,
            radius: 1.0,
        }
    }

    /// Geometry referring to the OBJ file at `path`.
    pub fn mesh<P: AsRef<Path>>(path: P) -> Self {
        Self::Mesh {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Geometry with its material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    /// Shape.
    pub geometry: Geometry,
    /// Reflectance.
    pub material: AnalyticMaterial,
}

/// Everything a renderer needs to produce one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Light transport algorithm.
    pub integrator: Integrator,
    /// Sensor.
    pub camera: Camera,
    /// Light source; none for normal maps.
    pub emitter: Option<Emitter>,
    /// Lights shining together with `emitter`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_emitters: Vec<Emitter>,
    /// The object.
    pub surface: Surface,
}

impl SceneDescription {
    /// Replaces the integrator.
    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    /// Adds lights shining together with the main emitter.
    pub fn with_extra_emitters(mut self, emitters: Vec<Emitter>) -> Self {
        self.extra_emitters = emitters;
        self
    }

    /// Every light of the scene, main emitter first.
    pub fn emitters(&self) -> impl Iterator<Item = &Emitter> {
        self.emitter.iter().chain(self.extra_emitters.iter())
    }

    /// Serialises the scene as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, base::Error> { Ok(serde_json::to_string_pretty(self)?) }
}

/// Resolves the geometry actually rendered.
///
/// A mesh whose file doesn't exist is replaced by the unit sphere. This
/// changes the ground truth of the dataset, hence the warning.
pub fn resolve_geometry(geometry: &Geometry) -> Geometry {
    match geometry {
        Geometry::Mesh { path } if !path.is_file() => {
            log::warn!(
                "Mesh {} not found, substituting a unit sphere",
                path.display()
            );
            Geometry::unit_sphere()
        },
        other => other.clone(),
    }
}

/// Combines an already resolved geometry with material, camera and light
/// into a scene rendered with the direct integrator.
pub fn compose(
    geometry: Geometry,
    material: AnalyticMaterial,
    camera: &Camera,
    emitter: Option<Emitter>,
) -> SceneDescription {
    SceneDescription {
        integrator: Integrator::Direct,
        camera: *camera,
        emitter,
        extra_emitters: Vec::new(),
        surface: Surface { geometry, material },
    }
}

/// Normal map scene of an already resolved geometry.
///
/// The material is fixed so that the normal map never depends on the
/// approximated reflectance.
pub fn compose_normals(geometry: Geometry, camera: &Camera) -> SceneDescription {
    compose(geometry, AnalyticMaterial::neutral(), camera, None)
        .with_integrator(Integrator::Normals)
}

/// Resolves `geometry` then composes the scene, see [`compose`].
pub fn assemble(
    geometry: &Geometry,
    material: AnalyticMaterial,
    camera: &Camera,
    emitter: Option<Emitter>,
) -> SceneDescription {
    compose(resolve_geometry(geometry), material, camera, emitter)
}

/// Resolves `geometry` then composes its normal map scene, see
/// [`compose_normals`].
pub fn assemble_normals(geometry: &Geometry, camera: &Camera) -> SceneDescription {
    compose_normals(resolve_geometry(geometry), camera)
}
