//! Quick looks at meshes and materials under fixed lighting presets.
//!
//! Every mesh is rendered with every material under every preset into one
//! flat directory, as `<mesh>_<brdf>_<preset>.png` next to the scene it was
//! rendered from. A `render_config.json` records the shared settings.

use crate::{
    dataset::stem,
    render::{save_png, Renderer},
    scene::{compose, resolve_geometry, Camera, Emitter, Geometry, Integrator},
};
use base::{math::dvec3, Error};
use bxdf::{AnalyticMaterial, ApproximationMode, BrdfCache, MaterialApproximator};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Name of the file recording the preview settings.
pub const RENDER_CONFIG_FILE_NAME: &str = "render_config.json";

/// Name used in file names for renders without a BRDF.
const NEUTRAL_MATERIAL_NAME: &str = "neutral";

/// Fixed lighting set-ups.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum LightingPreset {
    /// Constant environment light.
    Ambient,
    /// Point light above the object.
    TopPoint,
    /// Sun-like light coming from the upper right front.
    SideDirectional,
    /// Three point lights around the object.
    MultiPoint,
}

impl LightingPreset {
    /// Every preset, in rendering order.
    pub const ALL: [LightingPreset; 4] = [
        Self::Ambient,
        Self::TopPoint,
        Self::SideDirectional,
        Self::MultiPoint,
    ];

    /// Name used in file names.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ambient => "ambient",
            Self::TopPoint => "top_point",
            Self::SideDirectional => "side_directional",
            Self::MultiPoint => "multi_point",
        }
    }

    /// Lights of the preset, the main one first.
    pub fn emitters(&self) -> Vec<Emitter> {
        match self {
            Self::Ambient => vec![Emitter::Ambient { radiance: 0.3 }],
            Self::TopPoint => vec![Emitter::Point {
                position: dvec3(0.0, 5.0, 0.0),
                intensity: 50.0,
            }],
            Self::SideDirectional => vec![Emitter::Directional {
                direction: dvec3(-1.0, -1.0, -1.0),
                irradiance: 2.0,
            }],
            Self::MultiPoint => vec![
                Emitter::Point {
                    position: dvec3(2.0, 3.0, 2.0),
                    intensity: 20.0,
                },
                Emitter::Point {
                    position: dvec3(-2.0, 3.0, 2.0),
                    intensity: 20.0,
                },
                Emitter::Point {
                    position: dvec3(0.0, 3.0, -2.0),
                    intensity: 15.0,
                },
            ],
        }
    }
}

impl fmt::Display for LightingPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Settings shared by all preview renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Sensor.
    pub camera: Camera,
    /// Samples per pixel.
    pub spp: u32,
    /// Light transport algorithm.
    pub integrator: Integrator,
    /// Presets rendered for every mesh and material.
    pub presets: Vec<LightingPreset>,
    /// How materials are derived from BRDF tables.
    pub approximation: ApproximationMode,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            camera: Camera {
                width: 512,
                height: 512,
                ..Camera::default()
            },
            spp: 64,
            integrator: Integrator::Direct,
            presets: LightingPreset::ALL.to_vec(),
            approximation: ApproximationMode::Measured,
        }
    }
}

/// A preview that could not be rendered.
#[derive(Debug)]
pub struct PreviewFailure {
    /// `<mesh>_<brdf>_<preset>`.
    pub name: String,
    /// Cause.
    pub error: Error,
}

/// Outcome of [`PreviewRenderer::render_all`].
#[derive(Debug, Default)]
pub struct PreviewReport {
    /// Written images, in rendering order.
    pub images: Vec<PathBuf>,
    /// Renders that failed; the others went on.
    pub failures: Vec<PreviewFailure>,
}

impl PreviewReport {
    /// Whether every preview was rendered.
    pub fn is_success(&self) -> bool { self.failures.is_empty() }
}

#[derive(Serialize)]
struct LightingRecord {
    name: &'static str,
    emitters: Vec<Emitter>,
}

#[derive(Serialize)]
struct RenderRecord {
    spp: u32,
    integrator: Integrator,
}

#[derive(Serialize)]
struct PathsRecord<'a> {
    meshes: &'a [PathBuf],
    brdfs: &'a [PathBuf],
    output_dir: &'a Path,
}

#[derive(Serialize)]
struct RenderConfigRecord<'a> {
    camera: Camera,
    lighting: Vec<LightingRecord>,
    render: RenderRecord,
    paths: PathsRecord<'a>,
}

/// Renders previews into a single directory.
pub struct PreviewRenderer<R: Renderer> {
    renderer: R,
    output_dir: PathBuf,
    settings: PreviewSettings,
    approximator: MaterialApproximator,
    cache: BrdfCache,
}

impl<R: Renderer> PreviewRenderer<R> {
    /// Creates a preview renderer writing into `output_dir`.
    pub fn new<P: AsRef<Path>>(renderer: R, output_dir: P, settings: PreviewSettings) -> Self {
        Self {
            renderer,
            output_dir: output_dir.as_ref().to_path_buf(),
            approximator: MaterialApproximator::new(settings.approximation),
            settings,
            cache: BrdfCache::default(),
        }
    }

    /// Replaces the BRDF cache.
    pub fn with_cache(mut self, cache: BrdfCache) -> Self {
        self.cache = cache;
        self
    }

    /// Settings of every render.
    pub fn settings(&self) -> &PreviewSettings { &self.settings }

    /// Directory receiving the previews.
    pub fn output_dir(&self) -> &Path { &self.output_dir }

    /// Writes `render_config.json` describing the previews of `meshes` and
    /// `brdfs`.
    pub fn write_render_config(
        &self,
        meshes: &[PathBuf],
        brdfs: &[PathBuf],
    ) -> Result<PathBuf, Error> {
        let record = RenderConfigRecord {
            camera: self.settings.camera,
            lighting: self
                .settings
                .presets
                .iter()
                .map(|preset| LightingRecord {
                    name: preset.name(),
                    emitters: preset.emitters(),
                })
                .collect(),
            render: RenderRecord {
                spp: self.settings.spp,
                integrator: self.settings.integrator,
            },
            paths: PathsRecord {
                meshes,
                brdfs,
                output_dir: &self.output_dir,
            },
        };
        let path = self.output_dir.join(RENDER_CONFIG_FILE_NAME);
        std::fs::write(&path, serde_json::to_string_pretty(&record)?)
            .map_err(|err| Error::io(err, &path))?;
        log::info!("Wrote {}", path.display());
        Ok(path)
    }

    /// Renders one preview of an already resolved geometry.
    ///
    /// Writes `<name>.png` and the scene it was rendered from as
    /// `<name>.json`, returning the image path.
    pub fn render_one(
        &self,
        name: &str,
        geometry: &Geometry,
        material: AnalyticMaterial,
        preset: LightingPreset,
    ) -> Result<PathBuf, Error> {
        let mut emitters = preset.emitters().into_iter();
        let main = emitters.next();
        let scene = compose(geometry.clone(), material, &self.settings.camera, main)
            .with_extra_emitters(emitters.collect())
            .with_integrator(self.settings.integrator);

        let scene_path = self.output_dir.join(format!("{}.json", name));
        std::fs::write(&scene_path, scene.to_json()?).map_err(|err| Error::io(err, &scene_path))?;
        let image = self.renderer.render(&scene, self.settings.spp)?;
        let path = self.output_dir.join(format!("{}.png", name));
        save_png(&image, &path)?;
        Ok(path)
    }

    /// Renders every mesh with every material under every preset.
    ///
    /// Without BRDFs the neutral material is used. A failed render is
    /// recorded in the report and the next one goes on.
    pub fn render_all(&self, meshes: &[PathBuf], brdfs: &[PathBuf]) -> PreviewReport {
        let mut report = PreviewReport::default();
        if let Err(err) = std::fs::create_dir_all(&self.output_dir) {
            report.failures.push(PreviewFailure {
                name: self.output_dir.display().to_string(),
                error: Error::io(err, &self.output_dir),
            });
            return report;
        }
        if let Err(error) = self.write_render_config(meshes, brdfs) {
            report.failures.push(PreviewFailure {
                name: RENDER_CONFIG_FILE_NAME.to_string(),
                error,
            });
        }

        let materials: Vec<(String, AnalyticMaterial)> = if brdfs.is_empty() {
            vec![(NEUTRAL_MATERIAL_NAME.to_string(), AnalyticMaterial::neutral())]
        } else {
            brdfs
                .iter()
                .map(|brdf| (stem(brdf), self.approximator.approximate_path(&self.cache, brdf)))
                .collect()
        };
        let total = meshes.len() * materials.len() * self.settings.presets.len();
        let mut count = 0;
        for mesh in meshes {
            let geometry = resolve_geometry(&Geometry::mesh(mesh));
            for (brdf_name, material) in &materials {
                for &preset in &self.settings.presets {
                    count += 1;
                    let name = format!("{}_{}_{}", stem(mesh), brdf_name, preset);
                    log::info!("Rendering preview {}/{}: {}", count, total, name);
                    match self.render_one(&name, &geometry, *material, preset) {
                        Ok(path) => report.images.push(path),
                        Err(error) => {
                            log::error!("Preview {} failed: {}", name, error);
                            report.failures.push(PreviewFailure { name, error });
                        },
                    }
                }
            }
        }
        log::info!(
            "{}/{} previews rendered in {}",
            report.images.len(),
            total,
            self.output_dir.display()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_names_and_lights() {
        let names: Vec<_> = LightingPreset::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["ambient", "top_point", "side_directional", "multi_point"]);
        assert_eq!(
            LightingPreset::Ambient.emitters(),
            [Emitter::Ambient { radiance: 0.3 }]
        );
        assert_eq!(
            LightingPreset::SideDirectional.emitters(),
            [Emitter::Directional {
                direction: dvec3(-1.0, -1.0, -1.0),
                irradiance: 2.0
            }]
        );
        let multi = LightingPreset::MultiPoint.emitters();
        assert_eq!(multi.len(), 3);
        assert_eq!(
            multi[2],
            Emitter::Point {
                position: dvec3(0.0, 3.0, -2.0),
                intensity: 15.0
            }
        );
    }

    #[test]
    fn test_preset_serialisation_matches_file_names() {
        for preset in LightingPreset::ALL {
            let json = serde_json::to_string(&preset).unwrap();
            assert_eq!(json, format!("\"{}\"", preset.name()));
        }
        let settings: PreviewSettings =
            serde_json::from_str(r#"{"presets": ["top_point"], "spp": 4}"#).unwrap();
        assert_eq!(settings.presets, [LightingPreset::TopPoint]);
        assert_eq!(settings.camera.width, 512);
        assert_eq!(settings.spp, 4);
    }
}
