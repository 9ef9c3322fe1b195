//! Dataset generation.
//!
//! A dataset is one mesh with one material lit from several known
//! positions. Its directory under the output root looks like
//!
//! ```text
//! <name>/images/light_<N>.png
//! <name>/images/ground_truth_normal.png
//! <name>/output/
//! <name>/config.yaml
//! ```
//!
//! `config.yaml` is written last and only if every image was rendered, so
//! its presence tells whether the dataset is complete.

mod config;

pub use config::*;

use crate::{
    light::{self, LightPattern, LightSpec},
    render::{save_png, Renderer},
    scene::{compose, compose_normals, resolve_geometry, Camera, Emitter, Geometry, Integrator},
};
use base::{math::DVec3, Error};
use bxdf::{AnalyticMaterial, ApproximationMode, BrdfCache, MaterialApproximator};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    ffi::OsStr,
    fmt,
    path::{Component, Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Number of BRDF tables an orchestrator keeps in memory by default.
pub const DEFAULT_BRDF_CACHE_CAPACITY: usize = 8;

/// File name of the rendered normal map.
pub const NORMAL_MAP_FILE_NAME: &str = "ground_truth_normal.png";

/// Parameters shared by all datasets of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetOptions {
    /// Number of sampled lights.
    pub light_count: usize,
    /// Distribution of the sampled lights.
    pub pattern: LightPattern,
    /// Distance of the lights to the origin.
    pub light_distance: f64,
    /// Intensity of lights that don't specify one.
    pub light_intensity: f64,
    /// Sensor.
    pub camera: Camera,
    /// Samples per pixel.
    pub spp: u32,
    /// Integrator of the lit images.
    pub integrator: Integrator,
    /// Recorded background threshold.
    pub mask_threshold: f64,
    /// Recorded shadow threshold.
    pub shadow_threshold: f64,
    /// Focal length in pixels recorded instead of the one derived from the
    /// field of view.
    pub focal_length: Option<f64>,
    /// How materials are derived from BRDF tables.
    pub approximation: ApproximationMode,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            light_count: 4,
            pattern: LightPattern::Hemisphere,
            light_distance: 2.0,
            light_intensity: 50.0,
            camera: Camera::default(),
            spp: 64,
            integrator: Integrator::Direct,
            mask_threshold: 0.1,
            shadow_threshold: 0.05,
            focal_length: None,
            approximation: ApproximationMode::Measured,
        }
    }
}

/// Where the lights of a dataset come from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LightSource {
    /// Sampled from the pattern, count and distance of the options.
    #[default]
    Sampled,
    /// Given explicitly.
    Custom(Vec<LightSpec>),
}

/// One dataset to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetJob {
    /// Dataset name, also its directory name.
    pub name: String,
    /// OBJ file of the object.
    pub mesh: PathBuf,
    /// Measured BRDF; the neutral material is used without one.
    pub brdf: Option<PathBuf>,
    /// Lights.
    pub lights: LightSource,
}

impl DatasetJob {
    /// Creates a job named after its inputs.
    pub fn new<P: AsRef<Path>>(mesh: P, brdf: Option<&Path>) -> Self {
        Self {
            name: dataset_name(mesh.as_ref(), brdf),
            mesh: mesh.as_ref().to_path_buf(),
            brdf: brdf.map(Path::to_path_buf),
            lights: LightSource::Sampled,
        }
    }

    /// Overrides the dataset name.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Uses an explicit light list.
    pub fn with_lights(mut self, lights: Vec<LightSpec>) -> Self {
        self.lights = LightSource::Custom(lights);
        self
    }
}

pub(crate) fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<mesh_stem>_<brdf_stem>_data`, or `<mesh_stem>_data` without a BRDF.
pub fn dataset_name(mesh: &Path, brdf: Option<&Path>) -> String {
    match brdf {
        Some(brdf) => format!("{}_{}_data", stem(mesh), stem(brdf)),
        None => format!("{}_data", stem(mesh)),
    }
}

/// Every (mesh, BRDF) pair, meshes outermost, truncated to `max` jobs.
///
/// Without BRDFs there is one job per mesh.
pub fn batch_jobs(meshes: &[PathBuf], brdfs: &[PathBuf], max: Option<usize>) -> Vec<DatasetJob> {
    let jobs: Vec<DatasetJob> = if brdfs.is_empty() {
        meshes.iter().map(|m| DatasetJob::new(m, None)).collect()
    } else {
        meshes
            .iter()
            .flat_map(|m| brdfs.iter().map(move |b| DatasetJob::new(m, Some(b))))
            .collect()
    };
    match max {
        Some(max) if max < jobs.len() => {
            log::info!("Limiting the batch to {} of {} datasets", max, jobs.len());
            jobs.into_iter().take(max).collect()
        },
        _ => jobs,
    }
}

/// Step of the generation of one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetState {
    /// Directory cleanup and material approximation.
    Init,
    /// Light placement.
    LightSampling,
    /// Rendering of the image lit by the given light (1-based).
    RenderLight(usize),
    /// Rendering of the normal map.
    RenderNormal,
    /// Writing `config.yaml`.
    WriteConfig,
    /// Complete dataset.
    Done,
    /// Aborted; no `config.yaml` was written.
    Failed,
}

impl fmt::Display for DatasetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::LightSampling => f.write_str("light sampling"),
            Self::RenderLight(n) => write!(f, "render light {}", n),
            Self::RenderNormal => f.write_str("render normal"),
            Self::WriteConfig => f.write_str("write config"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Outcome of one dataset.
#[derive(Debug)]
pub struct DatasetReport {
    /// Dataset name.
    pub name: String,
    /// Dataset directory.
    pub dir: PathBuf,
    /// Final state, [`DatasetState::Done`] or [`DatasetState::Failed`].
    pub state: DatasetState,
    /// Every state entered, in order.
    pub history: Vec<DatasetState>,
    /// Images written, including those of a failed run.
    pub images: Vec<PathBuf>,
    /// Material used for the lit images.
    pub material: Option<AnalyticMaterial>,
    /// Why the dataset failed.
    pub error: Option<Error>,
}

impl DatasetReport {
    /// Whether the dataset is complete.
    pub fn is_success(&self) -> bool { self.state == DatasetState::Done }

    /// Step that failed, if any.
    pub fn failed_at(&self) -> Option<DatasetState> {
        match self.state {
            DatasetState::Failed => self
                .history
                .iter()
                .rev()
                .find(|s| **s != DatasetState::Failed)
                .copied(),
            _ => None,
        }
    }
}

/// Flag aborting generation between two steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that isn't cancelled.
    pub fn new() -> Self { Self::default() }

    /// Requests cancellation; observed before the next step of every
    /// running dataset.
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// A light placed in the scene.
#[derive(Debug, Clone, Copy)]
struct PlacedLight {
    emitter: Emitter,
    /// Position recorded in `config.yaml`.
    position: DVec3,
    intensity: f64,
}

/// Working state of one dataset.
struct Run<'a> {
    job: &'a DatasetJob,
    dir: PathBuf,
    geometry: Geometry,
    material: Option<AnalyticMaterial>,
    lights: Vec<PlacedLight>,
    images: Vec<PathBuf>,
}

/// Drives the generation of datasets.
pub struct DatasetOrchestrator<R: Renderer> {
    renderer: R,
    output_root: PathBuf,
    options: DatasetOptions,
    approximator: MaterialApproximator,
    cache: BrdfCache,
    cancel: CancelToken,
}

impl<R: Renderer> DatasetOrchestrator<R> {
    /// Creates an orchestrator writing datasets under `output_root`.
    pub fn new<P: AsRef<Path>>(renderer: R, output_root: P, options: DatasetOptions) -> Self {
        Self {
            renderer,
            output_root: output_root.as_ref().to_path_buf(),
            approximator: MaterialApproximator::new(options.approximation),
            options,
            cache: BrdfCache::new(Some(DEFAULT_BRDF_CACHE_CAPACITY)),
            cancel: CancelToken::new(),
        }
    }

    /// Replaces the BRDF cache.
    pub fn with_cache(mut self, cache: BrdfCache) -> Self {
        self.cache = cache;
        self
    }

    /// Uses `token` to observe cancellation.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token cancelling this orchestrator.
    pub fn cancel_token(&self) -> &CancelToken { &self.cancel }

    /// Cache of loaded BRDF tables.
    pub fn cache(&self) -> &BrdfCache { &self.cache }

    /// Options applied to every dataset.
    pub fn options(&self) -> &DatasetOptions { &self.options }

    /// Directory receiving the datasets.
    pub fn output_root(&self) -> &Path { &self.output_root }

    /// Generates one dataset.
    ///
    /// Never returns an error: the outcome, including the failure cause, is
    /// in the report.
    pub fn generate(&self, job: &DatasetJob) -> DatasetReport {
        let mut run = Run {
            job,
            dir: self.output_root.join(&job.name),
            geometry: Geometry::mesh(&job.mesh),
            material: None,
            lights: Vec::new(),
            images: Vec::new(),
        };
        let mut history = Vec::new();
        let mut state = DatasetState::Init;
        let error = loop {
            history.push(state);
            if state == DatasetState::Done {
                break None;
            }
            if self.cancel.is_cancelled() {
                break Some(Error::Cancelled);
            }
            log::debug!("[{}] {}", job.name, state);
            match self.step(&mut run, state) {
                Ok(next) => state = next,
                Err(err) => break Some(err),
            }
        };

        let state = match &error {
            None => {
                log::info!("[{}] dataset complete in {}", job.name, run.dir.display());
                DatasetState::Done
            },
            Some(err) => {
                log::error!("[{}] failed during {}: {}", job.name, state, err);
                history.push(DatasetState::Failed);
                DatasetState::Failed
            },
        };
        DatasetReport {
            name: job.name.clone(),
            dir: run.dir,
            state,
            history,
            images: run.images,
            material: run.material,
            error,
        }
    }

    /// Performs `state` and returns the state that follows it.
    fn step(&self, run: &mut Run, state: DatasetState) -> Result<DatasetState, Error> {
        match state {
            DatasetState::Init => {
                self.init(run)?;
                Ok(DatasetState::LightSampling)
            },
            DatasetState::LightSampling => {
                run.lights = self.place_lights(&run.job.lights)?;
                log::info!("[{}] {} lights", run.job.name, run.lights.len());
                Ok(DatasetState::RenderLight(1))
            },
            DatasetState::RenderLight(n) => {
                let light = run.lights.get(n - 1).ok_or_else(|| {
                    Error::render(format!("no light {} among {}", n, run.lights.len()))
                })?;
                let material = run.material.unwrap_or_default();
                let scene = compose(
                    run.geometry.clone(),
                    material,
                    &self.options.camera,
                    Some(light.emitter),
                )
                .with_integrator(self.options.integrator);
                let image = self.renderer.render(&scene, self.options.spp)?;
                let path = run.dir.join("images").join(format!("{}.png", light_key(n)));
                save_png(&image, &path)?;
                run.images.push(path);
                log::info!("[{}] light {}/{} rendered", run.job.name, n, run.lights.len());
                if n < run.lights.len() {
                    Ok(DatasetState::RenderLight(n + 1))
                } else {
                    Ok(DatasetState::RenderNormal)
                }
            },
            DatasetState::RenderNormal => {
                let scene = compose_normals(run.geometry.clone(), &self.options.camera);
                let image = self.renderer.render(&scene, self.options.spp)?;
                let path = run.dir.join("images").join(NORMAL_MAP_FILE_NAME);
                save_png(&image, &path)?;
                run.images.push(path);
                Ok(DatasetState::WriteConfig)
            },
            DatasetState::WriteConfig => {
                let lights: Vec<([f64; 3], f64)> = run
                    .lights
                    .iter()
                    .map(|l| (l.position.to_array(), l.intensity))
                    .collect();
                let config = DatasetConfig::new(
                    &run.job.name,
                    self.options.camera.intrinsics(self.options.focal_length),
                    &lights,
                    self.options.mask_threshold,
                    self.options.shadow_threshold,
                );
                config.write_atomic(&run.dir.join(CONFIG_FILE_NAME))?;
                Ok(DatasetState::Done)
            },
            DatasetState::Done | DatasetState::Failed => Ok(state),
        }
    }

    /// Starts from a clean dataset directory.
    ///
    /// Deletes `images/` and `config.yaml` left by a previous run with the
    /// same name, then derives the material.
    fn init(&self, run: &mut Run) -> Result<(), Error> {
        validate_name(&run.job.name)?;
        let images = run.dir.join("images");
        if images.exists() {
            log::debug!("Removing previous images in {}", images.display());
            std::fs::remove_dir_all(&images).map_err(|err| Error::io(err, &images))?;
        }
        let config = run.dir.join(CONFIG_FILE_NAME);
        if config.exists() {
            std::fs::remove_file(&config).map_err(|err| Error::io(err, &config))?;
        }
        for dir in [images, run.dir.join("output")] {
            std::fs::create_dir_all(&dir).map_err(|err| Error::io(err, &dir))?;
        }

        run.geometry = resolve_geometry(&run.geometry);
        run.material = Some(match &run.job.brdf {
            Some(brdf) => self.approximator.approximate_path(&self.cache, brdf),
            None => AnalyticMaterial::neutral(),
        });
        Ok(())
    }

    fn place_lights(&self, source: &LightSource) -> Result<Vec<PlacedLight>, Error> {
        let opts = &self.options;
        let lights: Vec<PlacedLight> = match source {
            LightSource::Sampled => {
                light::sample(opts.pattern, opts.light_count, opts.light_distance)?
                    .into_iter()
                    .map(|position| PlacedLight {
                        emitter: Emitter::Point {
                            position,
                            intensity: opts.light_intensity,
                        },
                        position,
                        intensity: opts.light_intensity,
                    })
                    .collect()
            },
            LightSource::Custom(specs) => specs
                .iter()
                .map(|spec| {
                    let intensity = spec.intensity_or(opts.light_intensity);
                    match *spec {
                        LightSpec::Point { position, .. } => PlacedLight {
                            emitter: Emitter::Point {
                                position,
                                intensity,
                            },
                            position,
                            intensity,
                        },
                        // Pointing at the light; the emitted light travels the
                        // other way.
                        LightSpec::Directional { direction, .. } => PlacedLight {
                            emitter: Emitter::Directional {
                                direction: -direction,
                                irradiance: intensity,
                            },
                            position: direction * opts.light_distance,
                            intensity,
                        },
                    }
                })
                .collect(),
        };
        if lights.is_empty() {
            return Err(Error::parameter(
                "light_count",
                "a dataset needs at least one light",
            ));
        }
        Ok(lights)
    }

    fn rejected(&self, job: &DatasetJob, error: Error) -> DatasetReport {
        log::error!("[{}] rejected: {}", job.name, error);
        DatasetReport {
            name: job.name.clone(),
            dir: self.output_root.join(&job.name),
            state: DatasetState::Failed,
            history: vec![DatasetState::Init, DatasetState::Failed],
            images: Vec::new(),
            material: None,
            error: Some(error),
        }
    }

    /// Generates independent datasets, returning their reports in job order.
    ///
    /// Datasets run in parallel, on a pool of `threads` workers if given.
    /// A failed dataset never stops the others. Jobs reusing the name of an
    /// earlier job are rejected, so no two datasets share a directory.
    pub fn generate_batch(
        &self,
        jobs: &[DatasetJob],
        threads: Option<usize>,
    ) -> Vec<DatasetReport> {
        use rayon::prelude::*;

        let mut seen = HashSet::new();
        let duplicate: Vec<bool> = jobs
            .iter()
            .map(|job| !seen.insert(job.name.as_str()))
            .collect();
        let run_all = || {
            jobs.par_iter()
                .zip(duplicate.par_iter())
                .map(|(job, &dup)| {
                    if dup {
                        self.rejected(
                            job,
                            Error::config(format!(
                                "dataset name '{}' is used by an earlier job",
                                job.name
                            )),
                        )
                    } else {
                        self.generate(job)
                    }
                })
                .collect::<Vec<_>>()
        };

        log::info!("Generating {} datasets", jobs.len());
        let reports = match threads {
            Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => pool.install(run_all),
                Err(err) => {
                    log::warn!(
                        "Cannot build a pool of {} threads ({}), using the global pool",
                        n,
                        err
                    );
                    run_all()
                },
            },
            None => run_all(),
        };
        let succeeded = reports.iter().filter(|r| r.is_success()).count();
        log::info!("{}/{} datasets complete", succeeded, reports.len());
        reports
    }
}

/// A dataset name must be a single plain path component.
fn validate_name(name: &str) -> Result<(), Error> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == OsStr::new(name) => Ok(()),
        _ => Err(Error::config(format!(
            "invalid dataset name '{}': must be a single directory name",
            name
        ))),
    }
}

/// Content of a verified dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    /// Dataset name.
    pub name: String,
    /// Number of lights.
    pub light_count: usize,
    /// Lit images, in light order.
    pub images: Vec<PathBuf>,
    /// Normal map.
    pub normal_map: PathBuf,
}

/// Checks that `dir` holds a complete dataset.
///
/// Returns the first problem found.
pub fn verify_dataset<P: AsRef<Path>>(dir: P) -> Result<DatasetSummary, Error> {
    let dir = dir.as_ref();
    for sub in ["images", "output"] {
        if !dir.join(sub).is_dir() {
            return Err(Error::format(dir, format!("missing {}/ directory", sub)));
        }
    }
    let config = DatasetConfig::load(&dir.join(CONFIG_FILE_NAME))?;
    let positions = config.lights.positions.len();
    if config.lights.count != positions {
        return Err(Error::format(
            dir,
            format!(
                "lights.count is {} but {} positions are recorded",
                config.lights.count, positions
            ),
        ));
    }
    if config.reconstruction.input_images.len() != positions {
        return Err(Error::format(
            dir,
            format!(
                "{} input images recorded for {} lights",
                config.reconstruction.input_images.len(),
                positions
            ),
        ));
    }

    // Recorded paths are relative to the output root.
    let root = dir.parent().unwrap_or_else(|| Path::new("."));
    let existing = |recorded: &str| -> Result<PathBuf, Error> {
        let path = root.join(recorded);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::format(dir, format!("missing image {}", recorded)))
        }
    };
    let images = config
        .reconstruction
        .input_images
        .iter()
        .map(|p| existing(p))
        .collect::<Result<Vec<_>, _>>()?;
    let normal_map = existing(&config.reconstruction.ground_truth_normal)?;
    log::debug!("{} verified: {} lights", dir.display(), positions);
    Ok(DatasetSummary {
        name: config.dataset,
        light_count: positions,
        images,
        normal_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_name() {
        assert_eq!(
            dataset_name(
                Path::new("objects/sphere.obj"),
                Some(Path::new("brdfs/gold-metallic-paint.binary"))
            ),
            "sphere_gold-metallic-paint_data"
        );
        assert_eq!(dataset_name(Path::new("cube.obj"), None), "cube_data");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("sphere_gold_data").is_ok());
        for bad in ["", "a/b", "..", ".", "/abs", "x/"] {
            assert!(matches!(validate_name(bad), Err(Error::Config(_))), "{bad}");
        }
    }

    #[test]
    fn test_batch_jobs_product_and_limit() {
        let meshes = vec![PathBuf::from("a.obj"), PathBuf::from("b.obj")];
        let brdfs = vec![PathBuf::from("x.binary"), PathBuf::from("y.binary")];
        let names: Vec<_> = batch_jobs(&meshes, &brdfs, None)
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names, ["a_x_data", "a_y_data", "b_x_data", "b_y_data"]);
        assert_eq!(batch_jobs(&meshes, &brdfs, Some(3)).len(), 3);
        assert_eq!(batch_jobs(&meshes, &[], Some(10)).len(), 2);
    }

    #[test]
    fn test_failed_at() {
        let report = DatasetReport {
            name: "x".into(),
            dir: PathBuf::from("x"),
            state: DatasetState::Failed,
            history: vec![
                DatasetState::Init,
                DatasetState::LightSampling,
                DatasetState::RenderLight(1),
                DatasetState::RenderLight(2),
                DatasetState::Failed,
            ],
            images: vec![],
            material: None,
            error: Some(Error::render("boom")),
        };
        assert!(!report.is_success());
        assert_eq!(report.failed_at(), Some(DatasetState::RenderLight(2)));
    }

    #[test]
    fn test_options_from_toml() {
        let opts: DatasetOptions = toml::from_str(
            "light_count = 8\npattern = \"grid\"\nintegrator = { type = \"path\", max_depth = 6 }\n\
             [camera]\nposition = [0.0, 0.0, 4.0]\ntarget = [0.0, 0.0, 0.0]\nup = [0.0, 1.0, 0.0]\n\
             fov = 30.0\nwidth = 128\nheight = 96\n",
        )
        .unwrap();
        assert_eq!(opts.light_count, 8);
        assert_eq!(opts.pattern, LightPattern::Grid);
        assert_eq!(opts.integrator, Integrator::Path { max_depth: 6 });
        assert_eq!(opts.camera.height, 96);
        assert_eq!(opts.spp, 64);
        assert_eq!(opts.light_distance, 2.0);
    }

    #[test]
    fn test_partial_camera_table_keeps_defaults() {
        let opts: DatasetOptions = toml::from_str("[camera]\nwidth = 128\n").unwrap();
        let default = Camera::default();
        assert_eq!(opts.camera.width, 128);
        assert_eq!(opts.camera.height, default.height);
        assert_eq!(opts.camera.position, default.position);
        assert_eq!(opts.camera.fov, default.fov);
    }
}
