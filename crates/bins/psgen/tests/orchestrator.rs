use base::{math::dvec3, Error};
use bxdf::{AnalyticMaterial, ConductorSpec, MetalPreset};
use image::{Rgb, Rgb32FImage};
use psgen::{
    dataset::{
        verify_dataset, CancelToken, DatasetConfig, DatasetJob, DatasetOptions,
        DatasetOrchestrator, DatasetState, CONFIG_FILE_NAME,
    },
    light::LightSpec,
    render::Renderer,
    scene::{Emitter, Geometry, Integrator, SceneDescription},
};
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

/// Renderer returning flat images, optionally failing on the n-th call.
#[derive(Default)]
struct FakeRenderer {
    calls: AtomicUsize,
    fail_on: Option<usize>,
    cancel_on_first: Option<CancelToken>,
    remove_on_first: Option<PathBuf>,
    scenes: Mutex<Vec<SceneDescription>>,
}

impl FakeRenderer {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::default()
        }
    }

    fn scenes(&self) -> Vec<SceneDescription> { self.scenes.lock().unwrap().clone() }
}

impl Renderer for FakeRenderer {
    fn render(&self, scene: &SceneDescription, _spp: u32) -> Result<Rgb32FImage, Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.scenes.lock().unwrap().push(scene.clone());
        if let Some(token) = &self.cancel_on_first {
            token.cancel();
        }
        if let Some(path) = self.remove_on_first.as_ref().filter(|_| call == 1) {
            std::fs::remove_file(path).unwrap();
        }
        if self.fail_on == Some(call) {
            return Err(Error::render(format!("synthetic failure on call {}", call)));
        }
        let level = 0.1 * call as f32;
        Ok(Rgb32FImage::from_pixel(
            scene.camera.width,
            scene.camera.height,
            Rgb([level, level, level]),
        ))
    }
}

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("psgen-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn small_options(light_count: usize) -> DatasetOptions {
    let mut opts = DatasetOptions {
        light_count,
        spp: 4,
        ..DatasetOptions::default()
    };
    opts.camera.width = 8;
    opts.camera.height = 6;
    opts
}

fn write_cube(dir: &Path) -> PathBuf {
    let path = dir.join("cube.obj");
    surf::obj::save_shape(&surf::Shape::Cube { size: 1.5 }, &path).unwrap();
    path
}

fn write_merl(path: &Path, dims: [i32; 3], value: f64) {
    let mut file = std::fs::File::create(path).unwrap();
    for d in dims {
        file.write_all(&d.to_le_bytes()).unwrap();
    }
    let n = (dims[0] * dims[1] * dims[2] * 3) as usize;
    for _ in 0..n {
        file.write_all(&value.to_le_bytes()).unwrap();
    }
}

#[test]
fn successful_run_writes_every_artifact() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let renderer = FakeRenderer::default();
    let orchestrator = DatasetOrchestrator::new(&renderer, root.join("out"), small_options(3));

    let report = orchestrator.generate(&DatasetJob::new(&mesh, None));
    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.name, "cube_data");
    assert_eq!(report.history, [
        DatasetState::Init,
        DatasetState::LightSampling,
        DatasetState::RenderLight(1),
        DatasetState::RenderLight(2),
        DatasetState::RenderLight(3),
        DatasetState::RenderNormal,
        DatasetState::WriteConfig,
        DatasetState::Done,
    ]);
    assert_eq!(report.images.len(), 4);

    let dir = root.join("out").join("cube_data");
    assert!(dir.join("output").is_dir());
    for name in ["light_1.png", "light_2.png", "light_3.png", "ground_truth_normal.png"] {
        assert!(dir.join("images").join(name).is_file(), "{name}");
    }
    let image = image::open(dir.join("images/light_2.png")).unwrap().into_rgb8();
    assert_eq!(image.dimensions(), (8, 6));
    assert_eq!(image.get_pixel(0, 0).0, [51, 51, 51]);

    let config = DatasetConfig::load(&dir.join(CONFIG_FILE_NAME)).unwrap();
    assert_eq!(config.dataset, "cube_data");
    assert_eq!(config.lights.count, 3);
    assert_eq!(config.lights.intensities.get("light_3"), Some(&50.0));
    assert_eq!(config.camera.intrinsic_matrix.cx, 4.0);
    assert_eq!(config.camera.intrinsic_matrix.cy, 3.0);
    assert_eq!(
        config.reconstruction.ground_truth_normal,
        "cube_data/images/ground_truth_normal.png"
    );

    let summary = verify_dataset(&dir).unwrap();
    assert_eq!(summary.light_count, 3);
    assert_eq!(summary.images.len(), 3);

    let scenes = renderer.scenes();
    assert_eq!(scenes.len(), 4);
    for scene in &scenes[..3] {
        assert_eq!(scene.integrator, Integrator::Direct);
        assert!(matches!(
            scene.emitter,
            Some(Emitter::Point { intensity, .. }) if intensity == 50.0
        ));
        assert_eq!(scene.surface.geometry, Geometry::Mesh { path: mesh.clone() });
    }
    let normal = &scenes[3];
    assert_eq!(normal.integrator, Integrator::Normals);
    assert_eq!(normal.emitter, None);
    assert_eq!(normal.surface.material, AnalyticMaterial::neutral());

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn failure_at_second_light_leaves_no_config() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let renderer = FakeRenderer::failing_on(2);
    let orchestrator = DatasetOrchestrator::new(&renderer, &root, small_options(4));

    let report = orchestrator.generate(&DatasetJob::new(&mesh, None));
    assert!(!report.is_success());
    assert_eq!(report.state, DatasetState::Failed);
    assert_eq!(report.failed_at(), Some(DatasetState::RenderLight(2)));
    assert!(matches!(report.error, Some(Error::Render(_))));

    let dir = root.join("cube_data");
    assert!(dir.join("images/light_1.png").is_file());
    assert!(!dir.join("images/light_2.png").exists());
    assert!(!dir.join(CONFIG_FILE_NAME).exists());
    assert!(verify_dataset(&dir).is_err());
    // Nothing is rendered after the failure.
    assert_eq!(renderer.scenes().len(), 2);

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn rerun_starts_from_a_clean_directory() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let job = DatasetJob::new(&mesh, None).with_name("rerun");

    let first = DatasetOrchestrator::new(FakeRenderer::default(), &root, small_options(4));
    assert!(first.generate(&job).is_success());
    let dir = root.join("rerun");
    std::fs::write(dir.join("images/stray.txt"), "left over").unwrap();
    assert!(dir.join(CONFIG_FILE_NAME).is_file());

    let second = DatasetOrchestrator::new(FakeRenderer::failing_on(2), &root, small_options(2));
    let report = second.generate(&job);
    assert!(!report.is_success());
    assert!(dir.join("images/light_1.png").is_file());
    for stale in [
        "images/light_3.png",
        "images/light_4.png",
        "images/stray.txt",
        CONFIG_FILE_NAME,
    ] {
        assert!(!dir.join(stale).exists(), "{stale}");
    }

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn cancellation_between_steps_fails_the_dataset() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let token = CancelToken::new();
    let renderer = FakeRenderer {
        cancel_on_first: Some(token.clone()),
        ..FakeRenderer::default()
    };
    let orchestrator =
        DatasetOrchestrator::new(&renderer, &root, small_options(3)).with_cancel_token(token);

    let report = orchestrator.generate(&DatasetJob::new(&mesh, None));
    assert!(matches!(report.error, Some(Error::Cancelled)));
    assert_eq!(report.history.last(), Some(&DatasetState::Failed));
    assert_eq!(report.failed_at(), Some(DatasetState::RenderLight(2)));
    assert_eq!(renderer.scenes().len(), 1);
    assert!(!root.join("cube_data").join(CONFIG_FILE_NAME).exists());
    assert!(orchestrator.cancel_token().is_cancelled());

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn missing_mesh_is_rendered_as_unit_sphere() {
    let root = scratch_dir();
    let renderer = FakeRenderer::default();
    let orchestrator = DatasetOrchestrator::new(&renderer, &root, small_options(1));

    let report = orchestrator.generate(&DatasetJob::new(root.join("bunny.obj"), None));
    assert!(report.is_success(), "{:?}", report.error);
    for scene in renderer.scenes() {
        assert_eq!(scene.surface.geometry, Geometry::unit_sphere());
    }

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn geometry_is_resolved_once_per_dataset() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let renderer = FakeRenderer {
        remove_on_first: Some(mesh.clone()),
        ..FakeRenderer::default()
    };
    let orchestrator = DatasetOrchestrator::new(&renderer, &root, small_options(3));

    let report = orchestrator.generate(&DatasetJob::new(&mesh, None));
    assert!(report.is_success(), "{:?}", report.error);
    assert!(!mesh.exists());
    let scenes = renderer.scenes();
    assert_eq!(scenes.len(), 4);
    // Losing the file mid-run must not switch the remaining images to the
    // fallback sphere.
    for scene in &scenes {
        assert_eq!(scene.surface.geometry, Geometry::Mesh { path: mesh.clone() });
    }

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn custom_lights_are_recorded_as_given() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let renderer = FakeRenderer::default();
    let orchestrator = DatasetOrchestrator::new(&renderer, &root, small_options(4));
    let job = DatasetJob::new(&mesh, None).with_lights(vec![
        LightSpec::Point {
            position: dvec3(0.0, 1.0, 3.0),
            intensity: Some(20.0),
        },
        LightSpec::Directional {
            direction: dvec3(0.0, 0.0, 1.0),
            intensity: None,
        },
    ]);

    let report = orchestrator.generate(&job);
    assert!(report.is_success(), "{:?}", report.error);
    let config = DatasetConfig::load(&report.dir.join(CONFIG_FILE_NAME)).unwrap();
    assert_eq!(config.lights.count, 2);
    assert_eq!(config.lights.positions.get("light_1"), Some(&[0.0, 1.0, 3.0]));
    assert_eq!(config.lights.positions.get("light_2"), Some(&[0.0, 0.0, 2.0]));
    assert_eq!(config.lights.intensities.get("light_1"), Some(&20.0));
    assert_eq!(config.lights.intensities.get("light_2"), Some(&50.0));

    let scenes = renderer.scenes();
    assert_eq!(
        scenes[1].emitter,
        Some(Emitter::Directional {
            direction: dvec3(0.0, 0.0, -1.0),
            irradiance: 50.0,
        })
    );

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn measured_brdf_drives_the_lit_material_only() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let brdf = root.join("gold_ring.binary");
    write_merl(&brdf, [2, 2, 4], 300.0);
    let renderer = FakeRenderer::default();
    let orchestrator = DatasetOrchestrator::new(&renderer, &root, small_options(2));

    let report = orchestrator.generate(&DatasetJob::new(&mesh, Some(&brdf)));
    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.name, "cube_gold_ring_data");
    let scenes = renderer.scenes();
    assert!(matches!(
        scenes[0].surface.material,
        AnalyticMaterial::RoughConductor {
            conductor: ConductorSpec::Preset(MetalPreset::Au),
            ..
        }
    ));
    assert_eq!(scenes[2].surface.material, AnalyticMaterial::neutral());
    assert_eq!(orchestrator.cache().misses(), 1);

    // A second dataset with the same BRDF reuses the loaded table.
    let again = orchestrator.generate(&DatasetJob::new(&mesh, Some(&brdf)).with_name("again"));
    assert!(again.is_success());
    assert_eq!(orchestrator.cache().misses(), 1);
    assert_eq!(orchestrator.cache().hits(), 1);

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn invalid_name_fails_before_touching_the_disk() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let orchestrator =
        DatasetOrchestrator::new(FakeRenderer::default(), root.join("out"), small_options(1));

    let report = orchestrator.generate(&DatasetJob::new(&mesh, None).with_name("../escape"));
    assert!(matches!(report.error, Some(Error::Config(_))));
    assert_eq!(report.failed_at(), Some(DatasetState::Init));
    assert!(!root.join("escape").exists());
    assert!(!root.join("out").exists());

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn batch_keeps_order_and_rejects_duplicate_names() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let renderer = FakeRenderer::default();
    let orchestrator = DatasetOrchestrator::new(&renderer, root.join("out"), small_options(2));
    let jobs = vec![
        DatasetJob::new(&mesh, None).with_name("first"),
        DatasetJob::new(&mesh, None).with_name("first"),
        DatasetJob::new(root.join("missing.obj"), None).with_name("second"),
    ];

    let reports = orchestrator.generate_batch(&jobs, Some(2));
    let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["first", "first", "second"]);
    assert!(reports[0].is_success());
    assert!(matches!(reports[1].error, Some(Error::Config(_))));
    assert!(reports[2].is_success());
    // Two datasets of three renders each.
    assert_eq!(renderer.scenes().len(), 6);

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn batch_continues_after_a_failed_dataset() {
    let root = scratch_dir();
    let mesh = write_cube(&root);
    let renderer = FakeRenderer::failing_on(1);
    let orchestrator = DatasetOrchestrator::new(&renderer, &root, small_options(1));
    let jobs = vec![
        DatasetJob::new(&mesh, None).with_name("a"),
        DatasetJob::new(&mesh, None).with_name("b"),
    ];

    // One worker, so the first render call belongs to the first dataset.
    let reports = orchestrator.generate_batch(&jobs, Some(1));
    assert!(!reports[0].is_success());
    assert!(reports[1].is_success());
    assert!(verify_dataset(root.join("b")).is_ok());
    assert!(!root.join("a").join(CONFIG_FILE_NAME).exists());

    std::fs::remove_dir_all(root).unwrap();
}
