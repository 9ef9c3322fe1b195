use base::Error;
use image::{Rgb, Rgb32FImage};
use psgen::{
    preview::{LightingPreset, PreviewRenderer, PreviewSettings, RENDER_CONFIG_FILE_NAME},
    render::Renderer,
    scene::{Emitter, Geometry, SceneDescription},
};
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Renderer returning white images, failing for scenes lit by an ambient
/// light when asked to.
#[derive(Default)]
struct FakeRenderer {
    fail_ambient: bool,
    scenes: Mutex<Vec<SceneDescription>>,
}

impl Renderer for FakeRenderer {
    fn render(&self, scene: &SceneDescription, _spp: u32) -> Result<Rgb32FImage, Error> {
        self.scenes.lock().unwrap().push(scene.clone());
        if self.fail_ambient && matches!(scene.emitter, Some(Emitter::Ambient { .. })) {
            return Err(Error::render("no ambient light today"));
        }
        Ok(Rgb32FImage::from_pixel(
            scene.camera.width,
            scene.camera.height,
            Rgb([1.0, 1.0, 1.0]),
        ))
    }
}

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("psgen-preview-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn small_settings() -> PreviewSettings {
    let mut settings = PreviewSettings {
        spp: 2,
        ..PreviewSettings::default()
    };
    settings.camera.width = 4;
    settings.camera.height = 3;
    settings
}

fn write_merl(path: &Path, value: f64) {
    let mut file = std::fs::File::create(path).unwrap();
    for d in [1i32, 1, 1] {
        file.write_all(&d.to_le_bytes()).unwrap();
    }
    for _ in 0..3 {
        file.write_all(&value.to_le_bytes()).unwrap();
    }
}

#[test]
fn every_mesh_material_and_preset_is_rendered() {
    let root = scratch_dir();
    let mesh = root.join("cube.obj");
    surf::obj::save_shape(&surf::Shape::Cube { size: 1.0 }, &mesh).unwrap();
    let brdfs = vec![root.join("red.binary"), root.join("blue.binary")];
    for brdf in &brdfs {
        write_merl(brdf, 0.5);
    }
    let out = root.join("previews");
    let renderer = FakeRenderer::default();
    let previewer = PreviewRenderer::new(&renderer, &out, small_settings());

    let report = previewer.render_all(&[mesh.clone()], &brdfs);
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.images.len(), 2 * LightingPreset::ALL.len());
    for brdf in ["red", "blue"] {
        for preset in LightingPreset::ALL {
            let stem = format!("cube_{}_{}", brdf, preset.name());
            let image = image::open(out.join(format!("{stem}.png"))).unwrap();
            assert_eq!((image.width(), image.height()), (4, 3));
            let scene: SceneDescription = serde_json::from_str(
                &std::fs::read_to_string(out.join(format!("{stem}.json"))).unwrap(),
            )
            .unwrap();
            assert_eq!(scene.emitters().copied().collect::<Vec<_>>(), preset.emitters());
            assert_eq!(scene.surface.geometry, Geometry::Mesh { path: mesh.clone() });
        }
    }

    let config: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join(RENDER_CONFIG_FILE_NAME)).unwrap(),
    )
    .unwrap();
    assert_eq!(config["camera"]["width"], 4);
    assert_eq!(config["render"]["spp"], 2);
    assert_eq!(config["render"]["integrator"]["type"], "direct");
    assert_eq!(config["lighting"][1]["name"], "top_point");
    assert_eq!(config["lighting"][1]["emitters"][0]["intensity"], 50.0);
    assert_eq!(config["lighting"][3]["emitters"].as_array().unwrap().len(), 3);

    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn neutral_material_and_missing_mesh_fall_back() {
    let root = scratch_dir();
    let renderer = FakeRenderer::default();
    let settings = PreviewSettings {
        presets: vec![LightingPreset::TopPoint],
        ..small_settings()
    };
    let previewer = PreviewRenderer::new(&renderer, &root, settings);

    let report = previewer.render_all(&[root.join("bunny.obj")], &[]);
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.images, [root.join("bunny_neutral_top_point.png")]);
    let scenes = renderer.scenes.lock().unwrap();
    assert_eq!(scenes[0].surface.geometry, Geometry::unit_sphere());

    drop(scenes);
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn failed_previews_do_not_stop_the_others() {
    let root = scratch_dir();
    let renderer = FakeRenderer {
        fail_ambient: true,
        ..FakeRenderer::default()
    };
    let previewer = PreviewRenderer::new(&renderer, &root, small_settings());

    let report = previewer.render_all(&[root.join("a.obj"), root.join("b.obj")], &[]);
    assert!(!report.is_success());
    let failed: Vec<_> = report.failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, ["a_neutral_ambient", "b_neutral_ambient"]);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f.error, Error::Render(_))));
    assert_eq!(report.images.len(), 2 * (LightingPreset::ALL.len() - 1));
    assert!(!root.join("a_neutral_ambient.png").exists());
    assert!(root.join("b_neutral_multi_point.png").is_file());

    std::fs::remove_dir_all(root).unwrap();
}
