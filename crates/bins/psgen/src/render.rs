//! Boundary to the renderer producing the images.

use crate::scene::SceneDescription;
use base::Error;
use image::{ImageFormat, Rgb, Rgb32FImage, RgbImage};
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, Mutex, PoisonError},
};

/// Number of failed scratch directories kept by default.
pub const DEFAULT_KEPT_FAILURES: usize = 4;

/// Something able to turn a scene description into an image.
///
/// Implementations are shared between batch workers; a single call renders
/// exactly one image.
pub trait Renderer: Send + Sync {
    /// Renders `scene` with `spp` samples per pixel.
    fn render(&self, scene: &SceneDescription, spp: u32) -> Result<Rgb32FImage, Error>;
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, scene: &SceneDescription, spp: u32) -> Result<Rgb32FImage, Error> {
        (**self).render(scene, spp)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&self, scene: &SceneDescription, spp: u32) -> Result<Rgb32FImage, Error> {
        (**self).render(scene, spp)
    }
}

/// Renders by running an external program.
///
/// The program is called as
/// `<program> <args..> --scene <scene.json> --output <image.png> --spp <n>`
/// and must write the image before exiting successfully.
///
/// Every call works in its own scratch directory, removed on success. The
/// directories of the most recent failed calls are kept for inspection, up
/// to a limit shared by all clones of the renderer.
#[derive(Debug, Clone)]
pub struct ExternalRenderer {
    program: PathBuf,
    args: Vec<String>,
    work_dir: PathBuf,
    keep_failed: usize,
    failed: Arc<Mutex<VecDeque<PathBuf>>>,
}

impl ExternalRenderer {
    /// Creates a renderer for `program`.
    ///
    /// A bare program name is looked up on `PATH`; anything containing a
    /// path separator is used as is but must exist.
    pub fn new<P: AsRef<Path>>(program: P, args: Vec<String>) -> Result<Self, Error> {
        let program = program.as_ref();
        let resolved = if program.components().count() > 1 {
            if !program.is_file() {
                return Err(Error::render(format!(
                    "renderer program {} does not exist",
                    program.display()
                )));
            }
            program.to_path_buf()
        } else {
            which::which(program).map_err(|err| {
                Error::render(format!(
                    "renderer program '{}' not found on PATH: {}",
                    program.display(),
                    err
                ))
            })?
        };
        log::debug!("Using renderer {}", resolved.display());
        Ok(Self {
            program: resolved,
            args,
            work_dir: std::env::temp_dir(),
            keep_failed: DEFAULT_KEPT_FAILURES,
            failed: Arc::default(),
        })
    }

    /// Sets the directory receiving the per-call scratch directories.
    pub fn with_work_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.work_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets how many scratch directories of failed calls are kept.
    pub fn with_kept_failures(mut self, count: usize) -> Self {
        self.keep_failed = count;
        self
    }

    /// Resolved program path.
    pub fn program(&self) -> &Path { &self.program }

    /// Remembers a failed scratch directory, deleting the oldest ones beyond
    /// the limit.
    fn keep_failure(&self, scratch: PathBuf) {
        let mut failed = self.failed.lock().unwrap_or_else(PoisonError::into_inner);
        log::debug!("Keeping {} for inspection", scratch.display());
        failed.push_back(scratch);
        while failed.len() > self.keep_failed {
            if let Some(oldest) = failed.pop_front() {
                remove_scratch(&oldest);
            }
        }
    }

    fn run(
        &self,
        scratch: &Path,
        scene: &SceneDescription,
        spp: u32,
    ) -> Result<Rgb32FImage, Error> {
        let scene_path = scratch.join("scene.json");
        let output_path = scratch.join("image.png");
        std::fs::write(&scene_path, scene.to_json()?)
            .map_err(|err| Error::io(err, &scene_path))?;

        log::trace!(
            "Running {} {:?} on {}",
            self.program.display(),
            self.args,
            scene_path.display()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--scene")
            .arg(&scene_path)
            .arg("--output")
            .arg(&output_path)
            .arg("--spp")
            .arg(spp.to_string())
            .output()
            .map_err(|err| {
                Error::render(format!("failed to run {}: {}", self.program.display(), err))
            })?;
        if !output.status.success() {
            return Err(Error::render(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !output_path.is_file() {
            return Err(Error::render(format!(
                "{} produced no image at {}",
                self.program.display(),
                output_path.display()
            )));
        }
        image::open(&output_path)
            .map(|img| img.into_rgb32f())
            .map_err(|err| {
                Error::render(format!(
                    "cannot decode rendered image {}: {}",
                    output_path.display(),
                    err
                ))
            })
    }
}

impl Renderer for ExternalRenderer {
    fn render(&self, scene: &SceneDescription, spp: u32) -> Result<Rgb32FImage, Error> {
        let scratch = self
            .work_dir
            .join(format!("psgen-render-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&scratch).map_err(|err| Error::io(err, &scratch))?;
        let result = self.run(&scratch, scene, spp);
        match result {
            Ok(_) => remove_scratch(&scratch),
            Err(_) => self.keep_failure(scratch),
        }
        result
    }
}

fn remove_scratch(dir: &Path) {
    if let Err(err) = std::fs::remove_dir_all(dir) {
        log::debug!("Could not remove {}: {}", dir.display(), err);
    }
}

/// Converts to 8 bits per channel, linearly, clamping to `[0, 1]`.
pub fn to_rgb8(image: &Rgb32FImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb(px) = *image.get_pixel(x, y);
        Rgb(px.map(|c| {
            let c = if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) };
            (c * 255.0).round() as u8
        }))
    })
}

/// Saves the image as an 8-bit PNG.
pub fn save_png(image: &Rgb32FImage, path: &Path) -> Result<(), Error> {
    to_rgb8(image).save_with_format(path, ImageFormat::Png)?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rgb8_clamps_linearly() {
        let mut img = Rgb32FImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([-1.0, 0.5, 2.0]));
        img.put_pixel(1, 0, Rgb([f32::NAN, 1.0, 0.0]));
        let out = to_rgb8(&img);
        assert_eq!(out.get_pixel(0, 0).0, [0, 128, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [0, 255, 0]);
    }

    #[test]
    fn test_save_png_reloads() {
        let dir = std::env::temp_dir().join(format!("psgen-png-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("grey.png");
        let img = Rgb32FImage::from_pixel(4, 3, Rgb([0.2, 0.4, 0.6]));
        save_png(&img, &path).unwrap();
        let back = image::open(&path).unwrap().into_rgb8();
        assert_eq!(back.dimensions(), (4, 3));
        assert_eq!(back.get_pixel(3, 2).0, [51, 102, 153]);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_program() {
        let err = ExternalRenderer::new("psgen-no-such-renderer-program", vec![]).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        let err = ExternalRenderer::new("/no/such/dir/renderer", vec![]).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("psgen-render-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_is_render_error() {
        use crate::scene::{compose_normals, Camera, Geometry};
        let Ok(renderer) = ExternalRenderer::new("false", vec![]) else {
            return;
        };
        let work_dir = scratch_dir();
        let renderer = renderer.with_work_dir(&work_dir).with_kept_failures(2);
        let scene = compose_normals(Geometry::unit_sphere(), &Camera::default());
        for _ in 0..5 {
            let err = renderer.render(&scene, 4).unwrap_err();
            assert!(matches!(err, Error::Render(_)), "{err}");
        }
        let kept = entries(&work_dir);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|dir| dir.join("scene.json").is_file()));
        std::fs::remove_dir_all(work_dir).unwrap();
    }

    /// Stand-in renderer checking its arguments and copying a fixture image
    /// to `--output`.
    #[cfg(unix)]
    const FAKE_RENDERER: &str = r#"
[ "$1" = "--mode" ] && [ "$2" = "preview" ] || exit 2
[ "$3" = "--scene" ] && [ -f "$4" ] || exit 3
[ "$5" = "--output" ] || exit 4
[ "$7" = "--spp" ] && [ "$8" = "7" ] || exit 5
grep -q '"normals"' "$4" || exit 6
cp "$(dirname "$0")/fixture.png" "$6"
"#;

    #[cfg(unix)]
    #[test]
    fn test_external_program_output_is_loaded() {
        use crate::scene::{compose_normals, Camera, Geometry};
        let Ok(_) = which::which("sh") else {
            return;
        };
        let dir = scratch_dir();
        let script = dir.join("render.sh");
        std::fs::write(&script, FAKE_RENDERER).unwrap();
        let fixture = Rgb32FImage::from_pixel(6, 4, Rgb([0.0, 0.5, 1.0]));
        save_png(&fixture, &dir.join("fixture.png")).unwrap();
        let work_dir = dir.join("work");
        std::fs::create_dir_all(&work_dir).unwrap();

        let renderer = ExternalRenderer::new(
            "sh",
            vec![
                script.to_string_lossy().into_owned(),
                "--mode".into(),
                "preview".into(),
            ],
        )
        .unwrap()
        .with_work_dir(&work_dir);
        let scene = compose_normals(Geometry::unit_sphere(), &Camera::default());
        let image = renderer.render(&scene, 7).unwrap();
        assert_eq!(image.dimensions(), (6, 4));
        assert_eq!(to_rgb8(&image).get_pixel(5, 3).0, [0, 128, 255]);
        assert!(entries(&work_dir).is_empty());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
