use crate::{
    app::{
        cli::{ansi, external_renderer, input_files, prepare_output_root},
        Config,
    },
    preview::{LightingPreset, PreviewRenderer, PreviewSettings},
};
use base::Error;
use bxdf::{ApproximationMode, BrdfCache};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[clap(about = "Render meshes and materials under fixed lighting presets.")]
pub struct PreviewOptions {
    #[clap(
        long,
        num_args = 1..,
        help = "OBJ files [default: every *.obj in the mesh directory]"
    )]
    pub meshes: Vec<PathBuf>,

    #[clap(
        long,
        num_args = 1..,
        help = "MERL BRDF files [default: every *.binary in the BRDF\ndirectory]"
    )]
    pub brdfs: Vec<PathBuf>,

    #[clap(
        long,
        value_enum,
        num_args = 1..,
        help = "Lighting presets [default: all of them]"
    )]
    pub presets: Vec<LightingPreset>,

    #[clap(long, help = "Samples per pixel [default: 64]")]
    pub spp: Option<u32>,

    #[clap(long, help = "Image width in pixels [default: 512]")]
    pub width: Option<u32>,

    #[clap(long, help = "Image height in pixels [default: 512]")]
    pub height: Option<u32>,

    #[clap(long, help = "Material approximation: measured or tinted")]
    pub approximation: Option<ApproximationMode>,

    #[clap(
        short,
        long,
        help = "Directory receiving the previews [default: previews in\nthe output directory]"
    )]
    pub output: Option<PathBuf>,
}

impl PreviewOptions {
    /// Overrides the default settings with the values given on the command
    /// line.
    pub fn settings(&self) -> PreviewSettings {
        let mut settings = PreviewSettings::default();
        if !self.presets.is_empty() {
            settings.presets = self.presets.clone();
        }
        if let Some(spp) = self.spp {
            settings.spp = spp;
        }
        if let Some(w) = self.width {
            settings.camera.width = w;
        }
        if let Some(h) = self.height {
            settings.camera.height = h;
        }
        if let Some(mode) = self.approximation {
            settings.approximation = mode;
        }
        settings
    }
}

pub fn preview(opts: PreviewOptions, config: Config) -> Result<(), Error> {
    let (meshes, brdfs) = input_files(&config, &opts.meshes, &opts.brdfs)?;
    let output = match &opts.output {
        Some(dir) => prepare_output_root(&config, Some(dir))?,
        None => prepare_output_root(&config, None)?.join("previews"),
    };
    let previewer = PreviewRenderer::new(external_renderer(&config)?, &output, opts.settings())
        .with_cache(BrdfCache::new(config.brdf_cache_capacity()));

    println!(
        "Rendering previews of {} meshes x {} BRDFs x {} presets in {}",
        meshes.len(),
        brdfs.len().max(1),
        previewer.settings().presets.len(),
        output.display()
    );
    let report = previewer.render_all(&meshes, &brdfs);
    for failure in &report.failures {
        println!(
            "{} {}: {}",
            ansi::RED_EXCLAMATION,
            failure.name,
            failure.error
        );
    }
    println!(
        "{} {} previews rendered",
        ansi::CYAN_CHECK,
        report.images.len()
    );
    if !report.is_success() {
        return Err(Error::render(format!(
            "{} previews failed",
            report.failures.len()
        )));
    }
    Ok(())
}
