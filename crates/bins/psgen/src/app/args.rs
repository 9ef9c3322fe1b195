use crate::{
    app::cli::{
        BatchOptions, GenerateOptions, LightsOptions, MaterialOptions, MeshOptions,
        PreviewOptions, VerifyOptions,
    },
    dataset::DatasetOptions,
    light::LightPattern,
};
use bxdf::ApproximationMode;
use std::path::PathBuf;

/// psgen command line interface arguments.
#[derive(clap::Parser, Debug)]
#[clap(
    author,
    version,
    about = "Synthetic photometric-stereo dataset generator."
)]
pub struct CliArgs {
    /// Whether to print any information to stdout.
    #[clap(short, long, help = "Only print errors (log level = 0)")]
    pub quiet: bool,

    /// Whether to print verbose information to stdout.
    #[clap(short, long, help = "Use verbose output (log level = 4)")]
    pub verbose: bool,

    /// Whether to show the timestamp in the log.
    #[clap(
        long,
        help = "Show timestamp for each log message in seconds since\nprogram starts"
    )]
    pub log_timestamp: bool,

    /// Verbosity level for the log.
    #[clap(
        long,
        help = "Setting logging verbosity level (higher for more\ndetails)\n  0 - error\n  1 - \
                warn + error\n  2 - info + warn + error\n  3 - debug + info + warn + error\n  4 - \
                trace + debug + info + warn + error\n\x08",
        default_value_t = 1
    )]
    pub log_level: u8,

    /// Path to the user config file. If not specified, psgen looks for
    /// `psgen.toml` in the current and the system configuration directory.
    #[clap(short, long, help = "Path to the user config file")]
    pub config: Option<PathBuf>,

    /// Command to execute.
    #[clap(subcommand)]
    pub command: SubCommand,
}

/// psgen command.
#[derive(clap::Subcommand, Debug)]
pub enum SubCommand {
    /// Writes parametric meshes as OBJ files.
    Mesh(MeshOptions),

    /// Prints the positions of a light pattern.
    Lights(LightsOptions),

    /// Prints the analytic material approximating a measured BRDF.
    Material(MaterialOptions),

    /// Generates one dataset.
    Generate(GenerateOptions),

    /// Generates a dataset for every mesh and BRDF pair.
    Batch(BatchOptions),

    /// Renders meshes and materials under fixed lighting presets.
    Preview(PreviewOptions),

    /// Checks the structure of generated datasets.
    Verify(VerifyOptions),

    /// Prints the resolved configuration.
    #[clap(name = "info")]
    PrintInfo,
}

/// Dataset parameters that can be set on the command line.
///
/// Unset values keep the configured ones.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DatasetArgs {
    /// Number of lights.
    #[clap(long, help = "Number of sampled lights")]
    pub lights: Option<usize>,

    /// Light distribution.
    #[clap(long, value_enum, help = "Light distribution pattern")]
    pub pattern: Option<LightPattern>,

    /// Distance of the lights.
    #[clap(long, help = "Distance of the lights to the origin")]
    pub distance: Option<f64>,

    /// Intensity of the lights.
    #[clap(long, help = "Intensity of the lights")]
    pub intensity: Option<f64>,

    /// Samples per pixel.
    #[clap(long, help = "Samples per pixel")]
    pub spp: Option<u32>,

    /// Image width.
    #[clap(long, help = "Image width in pixels")]
    pub width: Option<u32>,

    /// Image height.
    #[clap(long, help = "Image height in pixels")]
    pub height: Option<u32>,

    /// Horizontal field of view.
    #[clap(long, help = "Horizontal field of view in degrees")]
    pub fov: Option<f64>,

    /// Focal length recorded in the dataset description.
    #[clap(long, help = "Focal length in pixels [default: derived from fov]")]
    pub focal_length: Option<f64>,

    /// Material approximation mode.
    #[clap(long, help = "Material approximation: measured or tinted")]
    pub approximation: Option<ApproximationMode>,

    /// Output root.
    #[clap(short, long, help = "Directory receiving the datasets")]
    pub output: Option<PathBuf>,
}

impl DatasetArgs {
    /// Overrides the options with the values given on the command line.
    pub fn apply(&self, opts: &mut DatasetOptions) {
        if let Some(n) = self.lights {
            opts.light_count = n;
        }
        if let Some(pattern) = self.pattern {
            opts.pattern = pattern;
        }
        if let Some(d) = self.distance {
            opts.light_distance = d;
        }
        if let Some(i) = self.intensity {
            opts.light_intensity = i;
        }
        if let Some(spp) = self.spp {
            opts.spp = spp;
        }
        if let Some(w) = self.width {
            opts.camera.width = w;
        }
        if let Some(h) = self.height {
            opts.camera.height = h;
        }
        if let Some(fov) = self.fov {
            opts.camera.fov = fov;
        }
        if self.focal_length.is_some() {
            opts.focal_length = self.focal_length;
        }
        if let Some(mode) = self.approximation {
            opts.approximation = mode;
        }
    }
}
