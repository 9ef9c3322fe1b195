use crate::app::{cli::ansi, Config};
use base::Error;
use bxdf::{ApproximationMode, BrdfCache, MaterialApproximator, MerlLayout};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[clap(about = "Print the analytic material approximating measured BRDFs.")]
pub struct MaterialOptions {
    #[clap(num_args = 1.., required = true, help = "MERL BRDF files")]
    pub brdfs: Vec<PathBuf>,

    #[clap(
        short,
        long,
        default_value = "measured",
        help = "Approximation mode: measured or tinted"
    )]
    pub approximation: ApproximationMode,

    #[clap(long, help = "Samples are stored channel by channel")]
    pub planar: bool,

    #[clap(long, help = "Print the materials as JSON")]
    pub json: bool,
}

pub fn material(opts: MaterialOptions, config: Config) -> Result<(), Error> {
    let layout = if opts.planar {
        MerlLayout::Planar
    } else {
        MerlLayout::Interleaved
    };
    let cache = BrdfCache::new(config.brdf_cache_capacity()).with_layout(layout);
    let approximator = MaterialApproximator::new(opts.approximation);
    for path in &opts.brdfs {
        let path = config.resolve_path(path);
        let table = cache.load(&path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let material = approximator.approximate(Some(&table), &name);
        if opts.json {
            println!("{}", serde_json::to_string(&material)?);
            continue;
        }
        let [r, g, b] = table.channel_mean();
        println!("{}{}{}", ansi::BRIGHT_CYAN, name, ansi::RESET);
        println!("  - dims     : {:?}", table.dims());
        println!("  - mean     : ({:.6}, {:.6}, {:.6})", r, g, b);
        println!("  - std dev  : {:.6}", table.std_dev());
        println!("  - material : {}", material);
    }
    Ok(())
}
