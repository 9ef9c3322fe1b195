use crate::{
    app::{
        args::DatasetArgs,
        cli::{external_renderer, prepare_output_root, print_report},
        Config,
    },
    dataset::{DatasetJob, DatasetOrchestrator},
    light,
};
use base::Error;
use bxdf::BrdfCache;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[clap(about = "Generate one photometric-stereo dataset.")]
pub struct GenerateOptions {
    #[clap(short, long, help = "OBJ file of the object")]
    pub mesh: PathBuf,

    #[clap(short, long, help = "MERL BRDF file [default: neutral grey material]")]
    pub brdf: Option<PathBuf>,

    #[clap(long, help = "Dataset name [default: <mesh>_<brdf>_data]")]
    pub name: Option<String>,

    #[clap(long, help = "YAML light list used instead of a sampled pattern")]
    pub lights_file: Option<PathBuf>,

    #[clap(flatten)]
    pub dataset: DatasetArgs,
}

pub fn generate(opts: GenerateOptions, config: Config) -> Result<(), Error> {
    let mut options = config.dataset_options();
    opts.dataset.apply(&mut options);
    let root = prepare_output_root(&config, opts.dataset.output.as_deref())?;

    let mesh = config.resolve_path(&opts.mesh);
    let brdf = opts.brdf.as_deref().map(|p| config.resolve_path(p));
    let mut job = DatasetJob::new(&mesh, brdf.as_deref());
    if let Some(name) = opts.name {
        job = job.with_name(name);
    }
    if let Some(file) = &opts.lights_file {
        job = job.with_lights(light::load_light_list(config.resolve_path(file))?);
    }

    let orchestrator = DatasetOrchestrator::new(external_renderer(&config)?, &root, options)
        .with_cache(BrdfCache::new(config.brdf_cache_capacity()));
    println!("Generating {} in {}", job.name, root.display());
    let mut report = orchestrator.generate(&job);
    print_report(&report);
    match report.error.take() {
        None => Ok(()),
        Some(err) => Err(err),
    }
}
