use crate::{
    app::{
        args::DatasetArgs,
        cli::{external_renderer, input_files, prepare_output_root, print_report},
        Config,
    },
    dataset::{batch_jobs, DatasetOrchestrator},
};
use base::Error;
use bxdf::BrdfCache;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[clap(about = "Generate a dataset for every mesh and BRDF pair.")]
pub struct BatchOptions {
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

    #[clap(long, help = "Generate at most this many datasets")]
    pub max_datasets: Option<usize>,

    #[clap(short, long, help = "Number of datasets generated in parallel")]
    pub jobs: Option<usize>,

    #[clap(flatten)]
    pub dataset: DatasetArgs,
}

pub fn batch(opts: BatchOptions, config: Config) -> Result<(), Error> {
    let (meshes, brdfs) = input_files(&config, &opts.meshes, &opts.brdfs)?;

    let mut options = config.dataset_options();
    opts.dataset.apply(&mut options);
    let root = prepare_output_root(&config, opts.dataset.output.as_deref())?;
    let jobs = batch_jobs(&meshes, &brdfs, opts.max_datasets);
    let orchestrator = DatasetOrchestrator::new(external_renderer(&config)?, &root, options)
        .with_cache(BrdfCache::new(config.brdf_cache_capacity()));

    println!(
        "Generating {} datasets ({} meshes x {} BRDFs) in {}",
        jobs.len(),
        meshes.len(),
        brdfs.len().max(1),
        root.display()
    );
    let reports = orchestrator.generate_batch(&jobs, opts.jobs);
    for report in &reports {
        print_report(report);
    }
    let failed = reports.iter().filter(|r| !r.is_success()).count();
    println!(
        "{} succeeded, {} failed; BRDF cache {} hits, {} misses",
        reports.len() - failed,
        failed,
        orchestrator.cache().hits(),
        orchestrator.cache().misses()
    );
    if failed > 0 {
        return Err(Error::render(format!(
            "{} of {} datasets failed",
            failed,
            reports.len()
        )));
    }
    Ok(())
}
