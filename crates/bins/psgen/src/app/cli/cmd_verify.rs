use crate::{
    app::{cli::ansi, Config},
    dataset::verify_dataset,
};
use base::Error;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
#[clap(about = "Check the structure of generated datasets.")]
pub struct VerifyOptions {
    #[clap(num_args = 1.., required = true, help = "Dataset directories")]
    pub dirs: Vec<PathBuf>,
}

pub fn verify(opts: VerifyOptions, config: Config) -> Result<(), Error> {
    let mut first_error = None;
    for dir in &opts.dirs {
        let dir = config.resolve_path(dir);
        match verify_dataset(&dir) {
            Ok(summary) => println!(
                "  {} {}: {} lights, normal map {}",
                ansi::CYAN_CHECK,
                summary.name,
                summary.light_count,
                summary.normal_map.display()
            ),
            Err(err) => {
                println!("  {} {}: {}", ansi::RED_EXCLAMATION, dir.display(), err);
                first_error.get_or_insert(err);
            },
        }
    }
    match first_error {
        None => Ok(()),
        Some(err) => Err(err),
    }
}
