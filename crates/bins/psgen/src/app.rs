use args::CliArgs;
use base::{
    cli::{parse_args, setup_logging},
    Error,
};

pub(crate) mod args;
pub mod cli;
mod config;

pub use config::*;

/// Main entry point of the psgen program.
pub fn run() -> Result<(), Error> {
    let (args, launch_time) = parse_args::<CliArgs>("psgen");

    let log_level = if args.quiet {
        0
    } else if args.verbose {
        4
    } else {
        args.log_level
    };
    setup_logging(args.log_timestamp.then_some(launch_time), log_level, &[]);

    let config = Config::load_config(args.config.as_deref())?;
    cli::run(args.command, config)
}
