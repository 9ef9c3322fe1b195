//! Command line entry of psgen.

use base::cli::ansi;

fn main() {
    if let Err(err) = psgen::run() {
        eprintln!("{}error{}: {}", ansi::BRIGHT_RED, ansi::RESET, err);
        std::process::exit(1);
    }
}
