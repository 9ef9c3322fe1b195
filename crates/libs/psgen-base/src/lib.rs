//! Shared building blocks of the psgen photometric-stereo dataset tools.
#![warn(missing_docs)]

#[cfg(feature = "cli")]
pub mod cli;
mod error;
pub mod math;
pub mod utils;

pub use error::*;
