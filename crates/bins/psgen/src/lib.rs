//! Synthetic photometric-stereo dataset generation.
//!
//! Places lights around an object, describes one scene per light for an
//! external renderer and records everything a normal reconstruction needs
//! in the dataset directory.
#![warn(missing_docs)]

mod app;
pub mod dataset;
pub mod light;
pub mod preview;
pub mod render;
pub mod scene;

pub use app::{run, Config, RendererConfig, UserConfig};
