//! Parametric triangle meshes used as photometric-stereo test objects.
#![warn(missing_docs)]

pub mod gen;
mod mesh;
pub mod obj;

pub use gen::{presets, Shape, ShapeKind};
pub use mesh::*;
