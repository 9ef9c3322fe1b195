//! Math types used across psgen.
//!
//! Geometry is computed in double precision; see [`glam::DVec3`].

pub use glam::{dvec3, DVec3};

/// Returns `v` scaled to unit length, or `None` if it has no direction.
pub fn try_normalize(v: DVec3) -> Option<DVec3> {
    let len = v.length();
    (len.is_finite() && len > f64::EPSILON).then(|| v / len)
}
