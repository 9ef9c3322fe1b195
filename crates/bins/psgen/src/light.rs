//! Light placement.
//!
//! Photometric stereo needs light directions that are far from coplanar,
//! so the patterns below are deterministic and spread in both azimuth and
//! elevation.

use base::{
    math::{dvec3, try_normalize, DVec3},
    Error,
};
use serde::{Deserialize, Serialize};
use std::{
    f64::consts::{PI, TAU},
    fmt,
    path::Path,
    str::FromStr,
};

/// Distribution of the sampled light positions.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LightPattern {
    /// Golden-angle spiral over the upper hemisphere.
    #[default]
    Hemisphere,
    /// Ring at a fixed elevation.
    Circle,
    /// Regular lattice in the plane `z = distance`.
    Grid,
}

impl FromStr for LightPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hemisphere" => Ok(Self::Hemisphere),
            "circle" => Ok(Self::Circle),
            "grid" => Ok(Self::Grid),
            other => Err(Error::config(format!(
                "unknown light pattern '{}', expected one of hemisphere, circle, grid",
                other
            ))),
        }
    }
}

impl fmt::Display for LightPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hemisphere => f.write_str("hemisphere"),
            Self::Circle => f.write_str("circle"),
            Self::Grid => f.write_str("grid"),
        }
    }
}

/// Samples `count` light positions of the given pattern.
///
/// The result only depends on the arguments.
pub fn sample(pattern: LightPattern, count: usize, distance: f64) -> Result<Vec<DVec3>, Error> {
    if !distance.is_finite() || distance <= 0.0 {
        return Err(Error::parameter(
            "distance",
            format!("must be finite and positive, got {}", distance),
        ));
    }
    let n = count as f64;
    let positions: Vec<DVec3> = match pattern {
        LightPattern::Hemisphere => (0..count)
            .map(|i| {
                let theta = (1.0 - (i as f64 + 0.5) / n).acos();
                let phi = PI * (1.0 + 5f64.sqrt()) * i as f64;
                let (sin_theta, cos_theta) = theta.sin_cos();
                let (sin_phi, cos_phi) = phi.sin_cos();
                dvec3(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta) * distance
            })
            .collect(),
        LightPattern::Circle => {
            let radius = 0.7 * distance;
            let z = 0.7 * distance;
            (0..count)
                .map(|i| {
                    let (sin, cos) = (TAU * i as f64 / n).sin_cos();
                    dvec3(radius * cos, radius * sin, z)
                })
                .collect()
        },
        LightPattern::Grid => {
            let size = (n.sqrt().ceil() as usize).max(1);
            let half = size as f64 / 2.0;
            let step = distance / size as f64;
            (0..count)
                .map(|i| {
                    let (row, col) = (i / size, i % size);
                    dvec3(
                        (col as f64 - half + 0.5) * step,
                        (row as f64 - half + 0.5) * step,
                        distance,
                    )
                })
                .collect()
        },
    };
    log::trace!("Sampled {} {} lights: {:?}", count, pattern, positions);
    Ok(positions)
}

/// Like [`sample`], with the pattern given by name.
pub fn sample_named(pattern: &str, count: usize, distance: f64) -> Result<Vec<DVec3>, Error> {
    sample(pattern.parse()?, count, distance)
}

/// A light given explicitly instead of sampled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LightSpec {
    /// Isotropic point light.
    Point {
        /// Position in world space.
        position: DVec3,
        /// Radiant intensity; the dataset default when absent.
        intensity: Option<f64>,
    },
    /// Light at infinity.
    Directional {
        /// Direction from the scene towards the light.
        direction: DVec3,
        /// Irradiance; the dataset default when absent.
        intensity: Option<f64>,
    },
}

impl LightSpec {
    /// Intensity of the light, or `default` if none was given.
    pub fn intensity_or(&self, default: f64) -> f64 {
        match self {
            Self::Point { intensity, .. } | Self::Directional { intensity, .. } => {
                intensity.unwrap_or(default)
            },
        }
    }
}

/// A light entry as written in a light file, before validation.
#[derive(Debug, Deserialize)]
struct RawLight {
    #[serde(rename = "type", default = "default_light_type")]
    kind: String,
    position: Option<[f64; 3]>,
    direction: Option<[f64; 3]>,
    intensity: Option<f64>,
}

fn default_light_type() -> String { "point".to_string() }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LightFile {
    List(Vec<RawLight>),
    Wrapped { lights: Vec<RawLight> },
}

impl TryFrom<RawLight> for LightSpec {
    type Error = Error;

    fn try_from(raw: RawLight) -> Result<Self, Self::Error> {
        if let Some(i) = raw.intensity {
            if !i.is_finite() || i < 0.0 {
                return Err(Error::config(format!(
                    "light intensity must be finite and non-negative, got {}",
                    i
                )));
            }
        }
        match raw.kind.to_ascii_lowercase().as_str() {
            "point" => {
                let position = raw
                    .position
                    .ok_or_else(|| Error::config("point light without `position`"))?;
                Ok(Self::Point {
                    position: DVec3::from_array(position),
                    intensity: raw.intensity,
                })
            },
            "directional" => {
                let direction = raw
                    .direction
                    .map(DVec3::from_array)
                    .ok_or_else(|| Error::config("directional light without `direction`"))?;
                let direction = try_normalize(direction).ok_or_else(|| {
                    Error::config(format!(
                        "directional light direction {} has zero length",
                        direction
                    ))
                })?;
                Ok(Self::Directional {
                    direction,
                    intensity: raw.intensity,
                })
            },
            other => Err(Error::config(format!(
                "unsupported light type '{}', expected point or directional",
                other
            ))),
        }
    }
}

/// Parses a YAML light list: either a sequence of lights or a mapping with
/// a `lights` sequence.
pub fn parse_light_list(text: &str) -> Result<Vec<LightSpec>, Error> {
    let lights = match serde_yaml::from_str::<LightFile>(text)? {
        LightFile::List(lights) | LightFile::Wrapped { lights } => lights,
    };
    if lights.is_empty() {
        return Err(Error::config("the light list is empty"));
    }
    lights.into_iter().map(LightSpec::try_from).collect()
}

/// Reads a YAML light list from `path`.
pub fn load_light_list<P: AsRef<Path>>(path: P) -> Result<Vec<LightSpec>, Error> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|err| Error::io(err, path))?;
    let lights = parse_light_list(&text)?;
    log::info!("Loaded {} lights from {}", lights.len(), path.display());
    Ok(lights)
}
