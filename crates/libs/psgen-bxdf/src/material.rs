//! Reduction of measured BRDFs to analytic materials.
//!
//! The renderer doesn't consume tabulated reflectance, so every table is
//! replaced by either a diffuse albedo or a rough conductor. Whether a
//! material is metallic is decided from its name only.

use crate::{cache::BrdfCache, merl::MerlBrdfTable};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

/// Albedo of the neutral fallback material.
pub const NEUTRAL_ALBEDO: [f64; 3] = [0.8, 0.8, 0.8];

/// Bounds of the conductor roughness.
pub const ROUGHNESS_RANGE: (f64, f64) = (0.01, 1.0);

/// Name fragments marking a metallic material.
pub const METAL_KEYWORDS: [&str; 9] = [
    "metal", "steel", "brass", "chrome", "alumin", "gold", "silver", "copper", "nickel",
];

/// Name fragments marking a coating over a metal, which is never metallic.
pub const COATING_KEYWORDS: [&str; 2] = ["paint", "coat"];

/// Index of refraction of brass (RGB).
pub const BRASS_ETA: [f64; 3] = [0.618, 0.425, 0.206];
/// Extinction coefficient of brass (RGB).
pub const BRASS_K: [f64; 3] = [3.580, 2.376, 1.560];

/// Named conductor presets understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetalPreset {
    /// Gold.
    Au,
    /// Silver.
    Ag,
    /// Copper.
    Cu,
    /// Aluminium.
    Al,
    /// Chromium.
    Cr,
    /// Nickel.
    Ni,
}

impl fmt::Display for MetalPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Au => "Au",
            Self::Ag => "Ag",
            Self::Cu => "Cu",
            Self::Al => "Al",
            Self::Cr => "Cr",
            Self::Ni => "Ni",
        };
        f.write_str(name)
    }
}

/// Optical constants of a conductor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConductorSpec {
    /// A preset known to the renderer.
    Preset(MetalPreset),
    /// Explicit complex index of refraction, RGB.
    Spectral {
        /// Real part.
        eta: [f64; 3],
        /// Imaginary part.
        k: [f64; 3],
    },
}

/// A simplified material derived from a measured BRDF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalyticMaterial {
    /// Lambertian reflector.
    Diffuse {
        /// RGB reflectance in `[0, 1]`.
        albedo: [f64; 3],
    },
    /// Microfacet conductor.
    RoughConductor {
        /// GGX alpha in `[0.01, 1]`.
        roughness: f64,
        /// Optical constants.
        conductor: ConductorSpec,
    },
}

impl AnalyticMaterial {
    /// The grey diffuse material used when nothing better is known.
    pub const fn neutral() -> Self {
        Self::Diffuse {
            albedo: NEUTRAL_ALBEDO,
        }
    }

    /// Whether this is a conductor.
    pub fn is_metallic(&self) -> bool { matches!(self, Self::RoughConductor { .. }) }
}

impl Default for AnalyticMaterial {
    fn default() -> Self { Self::neutral() }
}

impl fmt::Display for AnalyticMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diffuse { albedo } => write!(
                f,
                "diffuse albedo=({:.4}, {:.4}, {:.4})",
                albedo[0], albedo[1], albedo[2]
            ),
            Self::RoughConductor {
                roughness,
                conductor: ConductorSpec::Preset(preset),
            } => write!(f, "roughconductor {} alpha={:.4}", preset, roughness),
            Self::RoughConductor {
                roughness,
                conductor: ConductorSpec::Spectral { eta, k },
            } => write!(
                f,
                "roughconductor eta={:?} k={:?} alpha={:.4}",
                eta, k, roughness
            ),
        }
    }
}

/// How the parameters of the approximated material are filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproximationMode {
    /// Roughness and albedo come from the table statistics.
    #[default]
    Measured,
    /// Fixed per-metal roughness; albedo is a hue picked from the name,
    /// scaled by the measured brightness.
    Tinted,
}

impl FromStr for ApproximationMode {
    type Err = base::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "measured" => Ok(Self::Measured),
            "tinted" => Ok(Self::Tinted),
            other => Err(base::Error::config(format!(
                "unknown approximation mode '{}', expected 'measured' or 'tinted'",
                other
            ))),
        }
    }
}

impl fmt::Display for ApproximationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured => f.write_str("measured"),
            Self::Tinted => f.write_str("tinted"),
        }
    }
}

/// Whether the material name designates a bare metal.
pub fn is_metallic_name(name: &str) -> bool {
    let name = name.to_lowercase();
    METAL_KEYWORDS.iter().any(|kw| name.contains(kw))
        && !COATING_KEYWORDS.iter().any(|kw| name.contains(kw))
}

/// Picks the conductor constants from the material name, aluminium if no
/// metal is named.
pub fn conductor_from_name(name: &str) -> ConductorSpec {
    let name = name.to_lowercase();
    let preset = if name.contains("gold") {
        MetalPreset::Au
    } else if name.contains("silver") {
        MetalPreset::Ag
    } else if name.contains("copper") {
        MetalPreset::Cu
    } else if name.contains("alumin") {
        MetalPreset::Al
    } else if name.contains("chrome") {
        MetalPreset::Cr
    } else if name.contains("brass") {
        return ConductorSpec::Spectral {
            eta: BRASS_ETA,
            k: BRASS_K,
        };
    } else if name.contains("nickel") {
        MetalPreset::Ni
    } else {
        MetalPreset::Al
    };
    ConductorSpec::Preset(preset)
}

/// Fixed roughness used in [`ApproximationMode::Tinted`].
fn tinted_roughness(conductor: &ConductorSpec) -> f64 {
    match conductor {
        ConductorSpec::Preset(MetalPreset::Cr) => 0.05,
        ConductorSpec::Spectral { .. } => 0.15,
        ConductorSpec::Preset(_) => 0.1,
    }
}

/// Base colour for a non-metallic material name.
pub fn base_hue(name: &str) -> [f64; 3] {
    const HUES: [(&[&str], [f64; 3]); 14] = [
        (&["red", "brick"], [1.0, 0.2, 0.2]),
        (&["blue"], [0.2, 0.4, 1.0]),
        (&["green"], [0.2, 1.0, 0.3]),
        (&["yellow"], [1.0, 1.0, 0.2]),
        (&["orange"], [1.0, 0.5, 0.1]),
        (&["purple", "violet"], [0.8, 0.2, 1.0]),
        (&["pink"], [1.0, 0.4, 0.6]),
        (&["brown", "wood"], [0.8, 0.5, 0.3]),
        (&["aventurine", "aventurnine"], [0.3, 0.8, 0.5]),
        (&["pearl"], [1.0, 1.0, 0.9]),
        (&["gold"], [1.0, 0.8, 0.2]),
        (&["beige"], [0.9, 0.85, 0.7]),
        (&["white"], [1.0, 1.0, 1.0]),
        (&["black"], [0.3, 0.3, 0.3]),
    ];
    let name = name.to_lowercase();
    HUES.iter()
        .find(|(keys, _)| keys.iter().any(|k| name.contains(k)))
        .map(|(_, hue)| *hue)
        .unwrap_or(NEUTRAL_ALBEDO)
}

/// Brightness factor in `[0.5, 0.9]` from the unscaled mid-range red mean.
pub fn brightness(mid_range_mean: f64) -> f64 {
    if mid_range_mean > 0.0 {
        ((mid_range_mean + 1.0).log10() / 5.0).clamp(0.5, 0.9)
    } else {
        0.7
    }
}

/// Derives analytic materials from measured tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialApproximator {
    /// How parameters are filled in.
    pub mode: ApproximationMode,
}

impl MaterialApproximator {
    /// Creates an approximator using the given mode.
    pub fn new(mode: ApproximationMode) -> Self { Self { mode } }

    /// Approximates the table with a diffuse or rough conductor material.
    ///
    /// Never fails: without a table, or with statistics that aren't finite,
    /// the neutral material is returned.
    pub fn approximate(&self, table: Option<&MerlBrdfTable>, name: &str) -> AnalyticMaterial {
        let table = match table {
            Some(table) => table,
            None => {
                log::debug!("No BRDF data for '{}', using neutral material", name);
                return AnalyticMaterial::neutral();
            },
        };

        let material = match self.mode {
            ApproximationMode::Measured => approximate_measured(table, name),
            ApproximationMode::Tinted => approximate_tinted(table, name),
        };
        match material {
            Some(material) => {
                log::info!("Approximated {} -> {}", name, material);
                material
            },
            None => {
                log::warn!(
                    "BRDF statistics of '{}' are not finite, using neutral material",
                    name
                );
                AnalyticMaterial::neutral()
            },
        }
    }

    /// Loads the table at `path` through `cache` and approximates it, named
    /// after the file stem.
    ///
    /// A table that can't be loaded yields the neutral material.
    pub fn approximate_path(&self, cache: &BrdfCache, path: &Path) -> AnalyticMaterial {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match cache.load(path) {
            Ok(table) => self.approximate(Some(&table), &name),
            Err(err) => {
                log::warn!(
                    "Failed to load BRDF {}: {}; using neutral material",
                    path.display(),
                    err
                );
                AnalyticMaterial::neutral()
            },
        }
    }
}

fn approximate_measured(table: &MerlBrdfTable, name: &str) -> Option<AnalyticMaterial> {
    if is_metallic_name(name) {
        let std = table.std_dev();
        if !std.is_finite() {
            return None;
        }
        Some(AnalyticMaterial::RoughConductor {
            roughness: (std * 10.0).clamp(ROUGHNESS_RANGE.0, ROUGHNESS_RANGE.1),
            conductor: conductor_from_name(name),
        })
    } else {
        let mean = table.channel_mean();
        if mean.iter().any(|m| !m.is_finite()) {
            return None;
        }
        Some(AnalyticMaterial::Diffuse {
            albedo: mean.map(|m| m.clamp(0.0, 1.0)),
        })
    }
}

fn approximate_tinted(table: &MerlBrdfTable, name: &str) -> Option<AnalyticMaterial> {
    if is_metallic_name(name) {
        let conductor = conductor_from_name(name);
        Some(AnalyticMaterial::RoughConductor {
            roughness: tinted_roughness(&conductor),
            conductor,
        })
    } else {
        let mean = table.mid_range_red_mean();
        if !mean.is_finite() {
            return None;
        }
        let b = brightness(mean);
        Some(AnalyticMaterial::Diffuse {
            albedo: base_hue(name).map(|c| (c * b).clamp(0.0, 1.0)),
        })
    }
}
