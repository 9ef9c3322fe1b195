//! The `config.yaml` written at the end of a successful dataset run.

use crate::scene::Intrinsics;
use base::{utils::slash_path, Error};
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{fmt, io::Write, marker::PhantomData, path::Path};

/// Name of the dataset description inside a dataset directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Key of the `n`-th light (1-based).
pub fn light_key(n: usize) -> String { format!("light_{}", n) }

/// Map keyed by light name, kept in light order when serialised.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightMap<T>(pub Vec<(String, T)>);

impl<T> LightMap<T> {
    /// Number of entries.
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterates over the entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T: Serialize> Serialize for LightMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct LightMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for LightMapVisitor<T> {
    type Value = LightMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map keyed by light name")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, T>()? {
            entries.push((k, v));
        }
        Ok(LightMap(entries))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for LightMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(LightMapVisitor(PhantomData))
    }
}

/// Camera section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    /// Pinhole intrinsics in pixels.
    pub intrinsic_matrix: Intrinsics,
}

/// Light section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightsRecord {
    /// Number of lights.
    pub count: usize,
    /// Light positions.
    pub positions: LightMap<[f64; 3]>,
    /// Intensity actually used for each light.
    pub intensities: LightMap<f64>,
}

/// Parameters of the HOG regulariser used by the downstream reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HogRegularization {
    /// Whether the regulariser is enabled.
    pub enabled: bool,
    /// Weight.
    pub lambda: f64,
    /// Number of orientation bins.
    pub orientations: u32,
    /// Cell size in pixels.
    pub pixels_per_cell: [u32; 2],
    /// Block size in cells.
    pub cells_per_block: [u32; 2],
}

impl Default for HogRegularization {
    fn default() -> Self {
        Self {
            enabled: false,
            lambda: 0.2,
            orientations: 9,
            pixels_per_cell: [8, 8],
            cells_per_block: [2, 2],
        }
    }
}

/// Reconstruction section; paths are relative to the output root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionRecord {
    /// One image per light, in light order.
    pub input_images: Vec<String>,
    /// Rendered normal map.
    pub ground_truth_normal: String,
    /// Where the reconstruction writes its result.
    pub output_normal_map: String,
    /// Pixels darker than this are background.
    pub mask_threshold: f64,
    /// Pixels darker than this are in shadow.
    pub shadow_threshold: f64,
    /// Regulariser parameters.
    #[serde(default)]
    pub hog_regularization: HogRegularization,
}

/// Machine-readable description of a complete dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset name, also the name of its directory.
    pub dataset: String,
    /// Camera.
    pub camera: CameraRecord,
    /// Lights.
    pub lights: LightsRecord,
    /// Reconstruction inputs and thresholds.
    pub reconstruction: ReconstructionRecord,
}

impl DatasetConfig {
    /// Describes dataset `name` lit by `lights` (position, intensity).
    pub fn new(
        name: &str,
        intrinsics: Intrinsics,
        lights: &[([f64; 3], f64)],
        mask_threshold: f64,
        shadow_threshold: f64,
    ) -> Self {
        let keys: Vec<String> = (1..=lights.len()).map(light_key).collect();
        Self {
            dataset: name.to_owned(),
            camera: CameraRecord {
                intrinsic_matrix: intrinsics,
            },
            lights: LightsRecord {
                count: lights.len(),
                positions: LightMap(
                    keys.iter()
                        .cloned()
                        .zip(lights.iter().map(|l| l.0))
                        .collect(),
                ),
                intensities: LightMap(
                    keys.iter()
                        .cloned()
                        .zip(lights.iter().map(|l| l.1))
                        .collect(),
                ),
            },
            reconstruction: ReconstructionRecord {
                input_images: keys
                    .iter()
                    .map(|k| slash_path([name, "images", format!("{}.png", k).as_str()]))
                    .collect(),
                ground_truth_normal: slash_path([name, "images", "ground_truth_normal.png"]),
                output_normal_map: slash_path([name, "output", "normal_map.png"]),
                mask_threshold,
                shadow_threshold,
                hog_regularization: HogRegularization::default(),
            },
        }
    }

    /// Reads a dataset description.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| Error::io(err, path))?;
        serde_yaml::from_str(&text).map_err(|err| Error::format(path, err.to_string()))
    }

    /// Writes the description to `path`.
    ///
    /// The content goes to a temporary file next to `path` first and is
    /// renamed into place, so readers never see a partial file.
    pub fn write_atomic(&self, path: &Path) -> Result<(), Error> {
        let text = serde_yaml::to_string(self)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = dir.join(format!(".{}.{}.tmp", CONFIG_FILE_NAME, uuid::Uuid::new_v4()));
        let written = std::fs::File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(text.as_bytes())?;
                file.sync_all()
            })
            .and_then(|_| std::fs::rename(&tmp, path));
        if let Err(err) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(Error::io(err, path));
        }
        Ok(())
    }
}
