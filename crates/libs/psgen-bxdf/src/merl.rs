//! BRDF data from the MERL database: <http://www.merl.com/brdf/>
//!
//! A MERL file starts with three little-endian `i32` giving the resolution
//! of the half/difference parameterisation `(theta_h, theta_d, phi_d)`,
//! followed by `theta_h * theta_d * phi_d * 3` little-endian `f64` samples.

use base::Error;
use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    f64::consts::{FRAC_PI_2, PI},
    fs::File,
    io::{BufReader, ErrorKind},
    path::{Path, PathBuf},
};

/// The number of zenith angles for the half-vector.
pub const RES_THETA_H: usize = 90;
/// The number of zenith angles for the difference vector.
pub const RES_THETA_D: usize = 90;
/// The number of azimuthal angles for the difference vector.
///
/// Only half of the azimuthal range is stored, the other half follows from
/// reciprocity.
pub const RES_PHI_D: usize = 180;
/// The total number of angular samples of a standard table.
pub const RES_TOTAL: usize = RES_THETA_H * RES_THETA_D * RES_PHI_D;
/// The scale factor for the Red channel.
pub const R_SCALE: f64 = 1.0 / 1500.0;
/// The scale factor for the Green channel.
pub const G_SCALE: f64 = 1.15 / 1500.0;
/// The scale factor for the Blue channel.
pub const B_SCALE: f64 = 1.66 / 1500.0;
/// Channel scale factors in RGB order.
pub const SCALES: [f64; 3] = [R_SCALE, G_SCALE, B_SCALE];

const HEADER_SIZE: u64 = 3 * std::mem::size_of::<i32>() as u64;

/// Ordering of the samples inside a MERL file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MerlLayout {
    /// `(theta_h, theta_d, phi_d, channel)`, channel varies fastest.
    #[default]
    Interleaved,
    /// `(channel, theta_h, theta_d, phi_d)`, as written by the MERL
    /// reference code.
    Planar,
}

/// A measured BRDF table.
///
/// Samples are stored row-major as `[theta_h][theta_d][phi_d][channel]`,
/// already scaled by [`SCALES`] and clamped to be non-negative. The table is
/// never modified after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct MerlBrdfTable {
    /// Where the table was loaded from; empty for in-memory tables.
    path: PathBuf,
    /// Resolution of `(theta_h, theta_d, phi_d)`.
    dims: [usize; 3],
    samples: Box<[f64]>,
}

impl MerlBrdfTable {
    /// Loads a table stored in the interleaved layout.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::load_with_layout(path, MerlLayout::Interleaved)
    }

    /// Loads a table stored in the given layout.
    ///
    /// Fails with [`Error::Io`] if the file can't be opened or read and with
    /// [`Error::Format`] if the header is invalid or the file is shorter than
    /// the size declared by its header.
    pub fn load_with_layout<P: AsRef<Path>>(path: P, layout: MerlLayout) -> Result<Self, Error> {
        let path = path.as_ref();
        log::debug!("Loading MERL BRDF from {} ({:?})", path.display(), layout);
        let file = File::open(path).map_err(|err| Error::io(err, path))?;
        let file_len = file
            .metadata()
            .map_err(|err| Error::io(err, path))?
            .len();
        let mut reader = BufReader::new(file);

        let mut dims = [0usize; 3];
        for (i, dim) in dims.iter_mut().enumerate() {
            let n = reader
                .read_i32::<LittleEndian>()
                .map_err(|err| eof_as_format(err, path, "truncated header"))?;
            if n <= 0 {
                return Err(Error::format(
                    path,
                    format!("dimension {} must be positive, got {}", i, n),
                ));
            }
            *dim = n as usize;
        }

        let count = sample_count(dims).ok_or_else(|| {
            Error::format(path, format!("dimensions {:?} are too large", dims))
        })?;
        let expected = (count as u64)
            .checked_mul(std::mem::size_of::<f64>() as u64)
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or_else(|| Error::format(path, format!("dimensions {:?} are too large", dims)))?;
        if file_len < expected {
            return Err(Error::format(
                path,
                format!(
                    "file is {} bytes but its header declares {} bytes",
                    file_len, expected
                ),
            ));
        }
        if file_len > expected {
            log::debug!(
                "Ignoring {} trailing bytes in {}",
                file_len - expected,
                path.display()
            );
        }

        let mut raw = vec![0.0f64; count];
        reader
            .read_f64_into::<LittleEndian>(&mut raw)
            .map_err(|err| eof_as_format(err, path, "truncated sample data"))?;

        let raw = match layout {
            MerlLayout::Interleaved => raw,
            MerlLayout::Planar => planar_to_interleaved(&raw, dims),
        };

        let mut table = Self::from_raw(dims, raw)
            .map_err(|_| Error::format(path, "sample count mismatch"))?;
        table.path = path.to_path_buf();
        log::info!(
            "Loaded MERL BRDF {} {:?}",
            path.file_name().unwrap_or_default().to_string_lossy(),
            dims
        );
        Ok(table)
    }

    /// Builds a table from unscaled interleaved samples.
    ///
    /// The channel scales are applied and negative values clamped to zero,
    /// exactly as when loading from a file.
    pub fn from_raw(dims: [usize; 3], mut raw: Vec<f64>) -> Result<Self, Error> {
        if dims.iter().any(|&d| d == 0) {
            return Err(Error::parameter("dims", "dimensions must be positive"));
        }
        if sample_count(dims) != Some(raw.len()) {
            return Err(Error::parameter(
                "samples",
                format!(
                    "expected {:?} x 3 samples, got {}",
                    dims,
                    raw.len()
                ),
            ));
        }
        if dims[0] * dims[1] * dims[2] != RES_TOTAL {
            log::warn!(
                "MERL BRDF dimensions mismatch: expected {} angular samples, got {} {:?}",
                RES_TOTAL,
                dims[0] * dims[1] * dims[2],
                dims
            );
        }
        for texel in raw.chunks_exact_mut(3) {
            for (value, scale) in texel.iter_mut().zip(SCALES) {
                *value = (*value * scale).max(0.0);
            }
        }
        Ok(Self {
            path: PathBuf::new(),
            dims,
            samples: raw.into_boxed_slice(),
        })
    }

    /// Path of the file the table was loaded from.
    pub fn path(&self) -> &Path { &self.path }

    /// Resolution of `(theta_h, theta_d, phi_d)`.
    pub fn dims(&self) -> [usize; 3] { self.dims }

    /// All scaled samples, interleaved.
    pub fn samples(&self) -> &[f64] { &self.samples }

    /// Returns the RGB sample at the given bin indices.
    pub fn sample(&self, theta_h: usize, theta_d: usize, phi_d: usize) -> Option<[f64; 3]> {
        let [nh, nd, np] = self.dims;
        if theta_h >= nh || theta_d >= nd || phi_d >= np {
            return None;
        }
        let idx = ((theta_h * nd + theta_d) * np + phi_d) * 3;
        Some([
            self.samples[idx],
            self.samples[idx + 1],
            self.samples[idx + 2],
        ])
    }

    /// Lookup the index of the zenith angle for the half-vector.
    ///
    /// The mapping is not linear: bins are denser near the specular peak.
    pub fn theta_h_index(&self, theta_h: f64) -> usize {
        let n = self.dims[0];
        let theta_h = theta_h.clamp(0.0, FRAC_PI_2);
        let fraction = theta_h / FRAC_PI_2 * n as f64;
        clamp_index((fraction * n as f64).sqrt(), n)
    }

    /// Lookup the index of the zenith angle for the difference vector.
    pub fn theta_d_index(&self, theta_d: f64) -> usize {
        let n = self.dims[1];
        let theta_d = theta_d.clamp(0.0, FRAC_PI_2);
        clamp_index(theta_d / FRAC_PI_2 * n as f64, n)
    }

    /// Lookup the index of the azimuthal angle for the difference vector.
    ///
    /// The angle is folded into `[0, π)` first.
    pub fn phi_d_index(&self, phi_d: f64) -> usize {
        let n = self.dims[2];
        let phi_d = phi_d.rem_euclid(PI);
        clamp_index(phi_d / PI * n as f64, n)
    }

    /// Returns the sample of the bin containing the given angles (radians).
    pub fn lookup(&self, theta_h: f64, theta_d: f64, phi_d: f64) -> [f64; 3] {
        let ih = self.theta_h_index(theta_h);
        let id = self.theta_d_index(theta_d);
        let ip = self.phi_d_index(phi_d);
        // Indices are clamped to the table's own dimensions.
        self.sample(ih, id, ip).unwrap_or([0.0; 3])
    }

    /// Mean of each channel over all angular samples.
    pub fn channel_mean(&self) -> [f64; 3] {
        let mut sum = [0.0f64; 3];
        for texel in self.samples.chunks_exact(3) {
            sum[0] += texel[0];
            sum[1] += texel[1];
            sum[2] += texel[2];
        }
        let n = (self.samples.len() / 3) as f64;
        sum.map(|s| s / n)
    }

    /// Population standard deviation over every value of the table.
    pub fn std_dev(&self) -> f64 {
        let n = self.samples.len() as f64;
        let mean = self.samples.iter().sum::<f64>() / n;
        let var = self
            .samples
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / n;
        var.sqrt()
    }

    /// Mean of the unscaled red channel over the middle half of the
    /// `theta_h` and `theta_d` ranges.
    pub fn mid_range_red_mean(&self) -> f64 {
        let [nh, nd, np] = self.dims;
        let (h0, h1) = (nh / 4, nh * 3 / 4);
        let (d0, d1) = (nd / 4, nd * 3 / 4);
        let mut sum = 0.0;
        let mut count = 0usize;
        for ih in h0..h1 {
            for id in d0..d1 {
                let row = (ih * nd + id) * np * 3;
                for ip in 0..np {
                    sum += self.samples[row + ip * 3];
                    count += 1;
                }
            }
        }
        if count == 0 {
            return 0.0;
        }
        sum / count as f64 / R_SCALE
    }
}

/// Number of `f64` values for the given dimensions.
fn sample_count(dims: [usize; 3]) -> Option<usize> {
    dims[0]
        .checked_mul(dims[1])?
        .checked_mul(dims[2])?
        .checked_mul(3)
}

fn clamp_index(value: f64, n: usize) -> usize {
    if value.is_nan() || value < 0.0 {
        0
    } else {
        (value as usize).min(n - 1)
    }
}

fn eof_as_format(err: std::io::Error, path: &Path, what: &str) -> Error {
    if err.kind() == ErrorKind::UnexpectedEof {
        Error::format(path, what)
    } else {
        Error::io(err, path)
    }
}

fn planar_to_interleaved(raw: &[f64], dims: [usize; 3]) -> Vec<f64> {
    let n = dims[0] * dims[1] * dims[2];
    let mut out = vec![0.0; n * 3];
    for c in 0..3 {
        for i in 0..n {
            out[i * 3 + c] = raw[c * n + i];
        }
    }
    out
}
