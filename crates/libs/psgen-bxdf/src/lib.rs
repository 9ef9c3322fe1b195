//! Measured reflectance data and its reduction to analytic materials.
#![warn(missing_docs)]

mod cache;
mod material;
pub mod merl;

pub use cache::{BrdfCache, RawBrdfCache};
pub use material::*;
pub use merl::{MerlBrdfTable, MerlLayout};

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::merl::MerlBrdfTable;
    use std::{
        io::Write,
        path::{Path, PathBuf},
    };

    /// Creates an empty scratch directory under the system temp directory.
    pub fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("psgen-{}-{}", tag, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes a MERL file with the given (unscaled) interleaved samples.
    pub fn write_merl(path: &Path, dims: [i32; 3], samples: &[f64]) {
        let mut file = std::fs::File::create(path).unwrap();
        for d in dims {
            file.write_all(&d.to_le_bytes()).unwrap();
        }
        for s in samples {
            file.write_all(&s.to_le_bytes()).unwrap();
        }
    }

    /// A small 2x2x4 table whose raw values are all `value`.
    pub fn uniform_table(value: f64) -> MerlBrdfTable {
        MerlBrdfTable::from_raw([2, 2, 4], vec![value; 2 * 2 * 4 * 3]).unwrap()
    }
}
