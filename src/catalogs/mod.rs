pub mod ascii;
pub mod delimited;
pub mod kdtree;
pub mod table;

use std::path::Path;

use rkyv::{Archive, Deserialize, Serialize};

pub use table::{Column, ColumnType, Schema, Table, Value};

/// A position on the sky in degrees
#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    pub alpha: f64,
    pub delta: f64,
}

impl SkyPosition {
    pub fn new(alpha: f64, delta: f64) -> Self {
        Self { alpha, delta }
    }

    /// Flat-sky separation in degrees.
    ///
    /// Treats (alpha, delta) as planar coordinates, which only holds
    /// for small fields away from the poles.
    pub fn separation(&self, other: &SkyPosition) -> f64 {
        let da = self.alpha - other.alpha;
        let dd = self.delta - other.delta;
        (da * da + dd * dd).sqrt()
    }
}

impl kdtree::KdPoint<2> for SkyPosition {
    fn point(&self) -> [f64; 2] {
        [self.alpha, self.delta]
    }
}

pub type SkyKdTree = kdtree::KdTree<SkyPosition, 2>;

/// Load a catalog table, choosing the reader from the file extension.
///
/// `.csv` files go through the delimited reader; anything else is
/// read as a `#<`-headed ascii table.
pub fn read_catalog<P: AsRef<Path>>(path: P) -> anyhow::Result<Table> {
    let is_csv = path
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        delimited::read_csv(path)
    } else {
        ascii::read_ascii(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_separation() {
        let a = SkyPosition::new(0.0, 0.0);
        let b = SkyPosition::new(0.0001, 0.0001);
        assert_relative_eq!(a.separation(&b), 0.0001 * 2.0_f64.sqrt(), epsilon = 1e-15);
        assert_eq!(a.separation(&a), 0.0);
    }

    #[test]
    fn test_read_catalog_by_extension() {
        let dir = tempfile::tempdir().expect("creating temp dir");

        let csv_path = dir.path().join("stars.csv");
        std::fs::write(&csv_path, "alpha,delta\n1.5,2.5\n3.5,4.5\n").expect("writing csv");
        let csv_table = read_catalog(&csv_path).expect("reading csv catalog");
        assert_eq!(csv_table.len(), 2);

        let dat_path = dir.path().join("stars.dat");
        std::fs::write(
            &dat_path,
            "#<  alpha  float64\n#<  delta  float64\n1.5  2.5\n",
        )
        .expect("writing ascii");
        let dat_table = read_catalog(&dat_path).expect("reading ascii catalog");
        assert_eq!(dat_table.len(), 1);
    }
}
