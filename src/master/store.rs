//! On-disk master catalogs.
//!
//! The catalog is archived with rkyv. The path lives only in the
//! [`MasterFile`] handle, never inside the archive, so a file that has been
//! moved or renamed opens under its new name.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{Footprint, MasterCatalog, MergeSummary};
use crate::{McError, Table};

/// A master catalog bound to the file it is persisted in.
///
/// Every mutating call writes the catalog back, overwriting the file.
#[derive(Debug)]
pub struct MasterFile {
    path: PathBuf,
    catalog: MasterCatalog,
}

impl MasterFile {
    /// Start an empty master catalog and write it immediately.
    pub fn create<P: AsRef<Path>>(path: P, overwrite: bool) -> anyhow::Result<Self> {
        let file = Self {
            path: path.as_ref().to_path_buf(),
            catalog: MasterCatalog::new(),
        };
        write_catalog(&file.catalog, &file.path, overwrite)?;
        Ok(file)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let buffer = fs::read(path)
            .with_context(|| format!("Failed to read master catalog: {}", path.display()))?;

        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(buffer.len());
        aligned.extend_from_slice(&buffer);
        let catalog = rkyv::from_bytes::<MasterCatalog, rkyv::rancor::Error>(&aligned)
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to deserialize master catalog {}: {}",
                    path.display(),
                    e
                )
            })?;

        tracing::debug!(
            "opened {} ({} objects, {} extensions)",
            path.display(),
            catalog.len(),
            catalog.extensions().len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            catalog,
        })
    }

    /// Open `path` if it exists, otherwise create it.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().is_file() {
            Self::open(path)
        } else {
            Self::create(path, false)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn catalog(&self) -> &MasterCatalog {
        &self.catalog
    }

    pub fn into_catalog(self) -> MasterCatalog {
        self.catalog
    }

    pub fn save(&self) -> anyhow::Result<()> {
        write_catalog(&self.catalog, &self.path, true)
    }

    /// Write a copy elsewhere; this handle stays bound to its own path.
    pub fn save_as<P: AsRef<Path>>(&self, path: P, overwrite: bool) -> anyhow::Result<()> {
        write_catalog(&self.catalog, path.as_ref(), overwrite)
    }

    pub fn add_catalog(
        &mut self,
        name: &str,
        catalog: &Table,
        rc: f64,
        append: bool,
    ) -> anyhow::Result<MergeSummary> {
        let summary = self.catalog.add_catalog(name, catalog, rc, append)?;
        self.save()?;
        Ok(summary)
    }

    pub fn remove_catalog(&mut self, name: &str) -> anyhow::Result<()> {
        self.catalog.remove_catalog(name)?;
        self.save()
    }

    pub fn update(&mut self) -> anyhow::Result<()> {
        self.catalog.update();
        self.save()
    }

    pub fn mark_out_of_coverage<F: Footprint>(
        &mut self,
        name: &str,
        footprint: &F,
    ) -> anyhow::Result<usize> {
        let marked = self.catalog.mark_out_of_coverage(name, footprint)?;
        self.save()?;
        Ok(marked)
    }
}

fn write_catalog(catalog: &MasterCatalog, path: &Path, overwrite: bool) -> anyhow::Result<()> {
    if path.exists() && !overwrite {
        return Err(McError::AlreadyExists(path.display().to_string()).into());
    }

    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(catalog)
        .map_err(|e| anyhow::anyhow!("Failed to serialize master catalog: {}", e))?;
    fs::write(path, &bytes)
        .with_context(|| format!("Failed to write master catalog: {}", path.display()))?;

    tracing::debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogs::{ColumnType, Schema, Value};
    use crate::master::{Detection, SkyBox};

    fn catalog(coords: &[(f64, f64)]) -> Table {
        let schema = Schema::new(vec![
            ("alpha", ColumnType::Float),
            ("delta", ColumnType::Float),
            ("name", ColumnType::Text),
        ])
        .expect("schema");
        Table::from_rows(
            schema,
            coords.iter().enumerate().map(|(i, &(a, d))| {
                vec![Value::Float(a), Value::Float(d), Value::Text(format!("obj{}", i))]
            }),
        )
        .expect("table")
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("field.mcc");

        let mut file = MasterFile::create(&path, false).expect("creating");
        file.add_catalog("a", &catalog(&[(1.0, 1.0), (2.0, 2.0)]), 0.001, true)
            .expect("adding a");
        file.add_catalog("b", &catalog(&[(1.0002, 1.0), (3.0, 3.0)]), 0.0005, true)
            .expect("adding b");
        file.mark_out_of_coverage(
            "b",
            &SkyBox {
                alpha_min: 0.0,
                alpha_max: 1.5,
                delta_min: 0.0,
                delta_max: 1.5,
            },
        )
        .expect("marking");

        let reopened = MasterFile::open(&path).expect("opening");
        assert_eq!(reopened.catalog(), file.catalog());
        assert_eq!(reopened.path(), path.as_path());
        let b = reopened.catalog().extension("b").expect("registered");
        assert_eq!(b.rows()[1], Detection::OutOfCoverage);
    }

    #[test]
    fn test_refuses_to_clobber() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("field.mcc");

        let file = MasterFile::create(&path, false).expect("creating");
        let err = MasterFile::create(&path, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<McError>(),
            Some(McError::AlreadyExists(_))
        ));
        assert!(file.save_as(&path, false).is_err());
        MasterFile::create(&path, true).expect("overwriting");
    }

    #[test]
    fn test_open_or_create_and_errors() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("field.mcc");

        let mut file = MasterFile::open_or_create(&path).expect("creating");
        file.add_catalog("a", &catalog(&[(1.0, 1.0)]), 0.001, true)
            .expect("adding");
        let again = MasterFile::open_or_create(&path).expect("opening");
        assert_eq!(again.catalog().len(), 1);

        let err = file
            .add_catalog("a", &catalog(&[(1.0, 1.0)]), 0.001, true)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<McError>(),
            Some(&McError::DuplicateExtension("a".to_string()))
        );

        file.remove_catalog("a").expect("removing");
        assert!(MasterFile::open(&path).expect("opening").catalog().is_empty());

        let garbage = dir.path().join("garbage.mcc");
        std::fs::write(&garbage, b"not an archive").expect("writing");
        assert!(MasterFile::open(&garbage).is_err());
        assert!(MasterFile::open(dir.path().join("missing.mcc")).is_err());
    }
}
