//! Merge plans and the driver that builds a master catalog from one.
//!
//! A merge plan is a CSV file with one row per source catalog:
//!
//! ```text
//! name,    catalog,          rc,   unit,    append
//! hst,     hst_f160w.dat,    0.1,  arcsec,  true
//! spitzer, irac_ch1.csv,     1.5,  ,        false
//! ```
//!
//! `unit` defaults to arcseconds and `append` to true. Rows are merged in
//! file order.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use serde::{Deserialize, Deserializer};

use crate::catalogs::read_catalog;
use crate::correlation::AngleUnit;
use crate::master::store::MasterFile;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    /// Catalog file, relative to the plan's base directory
    pub catalog: PathBuf,
    #[serde(alias = "Rc")]
    pub rc: f64,
    #[serde(default)]
    pub unit: Option<AngleUnit>,
    #[serde(default, deserialize_with = "flag")]
    pub append: Option<bool>,
}

impl CatalogEntry {
    /// Correlation radius converted to degrees
    pub fn rc_degrees(&self) -> f64 {
        self.unit.unwrap_or(AngleUnit::Arcseconds).to_degrees(self.rc)
    }

    pub fn append(&self) -> bool {
        self.append.unwrap_or(true)
    }
}

/// Anything but a case-insensitive "true" is false; an empty cell is unset.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| s.eq_ignore_ascii_case("true")))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergePlan {
    entries: Vec<CatalogEntry>,
}

impl MergePlan {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_path(path)
            .with_context(|| format!("Failed to open merge plan: {}", path.display()))?;

        let mut entries = Vec::new();
        for (line, result) in rdr.deserialize::<CatalogEntry>().enumerate() {
            let entry = result.with_context(|| {
                format!("Failed to parse entry {} of {}", line + 1, path.display())
            })?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Open (or create) the master file and merge in every plan entry not
/// already registered. Catalog paths resolve against `base_dir`.
pub fn build_master<P, Q, R>(master_path: P, plan_path: Q, base_dir: R) -> anyhow::Result<MasterFile>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let start = Instant::now();
    let plan = MergePlan::from_csv(plan_path)?;
    let mut master = MasterFile::open_or_create(master_path)?;

    for entry in plan.entries() {
        if master.catalog().extension(&entry.name).is_some() {
            tracing::info!("{} is already in the master catalog, skipping", entry.name);
            continue;
        }

        let timer = Instant::now();
        tracing::info!("Adding {} to the master catalog", entry.name);

        let catalog = read_catalog(base_dir.as_ref().join(&entry.catalog))
            .with_context(|| format!("loading catalog for {}", entry.name))?;
        master
            .add_catalog(&entry.name, &catalog, entry.rc_degrees(), entry.append())
            .with_context(|| format!("merging {}", entry.name))?;

        tracing::info!(
            "{} merged in {:.3} s",
            entry.name,
            timer.elapsed().as_secs_f64()
        );
    }

    tracing::info!(
        "master catalog {} built in {:.3} s ({} objects)",
        master.path().display(),
        start.elapsed().as_secs_f64(),
        master.catalog().len()
    );
    Ok(master)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plan_defaults_and_units() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("plan.csv");
        std::fs::write(
            &path,
            "name, catalog, Rc, unit, append\n\
             hst, hst.dat, 0.36, arcsec, true\n\
             # commented out\n\
             irac, irac.csv, 0.001, deg, False\n\
             wise, wise.dat, 7.2, , \n",
        )
        .expect("writing plan");

        let plan = MergePlan::from_csv(&path).expect("reading plan");
        assert_eq!(plan.len(), 3);

        let hst = &plan.entries()[0];
        assert_relative_eq!(hst.rc_degrees(), 0.0001, epsilon = 1e-15);
        assert!(hst.append());

        let irac = &plan.entries()[1];
        assert_relative_eq!(irac.rc_degrees(), 0.001, epsilon = 1e-15);
        assert!(!irac.append());

        let wise = &plan.entries()[2];
        assert_eq!(wise.unit, None);
        assert_eq!(wise.append, None);
        assert_relative_eq!(wise.rc_degrees(), 0.002, epsilon = 1e-15);
        assert!(wise.append());
    }

    #[test]
    fn test_optional_columns_may_be_absent() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("plan.csv");
        std::fs::write(&path, "name,catalog,rc\nhst,hst.dat,3.6\n").expect("writing plan");

        let plan = MergePlan::from_csv(&path).expect("reading plan");
        assert_relative_eq!(plan.entries()[0].rc_degrees(), 0.001, epsilon = 1e-15);
        assert!(plan.entries()[0].append());
    }

    #[test]
    fn test_bad_plan_fails() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("plan.csv");
        std::fs::write(&path, "name,catalog,rc,unit\nhst,hst.dat,3.6,parsecs\n")
            .expect("writing plan");
        assert!(MergePlan::from_csv(&path).is_err());

        std::fs::write(&path, "name,catalog\nhst,hst.dat\n").expect("writing plan");
        assert!(MergePlan::from_csv(&path).is_err());
    }

    #[test]
    fn test_build_master_skips_registered() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        std::fs::write(
            dir.path().join("a.dat"),
            "#<  alpha  float64\n#<  delta  float64\n10.0  10.0\n10.1  10.1\n",
        )
        .expect("writing a");
        std::fs::write(
            dir.path().join("b.csv"),
            "alpha,delta,mag\n10.0001,10.0,12.5\n20.0,20.0,13.0\n",
        )
        .expect("writing b");
        let plan = dir.path().join("plan.csv");
        std::fs::write(&plan, "name,catalog,rc\na,a.dat,1.8\nb,b.csv,1.8\n").expect("writing plan");
        let master_path = dir.path().join("field.mcc");

        let master = build_master(&master_path, &plan, dir.path()).expect("building");
        assert_eq!(master.catalog().extension_names(), vec!["a", "b"]);
        assert_eq!(master.catalog().len(), 3);
        assert_eq!(master.catalog().rows()[0].matches, 2);

        // Second run finds both registered and leaves the file alone
        let again = build_master(&master_path, &plan, dir.path()).expect("rebuilding");
        assert_eq!(again.catalog(), master.catalog());
    }

    #[test]
    fn test_build_master_reports_missing_catalog() {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let plan = dir.path().join("plan.csv");
        std::fs::write(&plan, "name,catalog,rc\na,nowhere.dat,1.0\n").expect("writing plan");

        let err = build_master(dir.path().join("field.mcc"), &plan, dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("nowhere.dat"));
    }
}
