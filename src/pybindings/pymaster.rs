use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::{runtime_err, MISSING};
use crate::catalogs::{read_catalog, Column, ColumnType, Schema, Table};
use crate::master::store::MasterFile;
use crate::master::{ALPHA, DELTA};

#[pyclass(name = "MasterCatalog")]
pub struct PyMasterCatalog {
    file: MasterFile,
}

#[pymethods]
impl PyMasterCatalog {
    #[staticmethod]
    #[pyo3(signature = (path, overwrite=false))]
    pub fn create(path: &str, overwrite: bool) -> PyResult<Self> {
        let file = MasterFile::create(path, overwrite).map_err(runtime_err)?;
        Ok(Self { file })
    }

    #[staticmethod]
    pub fn open(path: &str) -> PyResult<Self> {
        let file = MasterFile::open(path).map_err(runtime_err)?;
        Ok(Self { file })
    }

    /// Read an ascii or CSV catalog and merge it; `rc` in degrees.
    #[pyo3(signature = (name, path, rc, append=true))]
    pub fn add_catalog(&mut self, name: &str, path: &str, rc: f64, append: bool) -> PyResult<usize> {
        let catalog = read_catalog(path).map_err(runtime_err)?;
        let summary = self
            .file
            .add_catalog(name, &catalog, rc, append)
            .map_err(runtime_err)?;
        Ok(summary.matched)
    }

    /// Merge a bare position list as extension `name`.
    #[pyo3(signature = (name, alpha, delta, rc, append=true))]
    pub fn add_positions<'py>(
        &mut self,
        name: &str,
        alpha: PyReadonlyArray1<'py, f64>,
        delta: PyReadonlyArray1<'py, f64>,
        rc: f64,
        append: bool,
    ) -> PyResult<usize> {
        let schema = Schema::new(vec![(ALPHA, ColumnType::Float), (DELTA, ColumnType::Float)])
            .map_err(runtime_err)?;
        let columns = vec![
            Column::Float(alpha.as_slice()?.iter().copied().map(Some).collect()),
            Column::Float(delta.as_slice()?.iter().copied().map(Some).collect()),
        ];
        let catalog = Table::new(schema, columns).map_err(runtime_err)?;
        let summary = self
            .file
            .add_catalog(name, &catalog, rc, append)
            .map_err(runtime_err)?;
        Ok(summary.matched)
    }

    pub fn remove_catalog(&mut self, name: &str) -> PyResult<()> {
        self.file.remove_catalog(name).map_err(runtime_err)
    }

    pub fn update(&mut self) -> PyResult<()> {
        self.file.update().map_err(runtime_err)
    }

    pub fn names(&self) -> Vec<String> {
        self.file
            .catalog()
            .extension_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn __len__(&self) -> usize {
        self.file.catalog().len()
    }

    /// Master columns as numpy arrays; missing values are -99.
    pub fn master_arrays<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let rows = self.file.catalog().rows();
        let missing = MISSING as f64;

        let dict = PyDict::new(py);
        dict.set_item("id", PyArray1::from_iter(py, rows.iter().map(|r| r.id as i64)))?;
        dict.set_item(
            "matches",
            PyArray1::from_iter(py, rows.iter().map(|r| r.matches as i64)),
        )?;
        dict.set_item(
            ALPHA,
            PyArray1::from_iter(
                py,
                rows.iter().map(|r| r.position.map_or(missing, |p| p.alpha)),
            ),
        )?;
        dict.set_item(
            DELTA,
            PyArray1::from_iter(
                py,
                rows.iter().map(|r| r.position.map_or(missing, |p| p.delta)),
            ),
        )?;
        dict.set_item(
            "Rc",
            PyArray1::from_iter(py, rows.iter().map(|r| r.rc.unwrap_or(missing))),
        )?;
        dict.set_item(
            "S",
            PyArray1::from_iter(
                py,
                rows.iter().map(|r| r.mean_separation.unwrap_or(missing)),
            ),
        )?;
        Ok(dict)
    }

    pub fn __repr__(&self) -> String {
        format!(
            "MasterCatalog(path='{}', objects={}, catalogs={:?})",
            self.file.path().display(),
            self.file.catalog().len(),
            self.file.catalog().extension_names()
        )
    }
}
