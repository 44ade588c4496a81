mod pycorrelate;
mod pymaster;

use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;

/// Marks a missing index or separation in arrays handed to Python
pub(crate) const MISSING: i64 = -99;

pub(crate) fn runtime_err<E: std::fmt::Display>(e: E) -> PyErr {
    PyErr::new::<PyRuntimeError, _>(e.to_string())
}

#[pymodule]
pub fn mastercat(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<pymaster::PyMasterCatalog>()?;
    m.add_function(wrap_pyfunction!(pycorrelate::correlate, m)?)?;
    m.add_function(wrap_pyfunction!(pycorrelate::combine, m)?)?;
    Ok(())
}
