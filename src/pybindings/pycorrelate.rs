use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyAny;
use pyo3::Bound;

use super::{runtime_err, MISSING};
use crate::catalogs::{Column, ColumnType, Schema, Table};
use crate::correlation::{self, AngleUnit, MatchOptions, Radius};
use crate::master::{ALPHA, DELTA};

fn extract_radius(value: &Bound<'_, PyAny>) -> PyResult<Radius> {
    if let Ok(rc) = value.extract::<f64>() {
        return Ok(Radius::Uniform(rc));
    }
    if let Ok(rc) = value.extract::<Vec<f64>>() {
        return Ok(Radius::PerPoint(rc));
    }
    Err(PyValueError::new_err(
        "rc must be a float or a sequence of floats",
    ))
}

type MatchArrays<'py> = (
    Bound<'py, PyArray1<i64>>,
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyArray1<i64>>,
    Bound<'py, PyArray1<i64>>,
);

/// Returns `(match_index, separation, matched_indices, unmatched_candidates)`.
/// The first two hold -99 where a reference point has no counterpart.
#[pyfunction]
#[pyo3(signature = (ax, ay, bx, by, rc, rc_min=None, unit="degrees"))]
#[allow(clippy::too_many_arguments)]
pub fn correlate<'py>(
    py: Python<'py>,
    ax: PyReadonlyArray1<'py, f64>,
    ay: PyReadonlyArray1<'py, f64>,
    bx: PyReadonlyArray1<'py, f64>,
    by: PyReadonlyArray1<'py, f64>,
    rc: &Bound<'py, PyAny>,
    rc_min: Option<f64>,
    unit: &str,
) -> PyResult<MatchArrays<'py>> {
    let unit: AngleUnit = unit
        .parse()
        .map_err(|e: anyhow::Error| PyValueError::new_err(e.to_string()))?;
    let options = MatchOptions {
        min_radius: rc_min,
        unit,
    };
    let radius = extract_radius(rc)?;

    let result = correlation::correlate_xy(
        ax.as_slice()?,
        ay.as_slice()?,
        bx.as_slice()?,
        by.as_slice()?,
        &radius,
        &options,
    )
    .map_err(runtime_err)?;

    let index: Vec<i64> = result
        .match_index()
        .into_iter()
        .map(|m| m.map(|i| i as i64).unwrap_or(MISSING))
        .collect();
    let separation: Vec<f64> = result
        .separations()
        .into_iter()
        .map(|s| s.unwrap_or(MISSING as f64))
        .collect();

    let matched = result.matched_indices().into_iter().map(|i| i as i64);
    let unmatched = result.unmatched_candidates().iter().map(|&j| j as i64);

    Ok((
        PyArray1::from_vec(py, index),
        PyArray1::from_vec(py, separation),
        PyArray1::from_iter(py, matched),
        PyArray1::from_iter(py, unmatched),
    ))
}

/// Combine position lists `[(x, y), ...]` into one list without repeats.
#[pyfunction]
pub fn combine<'py>(
    py: Python<'py>,
    catalogs: Vec<(PyReadonlyArray1<'py, f64>, PyReadonlyArray1<'py, f64>)>,
    rc: f64,
) -> PyResult<(Bound<'py, PyArray1<f64>>, Bound<'py, PyArray1<f64>>)> {
    let schema = Schema::new(vec![(ALPHA, ColumnType::Float), (DELTA, ColumnType::Float)])
        .map_err(runtime_err)?;

    let tables = catalogs
        .iter()
        .map(|(x, y)| {
            let columns = vec![
                Column::Float(x.as_slice()?.iter().copied().map(Some).collect()),
                Column::Float(y.as_slice()?.iter().copied().map(Some).collect()),
            ];
            Table::new(schema.clone(), columns).map_err(runtime_err)
        })
        .collect::<PyResult<Vec<Table>>>()?;

    let combined = correlation::combine(&tables, rc, ALPHA, DELTA).map_err(runtime_err)?;
    let positions = combined.positions(ALPHA, DELTA).map_err(runtime_err)?;

    Ok((
        PyArray1::from_iter(py, positions.iter().map(|p| p.alpha)),
        PyArray1::from_iter(py, positions.iter().map(|p| p.delta)),
    ))
}
