//! Python bindings over numpy arrays

use crate::core::{
    conditioning::{ConditioningParams, TraceConditioner},
    model::{ModelBuilder, ModelParams, Property},
    raytrace, supergather, wavelet,
};
use crate::types::{Dataset, GeoError, TraceHeader, TraceRecord};
use ndarray::{Array1, Axis};
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn to_py_err(err: GeoError) -> PyErr {
    match err {
        GeoError::Configuration(_) => PyValueError::new_err(err.to_string()),
        GeoError::OutOfBounds { .. } => PyIndexError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Build the layered, faulted model. Omitted arguments take the reference model values.
#[pyfunction]
#[pyo3(signature = (dz = None, vp = None, rho = None, nx = None, fault_throw = None))]
fn build_model(
    py: Python<'_>,
    dz: Option<Vec<usize>>,
    vp: Option<Vec<f32>>,
    rho: Option<Vec<f32>>,
    nx: Option<usize>,
    fault_throw: Option<usize>,
) -> PyResult<PyObject> {
    let defaults = ModelParams::default();
    let params = ModelParams {
        dz: dz.unwrap_or(defaults.dz),
        vp: vp.unwrap_or(defaults.vp),
        rho: rho.unwrap_or(defaults.rho),
        nx: nx.unwrap_or(defaults.nx),
        fault_throw: fault_throw.unwrap_or(defaults.fault_throw),
        ..ModelParams::default()
    };
    let grid = ModelBuilder::new(params).build().map_err(to_py_err)?;

    let result = PyDict::new(py);
    for property in Property::ALL {
        result.set_item(
            property.to_string(),
            grid.property(property).clone().into_pyarray(py),
        )?;
    }
    result.set_item("dz", grid.dz().to_vec())?;
    result.set_item("depths", grid.depths())?;
    result.set_item("nx", grid.nx())?;

    Ok(result.into())
}

#[pyfunction]
#[pyo3(signature = (lowcut, highcut, ns = 200, dt = 0.001))]
fn build_wavelet<'py>(
    py: Python<'py>,
    lowcut: f64,
    highcut: f64,
    ns: usize,
    dt: f64,
) -> PyResult<&'py PyArray1<f32>> {
    let wavelet = wavelet::build_wavelet(lowcut, highcut, ns, dt).map_err(to_py_err)?;
    Ok(wavelet.into_pyarray(py))
}

#[pyfunction]
#[pyo3(signature = (traces, window = 100))]
fn agc<'py>(
    py: Python<'py>,
    traces: PyReadonlyArray2<'py, f32>,
    window: usize,
) -> PyResult<&'py PyArray2<f32>> {
    let conditioner = TraceConditioner::with_params(ConditioningParams {
        agc_window: window,
        ..ConditioningParams::default()
    });
    let gained = conditioner
        .agc(&traces.as_array().to_owned())
        .map_err(to_py_err)?;
    Ok(gained.into_pyarray(py))
}

#[pyfunction]
#[pyo3(signature = (traces, window = 10))]
fn mix<'py>(
    py: Python<'py>,
    traces: PyReadonlyArray2<'py, f32>,
    window: usize,
) -> PyResult<&'py PyArray2<f32>> {
    let conditioner = TraceConditioner::with_params(ConditioningParams {
        mix_window: window,
        ..ConditioningParams::default()
    });
    let mixed = conditioner
        .mix(&traces.as_array().to_owned())
        .map_err(to_py_err)?;
    Ok(mixed.into_pyarray(py))
}

#[pyfunction]
fn conv<'py>(
    py: Python<'py>,
    traces: PyReadonlyArray2<'py, f32>,
    wavelet: PyReadonlyArray1<'py, f32>,
) -> PyResult<&'py PyArray2<f32>> {
    let convolved = TraceConditioner::new()
        .convolve(&traces.as_array().to_owned(), &wavelet.as_array().to_owned())
        .map_err(to_py_err)?;
    Ok(convolved.into_pyarray(py))
}

#[pyfunction]
fn shift<'py>(
    py: Python<'py>,
    traces: PyReadonlyArray2<'py, f32>,
    lag: usize,
) -> PyResult<&'py PyArray2<f32>> {
    let shifted = TraceConditioner::new()
        .shift(&traces.as_array().to_owned(), lag)
        .map_err(to_py_err)?;
    Ok(shifted.into_pyarray(py))
}

#[pyfunction]
#[allow(clippy::too_many_arguments)]
fn find_points<'py>(
    py: Python<'py>,
    x0: f64,
    z0: f64,
    x1: f64,
    z1: f64,
    nump: usize,
    model: PyReadonlyArray2<'py, f32>,
) -> PyResult<&'py PyArray1<f32>> {
    let values = raytrace::find_points(x0, z0, x1, z1, nump, &model.as_array().to_owned())
        .map_err(to_py_err)?;
    Ok(values.into_pyarray(py))
}

#[pyfunction]
fn traveltime(
    x0: f64,
    z0: f64,
    x1: f64,
    z1: f64,
    model: PyReadonlyArray2<'_, f32>,
    nump: usize,
    ds: f64,
) -> PyResult<f64> {
    raytrace::traveltime(x0, z0, x1, z1, &model.as_array().to_owned(), nump, ds)
        .map_err(to_py_err)
}

/// Stack traces into supergathers. Returns the stacked traces with their
/// cdp, |offset|, group id, bin id and fold.
#[pyfunction]
fn build_supergather(
    py: Python<'_>,
    step: i64,
    width: i64,
    bins: Vec<f32>,
    traces: PyReadonlyArray2<'_, f32>,
    cdp: PyReadonlyArray1<'_, i64>,
    offset: PyReadonlyArray1<'_, f32>,
) -> PyResult<PyObject> {
    let traces = traces.as_array();
    let cdp = cdp.as_array();
    let offset = offset.as_array();
    if cdp.len() != traces.nrows() || offset.len() != traces.nrows() {
        return Err(PyValueError::new_err(
            "traces, cdp and offset must describe the same number of traces",
        ));
    }

    let records = traces
        .axis_iter(Axis(0))
        .zip(cdp.iter().zip(offset.iter()))
        .enumerate()
        .map(|(index, (samples, (&cdp, &offset)))| {
            TraceRecord::new(
                TraceHeader {
                    tracl: index as i32 + 1,
                    cdp,
                    offset,
                    ..TraceHeader::default()
                },
                samples.to_owned(),
            )
        })
        .collect();
    let dataset = Dataset::new(records).map_err(to_py_err)?;

    let stacked =
        supergather::build_supergather(step, width, &bins, &dataset).map_err(to_py_err)?;

    let headers: Vec<&TraceHeader> = stacked.iter().map(|r| &r.header).collect();
    let column = |f: fn(&TraceHeader) -> i64| -> Array1<i64> { headers.iter().map(|h| f(*h)).collect() };

    let result = PyDict::new(py);
    result.set_item("trace", stacked.trace_matrix().into_pyarray(py))?;
    result.set_item("cdp", column(|h| h.cdp).into_pyarray(py))?;
    result.set_item(
        "offset",
        headers
            .iter()
            .map(|h| h.offset)
            .collect::<Array1<f32>>()
            .into_pyarray(py),
    )?;
    result.set_item("group", column(|h| h.ns1 as i64).into_pyarray(py))?;
    result.set_item("bin", column(|h| h.ep as i64).into_pyarray(py))?;
    result.set_item("fold", column(|h| h.nhs as i64).into_pyarray(py))?;
    result.set_item("source_trace", column(|h| h.tracl as i64).into_pyarray(py))?;

    Ok(result.into())
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    // Model and rays
    m.add_function(wrap_pyfunction!(build_model, m)?)?;
    m.add_function(wrap_pyfunction!(find_points, m)?)?;
    m.add_function(wrap_pyfunction!(traveltime, m)?)?;

    // Wavelet and trace conditioning
    m.add_function(wrap_pyfunction!(build_wavelet, m)?)?;
    m.add_function(wrap_pyfunction!(agc, m)?)?;
    m.add_function(wrap_pyfunction!(mix, m)?)?;
    m.add_function(wrap_pyfunction!(conv, m)?)?;
    m.add_function(wrap_pyfunction!(shift, m)?)?;

    // Supergathers
    m.add_function(wrap_pyfunction!(build_supergather, m)?)?;
    Ok(())
}
