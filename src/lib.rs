//! Python extension module for the land-use optimisation solver
//!
//! The solver itself lives in [`lutopt_core`]; this crate only exposes it to Python.

use pyo3::prelude::*;

pub mod python;

#[pymodule]
#[pyo3(name = "_lib")]
fn lutopt(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_class::<python::PyLandUseSolver>()?;
    m.add_class::<python::PySolverSolution>()?;
    m.add_class::<python::PyUpdateReport>()?;
    Ok(())
}
