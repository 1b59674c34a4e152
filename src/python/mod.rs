//! Python wrappers around the solver lifecycle
//!
//! Inputs cross the boundary as plain Python dictionaries laid out like the serde
//! representation of [`SolverInputData`]. Solutions are returned as numpy arrays
//! and dictionaries.

use lutopt_core::{LandUseSolver, LutoptError, SolverConfig, SolverInputData, SolverSolution};
use numpy::{PyArray1, PyArray2, PyArray3, PyReadonlyArray1, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pythonize::{depythonize_bound, pythonize};

/// Map solver errors onto the closest Python exception
pub fn to_py_err(e: LutoptError) -> PyErr {
    match e {
        LutoptError::Infeasible { .. } | LutoptError::InvalidState(_) | LutoptError::Solver(_) => {
            PyRuntimeError::new_err(format!("{}", e))
        }
        _ => PyValueError::new_err(format!("{}", e)),
    }
}

fn extract_input(input: Bound<'_, PyAny>) -> PyResult<SolverInputData> {
    depythonize_bound::<SolverInputData>(input)
        .map_err(|e| PyValueError::new_err(format!("Invalid solver input: {}", e)))
}

/// Incrementally formulated land-use optimisation model
///
/// Example:
///     solver = LandUseSolver(config_toml)
///     solver.formulate(first_year)
///     solution = solver.solve()
///     solver.update(next_year, demand)
#[pyclass]
#[pyo3(name = "LandUseSolver")]
pub struct PyLandUseSolver(pub LandUseSolver);

#[pymethods]
impl PyLandUseSolver {
    /// Create a solver from a TOML configuration document
    #[new]
    #[pyo3(signature = (config=None))]
    fn new(config: Option<&str>) -> PyResult<Self> {
        let config = match config {
            Some(content) => SolverConfig::from_toml_str(content).map_err(to_py_err)?,
            None => SolverConfig::default(),
        };
        let solver = LandUseSolver::with_default_engine(config).map_err(to_py_err)?;
        Ok(Self(solver))
    }

    /// Build the model for the first year
    fn formulate(&mut self, input: Bound<'_, PyAny>) -> PyResult<()> {
        let input = extract_input(input)?;
        self.0.formulate(input).map_err(to_py_err)
    }

    /// Apply the next year's input, rebuilding only the cells that changed
    fn update(
        &mut self,
        input: Bound<'_, PyAny>,
        demand: PyReadonlyArray1<f64>,
    ) -> PyResult<PyUpdateReport> {
        let input = extract_input(input)?;
        let demand = demand.as_array().to_owned();
        let report = self.0.update_from_last(input, demand).map_err(to_py_err)?;
        Ok(PyUpdateReport {
            changed: report.changed,
            skipped: report.skipped,
        })
    }

    fn solve(&self) -> PyResult<PySolverSolution> {
        let solution = self.0.solve().map_err(to_py_err)?;
        Ok(PySolverSolution(solution))
    }

    #[getter]
    fn is_formulated(&self) -> bool {
        self.0.is_formulated()
    }

    #[getter]
    fn engine(&self) -> String {
        self.0.engine_name().to_string()
    }

    #[getter]
    fn n_variables(&self) -> PyResult<usize> {
        Ok(self.0.model().map_err(to_py_err)?.n_variables())
    }

    #[getter]
    fn n_constraints(&self) -> PyResult<usize> {
        Ok(self.0.model().map_err(to_py_err)?.n_constraints())
    }

    /// Names of the constraint families present in the model
    fn active_families(&self) -> PyResult<Vec<String>> {
        let registry = self.0.registry().map_err(to_py_err)?;
        Ok(registry
            .active_families()
            .iter()
            .map(ToString::to_string)
            .collect())
    }
}

/// Number of cells rebuilt and skipped by an update
#[pyclass]
#[pyo3(name = "UpdateReport")]
#[derive(Debug, Clone)]
pub struct PyUpdateReport {
    #[pyo3(get)]
    pub changed: usize,
    #[pyo3(get)]
    pub skipped: usize,
}

#[pymethods]
impl PyUpdateReport {
    fn __repr__(&self) -> String {
        format!(
            "UpdateReport(changed={}, skipped={})",
            self.changed, self.skipped
        )
    }
}

/// Decoded allocation of a solve
#[pyclass]
#[pyo3(name = "SolverSolution")]
pub struct PySolverSolution(pub SolverSolution);

#[pymethods]
impl PySolverSolution {
    #[getter]
    fn status(&self) -> String {
        self.0.status.to_string()
    }

    #[getter]
    fn lumap<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<u64>> {
        self.0.lumap.mapv(|lu| lu as u64).to_pyarray_bound(py)
    }

    #[getter]
    fn lmmap<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<u64>> {
        self.0.lmmap.mapv(|lm| lm as u64).to_pyarray_bound(py)
    }

    /// Adoption map per management option
    #[getter]
    fn ammaps<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new_bound(py);
        for (am, map) in &self.0.ammaps {
            dict.set_item(am, map.to_pyarray_bound(py))?;
        }
        Ok(dict)
    }

    #[getter]
    fn ag_x_mrj<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray3<f64>> {
        self.0.ag_x_mrj.to_pyarray_bound(py)
    }

    #[getter]
    fn non_ag_x_rk<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.0.non_ag_x_rk.to_pyarray_bound(py)
    }

    #[getter]
    fn ag_man_x_mrj<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new_bound(py);
        for (am, x) in &self.0.ag_man_x_mrj {
            dict.set_item(am, x.to_pyarray_bound(py))?;
        }
        Ok(dict)
    }

    /// Achieved production, emissions, water yield and biodiversity scores
    #[getter]
    fn prod_data(&self, py: Python<'_>) -> PyResult<PyObject> {
        pythonize(py, &self.0.prod_data).map_err(|e| PyValueError::new_err(format!("{}", e)))
    }

    /// Objective value and its decomposition
    #[getter]
    fn obj_val(&self, py: Python<'_>) -> PyResult<PyObject> {
        pythonize(py, &self.0.obj_val).map_err(|e| PyValueError::new_err(format!("{}", e)))
    }

    fn __repr__(&self) -> String {
        format!(
            "SolverSolution(status='{}', objective={:?})",
            self.0.status, self.0.obj_val.objective
        )
    }
}
