use chrono::{DateTime, Utc};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyModule};
use pyo3_polars::PyDataFrame;

use crate::clock::SystemClock;
use crate::config::{DashboardConfig, DEFAULT_TARGET_YEAR};
use crate::dashboard::{Dashboard, DashboardSnapshot};
use crate::marker;
use crate::pipeline;
use crate::schema;
use crate::source::{self, HttpTransport};

#[pyclass(name = "HousingDashboard")]
pub struct PyDashboard {
    inner: Dashboard<HttpTransport, SystemClock>,
    snapshot: Option<DashboardSnapshot>,
}

#[pymethods]
impl PyDashboard {
    /// Build a dashboard from an optional TOML config, with an optional
    /// source URL override.
    #[new]
    #[pyo3(signature = (config_path=None, source_url=None))]
    fn new(config_path: Option<&str>, source_url: Option<String>) -> PyResult<Self> {
        let mut config = match config_path {
            Some(path) => DashboardConfig::load(path)?,
            None => DashboardConfig::default(),
        };
        if let Some(url) = source_url {
            config.source_url = url;
        }
        Ok(Self {
            inner: Dashboard::from_config(config)?,
            snapshot: None,
        })
    }

    // ── Refresh ─────────────────────────────────────────────────────────────

    /// Fetch (or reuse the cached sheet) and recompute every view.
    fn refresh(&mut self) -> PyResult<()> {
        self.snapshot = Some(self.inner.refresh()?);
        Ok(())
    }

    /// Refetch regardless of the cache window.
    fn force_refresh(&mut self) -> PyResult<()> {
        self.snapshot = Some(self.inner.force_refresh()?);
        Ok(())
    }

    // ── Views ───────────────────────────────────────────────────────────────

    #[getter]
    fn projects_df(&self) -> Option<PyDataFrame> {
        self.snapshot.as_ref().map(|s| PyDataFrame(s.projects.clone()))
    }

    #[getter]
    fn yearly_df(&self) -> Option<PyDataFrame> {
        self.snapshot.as_ref().map(|s| PyDataFrame(s.yearly.clone()))
    }

    #[getter]
    fn ranking_df(&self) -> Option<PyDataFrame> {
        self.snapshot.as_ref().map(|s| PyDataFrame(s.ranking.clone()))
    }

    #[getter]
    fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|s| s.fetched_at)
    }

    #[getter]
    fn source_url(&self) -> String {
        self.inner.config().source_url.clone()
    }

    /// Goal progress and current cumulative totals as a dict.
    fn progress<'py>(&self, py: Python<'py>) -> PyResult<Option<Bound<'py, PyDict>>> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(None);
        };
        let p = &snapshot.progress;
        let c = &snapshot.current;
        let dict = PyDict::new(py);
        dict.set_item("goal", p.goal)?;
        dict.set_item("planned_total", p.planned_total)?;
        dict.set_item("deficit", p.deficit)?;
        dict.set_item("percent_of_goal", p.percent_of_goal)?;
        dict.set_item("required_annual_pace", p.required_annual_pace)?;
        dict.set_item("current_rental", c.rental)?;
        dict.set_item("current_owner", c.owner)?;
        dict.set_item("current_total", c.total)?;
        dict.set_item("current_affordable", c.affordable)?;
        dict.set_item("current_market_rate", c.market_rate)?;
        Ok(Some(dict))
    }

    /// Map markers as a JSON array.
    fn markers_json(&self) -> PyResult<Option<String>> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(None);
        };
        marker::markers_json(&snapshot.markers)
            .map(Some)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    // ── Stateless helpers ───────────────────────────────────────────────────

    /// Run the pipeline over an already loaded frame.
    /// Returns (enriched projects, yearly table).
    #[staticmethod]
    #[pyo3(signature = (projects, target_year=DEFAULT_TARGET_YEAR))]
    fn aggregate(projects: PyDataFrame, target_year: i32) -> PyResult<(PyDataFrame, PyDataFrame)> {
        let out = pipeline::aggregate(&projects.0, target_year)?;
        Ok((PyDataFrame(out.projects), PyDataFrame(out.yearly)))
    }

    /// Load a local CSV snapshot of the sheet, every column as String.
    #[staticmethod]
    fn load_csv(path: &str) -> PyResult<PyDataFrame> {
        let df = source::load_projects_file(path)?;
        Ok(PyDataFrame(df))
    }
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let project = PyModule::new(m.py(), "project")?;
    project.add("NAME", schema::project::NAME)?;
    project.add("ADDRESS", schema::project::ADDRESS)?;
    project.add("STATUS", schema::project::STATUS)?;
    project.add("OCCUPANCY", schema::project::OCCUPANCY)?;
    project.add("MARKET_RATE_RENTALS", schema::project::MARKET_RATE_RENTALS)?;
    project.add("AFFORDABLE_RENTALS", schema::project::AFFORDABLE_RENTALS)?;
    project.add("MARKET_RATE_OWNER", schema::project::MARKET_RATE_OWNER)?;
    project.add("AFFORDABLE_OWNER", schema::project::AFFORDABLE_OWNER)?;
    project.add("TOTAL_UNITS", schema::project::TOTAL_UNITS)?;
    project.add("LATITUDE", schema::project::LATITUDE)?;
    project.add("LONGITUDE", schema::project::LONGITUDE)?;
    m.add_submodule(&project)?;

    let derived = PyModule::new(m.py(), "derived")?;
    derived.add("RENTAL_UNITS", schema::derived::RENTAL_UNITS)?;
    derived.add("OWNER_UNITS", schema::derived::OWNER_UNITS)?;
    derived.add("AFFORDABLE_UNITS", schema::derived::AFFORDABLE_UNITS)?;
    derived.add("MARKET_RATE_UNITS", schema::derived::MARKET_RATE_UNITS)?;
    derived.add("MARKET_RENTALS", schema::derived::MARKET_RENTALS)?;
    derived.add("NON_MARKET_RENTALS", schema::derived::NON_MARKET_RENTALS)?;
    derived.add("AFFORDABILITY_RATIO", schema::derived::AFFORDABILITY_RATIO)?;
    derived.add("MOVE_IN_YEAR", schema::derived::MOVE_IN_YEAR)?;
    m.add_submodule(&derived)?;

    let yearly = PyModule::new(m.py(), "yearly")?;
    yearly.add("YEAR", schema::yearly::YEAR)?;
    yearly.add("CUMULATIVE_RENTALS", schema::yearly::CUMULATIVE_RENTALS)?;
    yearly.add("CUMULATIVE_OWNER", schema::yearly::CUMULATIVE_OWNER)?;
    yearly.add("CUMULATIVE_TOTAL", schema::yearly::CUMULATIVE_TOTAL)?;
    yearly.add("CUMULATIVE_AFFORDABLE", schema::yearly::CUMULATIVE_AFFORDABLE)?;
    yearly.add("CUMULATIVE_MARKET_RATE", schema::yearly::CUMULATIVE_MARKET_RATE)?;
    yearly.add(
        "CUMULATIVE_MARKET_RENTALS",
        schema::yearly::CUMULATIVE_MARKET_RENTALS,
    )?;
    yearly.add(
        "CUMULATIVE_NON_MARKET_RENTALS",
        schema::yearly::CUMULATIVE_NON_MARKET_RENTALS,
    )?;
    m.add_submodule(&yearly)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    crate::init_tracing();
    m.add_class::<PyDashboard>()?;
    add_schema_exports(m)?;
    Ok(())
}
