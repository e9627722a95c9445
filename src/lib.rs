//! Data core of the housing pipeline dashboard.
//!
//! Fetches the project spreadsheet, derives per-project unit counts and
//! affordability, tabulates yearly cumulative totals and measures them
//! against the rental goal. Rendering is left to the front-end, which can
//! consume everything through the `python` feature.

pub mod cache;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod marker;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod source;

#[cfg(feature = "python")]
mod python;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use error::{FetchError, PipelineError};
pub use pipeline::{aggregate, Aggregated};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, honouring `RUST_LOG`.
///
/// Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
