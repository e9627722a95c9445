use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;

use crate::cache::FetchCache;
use crate::clock::{Clock, SystemClock};
use crate::config::DashboardConfig;
use crate::error::PipelineError;
use crate::marker::{self, MapMarker};
use crate::metrics::{self, CurrentTotals, Goal, ProgressMetrics};
use crate::pipeline;
use crate::source::{HttpTransport, ProjectSource, Transport};

/// Everything the presentation layer renders after one refresh.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub projects: DataFrame,
    pub yearly: DataFrame,
    /// Projects with units, most affordable first.
    pub ranking: DataFrame,
    pub progress: ProgressMetrics,
    pub current: CurrentTotals,
    pub markers: Vec<MapMarker>,
    /// When the underlying sheet was fetched (not when it was served).
    pub fetched_at: DateTime<Utc>,
}

/// Derive a snapshot from a raw project frame.
pub fn build_snapshot(
    raw: &DataFrame,
    fetched_at: DateTime<Utc>,
    config: &DashboardConfig,
) -> Result<DashboardSnapshot, PipelineError> {
    let aggregated = pipeline::aggregate(raw, config.target_year)?;
    let ranking = pipeline::rank_by_affordability(&aggregated.projects)?;
    let progress = metrics::progress(&aggregated.projects, &goal(config))?;
    let current = CurrentTotals::from_yearly(&aggregated.yearly)?;
    let markers = marker::markers(&aggregated.projects)?;

    Ok(DashboardSnapshot {
        projects: aggregated.projects,
        yearly: aggregated.yearly,
        ranking,
        progress,
        current,
        markers,
        fetched_at,
    })
}

fn goal(config: &DashboardConfig) -> Goal {
    Goal {
        units: config.rental_goal,
        start_year: config.goal_start_year,
        target_year: config.target_year,
    }
}

/// One fetch-aggregate pass per refresh, over a cached source.
pub struct Dashboard<T, C> {
    config: DashboardConfig,
    source: ProjectSource<T, C>,
}

impl Dashboard<HttpTransport, SystemClock> {
    /// Dashboard fetching over HTTP with the configured cache window.
    pub fn from_config(config: DashboardConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let transport = HttpTransport::new(config.request_timeout())?;
        let cache = FetchCache::new(config.cache_ttl(), config.cache_max_entries, SystemClock);
        Ok(Self::new(config, ProjectSource::new(transport, cache)))
    }
}

impl<T: Transport, C: Clock> Dashboard<T, C> {
    pub fn new(config: DashboardConfig, source: ProjectSource<T, C>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn refresh(&mut self) -> Result<DashboardSnapshot, PipelineError> {
        let sheet = self.source.load(&self.config.source_url)?;
        let snapshot = build_snapshot(&sheet.frame, sheet.fetched_at, &self.config)?;
        tracing::info!(
            projects = snapshot.projects.height(),
            years = snapshot.yearly.height(),
            markers = snapshot.markers.len(),
            planned = snapshot.progress.planned_total,
            deficit = snapshot.progress.deficit,
            "Dashboard refreshed"
        );
        Ok(snapshot)
    }

    /// Refresh bypassing the cache window.
    pub fn force_refresh(&mut self) -> Result<DashboardSnapshot, PipelineError> {
        self.source.invalidate();
        self.refresh()
    }
}
