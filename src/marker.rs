//! Map markers: one value object per located project.
//!
//! Rendering is left to the presentation layer. This module only extracts
//! the label, coordinates, color tag and popup fields from the enriched
//! project frame, substituting a placeholder for absent optional fields.

use polars::prelude::*;
use serde::Serialize;

use crate::error::PipelineError;
use crate::pipeline::{parse_number, require_columns};
use crate::schema::{derived, project};

/// Shown in place of an absent optional field.
pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    /// Project includes affordable units.
    Orange,
    /// Market rate only.
    Blue,
}

impl MarkerColor {
    pub fn for_ratio(affordability_ratio: f64) -> Self {
        if affordability_ratio > 0.0 {
            MarkerColor::Orange
        } else {
            MarkerColor::Blue
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarkerColor::Orange => "orange",
            MarkerColor::Blue => "blue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDetails {
    pub address: String,
    pub status: String,
    pub move_in: String,
    pub market_rate_units: i64,
    pub affordable_units: i64,
    pub total_units: i64,
    pub affordability_ratio: f64,
    pub market_rate: String,
    pub city_project_info: String,
    pub media: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    pub color: MarkerColor,
    pub details: MarkerDetails,
}

/// Build a marker for every project with usable coordinates.
pub fn markers(enriched: &DataFrame) -> Result<Vec<MapMarker>, PipelineError> {
    require_columns(
        enriched,
        &[
            derived::MARKET_RATE_UNITS,
            derived::AFFORDABLE_UNITS,
            project::TOTAL_UNITS,
            derived::AFFORDABILITY_RATIO,
        ],
    )?;
    if enriched.column(project::LATITUDE).is_err() || enriched.column(project::LONGITUDE).is_err() {
        return Ok(Vec::new());
    }

    let coords = enriched
        .clone()
        .lazy()
        .select([
            parse_number(project::LATITUDE).alias(project::LATITUDE),
            parse_number(project::LONGITUDE).alias(project::LONGITUDE),
        ])
        .collect()?;
    let latitudes = coords.column(project::LATITUDE)?.f64()?;
    let longitudes = coords.column(project::LONGITUDE)?.f64()?;

    let names = text_column(enriched, project::NAME)?;
    let addresses = text_column(enriched, project::ADDRESS)?;
    let statuses = text_column(enriched, project::STATUS)?;
    let occupancy = text_column(enriched, project::OCCUPANCY)?;
    let market_rate_flags = text_column(enriched, project::MARKET_RATE_FLAG)?;
    let city_links = text_column(enriched, project::CITY_PROJECT_INFO)?;
    let media_links = text_column(enriched, project::MEDIA)?;
    let notes = text_column(enriched, project::NOTES)?;

    let market_rate_units = enriched.column(derived::MARKET_RATE_UNITS)?.i64()?;
    let affordable_units = enriched.column(derived::AFFORDABLE_UNITS)?.i64()?;
    let total_units = enriched.column(project::TOTAL_UNITS)?.i64()?;
    let ratios = enriched.column(derived::AFFORDABILITY_RATIO)?.f64()?;

    let mut out = Vec::new();
    for i in 0..enriched.height() {
        let (Some(latitude), Some(longitude)) = (latitudes.get(i), longitudes.get(i)) else {
            continue;
        };
        if !latitude.is_finite() || !longitude.is_finite() {
            continue;
        }

        let affordability_ratio = ratios.get(i).unwrap_or(0.0);
        out.push(MapMarker {
            label: or_placeholder(&names[i]),
            latitude,
            longitude,
            color: MarkerColor::for_ratio(affordability_ratio),
            details: MarkerDetails {
                address: or_placeholder(&addresses[i]),
                status: or_placeholder(&statuses[i]),
                move_in: or_placeholder(&occupancy[i]),
                market_rate_units: market_rate_units.get(i).unwrap_or(0),
                affordable_units: affordable_units.get(i).unwrap_or(0),
                total_units: total_units.get(i).unwrap_or(0),
                affordability_ratio,
                market_rate: or_placeholder(&market_rate_flags[i]),
                city_project_info: or_placeholder(&city_links[i]),
                media: or_placeholder(&media_links[i]),
                notes: or_placeholder(&notes[i]),
            },
        });
    }

    tracing::debug!(
        projects = enriched.height(),
        markers = out.len(),
        "Built map markers"
    );
    Ok(out)
}

pub fn markers_json(markers: &[MapMarker]) -> serde_json::Result<String> {
    serde_json::to_string(markers)
}

/// Trimmed text of an optional column; all `None` when the column is absent.
fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, PipelineError> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };
    let column = column.cast(&DataType::String)?;
    let values = column
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect();
    Ok(values)
}

fn or_placeholder(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| PLACEHOLDER.to_string())
}
