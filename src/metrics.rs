use polars::prelude::*;
use serde::Serialize;

use crate::error::PipelineError;
use crate::pipeline::require_columns;
use crate::schema::{derived, yearly};

/// Planning goal the pipeline is measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub units: i64,
    pub start_year: i32,
    pub target_year: i32,
}

/// Progress of the dated pipeline toward the rental goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressMetrics {
    pub goal: i64,
    pub planned_total: i64,
    pub deficit: i64,
    pub percent_of_goal: f64,
    /// Units per remaining goal year needed to close the deficit.
    pub required_annual_pace: f64,
}

impl ProgressMetrics {
    pub fn compute(planned_total: i64, goal: &Goal) -> Self {
        let deficit = (goal.units - planned_total).max(0);
        let percent_of_goal = if goal.units > 0 {
            planned_total as f64 / goal.units as f64 * 100.0
        } else {
            0.0
        };
        let goal_years = i64::from(goal.target_year) - i64::from(goal.start_year) + 1;
        let required_annual_pace = if goal_years > 0 {
            deficit as f64 / goal_years as f64
        } else {
            0.0
        };
        Self {
            goal: goal.units,
            planned_total,
            deficit,
            percent_of_goal,
            required_annual_pace,
        }
    }
}

/// Rental units across every project with a move-in year.
///
/// Projects dated after the target year count here but fall outside the
/// yearly table, so this can exceed `CurrentTotals::rental`.
pub fn planned_rentals(enriched: &DataFrame) -> Result<i64, PipelineError> {
    require_columns(enriched, &[derived::MOVE_IN_YEAR, derived::RENTAL_UNITS])?;
    let total = enriched
        .clone()
        .lazy()
        .filter(col(derived::MOVE_IN_YEAR).is_not_null())
        .select([col(derived::RENTAL_UNITS).sum()])
        .collect()?;
    let value = total
        .column(derived::RENTAL_UNITS)?
        .get(0)?
        .extract::<i64>()
        .unwrap_or(0);
    Ok(value)
}

pub fn progress(enriched: &DataFrame, goal: &Goal) -> Result<ProgressMetrics, PipelineError> {
    Ok(ProgressMetrics::compute(planned_rentals(enriched)?, goal))
}

/// Last value of every cumulative column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentTotals {
    pub rental: i64,
    pub owner: i64,
    pub total: i64,
    pub affordable: i64,
    pub market_rate: i64,
}

impl CurrentTotals {
    /// Read the final row of the yearly table; zeros when it is empty.
    pub fn from_yearly(table: &DataFrame) -> Result<Self, PipelineError> {
        if table.height() == 0 {
            return Ok(Self::default());
        }
        let last = |name: &str| -> Result<i64, PipelineError> {
            let column = table
                .column(name)
                .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;
            Ok(column.i64()?.get(table.height() - 1).unwrap_or(0))
        };
        Ok(Self {
            rental: last(yearly::CUMULATIVE_RENTALS)?,
            owner: last(yearly::CUMULATIVE_OWNER)?,
            total: last(yearly::CUMULATIVE_TOTAL)?,
            affordable: last(yearly::CUMULATIVE_AFFORDABLE)?,
            market_rate: last(yearly::CUMULATIVE_MARKET_RATE)?,
        })
    }
}
