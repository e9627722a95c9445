//! Aggregation pipeline: per-project derived columns and the yearly
//! cumulative table.

use polars::prelude::*;

use crate::error::PipelineError;
use crate::schema::{derived, project, yearly};

/// Widest year range the yearly table is expected to span.
const PLAUSIBLE_YEAR_SPAN: i64 = 200;

/// Output of one pipeline pass.
#[derive(Debug, Clone)]
pub struct Aggregated {
    /// Input rows plus typed unit counts and the derived columns.
    pub projects: DataFrame,
    /// One row per year from the earliest move-in year to the target year.
    pub yearly: DataFrame,
}

/// Run the full pipeline over a raw project frame.
pub fn aggregate(projects: &DataFrame, target_year: i32) -> Result<Aggregated, PipelineError> {
    let enriched = enrich_projects(projects)?;
    let yearly = yearly_totals(&enriched, target_year)?;
    tracing::debug!(
        projects = enriched.height(),
        years = yearly.height(),
        target_year,
        "Aggregated project sheet"
    );
    Ok(Aggregated {
        projects: enriched,
        yearly,
    })
}

/// Affordable share of a project in percent, one decimal, ties to even.
///
/// Zero when the project has no units; never above 100.
pub fn affordability_ratio(affordable: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = (affordable as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
    (pct * 10.0).round_ties_even() / 10.0
}

/// Type the unit counts and add the derived per-project columns.
///
/// Unit counts that are missing, non-numeric or negative become 0. The
/// occupancy field becomes `Move-in Year`, null where it is not a number.
pub fn enrich_projects(df: &DataFrame) -> Result<DataFrame, PipelineError> {
    require_columns(df, &project::UNIT_INPUTS)?;
    require_columns(df, &[project::OCCUPANCY])?;

    log_coercions(df)?;

    let mut df = df
        .clone()
        .lazy()
        .with_columns(
            project::UNIT_INPUTS
                .iter()
                .map(|name| unit_count(name))
                .collect::<Vec<_>>(),
        )
        .with_columns([
            (col(project::MARKET_RATE_RENTALS) + col(project::AFFORDABLE_RENTALS))
                .alias(derived::RENTAL_UNITS),
            (col(project::MARKET_RATE_OWNER) + col(project::AFFORDABLE_OWNER))
                .alias(derived::OWNER_UNITS),
            (col(project::AFFORDABLE_RENTALS) + col(project::AFFORDABLE_OWNER))
                .alias(derived::AFFORDABLE_UNITS),
            (col(project::MARKET_RATE_RENTALS) + col(project::MARKET_RATE_OWNER))
                .alias(derived::MARKET_RATE_UNITS),
            col(project::MARKET_RATE_RENTALS).alias(derived::MARKET_RENTALS),
            col(project::AFFORDABLE_RENTALS).alias(derived::NON_MARKET_RENTALS),
            parse_number(project::OCCUPANCY)
                .cast(DataType::Int32)
                .alias(derived::MOVE_IN_YEAR),
        ])
        .collect()?;

    let ratios: Vec<f64> = {
        let affordable = df.column(derived::AFFORDABLE_UNITS)?.i64()?;
        let total = df.column(project::TOTAL_UNITS)?.i64()?;
        affordable
            .into_iter()
            .zip(total)
            .map(|(a, t)| affordability_ratio(a.unwrap_or(0), t.unwrap_or(0)))
            .collect()
    };
    df.with_column(Column::new(derived::AFFORDABILITY_RATIO.into(), ratios))?;

    Ok(df)
}

/// Group enriched projects by move-in year and accumulate.
///
/// Rows without a move-in year are left out. Every year from the earliest
/// one through `target_year` gets a row, zero-filled when nothing moves in.
/// Without any dated project the result has the full schema and no rows.
pub fn yearly_totals(enriched: &DataFrame, target_year: i32) -> Result<DataFrame, PipelineError> {
    require_columns(enriched, &[yearly::YEAR])?;
    require_columns(
        enriched,
        &yearly::SUMMED.iter().map(|(sum, _)| *sum).collect::<Vec<_>>(),
    )?;

    let grouped = enriched
        .clone()
        .lazy()
        .filter(col(yearly::YEAR).is_not_null())
        .group_by([col(yearly::YEAR)])
        .agg(
            yearly::SUMMED
                .iter()
                .map(|(sum, _)| col(*sum).sum())
                .collect::<Vec<_>>(),
        )
        .collect()?;

    let Some(first_year) = grouped.column(yearly::YEAR)?.i32()?.min() else {
        return Ok(empty_yearly_frame()?);
    };
    // Collapse to a single row rather than emit a reversed range.
    let last_year = target_year.max(first_year);
    if implausible_span(first_year, last_year) {
        tracing::warn!(
            first_year,
            last_year,
            "Yearly table spans an implausible range; check the occupancy column for typos"
        );
    }

    let years: Vec<i32> = (first_year..=last_year).collect();
    let range = DataFrame::new(vec![Column::new(yearly::YEAR.into(), years)])?;

    let table = range
        .lazy()
        .join(
            grouped.lazy(),
            [col(yearly::YEAR)],
            [col(yearly::YEAR)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns(
            yearly::SUMMED
                .iter()
                .map(|(sum, _)| col(*sum).fill_null(lit(0i64)))
                .collect::<Vec<_>>(),
        )
        .sort([yearly::YEAR], SortMultipleOptions::default())
        .with_columns(
            yearly::SUMMED
                .iter()
                .map(|(sum, cumulative)| col(*sum).cum_sum(false).alias(*cumulative))
                .collect::<Vec<_>>(),
        )
        .collect()?;

    Ok(table)
}

/// Projects with at least one unit, most affordable first.
pub fn rank_by_affordability(enriched: &DataFrame) -> Result<DataFrame, PipelineError> {
    require_columns(
        enriched,
        &[derived::AFFORDABILITY_RATIO, project::TOTAL_UNITS],
    )?;

    let ranked = enriched
        .clone()
        .lazy()
        .filter(col(project::TOTAL_UNITS).gt(lit(0i64)))
        .sort_by_exprs(
            [col(derived::AFFORDABILITY_RATIO), col(project::TOTAL_UNITS)],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?;
    Ok(ranked)
}

pub(crate) fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), PipelineError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(PipelineError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Lenient numeric parse of a column of any dtype; null where it fails.
pub(crate) fn parse_number(name: &str) -> Expr {
    col(name)
        .cast(DataType::String)
        .str()
        .strip_chars(lit(" \t\r\n"))
        .cast(DataType::Float64)
}

fn implausible_span(first_year: i32, last_year: i32) -> bool {
    i64::from(last_year) - i64::from(first_year) + 1 > PLAUSIBLE_YEAR_SPAN
}

fn unit_count(name: &str) -> Expr {
    let parsed = parse_number(name);
    when(parsed.clone().gt(lit(0.0)))
        .then(parsed)
        .otherwise(lit(0.0))
        .cast(DataType::Int64)
        .fill_null(lit(0i64))
        .alias(name)
}

/// Report cells that the zero-fill and year-exclusion policies absorb.
fn log_coercions(df: &DataFrame) -> Result<(), PipelineError> {
    let counts = df
        .clone()
        .lazy()
        .select(
            project::UNIT_INPUTS
                .iter()
                .chain(std::iter::once(&project::OCCUPANCY))
                .map(|name| {
                    col(*name)
                        .is_not_null()
                        .and(parse_number(name).is_null())
                        .sum()
                        .alias(*name)
                })
                .collect::<Vec<_>>(),
        )
        .collect()?;

    for name in project::UNIT_INPUTS {
        let coerced = counts.column(name)?.get(0)?.extract::<u64>().unwrap_or(0);
        if coerced > 0 {
            tracing::debug!(column = name, cells = coerced, "Non-numeric unit counts treated as 0");
        }
    }
    let undated = counts
        .column(project::OCCUPANCY)?
        .get(0)?
        .extract::<u64>()
        .unwrap_or(0);
    if undated > 0 {
        tracing::debug!(rows = undated, "Projects without a numeric move-in year left out of yearly totals");
    }
    Ok(())
}

fn empty_yearly_frame() -> PolarsResult<DataFrame> {
    let mut columns = vec![Column::new(yearly::YEAR.into(), Vec::<i32>::new())];
    for (sum, _) in yearly::SUMMED {
        columns.push(Column::new(sum.into(), Vec::<i64>::new()));
    }
    for (_, cumulative) in yearly::SUMMED {
        columns.push(Column::new(cumulative.into(), Vec::<i64>::new()));
    }
    DataFrame::new(columns)
}
