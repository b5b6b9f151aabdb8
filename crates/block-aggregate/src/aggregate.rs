//! Aggregation entry points.

use raster_common::{RasterGrid, Table};
use serde::{Deserialize, Serialize};
use tracing::{info_span, warn};

use crate::error::{AggregateError, Result};
use crate::extent::aggregated_extent;
use crate::indexer::{check_unique_columns, index_blocks};
use crate::output::build_output_grid;
use crate::reducer::reduce_blocks;
use crate::reduction::{FnReduction, Reduction, RowGroup};

/// Parameters of one aggregation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateRequest {
    /// Source grid rows.
    pub nrows: usize,
    /// Source grid columns.
    pub ncols: usize,
    /// Source cells per block side.
    pub fact: usize,
    /// Source cell size (square cells).
    pub cell_size: f64,
    /// Keep the `ID` column in the result.
    pub include_id: bool,
}

impl AggregateRequest {
    /// Create a request that keeps the `ID` column.
    pub fn new(nrows: usize, ncols: usize, fact: usize, cell_size: f64) -> Self {
        Self {
            nrows,
            ncols,
            fact,
            cell_size,
            include_id: true,
        }
    }

    /// Set whether the `ID` column is kept.
    pub fn with_include_id(mut self, include_id: bool) -> Self {
        self.include_id = include_id;
        self
    }

    /// Validate the request parameters.
    pub fn validate(&self) -> Result<()> {
        if self.nrows == 0 || self.ncols == 0 {
            return Err(AggregateError::invalid_argument(format!(
                "grid dimensions must be positive, got {}x{}",
                self.nrows, self.ncols
            )));
        }
        if self.fact == 0 {
            return Err(AggregateError::invalid_argument("aggregation factor must be >= 1"));
        }
        if !(self.cell_size > 0.0) || !self.cell_size.is_finite() {
            return Err(AggregateError::invalid_argument(format!(
                "cell size must be positive, got {}",
                self.cell_size
            )));
        }
        Ok(())
    }
}

/// Aggregate a row-major coordinate table into `fact x fact` blocks.
///
/// `source` must hold one row per source cell in row-major order (row 0
/// at the top) with `x` and `y` cell-center columns. The result has one
/// row per aggregated cell with `ID` (optional), `x`, `y` and the
/// reduction's output columns, in row-major order; cells whose value is
/// missing in every output column are dropped.
///
/// `source` is never modified. Any error aborts the whole call.
pub fn aggregate(
    source: &Table,
    request: &AggregateRequest,
    reduction: &dyn Reduction,
) -> Result<Table> {
    Ok(run_pipeline(source, request, reduction)?.table)
}

fn run_pipeline(
    source: &Table,
    request: &AggregateRequest,
    reduction: &dyn Reduction,
) -> Result<AggregatedRaster> {
    let span = info_span!(
        "aggregate",
        nrows = request.nrows,
        ncols = request.ncols,
        fact = request.fact
    );
    let _enter = span.enter();

    check_unique_columns(source)?;
    request.validate()?;
    if request.fact == 1 {
        warn!("Aggregation factor is 1, output grid matches the source grid");
    }

    let working = index_blocks(source, request.nrows, request.ncols, request.fact)?;
    let extent = aggregated_extent(
        &working,
        request.nrows,
        request.ncols,
        request.fact,
        request.cell_size,
    )?;
    let output = build_output_grid(&extent)?;
    let grid = output.grid;
    let table = reduce_blocks(&working, output, reduction, request.include_id)?;
    Ok(AggregatedRaster { grid, table })
}

/// Aggregate with a closure producing a single named output column.
///
/// ```ignore
/// let table = aggregate_fn(&source, &request, "wmean", |g| {
///     Ok(weighted_mean(&g.values("value")?, &g.values("weight")?))
/// })?;
/// ```
pub fn aggregate_fn<F>(
    source: &Table,
    request: &AggregateRequest,
    output_column: &str,
    f: F,
) -> Result<Table>
where
    F: Fn(&RowGroup<'_>) -> Result<f64>,
{
    aggregate(source, request, &FnReduction::new(output_column, f))
}

/// Result of aggregating a raster layer set.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRaster {
    /// Aggregated grid descriptor.
    pub grid: RasterGrid,
    /// Aggregated coordinate table.
    pub table: Table,
}

impl AggregatedRaster {
    /// Row-major values of one output column; pruned cells are NaN.
    pub fn layer(&self, column: &str) -> Result<Vec<f64>> {
        Ok(self.grid.from_table(&self.table, column)?)
    }
}

/// Aggregate raster layers through their coordinate-table form.
///
/// Each layer must hold `grid.len()` row-major values.
pub fn aggregate_grid(
    grid: &RasterGrid,
    layers: &[(&str, &[f64])],
    fact: usize,
    reduction: &dyn Reduction,
) -> Result<AggregatedRaster> {
    let source = grid.to_table(layers)?;
    let request = AggregateRequest::new(grid.nrows, grid.ncols, fact, grid.cell_size);
    run_pipeline(&source, &request, reduction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::MethodReduction;
    use raster_common::{BoundingBox, Column};

    #[test]
    fn test_request_validation() {
        assert!(AggregateRequest::new(4, 4, 2, 1.0).validate().is_ok());
        assert!(AggregateRequest::new(0, 4, 2, 1.0).validate().is_err());
        assert!(AggregateRequest::new(4, 4, 0, 1.0).validate().is_err());
        assert!(AggregateRequest::new(4, 4, 2, 0.0).validate().is_err());
        assert!(AggregateRequest::new(4, 4, 2, f64::NAN).validate().is_err());
        assert!(!AggregateRequest::new(4, 4, 2, 1.0).with_include_id(false).include_id);
    }

    #[test]
    fn test_duplicate_checked_before_validation() {
        let source = Table::from_columns_unchecked(vec![
            Column::float("x", vec![0.5]),
            Column::float("x", vec![0.5]),
        ])
        .unwrap();
        let request = AggregateRequest::new(0, 0, 0, -1.0);
        let err = aggregate(&source, &request, &MethodReduction::mean("x", "out")).unwrap_err();
        assert!(matches!(err, AggregateError::DuplicateColumn(_)));
    }

    #[test]
    fn test_aggregate_grid_layer() {
        let grid = RasterGrid::new(4, 4, 1.0, 0.0, 4.0);
        let values: Vec<f64> = (1..=16).map(|v| v as f64).collect();
        let reduction = MethodReduction::max("value", "max");

        let result = aggregate_grid(&grid, &[("value", values.as_slice())], 2, &reduction).unwrap();
        assert_eq!(result.grid.extent, BoundingBox::new(0.0, 0.0, 4.0, 4.0));
        assert_eq!(result.grid.cell_size, 2.0);
        assert_eq!(result.layer("max").unwrap(), vec![6.0, 8.0, 14.0, 16.0]);
    }
}
