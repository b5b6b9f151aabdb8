//! Extent and resolution of the aggregated grid.

use raster_common::{BoundingBox, Table, X_COLUMN, Y_COLUMN};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AggregateError, Result};

/// Shape and placement of the aggregated grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedExtent {
    /// Number of block rows, `ceil(nrows / fact)`.
    pub rsteps: usize,
    /// Number of block columns, `ceil(ncols / fact)`.
    pub csteps: usize,
    /// Aggregation factor the extent was derived with.
    pub fact: usize,
    /// Output cell size, `fact * cell_size`.
    pub cell_size: f64,
    /// Outer edges of the aggregated grid.
    pub extent: BoundingBox,
}

impl AggregatedExtent {
    /// Number of cells in the aggregated grid.
    pub fn len(&self) -> usize {
        self.rsteps * self.csteps
    }

    /// Check if the aggregated grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Derive the aggregated extent from source cell-center extrema.
///
/// `centers` spans the source cell centers, not the cell edges. The
/// aggregated grid is anchored at the top-left source edge and grows right
/// and down by whole blocks, so it always contains the source grid.
pub fn compute_extent(
    centers: BoundingBox,
    nrows: usize,
    ncols: usize,
    fact: usize,
    cell_size: f64,
) -> AggregatedExtent {
    let rsteps = nrows.div_ceil(fact);
    let csteps = ncols.div_ceil(fact);
    let half = 0.5 * cell_size;
    let block = fact as f64 * cell_size;

    let min_x = centers.min_x - half;
    let max_y = centers.max_y + half;
    let max_x = min_x + csteps as f64 * block;
    let min_y = max_y - rsteps as f64 * block;

    AggregatedExtent {
        rsteps,
        csteps,
        fact,
        cell_size: block,
        extent: BoundingBox::new(min_x, min_y, max_x, max_y),
    }
}

/// Derive the aggregated extent from the coordinates present in `table`.
///
/// Uses the actual `x`/`y` extrema rather than any declared extent, so a
/// subset of a grid aggregates onto its own footprint.
pub fn aggregated_extent(
    table: &Table,
    nrows: usize,
    ncols: usize,
    fact: usize,
    cell_size: f64,
) -> Result<AggregatedExtent> {
    if fact == 0 {
        return Err(AggregateError::invalid_argument("aggregation factor must be >= 1"));
    }
    if !(cell_size > 0.0) || !cell_size.is_finite() {
        return Err(AggregateError::invalid_argument(format!(
            "cell size must be positive, got {}",
            cell_size
        )));
    }

    let xs = table.float_column(X_COLUMN)?;
    if !xs.iter().any(|x| x.is_finite()) {
        return Err(AggregateError::MissingCoordinates(X_COLUMN.to_string()));
    }
    let ys = table.float_column(Y_COLUMN)?;
    if !ys.iter().any(|y| y.is_finite()) {
        return Err(AggregateError::MissingCoordinates(Y_COLUMN.to_string()));
    }

    let centers = BoundingBox::from_points(xs.iter().copied().zip(ys.iter().copied()))
        .ok_or_else(|| AggregateError::MissingCoordinates(format!("{}/{}", X_COLUMN, Y_COLUMN)))?;
    let result = compute_extent(centers, nrows, ncols, fact, cell_size);

    debug!(
        rsteps = result.rsteps,
        csteps = result.csteps,
        cell_size = result.cell_size,
        min_x = result.extent.min_x,
        min_y = result.extent.min_y,
        max_x = result.extent.max_x,
        max_y = result.extent.max_y,
        "Computed aggregated extent"
    );

    Ok(result)
}
