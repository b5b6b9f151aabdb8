//! Output grid construction.
//!
//! Materializes one row per aggregated cell, carrying the cell identity,
//! its center coordinates and the block key it will be joined on.

use raster_common::{Column, RasterGrid, Table, ID_COLUMN};
use tracing::debug;

use crate::error::{AggregateError, Result};
use crate::extent::AggregatedExtent;
use crate::indexer::{BLOCK_COL_COLUMN, BLOCK_ROW_COLUMN};

/// Empty aggregated grid and its coordinate table.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputGrid {
    /// Aggregated grid descriptor.
    pub grid: RasterGrid,
    /// `ID`, `x`, `y`, `block_row`, `block_col`, one row per cell in
    /// row-major order.
    pub table: Table,
}

/// Build the coordinate table of the aggregated grid.
///
/// Cell `ID`s run `1..=rsteps*csteps` row-major from the top-left cell, and
/// each row carries the 1-based block key of the source block it covers.
/// The same extent always yields the same `ID` to coordinate mapping.
pub fn build_output_grid(extent: &AggregatedExtent) -> Result<OutputGrid> {
    let grid = RasterGrid::empty(extent.extent, extent.cell_size)?;
    if grid.nrows != extent.rsteps || grid.ncols != extent.csteps {
        return Err(AggregateError::invalid_argument(format!(
            "aggregated extent resolves to {}x{} cells, expected {}x{}",
            grid.nrows, grid.ncols, extent.rsteps, extent.csteps
        )));
    }

    let mut table = grid.to_table(&[])?;

    let csteps = grid.ncols as i64;
    let (block_rows, block_cols): (Vec<i64>, Vec<i64>) = table
        .int_column(ID_COLUMN)?
        .iter()
        .map(|&id| ((id - 1) / csteps + 1, (id - 1) % csteps + 1))
        .unzip();
    table.add_column(Column::int(BLOCK_ROW_COLUMN, block_rows))?;
    table.add_column(Column::int(BLOCK_COL_COLUMN, block_cols))?;

    debug!(cells = table.num_rows(), "Built output grid");

    Ok(OutputGrid { grid, table })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::compute_extent;
    use raster_common::BoundingBox;

    fn extent_3x2() -> AggregatedExtent {
        // 5 source rows x 3 source cols of 1.0, fact 2 -> 3x2 blocks
        compute_extent(BoundingBox::new(0.5, 0.5, 2.5, 4.5), 5, 3, 2, 1.0)
    }

    #[test]
    fn test_ids_and_keys_row_major() {
        let output = build_output_grid(&extent_3x2()).unwrap();
        let table = &output.table;

        assert_eq!(table.num_rows(), 6);
        assert_eq!(table.int_column("ID").unwrap(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(table.int_column(BLOCK_ROW_COLUMN).unwrap(), &[1, 1, 2, 2, 3, 3]);
        assert_eq!(table.int_column(BLOCK_COL_COLUMN).unwrap(), &[1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn test_cell_centers() {
        let output = build_output_grid(&extent_3x2()).unwrap();
        // extent x: 0..4, y: -1..5, cells of 2.0
        assert_eq!(output.table.float_column("x").unwrap(), &[1.0, 3.0, 1.0, 3.0, 1.0, 3.0]);
        assert_eq!(output.table.float_column("y").unwrap(), &[4.0, 4.0, 2.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let extent = extent_3x2();
        let first = build_output_grid(&extent).unwrap();
        let second = build_output_grid(&extent).unwrap();
        assert_eq!(first, second);
    }
}
