//! Common test fixtures for aggregation tests.
//!
//! Pre-built grids and source tables representing common scenarios.

use raster_common::{Column, RasterGrid, Table};

use crate::generators::create_sequential_grid;

/// Common grid definitions for testing.
pub mod grids {
    use raster_common::RasterGrid;

    /// 4x4 unit cells with the top-left corner at the origin, y up.
    pub fn unit_4x4() -> RasterGrid {
        RasterGrid::new(4, 4, 1.0, 0.0, 4.0)
    }

    /// 5x5 unit cells, not divisible by 2.
    pub fn unit_5x5() -> RasterGrid {
        RasterGrid::new(5, 5, 1.0, 0.0, 5.0)
    }

    /// A small regional lat/lon grid at 0.25 degrees.
    pub fn regional_quarter_degree() -> RasterGrid {
        RasterGrid::new(40, 60, 0.25, -100.0, 45.0)
    }

    /// GFS-like global grid at 0.5 degrees, cell edges on whole degrees.
    pub fn global_half_degree() -> RasterGrid {
        RasterGrid::new(360, 720, 0.5, -180.0, 90.0)
    }
}

/// Source table for `grid` with `value` counting up from 1 row-major.
///
/// Columns: `ID`, `x`, `y`, `value`.
pub fn sequential_table(grid: &RasterGrid) -> Table {
    let values = create_sequential_grid(grid.nrows, grid.ncols);
    grid.to_table(&[("value", values.as_slice())])
        .expect("sequential layer matches grid size")
}

/// Source table with `value` and a `weight` column equal to `value`.
pub fn weighted_table(grid: &RasterGrid) -> Table {
    let mut table = sequential_table(grid);
    let weights = table
        .float_column("value")
        .expect("value column present")
        .to_vec();
    table
        .add_column(Column::float("weight", weights))
        .expect("weight column is new");
    table
}

/// Source table for `grid` carrying the given named layers.
pub fn layered_table(grid: &RasterGrid, layers: &[(&str, Vec<f64>)]) -> Table {
    let borrowed: Vec<(&str, &[f64])> = layers
        .iter()
        .map(|(name, values)| (*name, values.as_slice()))
        .collect();
    grid.to_table(&borrowed).expect("layers match grid size")
}
