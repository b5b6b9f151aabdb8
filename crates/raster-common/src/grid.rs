//! Regular square-cell raster grids and their coordinate-table form.

use serde::{Deserialize, Serialize};

use crate::error::{TableError, TableResult};
use crate::table::{Column, Table};
use crate::{BoundingBox, ID_COLUMN, X_COLUMN, Y_COLUMN};

/// Specification of a north-up raster with square cells.
///
/// Cells are stored row-major with row 0 at the top (`max_y`) and
/// column 0 at the left (`min_x`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    /// Number of cell rows
    pub nrows: usize,
    /// Number of cell columns
    pub ncols: usize,
    /// Edge length of one cell, identical in x and y
    pub cell_size: f64,
    /// Outer edges of the grid (not cell centers)
    pub extent: BoundingBox,
}

impl RasterGrid {
    /// Create a grid from its dimensions, anchored at the top-left corner.
    pub fn new(nrows: usize, ncols: usize, cell_size: f64, min_x: f64, max_y: f64) -> Self {
        Self {
            nrows,
            ncols,
            cell_size,
            extent: BoundingBox::new(
                min_x,
                max_y - nrows as f64 * cell_size,
                min_x + ncols as f64 * cell_size,
                max_y,
            ),
        }
    }

    /// Create an empty grid covering `extent` at `cell_size` resolution.
    ///
    /// The dimensions are the extent divided by the cell size, rounded to
    /// the nearest whole cell to absorb floating point noise.
    pub fn empty(extent: BoundingBox, cell_size: f64) -> TableResult<Self> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(TableError::invalid_grid(format!(
                "cell size must be positive, got {}",
                cell_size
            )));
        }
        if !(extent.width() > 0.0) || !(extent.height() > 0.0) {
            return Err(TableError::invalid_grid(format!(
                "extent must have positive area, got {:?}",
                extent
            )));
        }

        Ok(Self {
            nrows: (extent.height() / cell_size).round() as usize,
            ncols: (extent.width() / cell_size).round() as usize,
            cell_size,
            extent,
        })
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.nrows * self.ncols
    }

    /// Check if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.nrows == 0 || self.ncols == 0
    }

    /// Current resolution (cell edge length).
    pub fn resolution(&self) -> f64 {
        self.cell_size
    }

    /// Change the resolution over the same extent.
    pub fn set_resolution(&mut self, cell_size: f64) -> TableResult<()> {
        *self = Self::empty(self.extent, cell_size)?;
        Ok(())
    }

    /// Replace the extent, keeping the resolution.
    pub fn set_extent(&mut self, extent: BoundingBox) -> TableResult<()> {
        *self = Self::empty(extent, self.cell_size)?;
        Ok(())
    }

    /// Center coordinates of the cell at (`row`, `col`).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.extent.min_x + (col as f64 + 0.5) * self.cell_size,
            self.extent.max_y - (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// Cell containing the point, or `None` outside the grid.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !self.extent.contains_point(x, y) {
            return None;
        }
        let col = ((x - self.extent.min_x) / self.cell_size).floor() as usize;
        let row = ((self.extent.max_y - y) / self.cell_size).floor() as usize;
        if row < self.nrows && col < self.ncols {
            Some((row, col))
        } else {
            None
        }
    }

    /// Convert the grid into a coordinate table.
    ///
    /// Emits `ID` (1-based, row-major), `x`, `y` and one float column per
    /// entry in `layers`. Each layer must hold exactly [`RasterGrid::len`]
    /// row-major values.
    pub fn to_table(&self, layers: &[(&str, &[f64])]) -> TableResult<Table> {
        let n = self.len();
        let mut ids = Vec::with_capacity(n);
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for row in 0..self.nrows {
            for col in 0..self.ncols {
                let (x, y) = self.cell_center(row, col);
                ids.push((row * self.ncols + col + 1) as i64);
                xs.push(x);
                ys.push(y);
            }
        }

        let mut table = Table::from_columns(vec![
            Column::int(ID_COLUMN, ids),
            Column::float(X_COLUMN, xs),
            Column::float(Y_COLUMN, ys),
        ])?;
        for (name, values) in layers {
            table.add_column(Column::float(*name, values.to_vec()))?;
        }
        Ok(table)
    }

    /// Rebuild a row-major raster layer from a coordinate table.
    ///
    /// Each row is placed in the cell containing its `x`/`y`. Cells with no
    /// table row are NaN, as are rows that fall outside the grid.
    pub fn from_table(&self, table: &Table, column: &str) -> TableResult<Vec<f64>> {
        let xs = table.float_column(X_COLUMN)?;
        let ys = table.float_column(Y_COLUMN)?;
        let values = table.float_column(column)?;

        let mut out = vec![f64::NAN; self.len()];
        for ((&x, &y), &v) in xs.iter().zip(ys).zip(values) {
            if let Some((row, col)) = self.cell_at(x, y) {
                out[row * self.ncols + col] = v;
            }
        }
        Ok(out)
    }
}
