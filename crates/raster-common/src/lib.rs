//! Common raster types shared by the aggregation crates.
//!
//! These are the collaborators the block aggregation core leans on:
//! a bounding box, an arrow-backed named-column table with grouping support,
//! and a regular square-cell raster grid that converts to and from a
//! coordinate table.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod table;

pub use bbox::BoundingBox;
pub use error::{TableError, TableResult};
pub use grid::RasterGrid;
pub use table::{Column, Group, Table};

/// Name of the cell identity column produced by [`RasterGrid::to_table`].
pub const ID_COLUMN: &str = "ID";
/// Name of the cell-center x coordinate column.
pub const X_COLUMN: &str = "x";
/// Name of the cell-center y coordinate column.
pub const Y_COLUMN: &str = "y";
