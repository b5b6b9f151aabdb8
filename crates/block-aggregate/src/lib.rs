//! Block-wise Raster Aggregation
//!
//! Coarsens a regular grid by combining `fact x fact` blocks of source
//! cells into one output cell, using any per-block reduction: a built-in
//! mean/max/weighted mean, or a caller closure over several attributes.
//!
//! # Architecture
//!
//! ```text
//! Source table (row-major, x/y + attributes)
//!      │
//!      ▼
//! index_blocks()           block_row/block_col per cell, sorted copy
//!      │
//!      ▼
//! aggregated_extent()      new extent from actual x/y extrema
//!      │
//!      ▼
//! build_output_grid()      ID/x/y table of the coarse grid
//!      │
//!      ▼
//! reduce_blocks()          reduce per block, keyed join, prune missing
//!      │
//!      ▼
//! Aggregated table
//! ```
//!
//! # Example
//!
//! ```ignore
//! use block_aggregate::{aggregate, AggregateRequest, WeightedMean};
//!
//! let request = AggregateRequest::new(720, 1440, 4, 0.25);
//! let reduction = WeightedMean::new("value", "area", "value");
//! let coarse = aggregate(&table, &request, &reduction)?;
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod extent;
pub mod indexer;
pub mod output;
pub mod reducer;
pub mod reduction;

// Re-export commonly used types at crate root
pub use aggregate::{aggregate, aggregate_fn, aggregate_grid, AggregateRequest, AggregatedRaster};
pub use config::AggregateConfig;
pub use error::{AggregateError, Result};
pub use extent::{aggregated_extent, compute_extent, AggregatedExtent};
pub use indexer::{index_blocks, BlockKey, BLOCK_COL_COLUMN, BLOCK_ROW_COLUMN};
pub use output::{build_output_grid, OutputGrid};
pub use reducer::reduce_blocks;
pub use reduction::{
    FnReduction, MethodReduction, MultiReduction, Reduction, ReductionMethod, RowGroup,
    WeightedMean,
};

pub use raster_common::{BoundingBox, Column, RasterGrid, Table};
