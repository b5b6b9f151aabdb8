//! Block indexing: assigns every source cell to its aggregation block.

use raster_common::{Column, Table};
use tracing::debug;

use crate::error::{AggregateError, Result};

/// Name of the derived 1-based block row column.
pub const BLOCK_ROW_COLUMN: &str = "block_row";
/// Name of the derived 1-based block column column.
pub const BLOCK_COL_COLUMN: &str = "block_col";

/// Identity of one aggregation block, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    pub row: i64,
    pub col: i64,
}

impl BlockKey {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Block containing the 0-based source cell (`row`, `col`).
    pub fn for_cell(row: usize, col: usize, fact: usize) -> Self {
        Self::new(block_index(row, fact), block_index(col, fact))
    }
}

/// 1-based block index of a 0-based cell index: `floor(i / fact) + 1`.
#[inline]
pub fn block_index(i: usize, fact: usize) -> i64 {
    (i / fact) as i64 + 1
}

/// Fail if any column name occurs more than once.
pub fn check_unique_columns(table: &Table) -> Result<()> {
    let dups = table.duplicate_names();
    if dups.is_empty() {
        Ok(())
    } else {
        Err(AggregateError::DuplicateColumn(dups))
    }
}

/// Fail unless the table holds exactly `nrows * ncols` rows.
pub fn check_dimensions(table: &Table, nrows: usize, ncols: usize) -> Result<()> {
    if nrows.checked_mul(ncols) != Some(table.num_rows()) {
        return Err(AggregateError::DimensionMismatch {
            nrows,
            ncols,
            rows: table.num_rows(),
        });
    }
    Ok(())
}

/// Produce a block-indexed working copy of `source`.
///
/// Rows must be in row-major scan order of an `nrows x ncols` grid with
/// row 0 at the top. The copy gains `block_row` and `block_col` columns and
/// is stably sorted by `(block_row, block_col)`. `source` is never modified.
pub fn index_blocks(source: &Table, nrows: usize, ncols: usize, fact: usize) -> Result<Table> {
    check_unique_columns(source)?;
    for reserved in [BLOCK_ROW_COLUMN, BLOCK_COL_COLUMN] {
        if source.has_column(reserved) {
            return Err(AggregateError::DuplicateColumn(vec![reserved.to_string()]));
        }
    }
    if fact == 0 {
        return Err(AggregateError::invalid_argument("aggregation factor must be >= 1"));
    }
    check_dimensions(source, nrows, ncols)?;

    let mut block_rows = Vec::with_capacity(source.num_rows());
    let mut block_cols = Vec::with_capacity(source.num_rows());
    for row in 0..nrows {
        let block_row = block_index(row, fact);
        for col in 0..ncols {
            block_rows.push(block_row);
            block_cols.push(block_index(col, fact));
        }
    }

    let mut working = source.clone();
    working.add_column(Column::int(BLOCK_ROW_COLUMN, block_rows))?;
    working.add_column(Column::int(BLOCK_COL_COLUMN, block_cols))?;
    working.sort_by_int_keys(&[BLOCK_ROW_COLUMN, BLOCK_COL_COLUMN])?;

    debug!(
        rows = working.num_rows(),
        block_rows = nrows.div_ceil(fact),
        block_cols = ncols.div_ceil(fact),
        "Indexed source cells into blocks"
    );

    Ok(working)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential(nrows: usize, ncols: usize) -> Table {
        let values: Vec<f64> = (0..nrows * ncols).map(|v| v as f64).collect();
        Table::from_columns(vec![Column::float("value", values)]).unwrap()
    }

    #[test]
    fn test_block_index() {
        assert_eq!(block_index(0, 2), 1);
        assert_eq!(block_index(1, 2), 1);
        assert_eq!(block_index(2, 2), 2);
        assert_eq!(block_index(4, 3), 2);
        assert_eq!(block_index(7, 1), 8);
        assert_eq!(BlockKey::for_cell(3, 0, 2), BlockKey::new(2, 1));
    }

    #[test]
    fn test_index_blocks_sorts_by_block() {
        let working = index_blocks(&sequential(4, 4), 4, 4, 2).unwrap();

        assert_eq!(
            working.int_column(BLOCK_ROW_COLUMN).unwrap(),
            &[1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2]
        );
        assert_eq!(
            working.int_column(BLOCK_COL_COLUMN).unwrap(),
            &[1, 1, 1, 1, 2, 2, 2, 2, 1, 1, 1, 1, 2, 2, 2, 2]
        );
        // Within a block, rows keep their row-major order.
        assert_eq!(
            &working.float_column("value").unwrap()[..4],
            &[0.0, 1.0, 4.0, 5.0]
        );
    }

    #[test]
    fn test_index_blocks_leaves_source_untouched() {
        let source = sequential(3, 3);
        let before = source.clone();
        let working = index_blocks(&source, 3, 3, 2).unwrap();

        assert_eq!(source, before);
        assert_eq!(working.num_columns(), source.num_columns() + 2);
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let source = Table::from_columns_unchecked(vec![
            Column::float("x", vec![0.0, 1.0]),
            Column::float("x", vec![0.0, 1.0]),
        ])
        .unwrap();

        let err = index_blocks(&source, 1, 2, 1).unwrap_err();
        assert_eq!(err, AggregateError::DuplicateColumn(vec!["x".to_string()]));
    }

    #[test]
    fn test_reserved_block_column_rejected() {
        let source = Table::from_columns(vec![Column::int(BLOCK_ROW_COLUMN, vec![1, 1])]).unwrap();
        assert!(matches!(
            index_blocks(&source, 1, 2, 1),
            Err(AggregateError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = index_blocks(&sequential(3, 3), 2, 4, 2).unwrap_err();
        assert_eq!(
            err,
            AggregateError::DimensionMismatch {
                nrows: 2,
                ncols: 4,
                rows: 9
            }
        );
    }

    #[test]
    fn test_overflowing_dimensions_reported() {
        let err = index_blocks(&sequential(4, 4), usize::MAX, 2, 2).unwrap_err();
        assert_eq!(
            err,
            AggregateError::DimensionMismatch {
                nrows: usize::MAX,
                ncols: 2,
                rows: 16
            }
        );
        assert_eq!(
            err.to_string(),
            format!("source table has 16 rows but grid is {}x2", usize::MAX)
        );
    }

    #[test]
    fn test_zero_factor_rejected() {
        assert!(matches!(
            index_blocks(&sequential(2, 2), 2, 2, 0),
            Err(AggregateError::InvalidArgument(_))
        ));
    }
}
