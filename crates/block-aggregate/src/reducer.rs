//! Grouped reduction and assembly of the aggregated table.
//!
//! Block results are joined onto the output grid by `(block_row,
//! block_col)` key, never by position, so a block with no source rows
//! leaves a missing value instead of shifting its neighbours.

use std::collections::HashMap;

use raster_common::{Column, Table, ID_COLUMN};
use tracing::debug;

use crate::error::{AggregateError, Result};
use crate::indexer::{BlockKey, BLOCK_COL_COLUMN, BLOCK_ROW_COLUMN};
use crate::output::OutputGrid;
use crate::reduction::{Reduction, RowGroup};

/// Reduce every block of `working` and attach the results to `output`.
///
/// `working` must carry the block index columns added by
/// [`crate::indexer::index_blocks`]. Rows whose value is missing in every
/// output column are dropped. The `ID` column is kept when `include_id`
/// is set; the block key columns are always removed.
pub fn reduce_blocks(
    working: &Table,
    output: OutputGrid,
    reduction: &dyn Reduction,
    include_id: bool,
) -> Result<Table> {
    let names = reduction.output_columns();
    check_output_names(&names, &output.table)?;

    let results = reduce_groups(working, reduction, names.len())?;

    let mut table = output.table;
    let keys: Vec<BlockKey> = table
        .int_column(BLOCK_ROW_COLUMN)?
        .iter()
        .zip(table.int_column(BLOCK_COL_COLUMN)?)
        .map(|(&row, &col)| BlockKey::new(row, col))
        .collect();

    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(keys.len()); names.len()];
    let mut matched = 0usize;
    for key in &keys {
        match results.get(key) {
            Some(values) => {
                matched += 1;
                for (column, &v) in columns.iter_mut().zip(values) {
                    column.push(v);
                }
            }
            None => {
                for column in columns.iter_mut() {
                    column.push(f64::NAN);
                }
            }
        }
    }
    if matched < results.len() {
        debug!(
            unmatched = results.len() - matched,
            "Blocks fell outside the output grid"
        );
    }

    for (name, values) in names.iter().zip(columns) {
        table.add_column(Column::float(name.as_str(), values))?;
    }
    table.remove_column(BLOCK_ROW_COLUMN)?;
    table.remove_column(BLOCK_COL_COLUMN)?;
    if !include_id {
        table.remove_column(ID_COLUMN)?;
    }

    let before = table.num_rows();
    prune_missing(&mut table, &names)?;
    debug!(
        cells = before,
        pruned = before - table.num_rows(),
        "Assembled aggregated table"
    );

    Ok(table)
}

/// Evaluate the reduction once per block, keyed by block.
fn reduce_groups(
    working: &Table,
    reduction: &dyn Reduction,
    arity: usize,
) -> Result<HashMap<BlockKey, Vec<f64>>> {
    let groups = working.group_by(&[BLOCK_ROW_COLUMN, BLOCK_COL_COLUMN])?;
    let mut results = HashMap::with_capacity(groups.len());

    for group in &groups {
        let key = BlockKey::new(group.key[0], group.key[1]);
        let row_group = RowGroup::new(key, working, &group.rows);
        let values = reduction.reduce(&row_group)?;
        if values.len() != arity {
            return Err(row_group.error(format!(
                "reduction returned {} values for {} output columns",
                values.len(),
                arity
            )));
        }
        results.insert(key, values);
    }

    debug!(blocks = results.len(), "Reduced blocks");
    Ok(results)
}

fn check_output_names(names: &[String], output: &Table) -> Result<()> {
    if names.is_empty() {
        return Err(AggregateError::invalid_argument(
            "reduction declares no output columns",
        ));
    }
    let mut clashes = Vec::new();
    for (i, name) in names.iter().enumerate() {
        if (output.has_column(name) || names[..i].contains(name)) && !clashes.contains(name) {
            clashes.push(name.clone());
        }
    }
    if clashes.is_empty() {
        Ok(())
    } else {
        Err(AggregateError::DuplicateColumn(clashes))
    }
}

/// Drop rows whose value is NaN in every one of `columns`.
fn prune_missing(table: &mut Table, columns: &[String]) -> Result<()> {
    let data = columns
        .iter()
        .map(|name| table.float_column(name).map(|v| v.to_vec()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    table.retain_rows(|row| data.iter().any(|col| !col[row].is_nan()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::compute_extent;
    use crate::indexer::index_blocks;
    use crate::output::build_output_grid;
    use crate::reduction::{FnReduction, MethodReduction};
    use raster_common::{BoundingBox, RasterGrid};

    fn setup(nrows: usize, ncols: usize, fact: usize, values: Vec<f64>) -> (Table, OutputGrid) {
        let grid = RasterGrid::new(nrows, ncols, 1.0, 0.0, nrows as f64);
        let source = grid.to_table(&[("value", values.as_slice())]).unwrap();
        let working = index_blocks(&source, nrows, ncols, fact).unwrap();
        let centers = BoundingBox::new(0.5, 0.5, ncols as f64 - 0.5, nrows as f64 - 0.5);
        let extent = compute_extent(centers, nrows, ncols, fact, 1.0);
        (working, build_output_grid(&extent).unwrap())
    }

    #[test]
    fn test_reduce_mean_4x4() {
        let (working, output) = setup(4, 4, 2, (1..=16).map(|v| v as f64).collect());
        let reduction = MethodReduction::mean("value", "mean");
        let table = reduce_blocks(&working, output, &reduction, true).unwrap();

        assert_eq!(table.column_names(), vec!["ID", "x", "y", "mean"]);
        assert_eq!(table.float_column("mean").unwrap(), &[3.5, 5.5, 11.5, 13.5]);
    }

    #[test]
    fn test_drop_id() {
        let (working, output) = setup(2, 2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let reduction = MethodReduction::mean("value", "mean");
        let table = reduce_blocks(&working, output, &reduction, false).unwrap();

        assert_eq!(table.column_names(), vec!["x", "y", "mean"]);
        assert_eq!(table.num_rows(), 1);
    }

    #[test]
    fn test_all_missing_block_pruned() {
        let mut values: Vec<f64> = (1..=16).map(|v| v as f64).collect();
        for idx in [2, 3, 6, 7] {
            values[idx] = f64::NAN;
        }
        let (working, output) = setup(4, 4, 2, values);
        let reduction = MethodReduction::mean("value", "mean");
        let table = reduce_blocks(&working, output, &reduction, true).unwrap();

        assert_eq!(table.int_column("ID").unwrap(), &[1, 3, 4]);
        assert_eq!(table.float_column("mean").unwrap(), &[3.5, 11.5, 13.5]);
    }

    #[test]
    fn test_wrong_arity_is_error() {
        struct TwoValues;
        impl Reduction for TwoValues {
            fn output_columns(&self) -> Vec<String> {
                vec!["only".to_string()]
            }
            fn reduce(&self, _group: &RowGroup<'_>) -> Result<Vec<f64>> {
                Ok(vec![1.0, 2.0])
            }
        }

        let (working, output) = setup(2, 2, 1, vec![1.0; 4]);
        let err = reduce_blocks(&working, output, &TwoValues, true).unwrap_err();
        assert!(matches!(err, AggregateError::Reduction { .. }));
    }

    #[test]
    fn test_output_name_clash() {
        let (working, output) = setup(2, 2, 1, vec![1.0; 4]);
        let reduction = MethodReduction::mean("value", "x");
        let err = reduce_blocks(&working, output, &reduction, true).unwrap_err();
        assert_eq!(err, AggregateError::DuplicateColumn(vec!["x".to_string()]));
    }

    #[test]
    fn test_missing_block_does_not_shift_values() {
        let (working, output) = setup(4, 4, 2, (1..=16).map(|v| v as f64).collect());
        // Drop every source row of block (1, 2)
        let mut filtered = working.clone();
        let rows = working.int_column(BLOCK_ROW_COLUMN).unwrap().to_vec();
        let cols = working.int_column(BLOCK_COL_COLUMN).unwrap().to_vec();
        filtered.retain_rows(|r| !(rows[r] == 1 && cols[r] == 2)).unwrap();

        let reduction = FnReduction::new("mean", |g| {
            Ok(crate::reduction::mean(&g.values("value")?))
        });
        let table = reduce_blocks(&filtered, output, &reduction, true).unwrap();

        assert_eq!(table.int_column("ID").unwrap(), &[1, 3, 4]);
        assert_eq!(table.float_column("mean").unwrap(), &[3.5, 11.5, 13.5]);
    }
}
