//! Named-column coordinate tables backed by an arrow [`RecordBatch`].
//!
//! Cells carry `Float64` attributes (NaN marks a missing value) or `Int64`
//! integer keys. Arrays are built without validity bitmaps, so nulls never
//! appear. Sorting, row selection and filtering run through the arrow
//! compute kernels.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, UInt64Array};
use arrow::compute::{self, SortColumn, SortOptions};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{TableError, TableResult};

/// A named arrow column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub array: ArrayRef,
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.array.as_ref() == other.array.as_ref()
    }
}

impl Column {
    /// Create a `Float64` column.
    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            array: Arc::new(Float64Array::from(values)),
        }
    }

    /// Create an `Int64` column.
    pub fn int(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            array: Arc::new(Int64Array::from(values)),
        }
    }

    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Check if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    fn field(&self) -> FieldRef {
        Arc::new(Field::new(&self.name, self.array.data_type().clone(), false))
    }
}

/// Rows sharing one grouping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Key values, in the order the key columns were requested.
    pub key: Vec<i64>,
    /// Member row indices in table order.
    pub rows: Vec<usize>,
}

/// A table of equally sized named columns.
///
/// Duplicate names are representable; lookups by name resolve to the
/// first matching column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    batch: RecordBatch,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Create an empty table with no columns.
    pub fn new() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    /// Wrap an existing record batch.
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Build a table, rejecting duplicate names and ragged columns.
    pub fn from_columns(columns: Vec<Column>) -> TableResult<Self> {
        let table = Self::from_columns_unchecked(columns)?;
        if let Some(name) = table.duplicate_names().into_iter().next() {
            return Err(TableError::DuplicateColumn(name));
        }
        Ok(table)
    }

    /// Build a table that may contain duplicate column names.
    ///
    /// Column lengths are still checked. Callers that accept such tables
    /// must check [`Table::duplicate_names`] themselves.
    pub fn from_columns_unchecked(columns: Vec<Column>) -> TableResult<Self> {
        let num_rows = columns.first().map(Column::len).unwrap_or(0);
        for column in &columns {
            if column.len() != num_rows {
                return Err(TableError::LengthMismatch {
                    column: column.name.clone(),
                    expected: num_rows,
                    actual: column.len(),
                });
            }
        }
        let fields = columns.iter().map(Column::field).collect();
        let arrays = columns.into_iter().map(|c| c.array).collect();
        Ok(Self {
            batch: build_batch(fields, arrays, num_rows)?,
        })
    }

    /// The underlying record batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Check whether a column with this exact name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Names that appear more than once, each reported once, in first-seen order.
    pub fn duplicate_names(&self) -> Vec<String> {
        let names = self.column_names();
        let mut dups: Vec<String> = Vec::new();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) && !dups.iter().any(|d| d == name) {
                dups.push(name.to_string());
            }
        }
        dups
    }

    /// Look up a column's array by name.
    pub fn column(&self, name: &str) -> TableResult<&ArrayRef> {
        self.position(name)
            .map(|idx| self.batch.column(idx))
            .ok_or_else(|| TableError::column_not_found(name))
    }

    /// Borrow a `Float64` column's values.
    pub fn float_column(&self, name: &str) -> TableResult<&[f64]> {
        let array = self
            .column(name)?
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| TableError::type_mismatch(name, "float"))?;
        let values: &[f64] = array.values();
        Ok(values)
    }

    /// Borrow an `Int64` column's values.
    pub fn int_column(&self, name: &str) -> TableResult<&[i64]> {
        let array = self
            .column(name)?
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| TableError::type_mismatch(name, "int"))?;
        let values: &[i64] = array.values();
        Ok(values)
    }

    /// Values of a numeric column at the given rows, widened to `f64`.
    pub fn gather_f64(&self, name: &str, rows: &[usize]) -> TableResult<Vec<f64>> {
        let taken = compute::take(self.column(name)?.as_ref(), &row_indices(rows), None)?;
        let widened = compute::cast(taken.as_ref(), &DataType::Float64)
            .map_err(|_| TableError::type_mismatch(name, "numeric"))?;
        let array = widened
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| TableError::type_mismatch(name, "numeric"))?;
        Ok(array.values().to_vec())
    }

    /// Append a column.
    ///
    /// The first column added to a column-less table fixes the row count.
    pub fn add_column(&mut self, column: Column) -> TableResult<()> {
        if self.has_column(&column.name) {
            return Err(TableError::DuplicateColumn(column.name));
        }
        let num_rows = if self.num_columns() == 0 {
            column.len()
        } else {
            self.num_rows()
        };
        let actual = column.len();
        if actual != num_rows {
            return Err(TableError::LengthMismatch {
                column: column.name,
                expected: num_rows,
                actual,
            });
        }

        let mut fields = self.fields();
        let mut arrays = self.batch.columns().to_vec();
        fields.push(column.field());
        arrays.push(column.array);
        self.batch = build_batch(fields, arrays, num_rows)?;
        Ok(())
    }

    /// Remove a column by name and return it.
    pub fn remove_column(&mut self, name: &str) -> TableResult<Column> {
        let idx = self
            .position(name)
            .ok_or_else(|| TableError::column_not_found(name))?;

        let mut fields = self.fields();
        let mut arrays = self.batch.columns().to_vec();
        fields.remove(idx);
        let array = arrays.remove(idx);
        self.batch = build_batch(fields, arrays, self.num_rows())?;
        Ok(Column {
            name: name.to_string(),
            array,
        })
    }

    /// New table holding the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> TableResult<Self> {
        let indices = row_indices(rows);
        let arrays = self
            .batch
            .columns()
            .iter()
            .map(|col| compute::take(col.as_ref(), &indices, None))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            batch: build_batch(self.fields(), arrays, rows.len())?,
        })
    }

    /// Keep only rows for which `keep` returns true.
    pub fn retain_rows<F>(&mut self, keep: F) -> TableResult<()>
    where
        F: Fn(usize) -> bool,
    {
        let mask: BooleanArray = (0..self.num_rows()).map(|r| Some(keep(r))).collect();
        self.batch = compute::filter_record_batch(&self.batch, &mask)?;
        Ok(())
    }

    /// Stable sort by ascending integer key columns.
    pub fn sort_by_int_keys(&mut self, keys: &[&str]) -> TableResult<()> {
        let order = self.sorted_order(keys)?;
        *self = self.take(&order)?;
        Ok(())
    }

    /// Group rows on integer key columns.
    ///
    /// Groups come back in ascending key order; rows within a group keep
    /// their table order.
    pub fn group_by(&self, keys: &[&str]) -> TableResult<Vec<Group>> {
        let key_cols: Vec<&[i64]> = keys
            .iter()
            .map(|k| self.int_column(k))
            .collect::<TableResult<_>>()?;
        let order = self.sorted_order(keys)?;

        let mut groups: Vec<Group> = Vec::new();
        for row in order {
            let key: Vec<i64> = key_cols.iter().map(|col| col[row]).collect();
            match groups.last_mut() {
                Some(group) if group.key == key => group.rows.push(row),
                _ => groups.push(Group {
                    key,
                    rows: vec![row],
                }),
            }
        }
        Ok(groups)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .position(|f| f.name() == name)
    }

    fn fields(&self) -> Vec<FieldRef> {
        self.batch.schema_ref().fields().iter().cloned().collect()
    }

    /// Row order sorting ascending on `keys`, ties broken by row position.
    fn sorted_order(&self, keys: &[&str]) -> TableResult<Vec<usize>> {
        let options = Some(SortOptions {
            descending: false,
            nulls_first: false,
        });
        let mut sort_columns = Vec::with_capacity(keys.len() + 1);
        for key in keys {
            self.int_column(key)?;
            sort_columns.push(SortColumn {
                values: self.column(key)?.clone(),
                options,
            });
        }
        let position: ArrayRef = Arc::new(UInt64Array::from_iter_values(
            0..self.num_rows() as u64,
        ));
        sort_columns.push(SortColumn {
            values: position,
            options,
        });
        let indices = compute::lexsort_to_indices(&sort_columns, None)?;
        Ok(indices.values().iter().map(|&i| i as usize).collect())
    }
}

fn row_indices(rows: &[usize]) -> UInt64Array {
    UInt64Array::from_iter_values(rows.iter().map(|&r| r as u64))
}

fn build_batch(
    fields: Vec<FieldRef>,
    arrays: Vec<ArrayRef>,
    num_rows: usize,
) -> TableResult<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        arrays,
        &options,
    )?)
}
