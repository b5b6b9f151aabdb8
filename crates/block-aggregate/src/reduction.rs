//! Reductions evaluated once per aggregation block.
//!
//! A [`Reduction`] receives a [`RowGroup`] holding every source row of one
//! block and returns one scalar per declared output column. Built-in
//! reductions cover the common cases; [`FnReduction`] wraps a caller
//! closure for anything else.
//!
//! Built-ins other than `Nearest` skip NaN inputs and return NaN when a
//! block has no valid input, which later prunes that block from the
//! output. `Nearest` returns the block's top-left value as stored, NaN
//! included.

use std::str::FromStr;

use raster_common::Table;
use serde::{Deserialize, Serialize};

use crate::error::{AggregateError, Result};
use crate::indexer::{BlockKey, BLOCK_COL_COLUMN, BLOCK_ROW_COLUMN};

/// The source rows belonging to one block.
#[derive(Debug, Clone, Copy)]
pub struct RowGroup<'a> {
    key: BlockKey,
    table: &'a Table,
    rows: &'a [usize],
}

impl<'a> RowGroup<'a> {
    /// Create a group over `rows` of `table`.
    pub fn new(key: BlockKey, table: &'a Table, rows: &'a [usize]) -> Self {
        Self { key, table, rows }
    }

    /// Block this group belongs to.
    pub fn key(&self) -> BlockKey {
        self.key
    }

    /// Number of member rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the group has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Member row indices into the working table.
    pub fn rows(&self) -> &[usize] {
        self.rows
    }

    /// Values of `column` for the member rows, widened to `f64`.
    ///
    /// An unknown column is a reduction error for this block. The block
    /// key columns are not part of the source and cannot be read.
    pub fn values(&self, column: &str) -> Result<Vec<f64>> {
        if column == BLOCK_ROW_COLUMN || column == BLOCK_COL_COLUMN {
            return Err(self.error(format!("Column not found: {}", column)));
        }
        self.table
            .gather_f64(column, self.rows)
            .map_err(|e| self.error(e.to_string()))
    }

    /// Build a reduction error tagged with this group's block.
    pub fn error(&self, message: impl Into<String>) -> AggregateError {
        AggregateError::reduction(self.key.row, self.key.col, message)
    }
}

/// A per-block reduction producing one value per output column.
pub trait Reduction {
    /// Names of the output columns, in the order `reduce` returns them.
    fn output_columns(&self) -> Vec<String>;

    /// Reduce one block. Must return exactly one value per output column.
    fn reduce(&self, group: &RowGroup<'_>) -> Result<Vec<f64>>;
}

impl<R: Reduction + ?Sized> Reduction for Box<R> {
    fn output_columns(&self) -> Vec<String> {
        (**self).output_columns()
    }

    fn reduce(&self, group: &RowGroup<'_>) -> Result<Vec<f64>> {
        (**self).reduce(group)
    }
}

/// Built-in single-column reduction methods.
///
/// - **Mean**: continuous fields (temperature, humidity, pressure)
/// - **Max**: peak fields (reflectivity, precipitation rate)
/// - **Nearest**: categorical fields, takes the block's top-left cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReductionMethod {
    /// Mean of valid values
    #[default]
    Mean,
    /// Mean weighted by a second column
    WeightedMean,
    /// Sum of valid values
    Sum,
    /// Minimum of valid values
    Min,
    /// Maximum of valid values
    Max,
    /// Number of valid values
    Count,
    /// Top-left cell of the block
    Nearest,
}

impl ReductionMethod {
    /// Get the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::WeightedMean => "weighted_mean",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::Nearest => "nearest",
        }
    }

    /// Check if the method reads a weight column besides the values.
    pub fn needs_weights(&self) -> bool {
        matches!(self, Self::WeightedMean)
    }

    /// Apply a single-column method to a block's values.
    ///
    /// Returns `None` for `WeightedMean`, which needs weights.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        match self {
            Self::Mean => Some(mean(values)),
            Self::WeightedMean => None,
            Self::Sum => Some(sum(values)),
            Self::Min => Some(min(values)),
            Self::Max => Some(max(values)),
            Self::Count => Some(count(values) as f64),
            Self::Nearest => Some(values.first().copied().unwrap_or(f64::NAN)),
        }
    }
}

impl FromStr for ReductionMethod {
    type Err = String;

    /// Parse a method name, case-insensitive.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" | "avg" => Ok(Self::Mean),
            "weighted_mean" | "wmean" => Ok(Self::WeightedMean),
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "count" => Ok(Self::Count),
            "nearest" | "first" => Ok(Self::Nearest),
            other => Err(format!("unknown reduction method: {}", other)),
        }
    }
}

impl std::fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Number of non-NaN values.
#[inline]
pub fn count(values: &[f64]) -> usize {
    values.iter().filter(|v| !v.is_nan()).count()
}

/// Mean of non-NaN values, NaN if there are none.
pub fn mean(values: &[f64]) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for &v in values {
        if !v.is_nan() {
            total += v;
            n += 1;
        }
    }
    if n == 0 {
        f64::NAN
    } else {
        total / n as f64
    }
}

/// Sum of non-NaN values, NaN if there are none.
pub fn sum(values: &[f64]) -> f64 {
    if count(values) == 0 {
        return f64::NAN;
    }
    values.iter().filter(|v| !v.is_nan()).sum()
}

/// Minimum of non-NaN values, NaN if there are none.
pub fn min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .unwrap_or(f64::NAN)
}

/// Maximum of non-NaN values, NaN if there are none.
pub fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or(f64::NAN)
}

/// `sum(v * w) / sum(w)` over pairs where both are valid.
///
/// NaN when no pair is valid or the weights sum to zero.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (&v, &w) in values.iter().zip(weights) {
        if v.is_nan() || w.is_nan() {
            continue;
        }
        num += v * w;
        den += w;
    }
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// A built-in reduction over one value column.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodReduction {
    method: ReductionMethod,
    value: String,
    output: String,
}

impl MethodReduction {
    /// Create a reduction for a single-column method.
    ///
    /// `WeightedMean` is rejected; use [`WeightedMean`] instead.
    pub fn new(
        method: ReductionMethod,
        value: impl Into<String>,
        output: impl Into<String>,
    ) -> Result<Self> {
        if method.needs_weights() {
            return Err(AggregateError::invalid_argument(
                "weighted_mean needs a weight column, use WeightedMean",
            ));
        }
        Ok(Self::unchecked(method, value, output))
    }

    pub fn mean(value: impl Into<String>, output: impl Into<String>) -> Self {
        Self::unchecked(ReductionMethod::Mean, value, output)
    }

    pub fn max(value: impl Into<String>, output: impl Into<String>) -> Self {
        Self::unchecked(ReductionMethod::Max, value, output)
    }

    fn unchecked(
        method: ReductionMethod,
        value: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            method,
            value: value.into(),
            output: output.into(),
        }
    }

    pub fn method(&self) -> ReductionMethod {
        self.method
    }
}

impl Reduction for MethodReduction {
    fn output_columns(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    fn reduce(&self, group: &RowGroup<'_>) -> Result<Vec<f64>> {
        let values = group.values(&self.value)?;
        let reduced = self
            .method
            .apply(&values)
            .ok_or_else(|| group.error(format!("{} needs a weight column", self.method)))?;
        Ok(vec![reduced])
    }
}

/// Weighted mean of a value column.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedMean {
    value: String,
    weight: String,
    output: String,
}

impl WeightedMean {
    pub fn new(
        value: impl Into<String>,
        weight: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            weight: weight.into(),
            output: output.into(),
        }
    }
}

impl Reduction for WeightedMean {
    fn output_columns(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    fn reduce(&self, group: &RowGroup<'_>) -> Result<Vec<f64>> {
        let values = group.values(&self.value)?;
        let weights = group.values(&self.weight)?;
        Ok(vec![weighted_mean(&values, &weights)])
    }
}

/// A caller-supplied closure producing one output column.
pub struct FnReduction<F> {
    output: String,
    f: F,
}

impl<F> FnReduction<F>
where
    F: Fn(&RowGroup<'_>) -> Result<f64>,
{
    pub fn new(output: impl Into<String>, f: F) -> Self {
        Self {
            output: output.into(),
            f,
        }
    }
}

impl<F> Reduction for FnReduction<F>
where
    F: Fn(&RowGroup<'_>) -> Result<f64>,
{
    fn output_columns(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    fn reduce(&self, group: &RowGroup<'_>) -> Result<Vec<f64>> {
        Ok(vec![(self.f)(group)?])
    }
}

/// Several reductions evaluated together, outputs concatenated in order.
#[derive(Default)]
pub struct MultiReduction {
    parts: Vec<Box<dyn Reduction>>,
}

impl MultiReduction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reduction.
    pub fn with<R: Reduction + 'static>(mut self, reduction: R) -> Self {
        self.parts.push(Box::new(reduction));
        self
    }
}

impl Reduction for MultiReduction {
    fn output_columns(&self) -> Vec<String> {
        self.parts.iter().flat_map(|r| r.output_columns()).collect()
    }

    fn reduce(&self, group: &RowGroup<'_>) -> Result<Vec<f64>> {
        let mut out = Vec::new();
        for part in &self.parts {
            let expected = part.output_columns().len();
            let values = part.reduce(group)?;
            if values.len() != expected {
                return Err(group.error(format!(
                    "reduction returned {} values for {} output columns",
                    values.len(),
                    expected
                )));
            }
            out.extend(values);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::Column;

    fn block_table() -> Table {
        Table::from_columns(vec![
            Column::float("value", vec![1.0, 2.0, 5.0, 6.0]),
            Column::float("weight", vec![1.0, 2.0, 5.0, 6.0]),
            Column::int("class", vec![3, 1, 1, 2]),
        ])
        .unwrap()
    }

    const ALL: [usize; 4] = [0, 1, 2, 3];

    #[test]
    fn test_nan_aware_helpers() {
        let values = [1.0, f64::NAN, 3.0, 4.0];
        assert!((mean(&values) - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(sum(&values), 8.0);
        assert_eq!(min(&values), 1.0);
        assert_eq!(max(&values), 4.0);
        assert_eq!(count(&values), 3);

        let missing = [f64::NAN, f64::NAN];
        assert!(mean(&missing).is_nan());
        assert!(sum(&missing).is_nan());
        assert!(min(&missing).is_nan());
        assert!(max(&missing).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_weighted_mean() {
        let v = [1.0, 2.0, 5.0, 6.0];
        assert!((weighted_mean(&v, &v) - 66.0 / 14.0).abs() < 1e-12);
        assert!(weighted_mean(&v, &[f64::NAN; 4]).is_nan());
        assert!(weighted_mean(&v, &[0.0; 4]).is_nan());
    }

    #[test]
    fn test_method_reduction() {
        let table = block_table();
        let group = RowGroup::new(BlockKey::new(1, 1), &table, &ALL);

        let mean = MethodReduction::mean("value", "out").reduce(&group).unwrap();
        assert_eq!(mean, vec![3.5]);

        let nearest = MethodReduction::new(ReductionMethod::Nearest, "value", "out")
            .unwrap()
            .reduce(&group)
            .unwrap();
        assert_eq!(nearest, vec![1.0]);

        let class_max = MethodReduction::max("class", "out").reduce(&group).unwrap();
        assert_eq!(class_max, vec![3.0]);
    }

    #[test]
    fn test_nearest_keeps_missing_top_left() {
        let table = Table::from_columns(vec![Column::float("value", vec![f64::NAN, 2.0])]).unwrap();
        let group = RowGroup::new(BlockKey::new(1, 1), &table, &[0, 1]);
        let nearest = MethodReduction::new(ReductionMethod::Nearest, "value", "out")
            .unwrap()
            .reduce(&group)
            .unwrap();
        assert!(nearest[0].is_nan());
    }

    #[test]
    fn test_weighted_method_needs_weights() {
        let err = MethodReduction::new(ReductionMethod::WeightedMean, "value", "out").unwrap_err();
        assert!(matches!(err, AggregateError::InvalidArgument(_)));
        assert_eq!(ReductionMethod::WeightedMean.apply(&[1.0, 2.0]), None);
        assert!(ReductionMethod::WeightedMean.needs_weights());
        assert!(!ReductionMethod::Mean.needs_weights());
    }

    #[test]
    fn test_block_key_columns_not_readable() {
        let mut table = block_table();
        table
            .add_column(Column::int(BLOCK_ROW_COLUMN, vec![1, 1, 1, 1]))
            .unwrap();
        let group = RowGroup::new(BlockKey::new(1, 1), &table, &ALL);

        for column in [BLOCK_ROW_COLUMN, BLOCK_COL_COLUMN] {
            let err = group.values(column).unwrap_err();
            assert!(matches!(
                err,
                AggregateError::Reduction {
                    block_row: 1,
                    block_col: 1,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_missing_column_is_reduction_error() {
        let table = block_table();
        let group = RowGroup::new(BlockKey::new(2, 3), &table, &ALL);
        let err = MethodReduction::mean("nope", "out").reduce(&group).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::Reduction {
                block_row: 2,
                block_col: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_fn_and_multi_reduction() {
        let table = block_table();
        let group = RowGroup::new(BlockKey::new(1, 1), &table, &ALL[..2]);

        let multi = MultiReduction::new()
            .with(WeightedMean::new("value", "weight", "wmean"))
            .with(FnReduction::new("n", |g| Ok(g.len() as f64)));

        assert_eq!(multi.output_columns(), vec!["wmean".to_string(), "n".to_string()]);
        let out = multi.reduce(&group).unwrap();
        assert!((out[0] - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(out[1], 2.0);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("MAX".parse::<ReductionMethod>(), Ok(ReductionMethod::Max));
        assert_eq!("mean".parse::<ReductionMethod>(), Ok(ReductionMethod::Mean));
        assert_eq!(
            "weighted_mean".parse::<ReductionMethod>(),
            Ok(ReductionMethod::WeightedMean)
        );
        assert_eq!("first".parse::<ReductionMethod>(), Ok(ReductionMethod::Nearest));
        assert!("median".parse::<ReductionMethod>().is_err());
        assert_eq!(ReductionMethod::Count.to_string(), "count");
    }
}
