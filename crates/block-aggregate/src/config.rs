//! Configuration for block aggregation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::AggregateRequest;
use crate::error::{AggregateError, Result};
use crate::reduction::{MethodReduction, Reduction, ReductionMethod, WeightedMean};

/// Configuration for an aggregation run with a built-in reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Source cells per block side.
    pub fact: usize,

    /// Source cell size (square cells).
    pub cell_size: f64,

    /// Keep the `ID` column in the result.
    pub include_id: bool,

    /// Built-in reduction to apply.
    pub method: ReductionMethod,

    /// Column the reduction reads.
    pub value_column: String,

    /// Weight column, required by `weighted_mean`.
    pub weight_column: Option<String>,

    /// Name of the aggregated column in the result.
    pub output_column: String,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            fact: 2,
            cell_size: 1.0,
            include_id: true,
            method: ReductionMethod::Mean,
            value_column: "value".to_string(),
            weight_column: None,
            output_column: "value".to_string(),
        }
    }
}

impl AggregateConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("AGGREGATE_FACT") {
            if let Ok(fact) = val.parse() {
                config.fact = fact;
            }
        }

        if let Ok(val) = std::env::var("AGGREGATE_CELL_SIZE") {
            if let Ok(size) = val.parse() {
                config.cell_size = size;
            }
        }

        if let Ok(val) = std::env::var("AGGREGATE_INCLUDE_ID") {
            config.include_id = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("AGGREGATE_METHOD") {
            match val.parse() {
                Ok(method) => config.method = method,
                Err(e) => warn!(error = %e, default = %config.method, "Ignoring AGGREGATE_METHOD"),
            }
        }

        if let Ok(val) = std::env::var("AGGREGATE_VALUE_COLUMN") {
            config.value_column = val;
        }

        if let Ok(val) = std::env::var("AGGREGATE_WEIGHT_COLUMN") {
            config.weight_column = Some(val);
        }

        if let Ok(val) = std::env::var("AGGREGATE_OUTPUT_COLUMN") {
            config.output_column = val;
        }

        config
    }

    /// Parse configuration from a YAML document. Missing keys take defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.fact == 0 {
            return Err("fact must be > 0".to_string());
        }

        if !(self.cell_size > 0.0) || !self.cell_size.is_finite() {
            return Err("cell_size must be a positive number".to_string());
        }

        if self.value_column.is_empty() || self.output_column.is_empty() {
            return Err("value_column and output_column must not be empty".to_string());
        }

        if self.method.needs_weights() && self.weight_column.is_none() {
            return Err("weighted_mean requires weight_column".to_string());
        }

        Ok(())
    }

    /// Build a request for an `nrows x ncols` source grid.
    pub fn request(&self, nrows: usize, ncols: usize) -> AggregateRequest {
        AggregateRequest::new(nrows, ncols, self.fact, self.cell_size)
            .with_include_id(self.include_id)
    }

    /// Build the configured reduction.
    pub fn reduction(&self) -> Result<Box<dyn Reduction>> {
        self.validate().map_err(AggregateError::config)?;

        let reduction: Box<dyn Reduction> = match (self.method, &self.weight_column) {
            (ReductionMethod::WeightedMean, Some(weight)) => Box::new(WeightedMean::new(
                self.value_column.as_str(),
                weight.as_str(),
                self.output_column.as_str(),
            )),
            (method, _) => Box::new(MethodReduction::new(
                method,
                self.value_column.as_str(),
                self.output_column.as_str(),
            )?),
        };
        Ok(reduction)
    }
}
