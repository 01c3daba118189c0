//! In-memory tabular dataset backed by an Arrow [`RecordBatch`].
//!
//! The dataset is immutable once constructed: every analysis stage reads
//! column values through this module and takes copies for derived
//! encodings. Cell access goes through [`CellValue`], a canonical scalar
//! representation that gives treatment/control matching and distinct-value
//! counting a single definition of equality across numeric, boolean, and
//! string columns.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, LargeStringArray, StringArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrialError};

/// A single non-null cell value in canonical scalar form.
///
/// Numbers are widened to `f64`, so `1`, `1i32`, and `1.0` compare equal
/// through [`CellValue::key`]. Serialized untagged so that result JSON
/// carries plain scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// A boolean value.
    Bool(bool),
    /// A numeric value widened to f64.
    Number(f64),
    /// A string value.
    Text(String),
}

impl CellValue {
    /// Returns the canonical string key for this value.
    ///
    /// Whole-number floats render without a fractional part (`1.0` -> "1"),
    /// which makes numeric and string-encoded treatment indicators
    /// comparable.
    pub fn key(&self) -> String {
        match self {
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(v) => format!("{v}"),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Attempts to interpret this value as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// An immutable tabular dataset for trial analysis.
///
/// # Example
///
/// ```rust,ignore
/// use trial_core::dataset::Dataset;
///
/// let dataset = Dataset::new(batch)?;
/// let outcome = dataset.numeric_values("outcome").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Dataset {
    batch: RecordBatch,
    schema: SchemaRef,
}

impl Dataset {
    /// Wraps a record batch, validating that it is structurally usable.
    ///
    /// A batch with zero columns is not a tabular dataset and is rejected
    /// with [`TrialError::Configuration`]. Zero rows are allowed; the
    /// analysis degrades to a failed-identification result instead.
    pub fn new(batch: RecordBatch) -> Result<Self> {
        if batch.num_columns() == 0 {
            return Err(TrialError::configuration("dataset has no columns"));
        }
        let schema = batch.schema();
        Ok(Self { batch, schema })
    }

    /// Returns the number of rows.
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Returns the number of columns.
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Returns the column names in schema order.
    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Returns the Arrow array for a column, if present.
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Returns the Arrow data type of a column, if present.
    pub fn data_type(&self, name: &str) -> Option<&DataType> {
        self.schema
            .fields()
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.data_type())
    }

    /// Whether the column holds values coercible to f64.
    ///
    /// Booleans count as numeric (0/1), matching the behavior expected of
    /// binary indicator columns.
    pub fn is_numeric(&self, name: &str) -> bool {
        matches!(
            self.data_type(name),
            Some(
                DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
                    | DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64
                    | DataType::Float32
                    | DataType::Float64
                    | DataType::Boolean
            )
        )
    }

    /// Whether the column holds integer-typed values.
    pub fn is_integer(&self, name: &str) -> bool {
        matches!(
            self.data_type(name),
            Some(
                DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
                    | DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64
            )
        )
    }

    /// Returns the cell at (column, row), or `None` when null or when the
    /// column does not exist.
    pub fn cell(&self, name: &str, row: usize) -> Option<CellValue> {
        let array = self.column(name)?;
        cell_from_array(array, row)
    }

    /// Returns every cell of a column, nulls as `None`.
    pub fn cell_values(&self, name: &str) -> Result<Vec<Option<CellValue>>> {
        let array = self
            .column(name)
            .ok_or_else(|| TrialError::ColumnNotFound {
                column: name.to_string(),
            })?;
        Ok((0..array.len()).map(|i| cell_from_array(array, i)).collect())
    }

    /// Returns a column as f64 values, or `None` when the column is not
    /// numeric-coercible. NaN entries are treated as missing.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        if !self.is_numeric(name) {
            return None;
        }
        let array = self.column(name)?;
        let values = (0..array.len())
            .map(|i| {
                cell_from_array(array, i)
                    .and_then(|c| c.as_f64())
                    .filter(|v| v.is_finite())
            })
            .collect();
        Some(values)
    }

    /// Returns the distinct non-null values of a column in first-seen order.
    pub fn distinct_non_null(&self, name: &str) -> Vec<CellValue> {
        let Some(array) = self.column(name) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        for i in 0..array.len() {
            if let Some(value) = cell_from_array(array, i) {
                if seen.insert(value.key()) {
                    distinct.push(value);
                }
            }
        }
        distinct
    }

    /// Number of null (or unsupported-type) entries in a column.
    pub fn null_count(&self, name: &str) -> usize {
        match self.column(name) {
            Some(array) => (0..array.len())
                .filter(|&i| cell_from_array(array, i).is_none())
                .count(),
            None => 0,
        }
    }

    /// Consumes the dataset, returning the underlying batch.
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }
}

impl TryFrom<RecordBatch> for Dataset {
    type Error = TrialError;

    fn try_from(batch: RecordBatch) -> Result<Self> {
        Dataset::new(batch)
    }
}

/// Extracts a canonical cell value from an Arrow array, supporting the
/// numeric type ladder plus booleans and strings.
fn cell_from_array(array: &ArrayRef, row: usize) -> Option<CellValue> {
    if row >= array.len() || array.is_null(row) {
        return None;
    }
    let any = array.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        let v = arr.value(row);
        return v.is_finite().then_some(CellValue::Number(v));
    }
    if let Some(arr) = any.downcast_ref::<Float32Array>() {
        let v = arr.value(row) as f64;
        return v.is_finite().then_some(CellValue::Number(v));
    }
    if let Some(arr) = any.downcast_ref::<Int64Array>() {
        return Some(CellValue::Number(arr.value(row) as f64));
    }
    if let Some(arr) = any.downcast_ref::<Int32Array>() {
        return Some(CellValue::Number(arr.value(row) as f64));
    }
    if let Some(arr) = any.downcast_ref::<Int16Array>() {
        return Some(CellValue::Number(arr.value(row) as f64));
    }
    if let Some(arr) = any.downcast_ref::<Int8Array>() {
        return Some(CellValue::Number(arr.value(row) as f64));
    }
    if let Some(arr) = any.downcast_ref::<UInt64Array>() {
        return Some(CellValue::Number(arr.value(row) as f64));
    }
    if let Some(arr) = any.downcast_ref::<UInt32Array>() {
        return Some(CellValue::Number(arr.value(row) as f64));
    }
    if let Some(arr) = any.downcast_ref::<UInt16Array>() {
        return Some(CellValue::Number(arr.value(row) as f64));
    }
    if let Some(arr) = any.downcast_ref::<UInt8Array>() {
        return Some(CellValue::Number(arr.value(row) as f64));
    }
    if let Some(arr) = any.downcast_ref::<BooleanArray>() {
        return Some(CellValue::Bool(arr.value(row)));
    }
    if let Some(arr) = any.downcast_ref::<StringArray>() {
        return Some(CellValue::Text(arr.value(row).to_string()));
    }
    if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        return Some(CellValue::Text(arr.value(row).to_string()));
    }
    None
}

/// Convenience constructor for building a dataset from named arrays.
pub fn dataset_from_columns(columns: Vec<(&str, ArrayRef)>) -> Result<Dataset> {
    use arrow::datatypes::{Field, Schema};

    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, array)| array).collect();
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Dataset::new(batch)
}
