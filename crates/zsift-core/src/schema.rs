//! Column schema inference for heterogeneous JSON records.
//!
//! Matched records from one dump file rarely share an exact shape. Columns
//! are the union of keys in first-seen order; a column keeps a typed Arrow
//! representation only when every observed value agrees, otherwise it is
//! stringified. Fields configured as problematic are forced to strings up
//! front so mixed-type columns never reach the writers.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, RecordBatch, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::criterion::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int,
    Float,
    Text,
}

impl ColumnKind {
    fn data_type(self) -> DataType {
        match self {
            Self::Bool => DataType::Boolean,
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Text => DataType::Utf8,
        }
    }
}

/// Build Arrow batches of at most `batch_size` rows from matched records.
pub fn records_to_batches(
    records: &[Record],
    force_text: &[String],
    batch_size: usize,
) -> Result<(Arc<Schema>, Vec<RecordBatch>), ArrowError> {
    let columns = column_order(records);
    let kinds: Vec<ColumnKind> = columns
        .iter()
        .map(|col| infer_kind(records, col, force_text))
        .collect();
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .zip(&kinds)
            .map(|(col, kind)| Field::new(col, kind.data_type(), true))
            .collect::<Vec<_>>(),
    ));

    let mut batches = Vec::new();
    for chunk in records.chunks(batch_size.max(1)) {
        let arrays: Vec<ArrayRef> = columns
            .iter()
            .zip(&kinds)
            .map(|(col, kind)| build_column(chunk, col, *kind))
            .collect();
        batches.push(RecordBatch::try_new(schema.clone(), arrays)?);
    }
    Ok((schema, batches))
}

/// Union of record keys in first-seen order.
fn column_order(records: &[Record]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut columns = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.clone()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn infer_kind(records: &[Record], column: &str, force_text: &[String]) -> ColumnKind {
    if force_text.iter().any(|f| f == column) {
        return ColumnKind::Text;
    }
    let mut kind: Option<ColumnKind> = None;
    for record in records {
        let value = match record.get(column) {
            None | Some(Value::Null) => continue,
            Some(v) => v,
        };
        let observed = match value {
            Value::Bool(_) => ColumnKind::Bool,
            Value::Number(n) if n.is_i64() => ColumnKind::Int,
            Value::Number(_) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        };
        kind = Some(match (kind, observed) {
            (None, k) => k,
            (Some(k), o) if k == o => k,
            (Some(ColumnKind::Int), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Int) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn build_column(records: &[Record], column: &str, kind: ColumnKind) -> ArrayRef {
    match kind {
        ColumnKind::Bool => {
            let mut builder = BooleanBuilder::with_capacity(records.len());
            for record in records {
                match record.get(column) {
                    Some(Value::Bool(v)) => builder.append_value(*v),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Int => {
            let mut builder = Int64Builder::with_capacity(records.len());
            for record in records {
                match record.get(column).and_then(Value::as_i64) {
                    Some(v) => builder.append_value(v),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Float => {
            let mut builder = Float64Builder::with_capacity(records.len());
            for record in records {
                match record.get(column).and_then(Value::as_f64) {
                    Some(v) => builder.append_value(v),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Text => {
            let mut builder = StringBuilder::new();
            for record in records {
                match record.get(column) {
                    None | Some(Value::Null) => builder.append_null(),
                    Some(Value::String(s)) => builder.append_value(s),
                    // Nested or mixed values serialize as compact JSON text.
                    Some(other) => builder.append_value(other.to_string()),
                }
            }
            Arc::new(builder.finish())
        }
    }
}
