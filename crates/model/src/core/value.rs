use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Driver-neutral cell value passed between the source reader and the
/// target writer. LOB columns are always fully materialized into the
/// `Text`/`Bytes` variants before a row leaves the source adapter; locator
/// handles never cross this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Decimal(v) => v.parse::<f64>().ok().map(|f| f as i64),
            Value::Text(v) => v.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Byte footprint estimate used for batch sizing diagnostics.
    pub fn size_bytes(&self) -> usize {
        match self {
            Value::Int(_) => 8,
            Value::Float(_) => 8,
            Value::Decimal(v) => v.len(),
            Value::Text(v) => v.len(),
            Value::Bytes(v) => v.len(),
            Value::Boolean(_) => 1,
            Value::Date(_) => 4,
            Value::Timestamp(_) => 8,
            Value::Null => 0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => f.write_str(v),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::Null => f.write_str("NULL"),
        }
    }
}

/// A single fetched row: ordered column names and their values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowData {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl RowData {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        RowData { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|idx| &self.values[idx])
    }

    pub fn size_bytes(&self) -> usize {
        self.columns.iter().map(|c| c.len()).sum::<usize>()
            + self.values.iter().map(|v| v.size_bytes()).sum::<usize>()
    }
}

/// Column metadata as reported by either adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub is_identity: bool,
    pub is_lob: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_is_case_insensitive() {
        let row = RowData::new(
            vec!["EMP_ID".into(), "NAME".into()],
            vec![Value::Int(7), Value::Text("KING".into())],
        );
        assert_eq!(row.get("emp_id"), Some(&Value::Int(7)));
        assert!(row.get("missing").is_none());
    }
}
