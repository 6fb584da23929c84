use model::core::value::Value;
use oracle::sql_type::OracleType;
use oracle::Row;
use tracing::debug;

/// Reads one cell into a driver-neutral value, materializing LOBs on the
/// spot. CLOB/NCLOB/LONG come back as owned strings, BLOB/RAW as owned byte
/// vectors; locator handles never leave this function.
pub fn read_cell(row: &Row, idx: usize, column_type: &OracleType) -> Result<Value, oracle::Error> {
    let value = match column_type {
        OracleType::Varchar2(_)
        | OracleType::NVarchar2(_)
        | OracleType::Char(_)
        | OracleType::NChar(_)
        | OracleType::Long
        | OracleType::CLOB
        | OracleType::NCLOB
        | OracleType::Rowid => row
            .get::<_, Option<String>>(idx)?
            .map(Value::Text)
            .unwrap_or(Value::Null),

        OracleType::Number(_, scale) if *scale == 0 => match row.get::<_, Option<i64>>(idx) {
            Ok(v) => v.map(Value::Int).unwrap_or(Value::Null),
            // NUMBER(38) ids can overflow i64; fall back to the textual form.
            Err(_) => row
                .get::<_, Option<String>>(idx)?
                .map(Value::Decimal)
                .unwrap_or(Value::Null),
        },
        OracleType::Number(_, _) | OracleType::Float(_) => row
            .get::<_, Option<String>>(idx)?
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        OracleType::Int64 => row
            .get::<_, Option<i64>>(idx)?
            .map(Value::Int)
            .unwrap_or(Value::Null),
        OracleType::UInt64 => row
            .get::<_, Option<u64>>(idx)?
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),
        OracleType::BinaryFloat | OracleType::BinaryDouble => row
            .get::<_, Option<f64>>(idx)?
            .map(Value::Float)
            .unwrap_or(Value::Null),

        OracleType::Date
        | OracleType::Timestamp(_)
        | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => row
            .get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),

        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => row
            .get::<_, Option<Vec<u8>>>(idx)?
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        OracleType::Boolean => row
            .get::<_, Option<bool>>(idx)?
            .map(Value::Boolean)
            .unwrap_or(Value::Null),

        other => {
            debug!(column_type = %other, "unmapped Oracle type read as text");
            row.get::<_, Option<String>>(idx)
                .unwrap_or(None)
                .map(Value::Text)
                .unwrap_or(Value::Null)
        }
    };
    Ok(value)
}

/// True for types whose values are large objects needing materialization.
pub fn is_lob_type(data_type: &str) -> bool {
    matches!(
        data_type.to_uppercase().as_str(),
        "CLOB" | "NCLOB" | "BLOB" | "BFILE" | "LONG" | "LONG RAW"
    )
}
