use model::core::value::Value;

/// Renders a value as a T-SQL literal for generated INSERT statements.
/// Strings are N-prefixed with doubled quotes; binary becomes 0x hex;
/// temporal values use the ISO forms SQL Server parses unambiguously.
pub fn encode_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => {
            if v.is_finite() {
                format!("{v}")
            } else {
                "NULL".to_string()
            }
        }
        Value::Decimal(v) => {
            // A decimal arrives as the source's textual rendering; reject
            // anything that could escape the literal position.
            if v.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')) {
                v.clone()
            } else {
                format!("N'{}'", escape(v))
            }
        }
        Value::Text(v) => format!("N'{}'", escape(v)),
        Value::Bytes(v) => {
            if v.is_empty() {
                "0x".to_string()
            } else {
                let mut out = String::with_capacity(2 + v.len() * 2);
                out.push_str("0x");
                for byte in v {
                    out.push_str(&format!("{byte:02X}"));
                }
                out
            }
        }
        Value::Boolean(v) => if *v { "1" } else { "0" }.to_string(),
        Value::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        Value::Timestamp(v) => format!("'{}'", v.format("%Y-%m-%dT%H:%M:%S%.3f")),
    }
}

fn escape(text: &str) -> String {
    text.replace('\'', "''")
}

/// Renders a multi-row `INSERT INTO ... VALUES ...` statement for one batch.
pub fn render_insert(qualified_table: &str, columns: &[String], rows: &[model::core::value::RowData]) -> String {
    let column_list = columns
        .iter()
        .map(|c| format!("[{c}]"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let rendered = columns
            .iter()
            .map(|column| {
                row.get(column)
                    .map(encode_literal)
                    .unwrap_or_else(|| "NULL".to_string())
            })
            .collect::<Vec<_>>()
            .join(", ");
        tuples.push(format!("({rendered})"));
    }

    format!(
        "INSERT INTO {qualified_table} ({column_list}) VALUES {}",
        tuples.join(",\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use model::core::value::RowData;

    #[test]
    fn strings_are_escaped_and_n_prefixed() {
        assert_eq!(encode_literal(&Value::Text("O'Brien".into())), "N'O''Brien'");
    }

    #[test]
    fn bytes_become_hex() {
        assert_eq!(encode_literal(&Value::Bytes(vec![0xDE, 0xAD])), "0xDEAD");
        assert_eq!(encode_literal(&Value::Bytes(vec![])), "0x");
    }

    #[test]
    fn temporal_literals_are_iso() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(encode_literal(&Value::Date(date)), "'2024-03-09'");
        let ts: NaiveDateTime = date.and_hms_milli_opt(13, 5, 0, 250).unwrap();
        assert_eq!(
            encode_literal(&Value::Timestamp(ts)),
            "'2024-03-09T13:05:00.250'"
        );
    }

    #[test]
    fn insert_statement_orders_columns_per_request() {
        let rows = vec![RowData::new(
            vec!["ID".into(), "NAME".into()],
            vec![Value::Int(1), Value::Text("x".into())],
        )];
        let sql = render_insert(
            "[dbo].[T]",
            &["NAME".to_string(), "ID".to_string()],
            &rows,
        );
        assert_eq!(sql, "INSERT INTO [dbo].[T] ([NAME], [ID]) VALUES (N'x', 1)");
    }
}
