//! Record codec: open column/value mappings to positional SQL parameters and back.
//!
//! Nothing here knows about a fixed schema. Column names go into the statement
//! as given; an unknown column surfaces as a SQLite error when executed.

use adjunct_core::sync::{ColumnType, MirroredTable, Record};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Row;
use serde_json::Value;

pub(crate) fn quote_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

/// Columns, placeholders and values of one record, kept in lock-step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedRecord {
    pub columns: Vec<String>,
    pub placeholders: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl EncodedRecord {
    pub fn from_record(record: &Record) -> Self {
        let mut encoded = Self::default();
        for (column, value) in record {
            encoded.push(column, json_to_sql(value));
        }
        encoded
    }

    pub fn push(&mut self, column: &str, value: SqlValue) {
        self.columns.push(column.to_string());
        self.placeholders.push(format!("?{}", self.values.len() + 1));
        self.values.push(value);
    }

    /// Binds `column` to its current value in the row keyed by `key`, so a
    /// replace keeps it. NULL when no such row exists.
    pub fn push_carried(
        &mut self,
        column: &str,
        table_name: &str,
        key_column: &str,
        key: SqlValue,
    ) {
        self.columns.push(column.to_string());
        self.placeholders.push(format!(
            "(SELECT {} FROM {} WHERE {} = ?{})",
            quote_identifier(column),
            quote_identifier(table_name),
            quote_identifier(key_column),
            self.values.len() + 1
        ));
        self.values.push(key);
    }

    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn placeholder_list(&self) -> String {
        self.placeholders.join(", ")
    }

    /// `INSERT OR REPLACE`: the row is replaced wholesale, including on
    /// conflicts with secondary unique columns.
    pub fn replace_sql(&self, table_name: &str) -> String {
        format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote_identifier(table_name),
            self.column_list(),
            self.placeholder_list()
        )
    }
}

pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Value::Number(v) => {
            if let Some(i) = v.as_i64() {
                SqlValue::Integer(i)
            } else if v.is_u64() {
                // Beyond INTEGER range; text keeps every digit.
                SqlValue::Text(v.to_string())
            } else if let Some(f) = v.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(v.to_string())
            }
        }
        Value::String(v) => SqlValue::Text(v.clone()),
        // Nested values are not scalar; keep them as JSON text.
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Decodes one stored value. Boolean columns come back as JSON booleans.
pub fn sql_to_json(value: ValueRef<'_>, column_type: Option<ColumnType>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => match column_type {
            Some(ColumnType::Boolean) => Value::Bool(v != 0),
            _ => Value::from(v),
        },
        ValueRef::Real(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

/// Reads a row into a record, typing columns by the table descriptor when known.
pub fn read_record(
    row: &Row<'_>,
    columns: &[String],
    table: Option<MirroredTable>,
) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (idx, name) in columns.iter().enumerate() {
        let column_type = table.and_then(|t| t.column(name)).map(|c| c.column_type);
        record.insert(name.clone(), sql_to_json(row.get_ref(idx)?, column_type));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn columns_placeholders_and_values_stay_aligned() {
        let encoded = EncodedRecord::from_record(&record(json!({
            "title": "buy milk",
            "id": "t1",
            "completed": false
        })));
        assert_eq!(encoded.columns, vec!["completed", "id", "title"]);
        assert_eq!(encoded.placeholders, vec!["?1", "?2", "?3"]);
        assert_eq!(
            encoded.values,
            vec![
                SqlValue::Integer(0),
                SqlValue::Text("t1".to_string()),
                SqlValue::Text("buy milk".to_string()),
            ]
        );
    }

    #[test]
    fn replace_sql_quotes_identifiers() {
        let mut encoded = EncodedRecord::default();
        encoded.push("id", SqlValue::Text("a".to_string()));
        encoded.push("pending_sync", SqlValue::Integer(0));
        assert_eq!(
            encoded.replace_sql("todos"),
            "INSERT OR REPLACE INTO `todos` (`id`, `pending_sync`) VALUES (?1, ?2)"
        );
    }

    #[test]
    fn carried_column_reads_from_the_replaced_row() {
        let mut encoded = EncodedRecord::default();
        encoded.push("id", SqlValue::Text("t1".to_string()));
        encoded.push_carried("last_synced_at", "todos", "id", SqlValue::Text("t1".to_string()));
        assert_eq!(
            encoded.replace_sql("todos"),
            "INSERT OR REPLACE INTO `todos` (`id`, `last_synced_at`) VALUES \
             (?1, (SELECT `last_synced_at` FROM `todos` WHERE `id` = ?2))"
        );
        assert_eq!(encoded.values.len(), encoded.placeholders.len());
    }

    #[test]
    fn quote_identifier_escapes_backticks() {
        assert_eq!(quote_identifier("col`name"), "`col``name`");
    }

    #[test]
    fn scalar_conversions() {
        assert_eq!(json_to_sql(&json!(true)), SqlValue::Integer(1));
        assert_eq!(json_to_sql(&json!(2.5)), SqlValue::Real(2.5));
        assert_eq!(json_to_sql(&Value::Null), SqlValue::Null);
        assert_eq!(
            json_to_sql(&json!(u64::MAX)),
            SqlValue::Text("18446744073709551615".to_string())
        );
        assert_eq!(
            json_to_sql(&json!({"a": 1})),
            SqlValue::Text("{\"a\":1}".to_string())
        );
        assert_eq!(
            sql_to_json(ValueRef::Integer(1), Some(ColumnType::Boolean)),
            json!(true)
        );
        assert_eq!(
            sql_to_json(ValueRef::Integer(1), Some(ColumnType::Integer)),
            json!(1)
        );
        assert_eq!(sql_to_json(ValueRef::Text(b"hi"), None), json!("hi"));
    }
}
