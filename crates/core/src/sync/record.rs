//! Open column-name-to-value rows exchanged with the backend and the local store.

use serde_json::Value;

use super::tables::{is_sync_control_column, MirroredTable};
use crate::errors::{Error, Result};

/// One row as an open mapping of column name to scalar-or-null value.
///
/// Iteration order is sorted by column name, so the same mapping always yields
/// the same column order.
pub type Record = serde_json::Map<String, Value>;

/// Returns the row's primary key value, rejecting missing or null keys.
pub fn primary_key_value(table: MirroredTable, record: &Record) -> Result<Value> {
    match record.get(table.primary_key()) {
        Some(Value::Null) | None => Err(Error::validation(format!(
            "Record for '{}' has no '{}' value",
            table,
            table.primary_key()
        ))),
        Some(value) => Ok(value.clone()),
    }
}

/// Drops the local-only bookkeeping columns.
pub fn strip_sync_control(mut record: Record) -> Record {
    record.retain(|column, _| !is_sync_control_column(column));
    record
}

/// Key rendered as text, for logs and comparisons.
pub fn key_to_string(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn strip_removes_only_control_columns() {
        let stripped = strip_sync_control(record(json!({
            "id": "t1",
            "title": "buy milk",
            "pending_sync": true,
            "deleted": false,
            "last_synced_at": null
        })));
        assert_eq!(
            Value::Object(stripped),
            json!({ "id": "t1", "title": "buy milk" })
        );
    }

    #[test]
    fn primary_key_follows_table_mapping() {
        let profile = record(json!({ "user_id": "u-1", "name": "Ada" }));
        assert_eq!(
            primary_key_value(MirroredTable::Profiles, &profile).unwrap(),
            json!("u-1")
        );
        assert!(primary_key_value(MirroredTable::Todos, &profile).is_err());
        let null_key = record(json!({ "id": null }));
        assert!(primary_key_value(MirroredTable::Todos, &null_key).is_err());
    }

    #[test]
    fn column_order_is_deterministic() {
        let a = record(json!({ "title": "x", "id": "1", "completed": false }));
        let b = record(json!({ "completed": false, "id": "1", "title": "x" }));
        let keys_a: Vec<_> = a.keys().collect();
        let keys_b: Vec<_> = b.keys().collect();
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn key_to_string_unquotes_strings() {
        assert_eq!(key_to_string(&json!("abc")), "abc");
        assert_eq!(key_to_string(&json!(42)), "42");
    }
}
