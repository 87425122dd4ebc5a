//! Integrity sweep: physically removes rows whose primary key has the wrong
//! shape for its table (null anywhere, non-UUIDv4 on UUID-keyed tables).

use adjunct_core::errors::Result;
use adjunct_core::sync::{key_matches_shape, MirroredTable, FULL_SYNC_ORDER};
use log::{info, warn};
use rusqlite::{params_from_iter, Connection};

use crate::codec::{quote_identifier, sql_to_json};
use crate::errors::StorageError;

/// Number of rowids deleted per statement.
const DELETE_CHUNK: usize = 200;

pub(crate) fn sweep_table(conn: &Connection, table: MirroredTable) -> Result<usize> {
    let select = format!(
        "SELECT rowid, {} FROM {}",
        quote_identifier(table.primary_key()),
        quote_identifier(table.table_name())
    );
    let mut stmt = conn.prepare(&select).map_err(StorageError::from)?;
    let invalid: Vec<i64> = stmt
        .query_map([], |row| {
            let rowid: i64 = row.get(0)?;
            let key = sql_to_json(row.get_ref(1)?, None);
            Ok((rowid, key))
        })
        .map_err(StorageError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(StorageError::from)?
        .into_iter()
        .filter(|(_, key)| !key_matches_shape(table.key_shape(), key))
        .map(|(rowid, _)| rowid)
        .collect();

    let mut removed = 0;
    for chunk in invalid.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let delete = format!(
            "DELETE FROM {} WHERE rowid IN ({})",
            quote_identifier(table.table_name()),
            placeholders
        );
        removed += conn
            .execute(&delete, params_from_iter(chunk.iter()))
            .map_err(StorageError::from)?;
    }
    if removed > 0 {
        warn!(
            "[LocalStore] Swept {} row(s) with invalid '{}' keys from {}",
            removed,
            table.primary_key(),
            table
        );
    }
    Ok(removed)
}

/// Sweeps every mirrored table in one transaction.
pub(crate) fn sweep_all(conn: &Connection) -> Result<usize> {
    let mut total = 0;
    for table in FULL_SYNC_ORDER {
        total += sweep_table(conn, table)?;
    }
    if total > 0 {
        info!("[LocalStore] Integrity sweep removed {} row(s)", total);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::initialize_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn removes_timestamp_keys_from_messages() {
        let conn = conn();
        conn.execute_batch(
            "INSERT INTO messages (id, message) VALUES
               ('3f2b6c1e-8d4a-4c2b-9e1f-0a1b2c3d4e5f', 'kept'),
               ('1722951234567', 'legacy'),
               (NULL, 'orphan');",
        )
        .unwrap();
        assert_eq!(sweep_table(&conn, MirroredTable::Messages).unwrap(), 2);
        assert_eq!(count(&conn, "messages"), 1);
    }

    #[test]
    fn opaque_tables_keep_non_uuid_keys() {
        let conn = conn();
        conn.execute_batch(
            "INSERT INTO todos (id, title) VALUES ('t1', 'a'), ('t2', 'b');
             INSERT INTO todos (title) VALUES ('keyless');",
        )
        .unwrap();
        assert_eq!(sweep_table(&conn, MirroredTable::Todos).unwrap(), 1);
        assert_eq!(count(&conn, "todos"), 2);
    }

    #[test]
    fn profiles_are_checked_on_user_id() {
        let conn = conn();
        conn.execute_batch(
            "INSERT INTO profiles (user_id, name) VALUES
               ('3f2b6c1e-8d4a-4c2b-9e1f-0a1b2c3d4e5f', 'Ada'),
               ('user-42', 'Bob');",
        )
        .unwrap();
        assert_eq!(sweep_all(&conn).unwrap(), 1);
        assert_eq!(count(&conn, "profiles"), 1);
    }
}
