//! Local mutation API and the reads screens render from.

use adjunct_core::errors::{Error, Result};
use adjunct_core::sync::{
    LocalRecordRepositoryTrait, MirroredTable, Record, SortOrder, DELETED_COLUMN,
    PENDING_SYNC_COLUMN,
};
use async_trait::async_trait;
use log::error;
use serde_json::Value;

use crate::codec::{json_to_sql, quote_identifier};
use crate::errors::StorageError;
use crate::store::{LocalStore, SyncMarks};

impl LocalStore {
    async fn delete_local_impl(&self, table: MirroredTable, key: Value) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET {} = 1, {} = 1 WHERE {} = ?1",
            quote_identifier(table.table_name()),
            DELETED_COLUMN,
            PENDING_SYNC_COLUMN,
            quote_identifier(table.primary_key())
        );
        self.writer()
            .exec(move |tx| {
                let changed = tx
                    .execute(&sql, [json_to_sql(&key)])
                    .map_err(StorageError::from)?;
                Ok(changed > 0)
            })
            .await
    }
}

#[async_trait]
impl LocalRecordRepositoryTrait for LocalStore {
    async fn insert_local(&self, table: MirroredTable, record: Record) -> Result<()> {
        self.insert_or_replace(table, record, SyncMarks::LocalEdit)
            .await
            .map_err(|err| {
                error!("[LocalStore] Insert into {} failed: {}", table, err);
                err
            })
    }

    async fn delete_local(&self, table: MirroredTable, key: Value) -> Result<bool> {
        self.delete_local_impl(table, key).await.map_err(|err| {
            error!("[LocalStore] Delete from {} failed: {}", table, err);
            err
        })
    }

    async fn select_all(&self, table: MirroredTable) -> Result<Vec<Record>> {
        self.select_rows(table).await
    }

    async fn select_all_ordered(
        &self,
        table: MirroredTable,
        column: &str,
        order: SortOrder,
    ) -> Result<Vec<Record>> {
        let column = table.column(column).ok_or_else(|| {
            Error::validation(format!("Table '{}' has no column '{}'", table, column))
        })?;
        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        self.select_where(
            table,
            format!(
                "{} = 0 ORDER BY {} {}",
                DELETED_COLUMN,
                quote_identifier(column.name),
                direction
            ),
            Vec::new(),
        )
        .await
    }

    async fn select_by_key(&self, table: MirroredTable, key: Value) -> Result<Option<Record>> {
        let mut rows = self
            .select_where(
                table,
                format!(
                    "{} = ?1 AND {} = 0 LIMIT 1",
                    quote_identifier(table.primary_key()),
                    DELETED_COLUMN
                ),
                vec![key],
            )
            .await?;
        Ok(rows.pop())
    }
}
