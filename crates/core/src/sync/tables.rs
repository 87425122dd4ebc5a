//! Catalogue of mirrored tables: names, primary keys, key shapes and column descriptors.

use serde::{Deserialize, Serialize};

use self::ColumnType::{Boolean, Integer, Text};
use crate::errors::{Error, Result};

pub const PENDING_SYNC_COLUMN: &str = "pending_sync";
pub const DELETED_COLUMN: &str = "deleted";
pub const LAST_SYNCED_AT_COLUMN: &str = "last_synced_at";

/// Local-only bookkeeping columns appended to every mirrored table.
/// Never sent to the backend and never trusted when received from it.
pub const SYNC_CONTROL_COLUMNS: [&str; 3] =
    [PENDING_SYNC_COLUMN, DELETED_COLUMN, LAST_SYNCED_AT_COLUMN];

/// Storage class of a column. Booleans are stored as INTEGER 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Boolean,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    /// Extra DDL after the type, e.g. `NOT NULL` or `DEFAULT 0`.
    pub constraint: &'static str,
}

const fn col(name: &'static str, column_type: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        column_type,
        constraint: "",
    }
}

const fn col_with(
    name: &'static str,
    column_type: ColumnType,
    constraint: &'static str,
) -> ColumnDef {
    ColumnDef {
        name,
        column_type,
        constraint,
    }
}

static SYNC_CONTROL_DEFS: [ColumnDef; 3] = [
    col_with(PENDING_SYNC_COLUMN, Boolean, "DEFAULT 0"),
    col_with(DELETED_COLUMN, Boolean, "DEFAULT 0"),
    col(LAST_SYNCED_AT_COLUMN, Text),
];

const MESSAGE_COLUMNS: &[ColumnDef] = &[
    col_with("id", Text, "PRIMARY KEY"),
    col("sender_phone", Text),
    col("receiver_phone", Text),
    col("message", Text),
    col("created_at", Text),
    col("is_ai", Boolean),
    col("reply_to_message", Text),
    col("is_read", Boolean),
    col("ciphertext", Text),
    col("nonce", Text),
    col("mode", Text),
    col("media_url", Text),
    col("media_type", Text),
    col("file_name", Text),
    col("file_size", Integer),
];

const PROFILE_COLUMNS: &[ColumnDef] = &[
    col_with("user_id", Text, "PRIMARY KEY"),
    col_with("phone_number", Text, "UNIQUE"),
    col("name", Text),
    col("profile_picture", Text),
    col("is_active", Boolean),
    col("created_at", Text),
    col("updated_at", Text),
    col("public_key", Text),
    col("google_access_token", Text),
    col("google_refresh_token", Text),
    col("google_user_id", Text),
    col("google_email", Text),
    col("lock_password", Text),
];

const CHATBOT_MESSAGE_COLUMNS: &[ColumnDef] = &[
    col_with("id", Text, "PRIMARY KEY"),
    col("sender_phone", Text),
    col("text", Text),
    col("is_ai", Boolean),
    col("created_at", Text),
];

const TODO_COLUMNS: &[ColumnDef] = &[
    col_with("id", Text, "PRIMARY KEY"),
    col("sender_phone", Text),
    col("title", Text),
    col("completed", Boolean),
    col("created_at", Text),
];

const USER_MODE_COLUMNS: &[ColumnDef] = &[
    col_with("id", Text, "PRIMARY KEY"),
    col_with("phone", Text, "UNIQUE"),
    col("mode", Text),
    col("created_at", Text),
    col("updated_at", Text),
];

const CONVERSATION_COLUMNS: &[ColumnDef] = &[
    col_with("id", Text, "PRIMARY KEY"),
    col_with("user_phone", Text, "NOT NULL"),
    col_with("contact_phone", Text, "NOT NULL"),
    col("contact_name", Text),
    col("profile_picture", Text),
    col_with("last_message", Text, "NOT NULL"),
    col_with("last_message_time", Text, "NOT NULL"),
    col_with("unread_count", Integer, "DEFAULT 0"),
    col_with("is_group", Boolean, "DEFAULT 0"),
    col_with("created_at", Text, "DEFAULT (datetime('now'))"),
    col_with("updated_at", Text, "DEFAULT (datetime('now'))"),
];

/// Expected shape of a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    /// Hyphenated version-4 UUID. Anything else is purged by the integrity sweep.
    UuidV4,
    /// Any non-null value.
    Opaque,
}

/// Tables mirrored between the local store and the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirroredTable {
    Messages,
    Profiles,
    ChatbotMessages,
    Todos,
    UsersModes,
    Conversations,
}

/// Order in which a full sync visits the tables.
pub const FULL_SYNC_ORDER: [MirroredTable; 6] = [
    MirroredTable::Messages,
    MirroredTable::Profiles,
    MirroredTable::ChatbotMessages,
    MirroredTable::Todos,
    MirroredTable::UsersModes,
    MirroredTable::Conversations,
];

impl MirroredTable {
    /// Table name, identical in the local store and on the backend.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Profiles => "profiles",
            Self::ChatbotMessages => "chatbotmessages",
            Self::Todos => "todos",
            Self::UsersModes => "usersmodes",
            Self::Conversations => "conversations",
        }
    }

    /// Column identifying a row in both stores; also the upsert conflict key.
    pub fn primary_key(&self) -> &'static str {
        match self {
            Self::Profiles => "user_id",
            _ => "id",
        }
    }

    pub fn key_shape(&self) -> KeyShape {
        match self {
            Self::Messages | Self::Profiles => KeyShape::UuidV4,
            _ => KeyShape::Opaque,
        }
    }

    /// Domain columns, primary key first.
    pub fn domain_columns(&self) -> &'static [ColumnDef] {
        match self {
            Self::Messages => MESSAGE_COLUMNS,
            Self::Profiles => PROFILE_COLUMNS,
            Self::ChatbotMessages => CHATBOT_MESSAGE_COLUMNS,
            Self::Todos => TODO_COLUMNS,
            Self::UsersModes => USER_MODE_COLUMNS,
            Self::Conversations => CONVERSATION_COLUMNS,
        }
    }

    /// Domain columns followed by the sync-control columns.
    pub fn columns(&self) -> impl Iterator<Item = &'static ColumnDef> {
        self.domain_columns().iter().chain(SYNC_CONTROL_DEFS.iter())
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns().find(|c| c.name == name)
    }

    pub fn from_name(name: &str) -> Result<Self> {
        FULL_SYNC_ORDER
            .iter()
            .copied()
            .find(|t| t.table_name() == name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }
}

impl std::fmt::Display for MirroredTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

impl std::str::FromStr for MirroredTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

pub fn is_sync_control_column(name: &str) -> bool {
    SYNC_CONTROL_COLUMNS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_keyed_by_user_id() {
        assert_eq!(MirroredTable::Profiles.primary_key(), "user_id");
        for table in FULL_SYNC_ORDER {
            if table != MirroredTable::Profiles {
                assert_eq!(table.primary_key(), "id", "{table}");
            }
        }
    }

    #[test]
    fn primary_key_is_first_domain_column() {
        for table in FULL_SYNC_ORDER {
            let first = table.domain_columns()[0];
            assert_eq!(first.name, table.primary_key());
            assert_eq!(first.constraint, "PRIMARY KEY");
        }
    }

    #[test]
    fn every_table_carries_sync_control_columns() {
        for table in FULL_SYNC_ORDER {
            for name in SYNC_CONTROL_COLUMNS {
                assert!(table.column(name).is_some(), "{table} missing {name}");
            }
        }
    }

    #[test]
    fn table_names_round_trip() {
        for table in FULL_SYNC_ORDER {
            assert_eq!(MirroredTable::from_name(table.table_name()).unwrap(), table);
            let json = serde_json::to_string(&table).unwrap();
            assert_eq!(json, format!("\"{}\"", table.table_name()));
        }
        assert!(matches!(
            "sync_log".parse::<MirroredTable>(),
            Err(Error::UnknownTable(_))
        ));
    }

    #[test]
    fn only_messages_and_profiles_require_uuid_keys() {
        assert_eq!(MirroredTable::Messages.key_shape(), KeyShape::UuidV4);
        assert_eq!(MirroredTable::Profiles.key_shape(), KeyShape::UuidV4);
        assert_eq!(MirroredTable::Todos.key_shape(), KeyShape::Opaque);
    }
}
