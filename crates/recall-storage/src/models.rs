// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw row shapes and their conversion to domain types.
//!
//! Rows are read off the connection thread as plain strings and decoded
//! afterwards, so JSON and timestamp failures surface as [`RecallError`]s
//! instead of being squeezed into `rusqlite::Error`.

use recall_core::types::{Message, Thread};
use recall_core::RecallError;
use serde_json::{Map, Value};

use crate::database::{format_timestamp, parse_timestamp};

/// A `threads` row as stored.
#[derive(Debug, Clone)]
pub struct ThreadRow {
    pub id: String,
    pub resource_id: String,
    pub title: Option<String>,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ThreadRow {
    pub const COLUMNS: &'static str = "id, resource_id, title, metadata, created_at, updated_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            resource_id: row.get(1)?,
            title: row.get(2)?,
            metadata: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    pub fn from_thread(thread: &Thread) -> Result<Self, RecallError> {
        Ok(Self {
            id: thread.id.clone(),
            resource_id: thread.resource_id.clone(),
            title: thread.title.clone(),
            metadata: serde_json::to_string(&thread.metadata)?,
            created_at: format_timestamp(&thread.created_at),
            updated_at: format_timestamp(&thread.updated_at),
        })
    }
}

impl TryFrom<ThreadRow> for Thread {
    type Error = RecallError;

    fn try_from(row: ThreadRow) -> Result<Self, Self::Error> {
        let metadata: Map<String, Value> = if row.metadata.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&row.metadata)?
        };
        Ok(Thread {
            id: row.id,
            resource_id: row.resource_id,
            title: row.title,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            metadata,
        })
    }
}

/// A `messages` row as stored, plus its insertion sequence.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub seq: i64,
    pub id: String,
    pub thread_id: String,
    pub resource_id: String,
    pub role: String,
    pub kind: String,
    pub content: String,
    pub tool_names: Option<String>,
    pub tool_call_args: Option<String>,
    pub tool_call_ids: Option<String>,
    pub created_at: String,
}

impl MessageRow {
    pub const COLUMNS: &'static str = "rowid AS seq, id, thread_id, resource_id, role, type, content, tool_names, tool_call_args, tool_call_ids, created_at";

    /// Column list for selecting from a subquery built with [`Self::COLUMNS`].
    pub const PROJECTED: &'static str = "seq, id, thread_id, resource_id, role, type, content, tool_names, tool_call_args, tool_call_ids, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            id: row.get(1)?,
            thread_id: row.get(2)?,
            resource_id: row.get(3)?,
            role: row.get(4)?,
            kind: row.get(5)?,
            content: row.get(6)?,
            tool_names: row.get(7)?,
            tool_call_args: row.get(8)?,
            tool_call_ids: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    pub fn from_message(message: &Message) -> Result<Self, RecallError> {
        fn encode<T: serde::Serialize>(v: &Option<T>) -> Result<Option<String>, RecallError> {
            v.as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(RecallError::from)
        }
        Ok(Self {
            seq: 0,
            id: message.id.clone(),
            thread_id: message.thread_id.clone(),
            resource_id: message.resource_id.clone(),
            role: message.role.to_string(),
            kind: message.kind.to_string(),
            content: serde_json::to_string(&message.content)?,
            tool_names: encode(&message.tool_names)?,
            tool_call_args: encode(&message.tool_call_args)?,
            tool_call_ids: encode(&message.tool_call_ids)?,
            created_at: format_timestamp(&message.created_at),
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = RecallError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        fn decode<T: serde::de::DeserializeOwned>(
            raw: Option<String>,
        ) -> Result<Option<T>, RecallError> {
            raw.map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(RecallError::from)
        }
        let bad_enum = |what: &str, raw: &str| {
            RecallError::Internal(format!("unrecognised message {what} `{raw}` in row {}", row.id))
        };
        Ok(Message {
            role: row.role.parse().map_err(|_| bad_enum("role", &row.role))?,
            kind: row.kind.parse().map_err(|_| bad_enum("type", &row.kind))?,
            content: serde_json::from_str(&row.content)?,
            created_at: parse_timestamp(&row.created_at)?,
            tool_names: decode(row.tool_names.clone())?,
            tool_call_args: decode(row.tool_call_args.clone())?,
            tool_call_ids: decode(row.tool_call_ids.clone())?,
            id: row.id.clone(),
            thread_id: row.thread_id.clone(),
            resource_id: row.resource_id.clone(),
        })
    }
}
