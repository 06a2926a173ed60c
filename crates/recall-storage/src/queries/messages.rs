// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and windowed retrieval.

use std::collections::HashSet;

use recall_core::types::{Message, SelectBy};
use recall_core::RecallError;
use rusqlite::params;

use crate::database::{format_timestamp, map_tr_err, Database};
use crate::models::MessageRow;

/// Insert messages, replacing rows with the same id, in one transaction.
///
/// Touches `updated_at` on every thread the batch writes to.
pub async fn save_messages(db: &Database, messages: &[Message]) -> Result<(), RecallError> {
    let rows = messages
        .iter()
        .map(MessageRow::from_message)
        .collect::<Result<Vec<_>, _>>()?;
    let now = format_timestamp(&chrono::Utc::now());
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut insert = tx.prepare(
                    "INSERT INTO messages (id, thread_id, resource_id, role, type, content, tool_names, tool_call_args, tool_call_ids, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(id) DO UPDATE SET
                        thread_id = excluded.thread_id,
                        resource_id = excluded.resource_id,
                        role = excluded.role,
                        type = excluded.type,
                        content = excluded.content,
                        tool_names = excluded.tool_names,
                        tool_call_args = excluded.tool_call_args,
                        tool_call_ids = excluded.tool_call_ids,
                        created_at = excluded.created_at",
                )?;
                let mut touch =
                    tx.prepare("UPDATE threads SET updated_at = ?2 WHERE id = ?1")?;
                let mut touched = HashSet::new();
                for row in &rows {
                    insert.execute(params![
                        row.id,
                        row.thread_id,
                        row.resource_id,
                        row.role,
                        row.kind,
                        row.content,
                        row.tool_names,
                        row.tool_call_args,
                        row.tool_call_ids,
                        row.created_at,
                    ])?;
                    if touched.insert(row.thread_id.as_str()) {
                        touch.execute(params![row.thread_id, now])?;
                    }
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the newest `last` messages plus a window around each included id.
///
/// The result is deduplicated by id and ordered oldest first. Include ids
/// that do not belong to the thread contribute nothing.
pub async fn get_messages(
    db: &Database,
    thread_id: &str,
    select_by: &SelectBy,
) -> Result<Vec<Message>, RecallError> {
    let thread_id = thread_id.to_string();
    let last = select_by.last;
    let windows: Vec<(String, i64, i64)> = select_by
        .include
        .iter()
        .map(|w| {
            (
                w.id.clone(),
                w.with_previous_messages as i64,
                w.with_next_messages as i64,
            )
        })
        .collect();

    let rows = db
        .connection()
        .call(move |conn| -> Result<Vec<MessageRow>, rusqlite::Error> {
            let mut rows = Vec::new();

            if let Some(limit) = last {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM messages WHERE thread_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                    MessageRow::COLUMNS
                ))?;
                let recent = stmt
                    .query_map(params![thread_id, limit as i64], MessageRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.extend(recent);
            }

            if !windows.is_empty() {
                let mut stmt = conn.prepare(&format!(
                    "WITH numbered AS (
                        SELECT {cols}, ROW_NUMBER() OVER (ORDER BY created_at ASC, rowid ASC) AS row_num
                        FROM messages WHERE thread_id = ?1
                     ),
                     target AS (SELECT row_num FROM numbered WHERE id = ?2)
                     SELECT {projected} FROM numbered
                     WHERE row_num BETWEEN (SELECT row_num FROM target) - ?3
                                       AND (SELECT row_num FROM target) + ?4
                     ORDER BY row_num",
                    cols = MessageRow::COLUMNS,
                    projected = MessageRow::PROJECTED
                ))?;
                for (id, before, after) in &windows {
                    let window = stmt
                        .query_map(params![thread_id, id, before, after], MessageRow::from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows.extend(window);
                }
            }

            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    let mut seen = HashSet::new();
    let mut unique: Vec<MessageRow> = rows
        .into_iter()
        .filter(|row| seen.insert(row.id.clone()))
        .collect();
    unique.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));
    unique.into_iter().map(Message::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use recall_core::types::{IncludeWindow, MessageContent, MessageType, Role};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_msg(id: &str, second: u32) -> Message {
        Message {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            resource_id: "r1".to_string(),
            role: Role::User,
            content: MessageContent::Text(format!("message {id}")),
            kind: MessageType::Text,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, second).unwrap(),
            tool_names: None,
            tool_call_args: None,
            tool_call_ids: None,
        }
    }

    /// Ten messages m0..m9, one second apart, saved out of order.
    async fn seed(db: &Database) {
        let mut messages: Vec<Message> = (0..10).map(|i| make_msg(&format!("m{i}"), i)).collect();
        messages.reverse();
        save_messages(db, &messages).await.unwrap();
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn last_returns_newest_in_ascending_order() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;
        let select = SelectBy {
            last: Some(3),
            ..Default::default()
        };
        let messages = get_messages(&db, "t1", &select).await.unwrap();
        assert_eq!(ids(&messages), vec!["m7", "m8", "m9"]);
    }

    #[tokio::test]
    async fn include_windows_union_with_last_without_duplicates() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;
        let select = SelectBy {
            last: Some(2),
            include: vec![
                IncludeWindow {
                    id: "m2".into(),
                    with_previous_messages: 1,
                    with_next_messages: 1,
                },
                IncludeWindow {
                    id: "m8".into(),
                    with_previous_messages: 1,
                    with_next_messages: 5,
                },
            ],
            vector_search_string: None,
        };
        let messages = get_messages(&db, "t1", &select).await.unwrap();
        assert_eq!(ids(&messages), vec!["m1", "m2", "m3", "m7", "m8", "m9"]);
    }

    #[tokio::test]
    async fn no_last_and_no_include_returns_nothing() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;
        let messages = get_messages(&db, "t1", &SelectBy::default()).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn unknown_include_id_is_ignored() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;
        let select = SelectBy {
            include: vec![IncludeWindow {
                id: "nope".into(),
                with_previous_messages: 2,
                with_next_messages: 2,
            }],
            ..Default::default()
        };
        assert!(get_messages(&db, "t1", &select).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saving_same_id_replaces_content() {
        let (db, _dir) = setup_db().await;
        let mut msg = make_msg("m1", 1);
        save_messages(&db, std::slice::from_ref(&msg)).await.unwrap();
        msg.content = MessageContent::Text("edited".into());
        save_messages(&db, std::slice::from_ref(&msg)).await.unwrap();

        let select = SelectBy {
            last: Some(10),
            ..Default::default()
        };
        let messages = get_messages(&db, "t1", &select).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, MessageContent::Text("edited".into()));
    }
}
