// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread CRUD operations.

use recall_core::types::Thread;
use recall_core::RecallError;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};

use crate::database::{format_timestamp, map_tr_err, Database};
use crate::models::ThreadRow;

/// Insert a thread, or replace every mutable column of an existing one.
pub async fn save_thread(db: &Database, thread: &Thread) -> Result<(), RecallError> {
    let row = ThreadRow::from_thread(thread)?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO threads (id, resource_id, title, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    resource_id = excluded.resource_id,
                    title = excluded.title,
                    metadata = excluded.metadata,
                    updated_at = excluded.updated_at",
                params![
                    row.id,
                    row.resource_id,
                    row.title,
                    row.metadata,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a thread by ID.
pub async fn get_thread(db: &Database, id: &str) -> Result<Option<Thread>, RecallError> {
    let id = id.to_string();
    let row = db
        .connection()
        .call(move |conn| -> Result<Option<ThreadRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {} FROM threads WHERE id = ?1", ThreadRow::COLUMNS),
                params![id],
                ThreadRow::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    row.map(Thread::try_from).transpose()
}

/// List a resource's threads, newest first.
pub async fn list_threads_for_resource(
    db: &Database,
    resource_id: &str,
) -> Result<Vec<Thread>, RecallError> {
    let resource_id = resource_id.to_string();
    let rows = db
        .connection()
        .call(move |conn| -> Result<Vec<ThreadRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM threads WHERE resource_id = ?1 ORDER BY created_at DESC",
                ThreadRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![resource_id], ThreadRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;
    rows.into_iter().map(Thread::try_from).collect()
}

/// Replace a thread's metadata (and title, when given), bumping `updated_at`.
///
/// Returns `None` when no thread has the id.
pub async fn update_thread(
    db: &Database,
    id: &str,
    title: Option<String>,
    metadata: &Map<String, Value>,
) -> Result<Option<Thread>, RecallError> {
    let id = id.to_string();
    let metadata = serde_json::to_string(metadata)?;
    let now = format_timestamp(&chrono::Utc::now());
    let row = db
        .connection()
        .call(move |conn| -> Result<Option<ThreadRow>, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE threads SET title = COALESCE(?2, title), metadata = ?3, updated_at = ?4
                 WHERE id = ?1",
                params![id, title, metadata, now],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("SELECT {} FROM threads WHERE id = ?1", ThreadRow::COLUMNS),
                params![id],
                ThreadRow::from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    row.map(Thread::try_from).transpose()
}

/// Delete a thread and every message in it.
pub async fn delete_thread(db: &Database, id: &str) -> Result<(), RecallError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM messages WHERE thread_id = ?1", params![id])?;
            tx.execute("DELETE FROM threads WHERE id = ?1", params![id])?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_thread(id: &str, resource: &str, minute: u32) -> Thread {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap();
        Thread {
            id: id.to_string(),
            resource_id: resource.to_string(),
            title: Some(format!("thread {id}")),
            created_at: ts,
            updated_at: ts,
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn save_and_get_thread() {
        let (db, _dir) = setup_db().await;
        let mut thread = make_thread("t1", "r1", 0);
        thread
            .metadata
            .insert("workingMemory".into(), Value::String("# Notes".into()));
        save_thread(&db, &thread).await.unwrap();

        let loaded = get_thread(&db, "t1").await.unwrap().unwrap();
        assert_eq!(loaded, thread);
        assert!(get_thread(&db, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_again_replaces_columns() {
        let (db, _dir) = setup_db().await;
        let mut thread = make_thread("t1", "r1", 0);
        save_thread(&db, &thread).await.unwrap();
        thread.title = Some("renamed".into());
        save_thread(&db, &thread).await.unwrap();

        let loaded = get_thread(&db, "t1").await.unwrap().unwrap();
        assert_eq!(loaded.title.as_deref(), Some("renamed"));
    }

    #[tokio::test]
    async fn list_is_scoped_and_newest_first() {
        let (db, _dir) = setup_db().await;
        save_thread(&db, &make_thread("old", "r1", 1)).await.unwrap();
        save_thread(&db, &make_thread("new", "r1", 2)).await.unwrap();
        save_thread(&db, &make_thread("other", "r2", 3)).await.unwrap();

        let ids: Vec<String> = list_threads_for_resource(&db, "r1")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn update_missing_thread_returns_none() {
        let (db, _dir) = setup_db().await;
        let result = update_thread(&db, "ghost", None, &Map::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn update_keeps_title_when_not_given() {
        let (db, _dir) = setup_db().await;
        save_thread(&db, &make_thread("t1", "r1", 0)).await.unwrap();
        let mut metadata = Map::new();
        metadata.insert("k".into(), Value::from(1));

        let updated = update_thread(&db, "t1", None, &metadata)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title.as_deref(), Some("thread t1"));
        assert_eq!(updated.metadata, metadata);
        assert!(updated.updated_at > updated.created_at);
    }
}
