// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the SQLite storage adapter through the trait surface.

use chrono::{Duration, TimeZone, Utc};
use recall_config::model::StorageConfig;
use recall_core::types::{
    ContentPart, IncludeWindow, Message, MessageContent, MessageType, Role, SelectBy, Thread,
};
use recall_core::StorageAdapter;
use recall_storage::{LazyInit, SqliteStorage};
use serde_json::{json, Map};
use tempfile::TempDir;

fn storage() -> (LazyInit<SqliteStorage>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        database_path: dir.path().join("it.db").to_string_lossy().into_owned(),
        wal_mode: true,
    };
    (LazyInit::new(SqliteStorage::new(config)), dir)
}

fn thread(id: &str) -> Thread {
    let ts = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    Thread {
        id: id.into(),
        resource_id: "user-1".into(),
        title: None,
        created_at: ts,
        updated_at: ts,
        metadata: Map::new(),
    }
}

fn message(id: &str, thread_id: &str, offset: i64, content: MessageContent) -> Message {
    Message {
        id: id.into(),
        thread_id: thread_id.into(),
        resource_id: "user-1".into(),
        role: Role::Assistant,
        content,
        kind: MessageType::Text,
        created_at: Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap() + Duration::seconds(offset),
        tool_names: None,
        tool_call_args: None,
        tool_call_ids: None,
    }
}

#[tokio::test]
async fn structured_content_survives_persistence() {
    let (storage, _dir) = storage();
    storage.save_thread(thread("t1")).await.unwrap();

    let mut call = message(
        "m1",
        "t1",
        0,
        MessageContent::Parts(vec![
            ContentPart::Text {
                text: "checking".into(),
            },
            ContentPart::ToolCall {
                tool_call_id: "c1".into(),
                tool_name: "weather".into(),
                args: json!({"city": "Oslo"}),
            },
        ]),
    );
    call.kind = MessageType::ToolCall;
    call.tool_names = Some(vec!["weather".into()]);
    call.tool_call_ids = Some(vec!["c1".into()]);
    call.tool_call_args = Some(vec![json!({"city": "Oslo"})]);
    storage.save_messages(vec![call.clone()]).await.unwrap();

    let loaded = storage
        .get_messages(
            "t1",
            &SelectBy {
                last: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(loaded, vec![call]);
}

#[tokio::test]
async fn delete_thread_removes_its_messages() {
    let (storage, _dir) = storage();
    storage.save_thread(thread("t1")).await.unwrap();
    storage.save_thread(thread("t2")).await.unwrap();
    storage
        .save_messages(vec![
            message("a", "t1", 0, "one".into()),
            message("b", "t2", 1, "two".into()),
        ])
        .await
        .unwrap();

    storage.delete_thread("t1").await.unwrap();

    assert!(storage.get_thread_by_id("t1").await.unwrap().is_none());
    let select = SelectBy {
        last: Some(10),
        include: vec![IncludeWindow {
            id: "a".into(),
            with_previous_messages: 1,
            with_next_messages: 1,
        }],
        vector_search_string: None,
    };
    assert!(storage.get_messages("t1", &select).await.unwrap().is_empty());
    assert_eq!(storage.get_messages("t2", &select).await.unwrap().len(), 1);
}

#[tokio::test]
async fn saving_messages_touches_thread() {
    let (storage, _dir) = storage();
    let original = storage.save_thread(thread("t1")).await.unwrap();
    storage
        .save_messages(vec![message("a", "t1", 0, "hello".into())])
        .await
        .unwrap();
    let reloaded = storage.get_thread_by_id("t1").await.unwrap().unwrap();
    assert!(reloaded.updated_at > original.updated_at);
}
