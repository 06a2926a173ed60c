// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for threads and messages used across test suites.
//!
//! Timestamps are offsets in seconds from a fixed base instant so tests
//! control chronological order exactly.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Map, Value};

use recall_core::types::{ContentPart, Message, MessageContent, MessageType, Role, Thread};

/// The instant every fixture timestamp is offset from.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// `base_time()` plus `seconds`.
pub fn at(seconds: i64) -> DateTime<Utc> {
    base_time() + Duration::seconds(seconds)
}

/// A thread with empty metadata.
pub fn thread(id: &str, resource_id: &str) -> Thread {
    Thread {
        id: id.to_string(),
        resource_id: resource_id.to_string(),
        title: Some(format!("Thread {id}")),
        created_at: base_time(),
        updated_at: base_time(),
        metadata: Map::new(),
    }
}

/// A plain-text message created `seconds` after the base instant.
pub fn text_message(id: &str, thread: &Thread, role: Role, text: &str, seconds: i64) -> Message {
    message(id, thread, role, MessageContent::Text(text.to_string()), seconds)
}

/// A message with arbitrary content, typed from its parts.
pub fn message(
    id: &str,
    thread: &Thread,
    role: Role,
    content: MessageContent,
    seconds: i64,
) -> Message {
    let kind = match content.parts().first() {
        Some(ContentPart::ToolCall { .. }) => MessageType::ToolCall,
        Some(ContentPart::ToolResult { .. }) => MessageType::ToolResult,
        _ => MessageType::Text,
    };
    Message {
        id: id.to_string(),
        thread_id: thread.id.clone(),
        resource_id: thread.resource_id.clone(),
        role,
        content,
        kind,
        created_at: at(seconds),
        tool_names: None,
        tool_call_args: None,
        tool_call_ids: None,
    }
}

/// An assistant message carrying one tool call.
pub fn tool_call_message(
    id: &str,
    thread: &Thread,
    call_id: &str,
    tool_name: &str,
    args: Value,
    seconds: i64,
) -> Message {
    let mut msg = message(
        id,
        thread,
        Role::Assistant,
        MessageContent::Parts(vec![ContentPart::ToolCall {
            tool_call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            args: args.clone(),
        }]),
        seconds,
    );
    msg.tool_names = Some(vec![tool_name.to_string()]);
    msg.tool_call_args = Some(vec![args]);
    msg.tool_call_ids = Some(vec![call_id.to_string()]);
    msg
}

/// A tool message carrying one tool result.
pub fn tool_result_message(
    id: &str,
    thread: &Thread,
    call_id: &str,
    tool_name: &str,
    result: Value,
    seconds: i64,
) -> Message {
    message(
        id,
        thread,
        Role::Tool,
        MessageContent::Parts(vec![ContentPart::ToolResult {
            tool_call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            result,
        }]),
        seconds,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn offsets_order_messages() {
        let t = thread("t1", "r1");
        let a = text_message("a", &t, Role::User, "hi", 1);
        let b = text_message("b", &t, Role::Assistant, "hello", 2);
        assert!(a.created_at < b.created_at);
        assert_eq!(a.resource_id, "r1");
    }

    #[test]
    fn tool_fixtures_are_typed() {
        let t = thread("t1", "r1");
        let call = tool_call_message("c", &t, "call-1", "search", json!({"q": "x"}), 0);
        let result = tool_result_message("r", &t, "call-1", "search", json!("ok"), 1);
        assert_eq!(call.kind, MessageType::ToolCall);
        assert_eq!(result.kind, MessageType::ToolResult);
        assert!(call.content.has_tool_call("call-1"));
        assert!(result.content.has_tool_result("call-1"));
    }
}
