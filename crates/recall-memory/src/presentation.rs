// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of recalled messages into chat-UI shaped messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use recall_core::types::{ContentPart, Message, MessageContent, Role};

/// Lifecycle of a tool invocation as shown to a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationState {
    /// The call was issued; no result is visible yet.
    Call,
    Result,
}

/// A tool call folded together with its result, when one is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub state: InvocationState,
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// One entry of a chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    pub id: String,
    pub role: Role,
    /// Text parts concatenated in order.
    pub content: String,
    pub tool_invocations: Vec<ToolInvocation>,
    pub created_at: DateTime<Utc>,
}

/// Decodes text content that holds a serialized part list.
///
/// Storage written by older clients may keep structured content as a JSON
/// string. Text starting with `[` or `{` is decoded when it parses as a part
/// list and left untouched otherwise.
pub fn parse_messages(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .map(|mut message| {
            if let MessageContent::Text(text) = &message.content
                && (text.starts_with('[') || text.starts_with('{'))
                && let Ok(parts) = serde_json::from_str::<Vec<ContentPart>>(text)
            {
                message.content = MessageContent::Parts(parts);
            }
            message
        })
        .collect()
}

/// Folds a chronological message list into UI messages.
///
/// Tool messages are not emitted. Their results are attached to every
/// earlier invocation with a matching call id and kept in a pool, so calls
/// that only appear later in the list still resolve to their result.
pub fn convert_to_ui_messages(messages: &[Message]) -> Vec<UiMessage> {
    let mut chat: Vec<UiMessage> = Vec::new();
    let mut result_pool: Vec<(&str, &Value)> = Vec::new();

    for message in messages {
        if message.role == Role::Tool {
            let results: Vec<(&str, &Value)> = message
                .content
                .parts()
                .iter()
                .filter_map(|part| match part {
                    ContentPart::ToolResult {
                        tool_call_id,
                        result,
                        ..
                    } => Some((tool_call_id.as_str(), result)),
                    _ => None,
                })
                .collect();

            for invocation in chat.iter_mut().flat_map(|m| m.tool_invocations.iter_mut()) {
                if let Some((_, result)) = results
                    .iter()
                    .find(|(id, _)| *id == invocation.tool_call_id)
                {
                    invocation.state = InvocationState::Result;
                    invocation.result = Some((*result).clone());
                }
            }
            result_pool.extend(results);
            continue;
        }

        let mut content = String::new();
        let mut tool_invocations = Vec::new();
        match &message.content {
            MessageContent::Text(text) => content.push_str(text),
            MessageContent::Parts(parts) => {
                for part in parts {
                    match part {
                        ContentPart::Text { text } => content.push_str(text),
                        ContentPart::ToolCall {
                            tool_call_id,
                            tool_name,
                            args,
                        } => {
                            let known = result_pool
                                .iter()
                                .find(|(id, _)| *id == tool_call_id.as_str())
                                .map(|(_, result)| (*result).clone());
                            tool_invocations.push(ToolInvocation {
                                state: if known.is_some() {
                                    InvocationState::Result
                                } else {
                                    InvocationState::Call
                                },
                                tool_call_id: tool_call_id.clone(),
                                tool_name: tool_name.clone(),
                                args: args.clone(),
                                result: known,
                            });
                        }
                        ContentPart::ToolResult { .. } => {}
                    }
                }
            }
        }

        chat.push(UiMessage {
            id: message.id.clone(),
            role: message.role,
            content,
            tool_invocations,
            created_at: message.created_at,
        });
    }

    chat
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_test_utils::fixtures::{
        message, text_message, thread, tool_call_message, tool_result_message,
    };
    use serde_json::json;

    #[test]
    fn tool_results_fold_into_the_calling_message() {
        let t = thread("t1", "r1");
        let messages = vec![
            text_message("u", &t, Role::User, "weather?", 0),
            message(
                "a",
                &t,
                Role::Assistant,
                MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: "Checking".into(),
                    },
                    ContentPart::Text { text: "...".into() },
                    ContentPart::ToolCall {
                        tool_call_id: "call-1".into(),
                        tool_name: "weather".into(),
                        args: json!({"city": "Oslo"}),
                    },
                ]),
                1,
            ),
            tool_result_message("r", &t, "call-1", "weather", json!("rain"), 2),
        ];

        let ui = convert_to_ui_messages(&messages);
        assert_eq!(ui.len(), 2);
        assert_eq!(ui[1].content, "Checking...");
        assert_eq!(
            ui[1].tool_invocations,
            vec![ToolInvocation {
                state: InvocationState::Result,
                tool_call_id: "call-1".into(),
                tool_name: "weather".into(),
                args: json!({"city": "Oslo"}),
                result: Some(json!("rain")),
            }]
        );
    }

    #[test]
    fn calls_without_results_stay_in_call_state() {
        let t = thread("t1", "r1");
        let messages = vec![tool_call_message("c", &t, "call-1", "search", json!({}), 0)];
        let ui = convert_to_ui_messages(&messages);
        assert_eq!(ui[0].tool_invocations[0].state, InvocationState::Call);
        assert_eq!(ui[0].tool_invocations[0].result, None);
    }

    #[test]
    fn earlier_results_resolve_later_calls() {
        let t = thread("t1", "r1");
        let messages = vec![
            tool_result_message("r", &t, "call-1", "search", json!([1, 2]), 0),
            tool_call_message("c", &t, "call-1", "search", json!({}), 1),
        ];
        let ui = convert_to_ui_messages(&messages);
        assert_eq!(ui.len(), 1);
        assert_eq!(ui[0].tool_invocations[0].state, InvocationState::Result);
        assert_eq!(ui[0].tool_invocations[0].result, Some(json!([1, 2])));
    }

    #[test]
    fn ui_messages_serialize_camel_case() {
        let t = thread("t1", "r1");
        let ui = convert_to_ui_messages(&[tool_call_message("c", &t, "call-1", "s", json!({}), 0)]);
        let value = serde_json::to_value(&ui[0]).unwrap();
        assert_eq!(value["toolInvocations"][0]["toolCallId"], "call-1");
        assert_eq!(value["toolInvocations"][0]["state"], "call");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn json_looking_text_becomes_parts() {
        let t = thread("t1", "r1");
        let encoded = r#"[{"type":"text","text":"hi"}]"#;
        let parsed = parse_messages(vec![
            text_message("a", &t, Role::User, encoded, 0),
            text_message("b", &t, Role::User, "[not json", 1),
            text_message("c", &t, Role::User, "plain", 2),
        ]);
        assert_eq!(
            parsed[0].content,
            MessageContent::Parts(vec![ContentPart::Text { text: "hi".into() }])
        );
        assert_eq!(parsed[1].content, MessageContent::Text("[not json".into()));
        assert_eq!(parsed[2].content, MessageContent::Text("plain".into()));
    }
}
