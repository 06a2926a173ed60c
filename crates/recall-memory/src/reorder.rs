// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repair of tool-call / tool-result adjacency in recalled history.

use recall_core::types::{ContentPart, Message};

/// Moves every tool-call message so it sits directly before the message
/// carrying its result.
///
/// Chronological order can interleave unrelated turns between a call and its
/// result. Each call id is repaired against the current state of the
/// sequence, so later moves never undo earlier ones. When several messages
/// share a call id, the first match in the sequence wins. Calls without a
/// result, and results without a call, stay where they are.
pub fn reorder_tool_calls_and_results(messages: Vec<Message>) -> Vec<Message> {
    let mut results = messages;
    if results.is_empty() {
        return results;
    }

    let mut call_ids: Vec<String> = Vec::new();
    for message in &results {
        for part in message.content.parts() {
            if let ContentPart::ToolResult { tool_call_id, .. } = part
                && !tool_call_id.is_empty()
                && !call_ids.contains(tool_call_id)
            {
                call_ids.push(tool_call_id.clone());
            }
        }
    }

    for id in &call_ids {
        let Some(result_index) = result_position(&results, id) else {
            continue;
        };
        if result_index > 0 && results[result_index - 1].content.has_tool_call(id) {
            continue;
        }
        let Some(call_index) = results.iter().position(|m| m.content.has_tool_call(id)) else {
            continue;
        };
        if call_index + 1 == result_index {
            continue;
        }

        let call = results.remove(call_index);
        let insert_at = result_position(&results, id).unwrap_or(results.len());
        results.insert(insert_at, call);
    }

    results
}

fn result_position(messages: &[Message], id: &str) -> Option<usize> {
    messages.iter().position(|m| m.content.has_tool_result(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::types::Role;
    use recall_test_utils::fixtures::{
        text_message, thread, tool_call_message, tool_result_message,
    };
    use serde_json::json;

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn empty_input_is_returned_unchanged() {
        assert!(reorder_tool_calls_and_results(Vec::new()).is_empty());
    }

    #[test]
    fn adjacent_pairs_are_left_alone() {
        let t = thread("t1", "r1");
        let messages = vec![
            text_message("u1", &t, Role::User, "weather?", 0),
            tool_call_message("c1", &t, "call-1", "weather", json!({}), 1),
            tool_result_message("r1", &t, "call-1", "weather", json!("sunny"), 2),
            text_message("a1", &t, Role::Assistant, "It is sunny", 3),
        ];
        let reordered = reorder_tool_calls_and_results(messages);
        assert_eq!(ids(&reordered), vec!["u1", "c1", "r1", "a1"]);
    }

    #[test]
    fn separated_call_moves_next_to_its_result() {
        let t = thread("t1", "r1");
        let messages = vec![
            tool_call_message("c1", &t, "call-1", "weather", json!({}), 0),
            text_message("u1", &t, Role::User, "also", 1),
            text_message("a1", &t, Role::Assistant, "sure", 2),
            tool_result_message("r1", &t, "call-1", "weather", json!("sunny"), 3),
        ];
        let reordered = reorder_tool_calls_and_results(messages);
        assert_eq!(ids(&reordered), vec!["u1", "a1", "c1", "r1"]);
    }

    #[test]
    fn call_after_its_result_moves_before_it() {
        let t = thread("t1", "r1");
        let messages = vec![
            tool_result_message("r1", &t, "call-1", "search", json!([]), 0),
            text_message("u1", &t, Role::User, "hm", 1),
            tool_call_message("c1", &t, "call-1", "search", json!({}), 2),
        ];
        let reordered = reorder_tool_calls_and_results(messages);
        assert_eq!(ids(&reordered), vec!["c1", "r1", "u1"]);
    }

    #[test]
    fn multiple_repairs_do_not_disturb_each_other() {
        let t = thread("t1", "r1");
        let messages = vec![
            tool_call_message("c1", &t, "call-1", "a", json!({}), 0),
            tool_call_message("c2", &t, "call-2", "b", json!({}), 1),
            text_message("x", &t, Role::User, "noise", 2),
            tool_result_message("r2", &t, "call-2", "b", json!(2), 3),
            tool_result_message("r1", &t, "call-1", "a", json!(1), 4),
        ];
        let reordered = reorder_tool_calls_and_results(messages);
        assert_eq!(ids(&reordered), vec!["x", "c2", "r2", "c1", "r1"]);
    }

    #[test]
    fn orphan_results_stay_put() {
        let t = thread("t1", "r1");
        let messages = vec![
            text_message("u1", &t, Role::User, "hi", 0),
            tool_result_message("r1", &t, "missing", "a", json!(1), 1),
        ];
        let reordered = reorder_tool_calls_and_results(messages);
        assert_eq!(ids(&reordered), vec!["u1", "r1"]);
    }

    #[test]
    fn reordering_is_idempotent() {
        let t = thread("t1", "r1");
        let messages = vec![
            tool_call_message("c1", &t, "call-1", "a", json!({}), 0),
            tool_result_message("r2", &t, "call-2", "b", json!(2), 1),
            text_message("x", &t, Role::User, "noise", 2),
            tool_call_message("c2", &t, "call-2", "b", json!({}), 3),
            tool_result_message("r1", &t, "call-1", "a", json!(1), 4),
        ];
        let once = reorder_tool_calls_and_results(messages);
        let twice = reorder_tool_calls_and_results(once.clone());
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["c2", "r2", "x", "c1", "r1"]);
    }
}
