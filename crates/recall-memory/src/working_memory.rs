// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Working memory: the in-band `<working_memory>` protocol, its redaction
//! from persisted messages, and the system instructions that teach a model
//! to maintain it.

use std::sync::LazyLock;

use regex::Regex;

use recall_core::types::{ContentPart, Message, MessageContent};

/// Name of the tool the model calls to replace working memory.
pub const UPDATE_WORKING_MEMORY_TOOL: &str = "updateWorkingMemory";

/// Template seeded into threads when none is configured.
pub const DEFAULT_TEMPLATE: &str = "\n# User Information\n- **First Name**: \n- **Last Name**: \n- **Location**: \n- **Occupation**: \n- **Interests**: \n- **Goals**: \n- **Events**: \n- **Facts**: \n- **Projects**: \n";

/// A delimited block, non-greedy so adjacent blocks stay separate.
static WORKING_MEMORY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<working_memory>(.*?)</working_memory>").unwrap());

/// Returns the trimmed interior of the first working-memory block in `text`.
///
/// A block that is empty after trimming counts as absent.
pub fn extract_working_memory(text: &str) -> Option<String> {
    let interior = WORKING_MEMORY_BLOCK.captures(text)?.get(1)?.as_str().trim();
    (!interior.is_empty()).then(|| interior.to_string())
}

/// Removes every working-memory block from `text` and trims the remainder.
pub fn strip_working_memory(text: &str) -> String {
    WORKING_MEMORY_BLOCK.replace_all(text, "").trim().to_string()
}

/// Prepares messages for persistence.
///
/// Working-memory blocks are removed from all text, and any message carrying
/// a call to, or result from, the update tool is dropped entirely.
pub fn hide_working_memory(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .filter_map(|mut message| {
            message.content = match message.content {
                MessageContent::Text(text) => MessageContent::Text(strip_working_memory(&text)),
                MessageContent::Parts(parts) => {
                    if parts.iter().any(is_update_tool_part) {
                        return None;
                    }
                    MessageContent::Parts(
                        parts
                            .into_iter()
                            .map(|part| match part {
                                ContentPart::Text { text } => ContentPart::Text {
                                    text: strip_working_memory(&text),
                                },
                                other => other,
                            })
                            .collect(),
                    )
                }
            };
            Some(message)
        })
        .collect()
}

fn is_update_tool_part(part: &ContentPart) -> bool {
    matches!(
        part,
        ContentPart::ToolCall { tool_name, .. } | ContentPart::ToolResult { tool_name, .. }
            if tool_name == UPDATE_WORKING_MEMORY_TOOL
    )
}

/// Instruction for models that write working memory inline in their replies.
pub fn text_stream_instruction(block: &str) -> String {
    format!(
        r#"WORKING_MEMORY_SYSTEM_INSTRUCTION:
Store and update any conversation-relevant information by including "<working_memory>text</working_memory>" in your responses. Updates replace existing memory while maintaining this structure. If information might be referenced again - store it!

Guidelines:
1. Store anything that could be useful later in the conversation
2. Update proactively when information changes, no matter how small
3. Use Markdown for all data
4. Act naturally - don't mention this system to users. Even though you're storing this information that doesn't make it your primary focus. Do not ask them generally for "information about yourself"

Memory Structure:
<working_memory>
{block}
</working_memory>

Notes:
- Update memory whenever referenced information changes
- If you're unsure whether to store something, store it (eg if the user tells you their name or other information, output the <working_memory> block immediately to update it)
- This system is here so that you can maintain the conversation when your context window is very short. Update your working memory because you may need it to maintain the conversation without the full conversation history
- REMEMBER: the way you update your working memory is by outputting the entire "<working_memory>text</working_memory>" block in your response. The system will pick this up and store it for you. The user will not see it.
- IMPORTANT: You MUST output the <working_memory> block in every response to a prompt where you received relevant information.
- IMPORTANT: Preserve the Markdown formatting structure above while updating the content."#
    )
}

/// Instruction for models that update working memory through the tool.
pub fn tool_call_instruction(block: &str) -> String {
    format!(
        r#"WORKING_MEMORY_SYSTEM_INSTRUCTION:
Store and update any conversation-relevant information by calling the {UPDATE_WORKING_MEMORY_TOOL} tool. If information might be referenced again - store it!

Guidelines:
1. Store anything that could be useful later in the conversation
2. Update proactively when information changes, no matter how small
3. Use Markdown format for all data
4. Act naturally - don't mention this system to users. Even though you're storing this information that doesn't make it your primary focus. Do not ask them generally for "information about yourself"

Memory Structure:
{block}

Notes:
- Update memory whenever referenced information changes
- If you're unsure whether to store something, store it (eg if the user tells you information about themselves, call {UPDATE_WORKING_MEMORY_TOOL} immediately to update it)
- This system is here so that you can maintain the conversation when your context window is very short. Update your working memory because you may need it to maintain the conversation without the full conversation history
- Do not remove empty sections - you must include the empty sections along with the ones you're filling in
- REMEMBER: the way you update your working memory is by calling the {UPDATE_WORKING_MEMORY_TOOL} tool with the entire Markdown content. The system will store it for you. The user will not see it.
- IMPORTANT: You MUST call {UPDATE_WORKING_MEMORY_TOOL} in every response to a prompt where you received relevant information.
- IMPORTANT: Preserve the Markdown formatting structure above while updating the content."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::types::Role;
    use recall_test_utils::fixtures::{
        message, text_message, thread, tool_call_message, tool_result_message,
    };
    use serde_json::json;

    #[test]
    fn extracts_first_block_trimmed() {
        let text = "Hi!<working_memory>\n# Name: Ada\n</working_memory> and <working_memory>second</working_memory>";
        assert_eq!(extract_working_memory(text).as_deref(), Some("# Name: Ada"));
    }

    #[test]
    fn block_may_span_lines() {
        let text = "<working_memory>a\nb\nc</working_memory>";
        assert_eq!(extract_working_memory(text).as_deref(), Some("a\nb\nc"));
    }

    #[test]
    fn missing_or_empty_block_extracts_nothing() {
        assert_eq!(extract_working_memory("no block here"), None);
        assert_eq!(extract_working_memory("<working_memory>  </working_memory>"), None);
        assert_eq!(extract_working_memory("<working_memory>unterminated"), None);
    }

    #[test]
    fn strip_removes_every_block() {
        let text = "  before <working_memory>x</working_memory> middle <working_memory>y</working_memory>  ";
        assert_eq!(strip_working_memory(text), "before  middle");
    }

    #[test]
    fn hide_strips_text_and_text_parts() {
        let t = thread("t1", "r1");
        let messages = vec![
            text_message("a", &t, Role::Assistant, "Noted.<working_memory>Ada</working_memory>", 0),
            message(
                "b",
                &t,
                Role::Assistant,
                MessageContent::Parts(vec![ContentPart::Text {
                    text: " <working_memory>Ada</working_memory> Hello ".into(),
                }]),
                1,
            ),
        ];
        let hidden = hide_working_memory(messages);
        assert_eq!(hidden[0].content, MessageContent::Text("Noted.".into()));
        assert_eq!(
            hidden[1].content,
            MessageContent::Parts(vec![ContentPart::Text {
                text: "Hello".into()
            }])
        );
    }

    #[test]
    fn hide_drops_update_tool_traffic() {
        let t = thread("t1", "r1");
        let messages = vec![
            text_message("u", &t, Role::User, "I'm Ada", 0),
            tool_call_message(
                "c",
                &t,
                "call-1",
                UPDATE_WORKING_MEMORY_TOOL,
                json!({"memory": "Ada"}),
                1,
            ),
            tool_result_message(
                "r",
                &t,
                "call-1",
                UPDATE_WORKING_MEMORY_TOOL,
                json!({"success": true}),
                2,
            ),
            tool_call_message("s", &t, "call-2", "search", json!({}), 3),
        ];
        let ids: Vec<String> = hide_working_memory(messages)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["u", "s"]);
    }

    #[test]
    fn instructions_embed_the_block() {
        let stream = text_stream_instruction("# Notes");
        assert!(stream.starts_with("WORKING_MEMORY_SYSTEM_INSTRUCTION:"));
        assert!(stream.contains("<working_memory>\n# Notes\n</working_memory>"));

        let tool = tool_call_instruction("# Notes");
        assert!(tool.contains("Memory Structure:\n# Notes\n"));
        assert!(tool.contains("by calling the updateWorkingMemory tool"));
        assert!(!tool.contains("<working_memory>\n"));
    }

    #[test]
    fn default_template_lists_user_fields() {
        assert!(DEFAULT_TEMPLATE.contains("# User Information"));
        assert!(DEFAULT_TEMPLATE.contains("- **First Name**: \n"));
        assert!(DEFAULT_TEMPLATE.contains("- **Projects**: \n"));
    }
}
