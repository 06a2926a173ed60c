// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-retrieval message processors.
//!
//! Processors run in registration order over the recalled history before it
//! is handed to a model. Each one receives the output of the previous.

use recall_core::types::{ContentPart, Message, MessageContent};
use tracing::debug;

/// Prompt material surrounding the history being processed.
#[derive(Debug, Clone, Default)]
pub struct ProcessorContext {
    pub system_message: Option<String>,
    /// Working-memory instruction contributed by the memory engine.
    pub memory_system_message: Option<String>,
    /// Messages of the current turn, not yet persisted.
    pub new_messages: Vec<Message>,
}

/// A transformation over recalled messages.
pub trait MessageProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, messages: Vec<Message>, context: &ProcessorContext) -> Vec<Message>;
}

/// Rough token count: 1.3 tokens per whitespace-separated word, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * 13).div_ceil(10)
}

fn message_tokens(message: &Message) -> usize {
    match &message.content {
        MessageContent::Text(text) => estimate_tokens(text),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => estimate_tokens(text),
                ContentPart::ToolCall {
                    tool_name, args, ..
                } => estimate_tokens(tool_name) + estimate_tokens(&args.to_string()),
                ContentPart::ToolResult {
                    tool_name, result, ..
                } => estimate_tokens(tool_name) + estimate_tokens(&result.to_string()),
            })
            .sum(),
    }
}

/// Keeps the newest messages that fit a token budget.
///
/// The system and memory instructions are charged against the budget first.
/// Messages are then admitted newest to oldest until the next one would
/// overflow; everything older is dropped.
pub struct TokenLimiter {
    max_tokens: usize,
}

impl TokenLimiter {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }
}

impl MessageProcessor for TokenLimiter {
    fn name(&self) -> &str {
        "token-limiter"
    }

    fn process(&self, messages: Vec<Message>, context: &ProcessorContext) -> Vec<Message> {
        let mut used: usize = [&context.system_message, &context.memory_system_message]
            .into_iter()
            .flatten()
            .map(|text| estimate_tokens(text))
            .sum();

        let total = messages.len();
        let mut kept = 0;
        for message in messages.iter().rev() {
            let cost = message_tokens(message);
            if used + cost > self.max_tokens {
                break;
            }
            used += cost;
            kept += 1;
        }

        if kept < total {
            debug!(
                dropped = total - kept,
                budget = self.max_tokens,
                "token limiter trimmed history"
            );
        }
        messages.into_iter().skip(total - kept).collect()
    }
}

/// Removes tool calls and results from recalled history.
///
/// With no names configured every tool is filtered; otherwise only the named
/// ones. A message left with no parts is dropped.
pub struct ToolCallFilter {
    exclude: Option<Vec<String>>,
}

impl ToolCallFilter {
    /// Filters every tool.
    pub fn all() -> Self {
        Self { exclude: None }
    }

    /// Filters only the named tools.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    fn excludes(&self, tool_name: &str) -> bool {
        self.exclude
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == tool_name))
    }
}

impl MessageProcessor for ToolCallFilter {
    fn name(&self) -> &str {
        "tool-call-filter"
    }

    fn process(&self, messages: Vec<Message>, _context: &ProcessorContext) -> Vec<Message> {
        messages
            .into_iter()
            .filter_map(|mut message| {
                let MessageContent::Parts(parts) = message.content else {
                    return Some(message);
                };
                let kept: Vec<ContentPart> = parts
                    .into_iter()
                    .filter(|part| !part.tool_name().is_some_and(|name| self.excludes(name)))
                    .collect();
                if kept.is_empty() {
                    return None;
                }
                message.content = MessageContent::Parts(kept);
                Some(message)
            })
            .collect()
    }
}

/// Runs `processors` over `messages` in order.
pub fn apply_processors(
    messages: Vec<Message>,
    processors: &[std::sync::Arc<dyn MessageProcessor>],
    context: &ProcessorContext,
) -> Vec<Message> {
    processors.iter().fold(messages, |messages, processor| {
        debug!(processor = processor.name(), "applying message processor");
        processor.process(messages, context)
    })
}
