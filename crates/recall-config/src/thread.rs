// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved per-thread memory configuration.
//!
//! A [`ThreadConfig`] is produced by folding [`MemoryOptions`] layers over
//! the built-in defaults: global defaults, then instance options, then
//! call-time options. Merging is per key and nested tables merge field by
//! field, so a layer that sets only `semantic_recall.top_k` keeps the
//! `message_range` of the layer below.

use crate::model::{
    LastMessages, MemoryOptions, SemanticRecallSetting, WorkingMemoryMode,
};

/// Messages recalled by recency when nothing overrides it.
pub const DEFAULT_LAST_MESSAGES: usize = 10;
/// Hits per query embedding when semantic recall is switched on with `true`.
pub const DEFAULT_TOP_K: usize = 2;
/// Neighbours on each side of a semantic hit.
pub const DEFAULT_MESSAGE_RANGE: usize = 2;

/// Fully resolved memory behaviour for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadConfig {
    /// `None` disables recency recall.
    pub last_messages: Option<usize>,
    /// `None` disables semantic recall.
    pub semantic_recall: Option<SemanticRecall>,
    pub working_memory: WorkingMemory,
    pub generate_title: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticRecall {
    pub top_k: usize,
    pub before: usize,
    pub after: usize,
}

impl Default for SemanticRecall {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            before: DEFAULT_MESSAGE_RANGE,
            after: DEFAULT_MESSAGE_RANGE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingMemory {
    pub enabled: bool,
    /// Custom template; the built-in one applies when `None`.
    pub template: Option<String>,
    pub mode: WorkingMemoryMode,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            last_messages: Some(DEFAULT_LAST_MESSAGES),
            semantic_recall: None,
            working_memory: WorkingMemory::default(),
            generate_title: false,
        }
    }
}

impl ThreadConfig {
    /// Resolves a chain of option layers, lowest precedence first.
    pub fn resolve<'a>(layers: impl IntoIterator<Item = &'a MemoryOptions>) -> Self {
        layers
            .into_iter()
            .fold(Self::default(), |config, layer| config.merged(layer))
    }

    /// Returns a fresh config with `options` layered on top of `self`.
    pub fn merged(&self, options: &MemoryOptions) -> Self {
        let mut next = self.clone();

        match options.last_messages {
            Some(LastMessages::Count(n)) => next.last_messages = Some(n),
            Some(LastMessages::Flag(false)) => next.last_messages = None,
            Some(LastMessages::Flag(true)) => {
                next.last_messages = next.last_messages.or(Some(DEFAULT_LAST_MESSAGES));
            }
            None => {}
        }

        match options.semantic_recall {
            Some(SemanticRecallSetting::Flag(false)) => next.semantic_recall = None,
            Some(SemanticRecallSetting::Flag(true)) => {
                next.semantic_recall = Some(SemanticRecall::default());
            }
            Some(SemanticRecallSetting::Options(opts)) => {
                let mut recall = next.semantic_recall.unwrap_or_default();
                if let Some(top_k) = opts.top_k {
                    recall.top_k = top_k;
                }
                if let Some(range) = opts.message_range {
                    (recall.before, recall.after) = range.bounds();
                }
                next.semantic_recall = Some(recall);
            }
            None => {}
        }

        if let Some(wm) = &options.working_memory {
            if let Some(enabled) = wm.enabled {
                next.working_memory.enabled = enabled;
            }
            if let Some(template) = &wm.template {
                next.working_memory.template = Some(template.clone());
            }
            if let Some(mode) = wm.mode {
                next.working_memory.mode = mode;
            }
        }

        if let Some(generate_title) = options.threads.and_then(|t| t.generate_title) {
            next.generate_title = generate_title;
        }

        next
    }

    /// Whether both recall strategies are switched off.
    pub fn recall_disabled(&self) -> bool {
        self.last_messages.is_none() && self.semantic_recall.is_none()
    }

    /// Whether the model updates working memory through the tool.
    pub fn uses_working_memory_tool(&self) -> bool {
        self.working_memory.enabled && self.working_memory.mode == WorkingMemoryMode::ToolCall
    }
}
