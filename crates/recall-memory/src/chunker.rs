// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-bounded text chunking ahead of embedding.

/// Approximate characters per token used to turn a token budget into a
/// character budget.
pub const CHARS_PER_TOKEN: usize = 4;

/// Token budget per chunk for message embeddings.
pub const DEFAULT_CHUNK_TOKENS: usize = 4096;

/// Greedily packs whitespace-separated words into chunks of at most
/// `token_budget * CHARS_PER_TOKEN` characters, joined by single spaces.
///
/// A word longer than the whole budget gets a chunk of its own rather than
/// being split. Blank input produces no chunks.
pub fn chunk_text(text: &str, token_budget: usize) -> Vec<String> {
    let char_budget = token_budget.saturating_mul(CHARS_PER_TOKEN);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if current.is_empty() {
            current.push_str(word);
        } else if current_len + 1 + word_len > char_budget {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello  there\nworld", 10), vec!["hello there world"]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_text("   \n\t", 10).is_empty());
    }

    #[test]
    fn splits_at_the_character_budget() {
        // Budget of 2 tokens = 8 characters.
        assert_eq!(
            chunk_text("abc def ghi jk", 2),
            vec!["abc def", "ghi jk"]
        );
    }

    #[test]
    fn oversized_word_stands_alone() {
        assert_eq!(
            chunk_text("a supercalifragilistic b", 1),
            vec!["a", "supercalifragilistic", "b"]
        );
    }

    fn word() -> impl Strategy<Value = String> {
        "[a-z]{1,4}"
    }

    proptest! {
        #[test]
        fn chunks_respect_budget_and_preserve_words(
            words in prop::collection::vec(word(), 0..40),
            budget in 1usize..6,
        ) {
            let text = words.join(" ");
            let chunks = chunk_text(&text, budget);
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= budget * CHARS_PER_TOKEN);
            }
            let rebuilt: Vec<&str> = chunks.iter().flat_map(|c| c.split(' ')).collect();
            let original: Vec<&str> = text.split_whitespace().collect();
            prop_assert_eq!(rebuilt, original);
        }
    }
}
