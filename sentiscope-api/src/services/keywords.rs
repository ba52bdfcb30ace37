//! Naive keyword extraction
//!
//! Lower-cases the text, splits on whitespace, strips everything outside
//! `[a-z0-9]`, drops short tokens and stopwords, and de-duplicates while
//! keeping first-occurrence order.

use std::collections::HashSet;

/// English and Indonesian stopwords
const STOPWORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "and", "or", "but", "in", "with", "to", "for", "of", "as",
    "by", "yang", "dan", "di", "ke", "dari", "untuk", "pada", "ini", "itu", "dengan", "adalah",
    "ada", "juga", "tidak", "akan", "bisa", "sudah", "telah", "dapat", "harus", "saya", "aku",
    "kamu", "mereka", "this", "that", "very", "so", "just", "now", "been", "have", "has", "had",
    "do", "does", "did",
];

/// Tokens must be longer than this to count as keywords
const MIN_KEYWORD_LEN: usize = 3;

pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    text.to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                .collect::<String>()
        })
        .filter(|word| word.len() > MIN_KEYWORD_LEN && !STOPWORDS.contains(&word.as_str()))
        .filter(|word| seen.insert(word.clone()))
        .collect()
}
