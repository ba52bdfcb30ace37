//! Sentiment label vocabulary shared by the classifier, the AI pipeline and
//! the database layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentiment label attached to one scored text
///
/// `Error` is a sentinel for items whose classification failed; it is never
/// produced by a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Error,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Error => "error",
        }
    }

    /// Map a free-form model label onto the three classifier labels
    ///
    /// Matching is case-insensitive and substring based, so `"Very Positive"`
    /// maps to `Positive` and `"mixed"` maps to `Neutral`. Returns `None` for
    /// labels that match nothing; callers decide how to degrade.
    pub fn from_model_label(label: &str) -> Option<Self> {
        let lower = label.to_lowercase();

        if lower.contains("positive") {
            Some(SentimentLabel::Positive)
        } else if lower.contains("negative") {
            Some(SentimentLabel::Negative)
        } else if lower.contains("neutral") || lower.contains("mixed") {
            Some(SentimentLabel::Neutral)
        } else {
            None
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            "error" => Ok(SentimentLabel::Error),
            other => Err(format!("Unknown sentiment label: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_label_mapping() {
        let cases = [
            ("positive", Some(SentimentLabel::Positive)),
            ("Very Positive", Some(SentimentLabel::Positive)),
            ("NEGATIVE", Some(SentimentLabel::Negative)),
            ("very negative", Some(SentimentLabel::Negative)),
            ("Neutral", Some(SentimentLabel::Neutral)),
            ("mixed", Some(SentimentLabel::Neutral)),
            ("LABEL_2", None),
        ];

        for (input, expected) in cases {
            assert_eq!(SentimentLabel::from_model_label(input), expected, "label {input}");
        }
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&SentimentLabel::Error).unwrap();
        assert_eq!(json, "\"error\"");
        let parsed: SentimentLabel = serde_json::from_str("\"neutral\"").unwrap();
        assert_eq!(parsed, SentimentLabel::Neutral);
    }
}
