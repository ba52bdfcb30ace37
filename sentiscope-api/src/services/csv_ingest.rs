//! CSV ingestion
//!
//! Parses an uploaded CSV with headers, finds the column that holds free
//! text and extracts its non-empty cells.
//!
//! Column lookup falls through: exact name, case-insensitive name, substring
//! match in either direction, a language-model guess, then the first column.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::ai::AiService;
use super::sentiment::MAX_BATCH_SIZE;
use crate::error::ApiError;

/// Column names tried when the client does not name one
pub const DEFAULT_TEXT_COLUMNS: &[&str] = &["text", "comment", "review", "content", "message"];

/// Parsed CSV contents
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// First `n` rows keyed by header, for prompting
    pub fn sample_rows(&self, n: usize) -> Vec<BTreeMap<String, String>> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                self.headers
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// How the text column was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnMatch {
    Exact,
    CaseInsensitive,
    Substring,
    Ai,
    FirstColumn,
}

/// Chosen column plus how it was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextColumn {
    pub index: usize,
    pub name: String,
    pub matched_by: ColumnMatch,
}

/// Texts pulled from a CSV
#[derive(Debug, Clone)]
pub struct ExtractedTexts {
    pub texts: Vec<String>,
    /// Non-empty cells before truncation
    pub available: usize,
}

pub fn parse_csv(bytes: &[u8]) -> Result<CsvTable, ApiError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ApiError::bad_request(format!("Invalid CSV file: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ApiError::bad_request(format!("Invalid CSV file: {}", e)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    tracing::debug!(columns = headers.len(), rows = rows.len(), "Parsed CSV");
    Ok(CsvTable { headers, rows })
}

/// Parse a CSV file on the blocking pool
pub async fn parse_csv_file(path: &Path) -> Result<CsvTable, ApiError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path)?;
        parse_csv(&bytes)
    })
    .await
    .map_err(|e| ApiError::internal(format!("CSV parsing task failed: {}", e)))?
}

/// Name-based column lookup without the AI or first-column fallbacks
pub fn match_column_by_name(headers: &[String], candidates: &[String]) -> Option<TextColumn> {
    let found = |index: usize, matched_by| TextColumn {
        index,
        name: headers[index].clone(),
        matched_by,
    };

    for candidate in candidates {
        if let Some(i) = headers.iter().position(|h| h == candidate) {
            return Some(found(i, ColumnMatch::Exact));
        }
    }

    for candidate in candidates {
        if let Some(i) = headers.iter().position(|h| h.eq_ignore_ascii_case(candidate)) {
            return Some(found(i, ColumnMatch::CaseInsensitive));
        }
    }

    for candidate in candidates {
        let wanted = candidate.to_lowercase();
        if wanted.is_empty() {
            continue;
        }
        if let Some(i) = headers.iter().position(|h| {
            let header = h.to_lowercase();
            !header.is_empty() && (header.contains(&wanted) || wanted.contains(&header))
        }) {
            return Some(found(i, ColumnMatch::Substring));
        }
    }

    None
}

/// Choose the text column, consulting the language model only if names fail
pub async fn select_text_column(
    table: &CsvTable,
    requested: Option<&str>,
    ai: &AiService,
    use_ai: bool,
) -> Result<TextColumn, ApiError> {
    if table.headers.is_empty() {
        return Err(ApiError::bad_request("No valid text found in CSV"));
    }

    let candidates: Vec<String> = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => vec![name.to_string()],
        None => DEFAULT_TEXT_COLUMNS.iter().map(|s| s.to_string()).collect(),
    };

    if let Some(column) = match_column_by_name(&table.headers, &candidates) {
        return Ok(column);
    }

    if use_ai && ai.is_available() {
        match ai.detect_text_column(&table.headers, &table.sample_rows(3)).await {
            Ok(name) => {
                if let Some(index) = table.headers.iter().position(|h| *h == name) {
                    return Ok(TextColumn {
                        index,
                        name,
                        matched_by: ColumnMatch::Ai,
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e.message, "AI column detection failed"),
        }
    }

    tracing::info!(column = %table.headers[0], "Falling back to first CSV column");
    Ok(TextColumn {
        index: 0,
        name: table.headers[0].clone(),
        matched_by: ColumnMatch::FirstColumn,
    })
}

/// Non-empty cells of `column`, truncated to the batch limit
pub fn extract_texts(table: &CsvTable, column: usize) -> Result<ExtractedTexts, ApiError> {
    let mut texts: Vec<String> = table
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect();

    if texts.is_empty() {
        return Err(ApiError::bad_request("No valid text found in CSV"));
    }

    let available = texts.len();
    if available > MAX_BATCH_SIZE {
        tracing::warn!(
            available,
            kept = MAX_BATCH_SIZE,
            "CSV has more texts than one batch allows, truncating"
        );
        texts.truncate(MAX_BATCH_SIZE);
    }

    Ok(ExtractedTexts { texts, available })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::openai_client::{CompletionRequest, LanguageModel};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedAnswer(&'static str);

    #[async_trait]
    impl LanguageModel for FixedAnswer {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, ApiError> {
            Ok(self.0.to_string())
        }
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_csv_with_bom_and_quotes() {
        let table = parse_csv("\u{feff}id,Review\n1,\"Great, fast shipping\"\n2,  slow  \n".as_bytes()).unwrap();
        assert_eq!(table.headers, headers(&["id", "Review"]));
        assert_eq!(table.rows[0][1], "Great, fast shipping");
        assert_eq!(table.rows[1][1], "slow");
    }

    #[test]
    fn test_match_order() {
        let cols = headers(&["Text", "text", "full_text_body"]);
        let m = match_column_by_name(&cols, &headers(&["text"])).unwrap();
        assert_eq!((m.index, m.matched_by), (1, ColumnMatch::Exact));

        let cols = headers(&["id", "COMMENT"]);
        let m = match_column_by_name(&cols, &headers(&["comment"])).unwrap();
        assert_eq!((m.index, m.matched_by), (1, ColumnMatch::CaseInsensitive));

        let cols = headers(&["id", "customer_review_text"]);
        let m = match_column_by_name(&cols, &headers(&["review"])).unwrap();
        assert_eq!((m.index, m.matched_by), (1, ColumnMatch::Substring));

        assert!(match_column_by_name(&headers(&["a", "b"]), &headers(&["text"])).is_none());
    }

    #[tokio::test]
    async fn test_unrecognized_column_falls_back_to_first() {
        let table = parse_csv(b"ulasan,rating\nbagus sekali,5\n").unwrap();
        let column = select_text_column(&table, None, &AiService::new(None), true)
            .await
            .unwrap();
        assert_eq!(column.index, 0);
        assert_eq!(column.matched_by, ColumnMatch::FirstColumn);
    }

    #[tokio::test]
    async fn test_invalid_ai_guess_falls_back_to_first() {
        let table = parse_csv(b"ulasan,rating\nbagus sekali,5\n").unwrap();
        let ai = AiService::new(Some(Arc::new(FixedAnswer("nonexistent"))));
        let column = select_text_column(&table, None, &ai, true).await.unwrap();
        assert_eq!(column.matched_by, ColumnMatch::FirstColumn);
    }

    #[tokio::test]
    async fn test_ai_guess_used_when_valid() {
        let table = parse_csv(b"rating,ulasan\n5,bagus sekali\n").unwrap();
        let ai = AiService::new(Some(Arc::new(FixedAnswer("ulasan"))));

        let column = select_text_column(&table, None, &ai, true).await.unwrap();
        assert_eq!((column.index, column.matched_by), (1, ColumnMatch::Ai));

        // Disabled per request
        let column = select_text_column(&table, None, &ai, false).await.unwrap();
        assert_eq!(column.matched_by, ColumnMatch::FirstColumn);
    }

    #[test]
    fn test_extract_texts_skips_blank_and_truncates() {
        let mut body = String::from("text\n");
        for i in 0..120 {
            body.push_str(&format!("review {}\n", i));
            body.push_str("\"\"\n");
        }
        let table = parse_csv(body.as_bytes()).unwrap();
        let extracted = extract_texts(&table, 0).unwrap();

        assert_eq!(extracted.available, 120);
        assert_eq!(extracted.texts.len(), MAX_BATCH_SIZE);
        assert_eq!(extracted.texts[0], "review 0");
    }

    #[tokio::test]
    async fn test_parse_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(&path, "comment\nFast delivery\n").unwrap();

        let table = parse_csv_file(&path).await.unwrap();
        assert_eq!(table.rows.len(), 1);
        assert!(parse_csv_file(&dir.path().join("missing.csv")).await.is_err());
    }

    #[test]
    fn test_extract_texts_empty_column() {
        let table = parse_csv(b"text,other\n,1\n  ,2\n").unwrap();
        let err = extract_texts(&table, 0).unwrap_err();
        assert_eq!(err.message, "No valid text found in CSV");
    }
}
