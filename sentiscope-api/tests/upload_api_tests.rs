//! Integration tests for CSV and image uploads

mod common;

use axum::http::StatusCode;
use common::{TestApp, TestOptions};

const CSV: &[u8] = b"opinion,stars\nI love it,5\nI hate it,1\n,3\nIt is fine,3\n";

#[tokio::test]
async fn test_csv_falls_back_to_first_column() {
    let app = TestApp::new().await;
    let token = app.register("csv@example.com", "secret123").await;

    let (status, json) = app
        .upload("/api/analysis/csv", &token, "feedback.csv", CSV, &[])
        .await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    let data = &json["data"];
    assert_eq!(data["textColumn"]["name"], "opinion");
    assert_eq!(data["textColumn"]["matchedBy"], "first-column");
    assert_eq!(data["totalRows"], 3);
    assert_eq!(data["results"].as_array().unwrap().len(), 3);
    assert_eq!(data["statistics"]["negative"], 1);
    assert!(data["analysisId"].is_string());
    assert_eq!(app.temp_upload_count(), 0);
}

#[tokio::test]
async fn test_csv_named_column_and_stored_original() {
    let app = TestApp::new().await;
    let token = app.register("csv2@example.com", "secret123").await;
    let csv = b"id,Review\n1,I love the fabric\n2,hate the zipper\n";

    let (status, json) = app
        .upload(
            "/api/analysis/csv",
            &token,
            "Reviews.CSV",
            csv,
            &[("title", "Jacket reviews")],
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["data"]["textColumn"]["name"], "Review");
    assert_eq!(json["data"]["textColumn"]["matchedBy"], "case-insensitive");

    let file_url = json["data"]["fileUrl"].as_str().unwrap().to_string();
    assert!(file_url.starts_with("/files/"));

    let id = json["data"]["analysisId"].as_str().unwrap();
    let (_, json) = app
        .get(&format!("/api/analysis/history/{}", id), Some(&token))
        .await;
    assert_eq!(json["data"]["title"], "Jacket reviews");
    assert_eq!(json["data"]["inputType"], "csv");
    assert_eq!(json["data"]["fileUrl"], file_url.as_str());
}

#[tokio::test]
async fn test_stored_original_is_private_to_its_owner() {
    let app = TestApp::new().await;
    let token = app.register("owner@example.com", "secret123").await;
    let other = app.register("stranger@example.com", "secret123").await;
    let csv = b"text\nI love the private data\n";

    let (status, json) = app
        .upload("/api/analysis/csv", &token, "private.csv", csv, &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    let file_url = json["data"]["fileUrl"].as_str().unwrap().to_string();

    let (status, json) = app.get(&file_url, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Access token required");

    let (status, _) = app.get(&file_url, Some(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, bytes, content_type) = app.download(&file_url, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, csv.to_vec());
    assert!(content_type.starts_with("text/csv"));
}

#[tokio::test]
async fn test_csv_without_text_is_rejected() {
    let app = TestApp::new().await;
    let token = app.register("empty@example.com", "secret123").await;

    let (status, json) = app
        .upload("/api/analysis/csv", &token, "blank.csv", b"text\n \n\n", &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "No valid text found in CSV");
    assert_eq!(app.temp_upload_count(), 0);
}

#[tokio::test]
async fn test_wrong_extension_rejected_before_classifier() {
    let app = TestApp::new().await;
    let token = app.register("ext@example.com", "secret123").await;

    let (status, json) = app
        .upload("/api/analysis/csv", &token, "notes.txt", CSV, &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Only CSV files are allowed");

    let (status, json) = app
        .upload("/api/analysis/image", &token, "scan.pdf", b"%PDF", &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Only image files (JPG, PNG, GIF, BMP, WEBP) are allowed");

    assert_eq!(app.classifier_calls(), 0);
    assert_eq!(app.temp_upload_count(), 0);
}

#[tokio::test]
async fn test_oversize_upload_rejected_before_classifier() {
    let app = TestApp::with_options(TestOptions {
        max_upload_bytes: 1024,
        ..Default::default()
    })
    .await;
    let token = app.register("big@example.com", "secret123").await;

    let mut csv = b"text\n".to_vec();
    while csv.len() <= 4096 {
        csv.extend_from_slice(b"I love this product a lot\n");
    }

    let (status, json) = app
        .upload("/api/analysis/csv", &token, "big.csv", &csv, &[])
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
    assert_eq!(app.classifier_calls(), 0);
    assert_eq!(app.temp_upload_count(), 0);
}

#[tokio::test]
async fn test_image_lines_without_language_model() {
    let app = TestApp::new().await;
    let token = app.register("img@example.com", "secret123").await;

    let (status, json) = app
        .upload("/api/analysis/image", &token, "shot.PNG", b"\x89PNG fake", &[])
        .await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    let results = json["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["text"], "Great seller");
    assert_eq!(results[1]["sentiment"]["label"], "negative");
    assert!(results[0].get("metadata").is_none());
    assert!(json["data"]["extractedText"].as_str().unwrap().contains("Great seller"));
    assert_eq!(app.temp_upload_count(), 0);
}

#[tokio::test]
async fn test_image_comments_keep_author_metadata() {
    let app = TestApp::with_options(TestOptions {
        with_ai: true,
        ..Default::default()
    })
    .await;
    let token = app.register("img2@example.com", "secret123").await;

    let (status, json) = app
        .upload(
            "/api/analysis/image",
            &token,
            "comments.jpg",
            b"jpeg bytes",
            &[("generateInsights", "false")],
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    let results = json["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["metadata"]["username"], "@ana");
    assert_eq!(results[0]["sentiment"]["label"], "positive");
    assert_eq!(results[1]["metadata"]["username"], "Unknown User");
    assert_eq!(results[1]["metadata"]["timestamp"], "Unknown Time");
    assert!(json["data"].get("aiInsights").is_none());
}

#[tokio::test]
async fn test_image_without_text() {
    let app = TestApp::with_options(TestOptions {
        ocr_text: "  \n ".to_string(),
        ..Default::default()
    })
    .await;
    let token = app.register("blank@example.com", "secret123").await;

    let (status, json) = app
        .upload("/api/analysis/image", &token, "blank.webp", b"webp", &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "No text found in image");
    assert_eq!(app.classifier_calls(), 0);
}
