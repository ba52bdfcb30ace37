//! Integration tests for text analysis, history, reports and chat

mod common;

use axum::http::StatusCode;
use common::{TestApp, TestOptions, STUB_REPLY};
use serde_json::{json, Value};

async fn app_with_ai() -> TestApp {
    TestApp::with_options(TestOptions {
        with_ai: true,
        ..Default::default()
    })
    .await
}

fn labels(results: &Value) -> Vec<String> {
    results
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["sentiment"]["label"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_batch_labels_follow_classifier() {
    let app = TestApp::new().await;
    let token = app.register("batch@example.com", "secret123").await;

    let (status, json) = app
        .post(
            "/api/analysis/batch",
            Some(&token),
            json!({"texts": ["I love it", "I hate it", "It is fine"]}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(labels(&data["results"]), vec!["positive", "negative", "neutral"]);
    assert_eq!(data["statistics"]["total"], 3);
    assert_eq!(data["statistics"]["positive"], 1);
    assert!(data["analysisId"].is_string());
    assert!(data.get("aiInsights").is_none());
}

#[tokio::test]
async fn test_batch_item_failure_does_not_abort() {
    let app = TestApp::new().await;
    let token = app.register("fail@example.com", "secret123").await;

    let (status, json) = app
        .post(
            "/api/analysis/batch",
            Some(&token),
            json!({"texts": ["I love it", "   ", "this will fail"]}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = &json["data"]["results"];
    assert_eq!(labels(results), vec!["positive", "error"]);
    assert_eq!(results[1]["sentiment"]["score"], 0.0);
    assert_eq!(results[1]["keywords"], json!([]));
    assert_eq!(json["data"]["statistics"]["error"], 1);
}

#[tokio::test]
async fn test_batch_limits() {
    let app = TestApp::new().await;
    let token = app.register("limits@example.com", "secret123").await;

    let (status, _) = app
        .post("/api/analysis/batch", Some(&token), json!({"texts": []}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let texts: Vec<String> = (0..101).map(|i| format!("text {}", i)).collect();
    let (status, json) = app
        .post("/api/analysis/batch", Some(&token), json!({"texts": texts}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Maximum 100 texts per batch");
    assert_eq!(app.classifier_calls(), 0);
}

#[tokio::test]
async fn test_single_analysis_is_saved_with_matching_counts() {
    let app = TestApp::new().await;
    let token = app.register("single@example.com", "secret123").await;

    let (status, json) = app
        .post("/api/analysis/analyze", Some(&token), json!({"text": "I love this phone"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["sentiment"]["label"], "positive");
    assert_eq!(json["data"]["keywords"], json!(["love", "phone"]));
    let id = json["data"]["analysisId"].as_str().unwrap().to_string();

    let (status, json) = app
        .get(&format!("/api/analysis/history/{}", id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let analysis = &json["data"];
    assert_eq!(analysis["inputType"], "text");
    assert_eq!(analysis["totalItems"], 1);
    assert_eq!(analysis["positiveCount"], 1);
    assert_eq!(analysis["items"].as_array().unwrap().len(), 1);
    assert_eq!(analysis["items"][0]["sentimentLabel"], "positive");

    let (status, json) = app
        .post("/api/analysis/analyze", Some(&token), json!({"text": "   "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Text cannot be empty");
}

#[tokio::test]
async fn test_saved_counts_equal_item_labels() {
    let app = TestApp::new().await;
    let token = app.register("counts@example.com", "secret123").await;

    let (_, json) = app
        .post(
            "/api/analysis/batch",
            Some(&token),
            json!({"texts": ["love", "love it", "hate", "meh", "fail now"], "title": "Mixed"}),
        )
        .await;
    let id = json["data"]["analysisId"].as_str().unwrap().to_string();

    let (_, json) = app
        .get(&format!("/api/analysis/history/{}", id), Some(&token))
        .await;
    let analysis = &json["data"];
    let items = analysis["items"].as_array().unwrap();
    let count = |label: &str| items.iter().filter(|i| i["sentimentLabel"] == label).count() as i64;

    assert_eq!(analysis["title"], "Mixed");
    assert_eq!(analysis["totalItems"].as_i64().unwrap(), items.len() as i64);
    assert_eq!(analysis["positiveCount"].as_i64().unwrap(), count("positive"));
    assert_eq!(analysis["negativeCount"].as_i64().unwrap(), count("negative"));
    assert_eq!(analysis["neutralCount"].as_i64().unwrap(), count("neutral"));
    assert_eq!(count("error"), 1);
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let app = TestApp::new().await;
    let token = app.register("del@example.com", "secret123").await;
    let other = app.register("other@example.com", "secret123").await;

    let (_, json) = app
        .post("/api/analysis/analyze", Some(&token), json!({"text": "I hate waiting"}))
        .await;
    let uri = format!("/api/analysis/history/{}", json["data"]["analysisId"].as_str().unwrap());

    let (status, _) = app.get(&uri, Some(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, Some(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = app.delete(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Analysis deleted successfully");

    let (status, json) = app.delete(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Analysis not found");
}

#[tokio::test]
async fn test_history_pagination() {
    let app = TestApp::new().await;
    let token = app.register("pages@example.com", "secret123").await;

    for text in ["I love one", "I love two", "I love three"] {
        app.post("/api/analysis/analyze", Some(&token), json!({"text": text}))
            .await;
    }

    let (status, json) = app
        .get("/api/analysis/history?page=1&limit=2", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = &json["data"];
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["title"], "I love three");
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["totalPages"], 2);

    let (_, json) = app
        .get("/api/analysis/history?page=2&limit=2", Some(&token))
        .await;
    assert_eq!(json["data"]["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reports_aggregate_across_analyses() {
    let app = TestApp::new().await;
    let token = app.register("reports@example.com", "secret123").await;

    app.post(
        "/api/analysis/batch",
        Some(&token),
        json!({"texts": ["love", "hate"]}),
    )
    .await;
    app.post(
        "/api/analysis/batch",
        Some(&token),
        json!({"texts": ["love", "meh", "meh"]}),
    )
    .await;

    let (status, json) = app.get("/api/analysis/reports", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let report = &json["data"];
    assert_eq!(report["totalAnalyses"], 2);
    assert_eq!(report["totalItems"], 5);
    assert_eq!(report["positive"], 2);
    assert_eq!(report["negative"], 1);
    assert_eq!(report["neutral"], 2);
    // (0.9 + 0.8 + 0.9 + 0.6 + 0.6) / 5
    assert_eq!(report["averageScore"], 0.76);
    assert!(report["period"]["startDate"].is_null());

    let (status, json) = app
        .get("/api/analysis/reports?startDate=2000-01-01&endDate=2000-01-31", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["totalAnalyses"], 0);
    assert_eq!(json["data"]["period"]["startDate"], "2000-01-01");

    let (status, _) = app
        .get("/api/analysis/reports?startDate=someday", Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deep_analysis_requires_language_model() {
    let app = TestApp::new().await;
    let token = app.register("nodeep@example.com", "secret123").await;

    let (status, json) = app
        .post("/api/analysis/deep", Some(&token), json!({"texts": ["I love it"]}))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["message"], "AI service is not available");
}

#[tokio::test]
async fn test_deep_analysis_with_language_model() {
    let app = app_with_ai().await;
    let token = app.register("deep@example.com", "secret123").await;

    let texts: Vec<String> = (0..23).map(|i| format!("review number {}", i)).collect();
    let (status, json) = app
        .post("/api/analysis/deep", Some(&token), json!({"texts": texts}))
        .await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["results"].as_array().unwrap().len(), 23);
    assert_eq!(data["deepResults"].as_array().unwrap().len(), 23);
    assert_eq!(data["deepResults"][22]["text"], "review number 22");
    assert_eq!(data["deepResults"][0]["keyPhrases"], json!(["great"]));
    assert_eq!(data["statistics"]["positive"], 23);
    assert_eq!(app.classifier_calls(), 0);
}

#[tokio::test]
async fn test_explain_and_insights() {
    let app = app_with_ai().await;
    let token = app.register("explain@example.com", "secret123").await;

    let (status, json) = app
        .post("/api/analysis/explain", Some(&token), json!({"text": "I hate the wait"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["sentiment"]["label"], "negative");
    assert_eq!(json["data"]["explanation"], STUB_REPLY);

    let (_, json) = app
        .post(
            "/api/analysis/batch",
            Some(&token),
            json!({"texts": ["I love it"], "generateInsights": true}),
        )
        .await;
    assert_eq!(json["data"]["aiInsights"], STUB_REPLY);
}

#[tokio::test]
async fn test_chat_round_trip() {
    let app = app_with_ai().await;
    let token = app.register("chat@example.com", "secret123").await;

    let (_, json) = app
        .post("/api/analysis/batch", Some(&token), json!({"texts": ["I love it", "I hate it"]}))
        .await;
    let id = json["data"]["analysisId"].as_str().unwrap().to_string();

    let (status, json) = app
        .post(
            "/api/analysis/chat",
            Some(&token),
            json!({"analysisId": id, "message": "What do people dislike?"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["reply"], STUB_REPLY);

    let (status, json) = app
        .get(&format!("/api/analysis/history/{}/chat", id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let messages = json["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "What do people dislike?");
    assert_eq!(messages[1]["role"], "assistant");

    let (status, _) = app
        .post(
            "/api/analysis/chat",
            Some(&token),
            json!({"analysisId": "missing", "message": "Hello?"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
