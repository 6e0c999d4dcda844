//! End-to-end tests for the generation pipeline.
//!
//! Both provider APIs are replaced by `wiremock` servers; the gateway, the
//! HTTP router and the CLI run unmodified against them.

use std::collections::HashMap;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use backlog::server::{build_router, AppState, UNSUPPORTED_FORMAT_MESSAGE};
use backlog::{BacklogGenerator, Config, GenerationRequest, StoryPoints};

const ANALYSIS: &str = "1. Context and objectives\nA gym booking platform.\n2. Functional features\n- Login";

const BACKLOG: &str = "EPIC: Core | Platform basics\n\
    FEATURE: Auth\n\
    STORY: As a user, I want to log in so that I access my data | 3 | 0.375\n\
    STORY: broken line | 3\n";

fn openai_completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-4-turbo-2024-04-09",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150 }
    })
}

fn anthropic_message(text: &str) -> Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4-20250514",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 100, "output_tokens": 50 }
    })
}

struct Providers {
    openai: MockServer,
    anthropic: MockServer,
}

impl Providers {
    async fn start() -> Self {
        Self {
            openai: MockServer::start().await,
            anthropic: MockServer::start().await,
        }
    }

    fn vars(&self, with_openai_key: bool) -> HashMap<String, String> {
        let mut vars = HashMap::from([
            (
                "OPENAI_BASE_URL".to_string(),
                format!("{}/v1/chat/completions", self.openai.uri()),
            ),
            (
                "ANTHROPIC_BASE_URL".to_string(),
                format!("{}/v1/messages", self.anthropic.uri()),
            ),
            ("ANTHROPIC_API_KEY".to_string(), "sk-ant-test".to_string()),
            ("PROVIDER_REQUEST_TIMEOUT_SECS".to_string(), "5".to_string()),
        ]);
        if with_openai_key {
            vars.insert("OPENAI_API_KEY".to_string(), "sk-test".to_string());
        }
        vars
    }

    fn config(&self, with_openai_key: bool) -> Config {
        let vars = self.vars(with_openai_key);
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    /// Answer the analysis prompt and the backlog prompt on the OpenAI mock.
    async fn openai_answers(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("seven sections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion(ANALYSIS)))
            .mount(&self.openai)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("EPIC: <name>"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion(BACKLOG)))
            .mount(&self.openai)
            .await;
    }
}

fn request() -> GenerationRequest {
    GenerationRequest::new(
        "Plateforme de réservation pour salles de sport",
        vec!["Symfony".to_string(), "React".to_string()],
        "Expert",
    )
    .unwrap()
}

#[tokio::test]
async fn test_primary_provider_generates_backlog() {
    let providers = Providers::start().await;
    providers.openai_answers().await;

    let generator = BacklogGenerator::from_config(&providers.config(true)).unwrap();
    let outcome = generator.generate(&request()).await.unwrap();

    assert!(!outcome.degraded);
    assert_eq!(outcome.analysis, ANALYSIS);
    assert_eq!(outcome.backlog_text, BACKLOG);

    let backlog = &outcome.report.backlog;
    assert_eq!(backlog.epics.len(), 1);
    assert_eq!(backlog.epics[0].description, "Platform basics");
    let story = &backlog.epics[0].features[0].stories[0];
    assert_eq!(story.points, StoryPoints::Three);
    assert_eq!(outcome.report.rejected.len(), 1);

    let requests = providers.openai.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        let body: Value = request.body_json().unwrap();
        assert_eq!(body["model"], "gpt-4-turbo");
        assert_eq!(body["seed"], outcome.seed.value());
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(
            request.headers.get("authorization").unwrap(),
            "Bearer sk-test"
        );
    }
    assert!(providers
        .anthropic
        .received_requests()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_primary_failure_falls_back_at_zero_temperature() {
    let providers = Providers::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": { "message": "upstream exploded" } })),
        )
        .expect(2)
        .mount(&providers.openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header_eq("x-api-key", "sk-ant-test"))
        .and(header_eq("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({ "temperature": 0.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_message(BACKLOG)))
        .expect(2)
        .mount(&providers.anthropic)
        .await;

    let generator = BacklogGenerator::from_config(&providers.config(true)).unwrap();
    let outcome = generator.generate(&request()).await.unwrap();

    assert!(!outcome.degraded);
    assert_eq!(outcome.report.backlog.story_count(), 1);

    // The fallback receives the same prompt: system text moves to `system`,
    // the user message is unchanged, and no seed is sent.
    let primary = providers.openai.received_requests().await.unwrap();
    let secondary = providers.anthropic.received_requests().await.unwrap();
    let primary_body: Value = primary[0].body_json().unwrap();
    let secondary_body: Value = secondary[0].body_json().unwrap();
    assert_eq!(secondary_body["system"], primary_body["messages"][0]["content"]);
    assert_eq!(
        secondary_body["messages"][0]["content"],
        primary_body["messages"][1]["content"]
    );
    assert!(secondary_body.get("seed").is_none());
}

#[tokio::test]
async fn test_missing_primary_key_goes_straight_to_fallback() {
    let providers = Providers::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion(BACKLOG)))
        .expect(0)
        .mount(&providers.openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_message(BACKLOG)))
        .expect(2)
        .mount(&providers.anthropic)
        .await;

    let generator = BacklogGenerator::from_config(&providers.config(false)).unwrap();
    let outcome = generator.generate(&request()).await.unwrap();

    assert!(!outcome.degraded);
    assert_eq!(outcome.report.backlog.epics[0].name, "Core");
}

#[tokio::test]
async fn test_both_providers_failing_returns_diagnostic() {
    let providers = Providers::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({ "error": { "message": "service unavailable" } })),
        )
        .mount(&providers.openai)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": { "type": "overloaded_error", "message": "Overloaded" }
        })))
        .mount(&providers.anthropic)
        .await;

    let generator = BacklogGenerator::from_config(&providers.config(true)).unwrap();
    let outcome = generator.generate(&request()).await.unwrap();

    assert!(outcome.degraded);
    assert!(outcome.analysis.contains("service unavailable"));
    assert!(outcome.analysis.contains("overloaded_error - Overloaded"));
    assert_eq!(outcome.analysis, outcome.backlog_text);
    assert!(outcome.report.is_empty());

    // The backlog stage is skipped once the analysis is degraded.
    assert_eq!(providers.openai.received_requests().await.unwrap().len(), 1);
    assert_eq!(providers.anthropic.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_primary_timeout_falls_back() {
    let providers = Providers::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_completion(BACKLOG))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&providers.openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_message(BACKLOG)))
        .expect(2)
        .mount(&providers.anthropic)
        .await;

    let mut vars = providers.vars(true);
    vars.insert("PROVIDER_REQUEST_TIMEOUT_SECS".to_string(), "1".to_string());
    let config = Config::from_lookup(|key| vars.get(key).cloned());

    let generator = BacklogGenerator::from_config(&config).unwrap();
    let outcome = generator.generate(&request()).await.unwrap();

    assert!(!outcome.degraded);
    assert_eq!(outcome.analysis, BACKLOG);
    assert_eq!(outcome.report.backlog.story_count(), 1);
}

#[tokio::test]
async fn test_malformed_primary_body_falls_back() {
    let providers = Providers::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&providers.openai)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_message(BACKLOG)))
        .mount(&providers.anthropic)
        .await;

    let generator = BacklogGenerator::from_config(&providers.config(true)).unwrap();
    let outcome = generator.generate(&request()).await.unwrap();

    assert!(!outcome.degraded);
    assert_eq!(outcome.report.backlog.story_count(), 1);
}

#[tokio::test]
async fn test_router_generates_then_rejects_unknown_export() {
    let providers = Providers::start().await;
    providers.openai_answers().await;

    let state = AppState::from_config(&providers.config(true)).unwrap();
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(
            Request::post("/generate-backlog")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "cdc=Gym+booking&tech=%5B%22Symfony%22%5D&niveau_dev=Interm%C3%A9diaire",
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["analyse"], ANALYSIS);
    assert_eq!(body["summary"]["epics"], 1);
    assert_eq!(body["summary"]["rejected_lines"], 1);

    let response = app
        .oneshot(
            Request::post("/export-backlog/csv")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "analyse": body["analyse"], "backlog": body["backlog"] }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], UNSUPPORTED_FORMAT_MESSAGE);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_generate_writes_export() {
    let providers = Providers::start().await;
    providers.openai_answers().await;

    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("cdc.txt");
    std::fs::write(&spec, "Plateforme de r\u{e9}servation").unwrap();
    let output = dir.path().join("backlog.xlsx");

    let result = tokio::process::Command::new(env!("CARGO_BIN_EXE_backlog"))
        .envs(providers.vars(true))
        .env_remove("RUST_LOG")
        .args(["generate", "--cdc"])
        .arg(&spec)
        .args(["--tech", "Symfony,React", "--level", "Expert", "--export", "excel", "--output"])
        .arg(&output)
        .output()
        .await
        .unwrap();

    assert!(
        result.status.success(),
        "{}",
        String::from_utf8_lossy(&result.stderr)
    );
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("EPIC: Core"));
    let written = std::fs::read(&output).unwrap();
    assert!(written.starts_with(b"PK"));
}
