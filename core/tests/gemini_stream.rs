use futures::StreamExt;
use grounded_core::{
    extract_sources, GeminiClient, GeminiConfig, GeminiError, GenerationProvider,
    GenerationRequest, GenerationSettings, Message, UpstreamEvent,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GeminiClient {
    let config = GeminiConfig {
        api_key: Some("test-key".to_string()),
        api_base_url: Some(format!("{}/v1beta", server.uri())),
        model_name: Some("test-model".to_string()),
        ..GeminiConfig::default()
    };
    GeminiClient::new(&config).unwrap()
}

fn request() -> GenerationRequest {
    GenerationRequest {
        system_instruction: Some("Be helpful".to_string()),
        messages: vec![Message::user("Say hello")],
        settings: GenerationSettings::default(),
    }
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {}\r\n\r\n", event))
        .collect()
}

#[tokio::test]
async fn test_streams_deltas_then_completion_metadata() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({
            "candidates": [{ "content": { "parts": [{ "text": "plan", "thought": true }] } }]
        }),
        json!({ "candidates": [{ "content": { "parts": [{ "text": "Hel" }] } }] }),
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": "lo" }] },
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "http://a.com", "title": "" } },
                        { "web": { "uri": "http://a.com", "title": "Again" } }
                    ]
                }
            }]
        }),
    ]);

    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let events: Vec<UpstreamEvent> = client
        .stream(request())
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], UpstreamEvent::TextDelta("Hel".to_string()));
    assert_eq!(events[1], UpstreamEvent::TextDelta("lo".to_string()));

    let UpstreamEvent::Completed(metadata) = &events[2] else {
        panic!("expected completion, got {:?}", events[2]);
    };
    let sources = extract_sources(metadata.as_ref());
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].title, "a.com");
}

#[tokio::test]
async fn test_completion_without_metadata() {
    let server = MockServer::start().await;
    let body = sse(&[json!({ "candidates": [{ "content": { "parts": [{ "text": "Hi" }] } }] })]);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events: Vec<_> = client_for(&server)
        .stream(request())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], Ok(UpstreamEvent::Completed(None))));
}

#[tokio::test]
async fn test_http_error_fails_before_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .mount(&server)
        .await;

    let result = client_for(&server).stream(request()).await;
    match result {
        Err(GeminiError::HttpError {
            status_code,
            message,
        }) => {
            assert_eq!(status_code, 429);
            assert!(message.contains("quota exhausted"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an HTTP error"),
    }
}

#[tokio::test]
async fn test_malformed_chunk_ends_stream_with_error() {
    let server = MockServer::start().await;
    let body = format!(
        "{}data: {{not json}}\n\n",
        sse(&[json!({ "candidates": [{ "content": { "parts": [{ "text": "partial" }] } }] })])
    );

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events: Vec<_> = client_for(&server)
        .stream(request())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Ok(UpstreamEvent::TextDelta(t)) if t == "partial"));
    assert!(matches!(events[1], Err(GeminiError::ParsingError(_))));
}
