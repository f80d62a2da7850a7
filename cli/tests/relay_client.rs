use grounded_cli::{ChatSession, ExchangeStatus, RelayClient, FAILURE_MESSAGE};
use grounded_core::Message;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANSWER: &str = concat!(
    "data: {\"type\":\"text\",\"content\":\"Paris\"}\n\n",
    "data: {\"type\":\"text\",\"content\":\" is sunny\"}\n\n",
    "data: {\"type\":\"sources\",\"content\":[{\"url\":\"https://weather.example/paris\",\"title\":\"weather.example\"}]}\n\n",
);

#[tokio::test]
async fn test_streams_answer_into_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(serde_json::json!({
            "messages": [{"role": "user", "content": "Weather in Paris?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ANSWER, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = RelayClient::new(server.uri());
    let mut session = ChatSession::new();
    let status = client
        .send_chat(&mut session, "Weather in Paris?", &CancellationToken::new(), &mut ())
        .await
        .unwrap();

    assert_eq!(status, ExchangeStatus::Completed);
    assert_eq!(
        session.messages(),
        &[
            Message::user("Weather in Paris?"),
            Message::assistant("Paris is sunny"),
        ]
    );
    assert_eq!(session.sources().len(), 1);
    assert_eq!(session.sources()[0].title, "weather.example");
}

#[tokio::test]
async fn test_error_status_fails_the_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_json(serde_json::json!({"error": "Failed to process chat request"})),
        )
        .mount(&server)
        .await;

    let client = RelayClient::new(server.uri());
    let mut session = ChatSession::new();
    let status = client
        .send_chat(&mut session, "hi", &CancellationToken::new(), &mut ())
        .await
        .unwrap();

    assert_eq!(status, ExchangeStatus::Failed);
    assert_eq!(session.last_answer(), Some(FAILURE_MESSAGE));
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_blank_input_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = RelayClient::new(server.uri());
    let mut session = ChatSession::new();
    let result = client
        .send_chat(&mut session, "   ", &CancellationToken::new(), &mut ())
        .await;

    assert!(result.is_err());
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_response() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let client = RelayClient::new(server.uri());
    let mut session = ChatSession::new();
    let status = client
        .send_chat(&mut session, "hi", &cancel, &mut ())
        .await
        .unwrap();

    assert_eq!(status, ExchangeStatus::Cancelled);
    assert_eq!(session.last_answer(), Some(""));
}

#[tokio::test]
async fn test_history_is_sent_on_follow_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ANSWER, "text/event-stream"))
        .mount(&server)
        .await;

    let client = RelayClient::new(format!("{}/", server.uri()));
    let mut session = ChatSession::new();
    let cancel = CancellationToken::new();
    client
        .send_chat(&mut session, "Weather in Paris?", &cancel, &mut ())
        .await
        .unwrap();
    client
        .send_chat(&mut session, "And tomorrow?", &cancel, &mut ())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let last: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(last["messages"].as_array().unwrap().len(), 3);
    assert_eq!(last["messages"][1]["content"], "Paris is sunny");
}

#[tokio::test]
async fn test_connection_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    assert!(RelayClient::new(server.uri()).test_connection().await.unwrap());
}
