use std::sync::{Arc, Once};
use std::time::Duration;

use overlay_engine::{ChatConfig, ChatHandle, ChatMessage, HttpMethod, Role, StreamEvent};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(desk_logging::initialize_for_tests);
}

fn config_for(server_uri: &str) -> ChatConfig {
    ChatConfig {
        api_url: format!("{server_uri}/v1/chat/completions"),
        model: "test-model".to_string(),
        ..ChatConfig::default()
    }
}

fn user_message(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage {
        role: Role::User,
        content: text.to_string(),
    }]
}

/// Drains events until `Finished`, then keeps listening briefly so a
/// duplicate terminal notification would be caught.
async fn collect_events(config: ChatConfig, messages: Vec<ChatMessage>) -> Vec<StreamEvent> {
    tokio::task::spawn_blocking(move || {
        let handle = ChatHandle::new();
        handle.start(1, Arc::new(config), messages);

        let mut events = Vec::new();
        while let Some((_, event)) = handle.recv_timeout(Duration::from_secs(10)) {
            let finished = event == StreamEvent::Finished;
            events.push(event);
            if finished {
                break;
            }
        }
        while let Some((_, event)) = handle.recv_timeout(Duration::from_millis(300)) {
            events.push(event);
        }
        events
    })
    .await
    .expect("collector task")
}

#[tokio::test]
async fn fragments_arrive_in_order_then_finished() {
    init_logging();
    let server = MockServer::start().await;
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
                \n\
                data: {\"choices\":[{\"delta\":{}}]}\n\
                data: {\"choices\":[{\"delta\":{\"content\":null}}]}\n\
                data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\
                data: [DONE]\n";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events = collect_events(config_for(&server.uri()), user_message("say hello")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("Hel".to_string()),
            StreamEvent::Fragment("lo".to_string()),
            StreamEvent::Finished,
        ]
    );
}

#[tokio::test]
async fn http_failure_yields_one_error_with_status_and_body() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
        .mount(&server)
        .await;

    let events = collect_events(config_for(&server.uri()), user_message("anything")).await;

    assert_eq!(events.len(), 2);
    match &events[0] {
        StreamEvent::Failed { status, detail } => {
            assert_eq!(*status, Some(500));
            assert!(detail.contains("500"));
            assert!(detail.contains("server error"));
        }
        other => panic!("expected a failure event, got {other:?}"),
    }
    assert_eq!(events[1], StreamEvent::Finished);
}

#[tokio::test]
async fn malformed_payload_between_valid_ones_is_skipped() {
    init_logging();
    let server = MockServer::start().await;
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
                data: {broken json\n\
                data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\
                data: [DONE]\n";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events = collect_events(config_for(&server.uri()), user_message("say hello")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("Hel".to_string()),
            StreamEvent::Fragment("lo".to_string()),
            StreamEvent::Finished,
        ]
    );
}

#[tokio::test]
async fn request_carries_forced_stream_flag_model_and_headers() {
    init_logging();
    let server = MockServer::start().await;
    // The mock only matches when the body says stream=true with our model
    // and history, and the configured header came through.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "stream": true,
            "model": "test-model",
            "temperature": 0.2,
            "messages": [{"role": "user", "content": "hi"}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\ndata: [DONE]\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let mut config = config_for(&server.uri());
    config
        .headers
        .push(("Authorization".to_string(), "Bearer secret".to_string()));
    config.extra_body = serde_json::Map::from_iter([(
        "temperature".to_string(),
        json!(0.2),
    )]);

    let events = collect_events(config, user_message("hi")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("ok".to_string()),
            StreamEvent::Finished,
        ]
    );
}

#[tokio::test]
async fn body_ending_without_sentinel_still_finishes_once() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let events = collect_events(config_for(&server.uri()), user_message("hi")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("tail".to_string()),
            StreamEvent::Finished,
        ]
    );
}

#[tokio::test]
async fn connection_failure_reports_error_then_finishes() {
    init_logging();
    let mut config = ChatConfig::default();
    // Nothing listens on this port.
    config.api_url = "http://127.0.0.1:9/v1/chat/completions".to_string();

    let events = collect_events(config, user_message("hi")).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        StreamEvent::Failed { status: None, .. }
    ));
    assert_eq!(events[1], StreamEvent::Finished);
}

#[tokio::test]
async fn get_method_streams_without_a_body() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"choices\":[{\"delta\":{\"content\":\"via get\"}}]}\ndata: [DONE]\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let mut config = config_for(&server.uri());
    config.method = HttpMethod::Get;

    let events = collect_events(config, Vec::new()).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("via get".to_string()),
            StreamEvent::Finished,
        ]
    );
}
