mod harness;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use harness::config::{ConfigBuilder, adapter};
use harness::mock_llm::{Behavior, MockLlm};
use relay_llm::stream::StreamDelta;
use relay_llm::types::{ActionDefinition, SharedBroadcaster, ToolChoice};
use relay_llm::{Generator, HttpTransport, LifecycleEvent, LlmError, Message, Outcome, Prompt};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn generator(config_builder: ConfigBuilder, name: &str) -> Generator {
    let config = config_builder.build();
    Generator::new(adapter(&config, name), Arc::new(HttpTransport::new()))
}

fn capture() -> (SharedBroadcaster, Arc<Mutex<Vec<LifecycleEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let broadcaster = SharedBroadcaster::new(move |event: &LifecycleEvent| sink.lock().unwrap().push(event.clone()));
    (broadcaster, events)
}

fn weather_tool() -> ActionDefinition {
    ActionDefinition::new(
        "get_weather",
        "Get current weather",
        json!({"type": "object", "properties": {"location": {"type": "string"}}}),
    )
}

fn count(events: &[LifecycleEvent], kind: fn(&LifecycleEvent) -> bool) -> usize {
    events.iter().filter(|e| kind(e)).count()
}

#[tokio::test]
async fn chat_stream_emits_one_open_and_one_close() {
    let mock = MockLlm::start().await.unwrap();
    let generator = generator(ConfigBuilder::new().with_openai_provider("mock", &mock.base_url()), "mock");
    let (broadcaster, events) = capture();

    let prompt = Prompt::new("mock-model-1")
        .with_message(Message::user("Hello"))
        .streaming(Some(broadcaster));
    let response = generator.generate_stream(&prompt, &CancellationToken::new()).await.unwrap();

    assert!(response.success);
    assert_eq!(response.text(), "Hello from mock LLM");
    assert_eq!(response.usage.unwrap().output_tokens, 4);

    let events = events.lock().unwrap();
    assert!(matches!(events.first(), Some(LifecycleEvent::Open { .. })));
    assert!(matches!(events.last(), Some(LifecycleEvent::Close { aborted: false, .. })));
    assert_eq!(count(&events, |e| matches!(e, LifecycleEvent::Open { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, LifecycleEvent::Close { .. })), 1);

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::Update { delta: StreamDelta::Text { text }, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello from mock LLM");
}

#[tokio::test]
async fn chat_stream_requests_usage_only_from_openai_itself() {
    let mock = MockLlm::start().await.unwrap();
    let generator = generator(ConfigBuilder::new().with_openai_provider("mock", &mock.base_url()), "mock");

    let prompt = Prompt::new("mock-model-1")
        .with_message(Message::user("Hello"))
        .streaming(None);
    generator.generate_stream(&prompt, &CancellationToken::new()).await.unwrap();

    let request = mock.last_request();
    assert_eq!(request.body["stream"], true);
    assert!(request.body.get("stream_options").is_none());
}

#[tokio::test]
async fn chat_stream_reconstructs_tool_calls() {
    let mock = MockLlm::start().await.unwrap();
    let generator = generator(ConfigBuilder::new().with_openai_provider("mock", &mock.base_url()), "mock");

    let mut prompt = Prompt::new("mock-model-1")
        .with_message(Message::user("What is the weather?"))
        .with_action(weather_tool())
        .with_tool_choice(ToolChoice::action("get_weather"))
        .streaming(None);
    let outcome = generator.run(&mut prompt, &CancellationToken::new()).await.unwrap();

    let Outcome::Completed(response) = outcome else {
        panic!("generation was not completed");
    };
    let action = &response.message.requested_actions[0];
    assert_eq!(action.id, "call_test_stream");
    assert_eq!(action.params.as_ref().unwrap()["location"], "San Francisco");
    assert_eq!(prompt.options.tool_choice, None);
}

#[tokio::test]
async fn anthropic_stream_merges_text_and_tool_use() {
    let mock = MockLlm::start().await.unwrap();
    let generator = generator(ConfigBuilder::new().with_anthropic_provider("claude", &mock.base_url()), "claude");
    let (broadcaster, events) = capture();

    let prompt = Prompt::new("claude-sonnet-4")
        .with_message(Message::user("Weather in Paris?"))
        .with_action(weather_tool())
        .streaming(Some(broadcaster));
    let response = generator.generate_stream(&prompt, &CancellationToken::new()).await.unwrap();

    assert_eq!(response.text(), "Hello from mock Claude");
    assert_eq!(response.id.as_deref(), Some("msg_test_stream"));
    let action = &response.message.requested_actions[0];
    assert_eq!(action.id, "toolu_stream");
    assert_eq!(action.params.as_ref().unwrap()["location"], "Paris");

    let events = events.lock().unwrap();
    assert_eq!(count(&events, |e| matches!(e, LifecycleEvent::Open { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, LifecycleEvent::Close { .. })), 1);
}

#[tokio::test]
async fn gateway_streams_through_stream_raw_predict() {
    let mock = MockLlm::start().await.unwrap();
    let generator = generator(ConfigBuilder::new().with_gateway_provider("vertex", &mock.root_url()), "vertex");

    let prompt = Prompt::new("claude-sonnet-4")
        .with_message(Message::user("Hi"))
        .streaming(None);
    let response = generator.generate_stream(&prompt, &CancellationToken::new()).await.unwrap();

    assert_eq!(response.text(), "Hello from mock Claude");
    assert!(mock.last_request().path.ends_with("claude-sonnet-4:streamRawPredict"));
}

#[tokio::test]
async fn request_timeout_ends_a_stalled_stream_with_an_error() {
    let mock = MockLlm::start_with(Behavior::Stalled).await.unwrap();
    let config = ConfigBuilder::new().with_openai_provider("mock", &mock.base_url()).build();
    let transport = HttpTransport::with_timeout(Duration::from_millis(300)).unwrap();
    let generator = Generator::new(adapter(&config, "mock"), Arc::new(transport));
    let (broadcaster, events) = capture();

    let prompt = Prompt::new("mock-model-1")
        .with_message(Message::user("Hello"))
        .streaming(Some(broadcaster));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        generator.generate_stream(&prompt, &CancellationToken::new()),
    )
    .await
    .expect("the transport timeout must end the stream");
    assert!(matches!(result, Err(LlmError::Streaming(_))));

    let events = events.lock().unwrap();
    assert_eq!(count(&events, |e| matches!(e, LifecycleEvent::Close { aborted: true, .. })), 1);
}

#[tokio::test]
async fn cancelling_a_stalled_stream_aborts_once() {
    let mock = MockLlm::start_with(Behavior::Stalled).await.unwrap();
    let generator = generator(ConfigBuilder::new().with_openai_provider("mock", &mock.base_url()), "mock");
    let (broadcaster, events) = capture();

    let prompt = Prompt::new("mock-model-1")
        .with_message(Message::user("Hello"))
        .streaming(Some(broadcaster));

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let response = tokio::time::timeout(Duration::from_secs(5), generator.generate_stream(&prompt, &cancel))
        .await
        .expect("cancellation must end the stream")
        .unwrap();
    assert!(!response.success);

    let events = events.lock().unwrap();
    assert_eq!(count(&events, |e| matches!(e, LifecycleEvent::Close { aborted: true, .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, LifecycleEvent::Close { .. })), 1);
}
