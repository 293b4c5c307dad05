use serde_json::json;
use shopkeeper::core::conversation::{Metadata, Role};
use shopkeeper::tools::StoreApi;
use shopkeeper::{App, AppBuilder};
use shopkeeper_model::{ModelMessage, ToolCallRequest};
use shopkeeper_test_model::{PresetResponse, TestModelProvider};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOOL_NAMES: [&str; 9] = [
    "create_coupon",
    "create_product",
    "get_order",
    "get_product",
    "list_coupons",
    "list_orders",
    "list_products",
    "update_order",
    "update_product",
];

async fn build_app(
    model_provider: TestModelProvider,
    server: &MockServer,
    temp_dir: &TempDir,
) -> App {
    AppBuilder::with_model_provider(model_provider)
        .with_store_api(StoreApi::new(server.uri()))
        .with_conversations_dir(temp_dir.path())
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_list_products_turn() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("per_page", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Mug", "price": "9.00" },
            { "id": 2, "name": "T-shirt", "price": "25.00" },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let model_provider = TestModelProvider::with_responses([
        PresetResponse::with_tool_calls([ToolCallRequest {
            id: "call_1".to_owned(),
            name: "list_products".to_owned(),
            arguments: json!({ "per_page": 5 }),
        }]),
        PresetResponse::text("You sell a Mug and a T-shirt."),
    ]);
    let temp_dir = TempDir::new().unwrap();
    let app = build_app(model_provider.clone(), &server, &temp_dir).await;

    let conversation = app.create_conversation(Metadata::new()).await;
    let id = conversation.conversation_id.to_string();
    let envelope = app
        .process_message(&id, "List the first 5 products in the store")
        .await;
    assert!(envelope.success, "{envelope:?}");
    assert_eq!(envelope.response, "You sell a Mug and a T-shirt.");

    let requests = model_provider.requests();
    assert_eq!(requests.len(), 2);
    let mut names: Vec<_> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    names.sort();
    assert_eq!(names, TOOL_NAMES);
    assert!(matches!(&requests[0].messages[0], ModelMessage::System(prompt) if !prompt.is_empty()));

    let Some(ModelMessage::Tool(result)) = requests[1].messages.last() else {
        panic!("expected a tool result: {:?}", requests[1].messages);
    };
    assert_eq!(result.id, "call_1");
    assert!(result.content.contains("T-shirt"));

    // Tool traffic stays out of the conversation history.
    let history = app.get_conversation_history(&id).await.unwrap();
    let roles: Vec<_> = history.iter().map(|m| m.role()).collect();
    assert_eq!(roles, [Role::User, Role::Assistant]);

    let summaries = app.list_conversations(10).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].message_count, 2);
}

#[tokio::test]
async fn test_model_failure_turn() {
    let server = MockServer::start().await;
    let model_provider = TestModelProvider::with_responses([
        PresetResponse::text("unreachable").with_failures(0),
    ]);
    let temp_dir = TempDir::new().unwrap();
    let app = build_app(model_provider, &server, &temp_dir).await;

    let id = app
        .create_conversation(Metadata::new())
        .await
        .conversation_id
        .to_string();
    let envelope = app.process_message(&id, "hello").await;
    assert!(!envelope.success);
    assert_eq!(envelope.response, shopkeeper::core::APOLOGY);
    assert!(envelope.error.is_some());

    let history = app.get_conversation_history(&id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role(), Role::System);
    assert!(history[1].content().starts_with("Error processing message: "));
}

#[tokio::test]
async fn test_probe_tool_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    let app = build_app(TestModelProvider::default(), &server, &temp_dir).await;
    assert!(app.probe_tool_server().await);

    let without_tools = AppBuilder::with_model_provider(TestModelProvider::default())
        .with_conversations_dir(temp_dir.path())
        .build()
        .await
        .unwrap();
    assert!(!without_tools.probe_tool_server().await);
}
