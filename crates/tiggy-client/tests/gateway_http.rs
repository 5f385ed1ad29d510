use chrono::{TimeZone, Utc};
use mockito::Matcher;
use serde_json::json;
use tiggy_client::{ChatBackend, ClientError, HttpGateway, NewUser};
use tiggy_config::{ApiFlavor, BackendConfig};
use tiggy_core::{Identity, ThreadId};

fn gateway(server: &mockito::Server, flavor: ApiFlavor) -> HttpGateway {
    HttpGateway::new(&BackendConfig {
        base_url: server.url(),
        api_prefix: "/api".to_string(),
        api_flavor: flavor,
        timeout_seconds: 5,
        max_read_retries: 2,
    })
    .unwrap()
}

fn tiger() -> Identity {
    Identity::new("tiger@princeton.edu")
}

#[tokio::test]
async fn test_list_chats_snake_case() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/chat/list-chats")
        .match_query(Matcher::UrlEncoded(
            "user_id".into(),
            "tiger@princeton.edu".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "chats": [
                    {"_id": "a", "created_at": "2025-09-01T09:00:00Z", "updated_at": "2025-09-01T10:00:00Z"},
                    {"_id": "b", "created_at": "2025-09-01T09:30:00Z", "updated_at": "2025-09-01T10:05:00Z",
                     "user_messages": [{"message": "hi", "timestamp": "2025-09-01T10:04:00Z"}],
                     "model_messages": [{"message": "hello", "timestamp": "2025-09-01T10:05:00Z"}]}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let threads = gateway(&server, ApiFlavor::SnakeCase)
        .list_chats(&tiger())
        .await
        .unwrap();

    assert_eq!(threads.len(), 2);
    assert_eq!(threads[1].id, ThreadId::new("b"));
    assert_eq!(threads[1].messages().len(), 2);
    assert_eq!(threads[1].title, "hi");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_chat_camel_case_keys() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/chat/get-chat")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("chatId".into(), "66f1".into()),
            Matcher::UrlEncoded("userId".into(), "tiger@princeton.edu".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"_id":"66f1","user_messages":[],"model_messages":[]}"#)
        .create_async()
        .await;

    let thread = gateway(&server, ApiFlavor::CamelCase)
        .get_chat(&ThreadId::new("66f1"), &tiger())
        .await
        .unwrap();

    assert_eq!(thread.id.as_str(), "66f1");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_message_body_and_reply() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat/send-message")
        .match_body(Matcher::PartialJson(json!({
            "chat_id": "66f1",
            "user_id": "tiger@princeton.edu",
            "message": "Should I take COS217 or COS226?",
            "timestamp": "2025-09-01T10:00:00.000Z"
        })))
        .with_status(201)
        .with_body(r#"{"model_message":"Take both."}"#)
        .create_async()
        .await;

    let reply = gateway(&server, ApiFlavor::SnakeCase)
        .send_message(
            &ThreadId::new("66f1"),
            &tiger(),
            "Should I take COS217 or COS226?",
            Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(reply, "Take both.");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_write_failure_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat/send-message")
        .with_status(500)
        .with_body(r#"{"error":"Failed to upload user message to the database"}"#)
        .expect(1)
        .create_async()
        .await;

    let result = gateway(&server, ApiFlavor::SnakeCase)
        .send_message(&ThreadId::new("66f1"), &tiger(), "hi", Utc::now())
        .await;

    match result {
        Err(ClientError::Backend { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Failed to upload user message to the database");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_read_failure_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/chat/list-chats")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let result = gateway(&server, ApiFlavor::SnakeCase)
        .list_chats(&tiger())
        .await;

    match result {
        Err(ClientError::Backend { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "HTTP error! status: 503");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_chat_returned_as_string() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat/create-chat")
        .match_body(Matcher::Json(json!({"user_id": "tiger@princeton.edu"})))
        .with_status(201)
        .with_body(
            serde_json::to_string(r#"{"_id":"66f3","user_messages":[],"model_messages":[]}"#)
                .unwrap(),
        )
        .create_async()
        .await;

    let thread = gateway(&server, ApiFlavor::SnakeCase)
        .create_chat(&tiger())
        .await
        .unwrap();

    assert_eq!(thread.id.as_str(), "66f3");
    assert!(thread.has_sentinel_title());
}

#[tokio::test]
async fn test_delete_chat() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/api/chat/delete-chat")
        .match_body(Matcher::Json(json!({
            "chat_id": "66f1",
            "user_id": "tiger@princeton.edu"
        })))
        .with_status(200)
        .with_body(r#"{"chat_id":"66f1"}"#)
        .create_async()
        .await;

    let deleted = gateway(&server, ApiFlavor::SnakeCase)
        .delete_chat(&ThreadId::new("66f1"), &tiger())
        .await
        .unwrap();

    assert_eq!(deleted, ThreadId::new("66f1"));
}

#[tokio::test]
async fn test_user_endpoints() {
    let mut server = mockito::Server::new_async().await;
    let user_body = r#"{"id":"tiger@princeton.edu","_id":"tiger@princeton.edu","name":"Tiger",
        "email":"tiger@princeton.edu","grad_year":2027,"concentration":null,"certificates":[]}"#;
    server
        .mock("POST", "/api/user/create-user")
        .match_body(Matcher::PartialJson(json!({
            "email": "tiger@princeton.edu",
            "name": "Tiger",
            "grad_year": 2027
        })))
        .with_status(201)
        .with_body(user_body)
        .create_async()
        .await;
    server
        .mock("GET", "/api/user/get-user-by-email")
        .match_query(Matcher::UrlEncoded(
            "email".into(),
            "tiger@princeton.edu".into(),
        ))
        .with_status(404)
        .with_body(r#"{"error":"User with email tiger@princeton.edu not found"}"#)
        .create_async()
        .await;
    server
        .mock("PATCH", "/api/user/update-concentration")
        .match_body(Matcher::Json(json!({
            "user_id": "tiger@princeton.edu",
            "concentration": "COS"
        })))
        .with_status(200)
        .with_body(r#"{"concentration":"COS"}"#)
        .create_async()
        .await;

    let gateway = gateway(&server, ApiFlavor::SnakeCase);

    let created = gateway
        .create_user(&NewUser {
            email: "tiger@princeton.edu".to_string(),
            name: "Tiger".to_string(),
            grad_year: Some(2027),
            concentration: None,
            certificates: vec![],
        })
        .await
        .unwrap();
    assert_eq!(created.id.as_deref(), Some("tiger@princeton.edu"));

    let missing = gateway.get_user_by_email("tiger@princeton.edu").await;
    assert!(matches!(missing, Err(ClientError::Backend { status: 404, .. })));

    let concentration = gateway
        .update_concentration(&tiger(), "COS")
        .await
        .unwrap();
    assert_eq!(concentration, "COS");
}
