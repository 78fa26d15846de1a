use super::*;
use crate::core::api::{AnalysisApi, SessionApi};
use crate::core::config::AppConfig;
use crate::core::error::{ErrorKind, GENERIC_ERROR_MESSAGE};
use crate::core::persistence::TokenStore;
use crate::storage::MemoryStore;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve exactly one canned response and hand back the raw request text.
async fn one_shot_server(
    status_line: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(head_end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..head_end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + body_len {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).to_string()
    });

    (format!("http://{addr}"), handle)
}

fn api_for(base_url: String, tokens: Arc<MemoryStore>) -> HttpApi {
    let config = AppConfig {
        base_url,
        ..Default::default()
    };
    HttpApi::new(&config, tokens).unwrap()
}

#[test]
fn test_resolve_url_slashes() {
    assert_eq!(
        resolve_url("http://h:8000/", "/api/v1/", "/chat/sessions"),
        "http://h:8000/api/v1/chat/sessions"
    );
    assert_eq!(
        resolve_url("http://h:8000", "api/v1", "chat/sessions"),
        "http://h:8000/api/v1/chat/sessions"
    );
    assert_eq!(resolve_url("http://h", "", "/x"), "http://h/x");
}

#[test]
fn test_extract_server_message() {
    assert_eq!(
        extract_server_message(r#"{"detail": "Session not found"}"#).as_deref(),
        Some("Session not found")
    );
    assert_eq!(
        extract_server_message(r#"{"message": "Nickname taken"}"#).as_deref(),
        Some("Nickname taken")
    );
    assert_eq!(
        extract_server_message(r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#)
            .as_deref(),
        Some("field required")
    );
    assert_eq!(extract_server_message("plain failure").as_deref(), Some("plain failure"));
    assert!(extract_server_message(r#"{"other": 1}"#).is_none());
    assert!(extract_server_message("<html>502</html>").is_none());
    assert!(extract_server_message("   ").is_none());
}

#[test]
fn test_normalize_error_kinds() {
    let err = normalize_error(404, r#"{"detail": "Session not found"}"#);
    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.status, Some(404));
    assert_eq!(err.message, "Session not found");

    let err = normalize_error(500, "");
    assert_eq!(err.message, GENERIC_ERROR_MESSAGE);

    let err = normalize_error(401, "");
    assert_eq!(err.kind, ErrorKind::Auth);
    assert!(err.message.contains("sign in"));
}

#[tokio::test]
async fn test_missing_token_fails_before_network() {
    // Nothing listens on port 9; a network attempt would be a Network error.
    let api = api_for("http://127.0.0.1:9".into(), Arc::new(MemoryStore::new()));
    let auth = api.auth_state();
    assert_eq!(*auth.borrow(), AuthState::SignedIn);

    let err = api.get_session("s-1").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(*auth.borrow(), AuthState::SignedOut);
}

#[tokio::test]
async fn test_send_message_attaches_bearer_and_decodes() {
    let body = r#"{
        "user_message": {"id": 1, "session_id": "s-1", "role": "user",
                         "content": "hi", "created_at": "2024-01-02T08:00:00"},
        "assistant_message": {"id": 2, "session_id": "s-1", "role": "assistant",
                              "content": "hello", "created_at": "2024-01-02T08:00:02"},
        "session_updated": true
    }"#;
    let (base, server) = one_shot_server("200 OK", body).await;
    let api = api_for(base, Arc::new(MemoryStore::with_token("tok-123")));

    let resp = api.send_message("s-1", "hi").await.unwrap();
    assert_eq!(resp.user_message.content, "hi");
    assert_eq!(resp.assistant_message.content, "hello");
    assert!(resp.session_updated);

    let request = server.await.unwrap().to_lowercase();
    assert!(request.starts_with("post /api/v1/chat/sessions/s-1/messages"));
    assert!(request.contains("authorization: bearer tok-123"));
    assert!(request.contains("x-request-id:"));
}

#[tokio::test]
async fn test_unauthorized_signs_out() {
    let (base, server) =
        one_shot_server("401 Unauthorized", r#"{"detail": "Token expired"}"#).await;
    let tokens = Arc::new(MemoryStore::with_token("stale"));
    let api = api_for(base, tokens.clone());
    let auth = api.auth_state();
    assert_eq!(*auth.borrow(), AuthState::SignedIn);

    let err = api.analysis_status("t-1").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.message, "Token expired");
    assert!(tokens.token().await.unwrap().is_none());
    assert_eq!(*auth.borrow(), AuthState::SignedOut);

    server.await.unwrap();
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let (base, server) =
        one_shot_server("409 Conflict", r#"{"message": "Session already exists"}"#).await;
    let api = api_for(base, Arc::new(MemoryStore::with_token("tok")));

    let err = api.delete_session("s-1").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.status, Some(409));
    assert_eq!(err.message, "Session already exists");

    server.await.unwrap();
}
