use super::analysis::*;
use super::error::*;
use super::message::*;
use super::persona::*;
use super::profile::*;
use super::session::*;
use super::wire;

#[test]
fn test_session_decodes_numeric_ids_and_naive_timestamps() {
    let json = r#"{
        "session_id": 42,
        "user_id": 7,
        "persona_id": 3,
        "session_name": "Evening talk",
        "is_active": true,
        "created_at": "2024-01-02T08:00:00",
        "updated_at": "2024-01-02T09:30:00.123456"
    }"#;
    let session: Session = serde_json::from_str(json).unwrap();
    assert_eq!(session.id, "42");
    assert_eq!(session.user_id, "7");
    assert_eq!(session.persona_id, PersonaId(3));
    assert_eq!(session.name.as_deref(), Some("Evening talk"));
    assert_eq!(session.created_at.to_rfc3339(), "2024-01-02T08:00:00+00:00");
}

#[test]
fn test_session_display_name_falls_back_to_persona() {
    let json = r#"{
        "id": "s-1", "user_id": "u-1", "persona_id": 2,
        "created_at": "2024-01-02T08:00:00Z", "updated_at": "2024-01-02T08:00:00Z"
    }"#;
    let mut session: Session = serde_json::from_str(json).unwrap();
    assert!(session.is_active);
    assert_eq!(session.display_name(), "Dreamer");

    session.name = Some("   ".into());
    assert_eq!(session.display_name(), "Dreamer");
}

#[test]
fn test_session_detail_flattens_messages() {
    let json = r#"{
        "id": "s-1", "user_id": "u-1", "persona_id": 1,
        "created_at": "2024-01-02T08:00:00Z", "updated_at": "2024-01-02T08:00:00Z",
        "messages": [
            {"id": 1, "session_id": "s-1", "sender_type": "user",
             "content": "hi", "created_at": "2024-01-02T08:01:00"},
            {"id": 2, "session_id": "s-1", "role": "assistant",
             "content": "hello!", "created_at": "2024-01-02T08:01:02"}
        ]
    }"#;
    let detail: SessionDetail = serde_json::from_str(json).unwrap();
    assert_eq!(detail.session.id, "s-1");
    assert_eq!(detail.messages.len(), 2);
    assert!(detail.messages[0].is_user());
    assert_eq!(detail.messages[1].role, MessageRole::Assistant);
}

#[test]
fn test_message_role_serialization() {
    let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
    assert_eq!(json, "\"assistant\"");

    let role: MessageRole = serde_json::from_str("\"user\"").unwrap();
    assert_eq!(role, MessageRole::User);
}

#[test]
fn test_create_session_request_omits_missing_name() {
    let req = CreateSessionRequest {
        user_id: "u-1".into(),
        persona_id: PersonaId(4),
        name: None,
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["persona_id"], 4);
    assert!(json.get("session_name").is_none());
}

#[test]
fn test_analysis_status_terminality() {
    assert!(!AnalysisStatus::Pending.is_terminal());
    assert!(!AnalysisStatus::Processing.is_terminal());
    assert!(AnalysisStatus::Completed.is_terminal());
    assert!(AnalysisStatus::Failed.is_terminal());
    assert!(AnalysisStatus::Cancelled.is_terminal());
}

#[test]
fn test_status_report_decodes_result() {
    let json = r#"{
        "test_id": 99,
        "status": "completed",
        "current_step": 4,
        "result": {
            "personality_type": "analyst",
            "probabilities": {"analyst": 0.7, "dreamer": 0.2, "pathfinder": 0.1},
            "summary": "Detailed house, firm lines."
        }
    }"#;
    let report: AnalysisStatusReport = serde_json::from_str(json).unwrap();
    assert_eq!(report.test_id, "99");
    assert!(report.is_terminal());
    let result = report.result.unwrap();
    assert_eq!(result.predicted_category.as_deref(), Some("analyst"));
    assert_eq!(result.probabilities.len(), 3);
    assert!(result.image_url.is_none());
}

#[test]
fn test_cancelled_report_is_terminal() {
    let report = AnalysisStatusReport::cancelled("t-1");
    assert_eq!(report.status, AnalysisStatus::Cancelled);
    assert!(report.is_terminal());
    assert!(report.result.is_none());
}

#[test]
fn test_image_upload_mime_type() {
    let upload = ImageUpload {
        file_name: "house.JPG".into(),
        bytes: vec![1, 2, 3],
        note: None,
    };
    assert_eq!(upload.mime_type(), "image/jpeg");
}

#[test]
fn test_persona_lookup() {
    assert_eq!(persona_info(PersonaId(1)).display_name, "Pathfinder");
    assert_eq!(persona_for_category("ANALYST").id, PersonaId(3));
    assert_eq!(persona_for_category("Free Spirit").id, PersonaId(5));
    assert_eq!(persona_for_category("4").key, "caretaker");
}

#[test]
fn test_unknown_persona_placeholder() {
    let info = persona_info(PersonaId(42));
    assert!(info.is_unknown());
    assert_eq!(info.display_name, "Unknown");
    assert!(persona_for_category("nobody").is_unknown());
}

#[test]
fn test_profile_decodes_optional_fields() {
    let json = r#"{"user_id": 5, "nickname": "minji", "joined_at": "not a date"}"#;
    let profile: UserProfile = serde_json::from_str(json).unwrap();
    assert_eq!(profile.id, "5");
    assert_eq!(profile.name, "minji");
    assert!(profile.joined_at.is_none());
    assert_eq!(profile.test_count, 0);
}

#[test]
fn test_profile_update_uses_nickname_field() {
    let update = ProfileUpdate {
        name: Some("minji".into()),
        profile_image_url: None,
    };
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json, serde_json::json!({"nickname": "minji"}));
}

#[test]
fn test_parse_timestamp_variants() {
    let a = wire::parse_naive_timestamp("2024-01-02T08:00").unwrap();
    let b = wire::parse_naive_timestamp("2024-01-02 23:00:59").unwrap();
    let c = wire::parse_naive_timestamp("2024-01-02T10:00:00+09:00").unwrap();
    assert_eq!(a.to_string(), "2024-01-02 08:00:00");
    assert_eq!(b.to_string(), "2024-01-02 23:00:59");
    assert_eq!(c.to_string(), "2024-01-02 10:00:00");
    assert!(wire::parse_naive_timestamp("yesterday").is_none());

    let instant = wire::parse_timestamp("2024-01-02T10:00:00+09:00").unwrap();
    assert_eq!(instant.to_rfc3339(), "2024-01-02T01:00:00+00:00");
    let naive = wire::parse_timestamp("2024-01-02T08:00").unwrap();
    assert_eq!(naive.to_rfc3339(), "2024-01-02T08:00:00+00:00");
}

#[test]
fn test_api_error_constructors() {
    let err = ApiError::server(500, "boom");
    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.status, Some(500));
    assert_eq!(err.to_string(), "boom");

    assert!(ApiError::auth("expired").is_auth());
    assert_eq!(ApiError::validation("bad").status, None);
}

#[test]
fn test_config_defaults() {
    let config = crate::core::config::AppConfig::default();
    assert_eq!(config.data_dir, ".htp-client");
    assert_eq!(config.base_url, "http://localhost:8000");
    assert_eq!(config.api_prefix, "/api/v1");
    assert_eq!(config.poll_interval().as_millis(), 2_000);
    assert_eq!(config.nickname_debounce().as_millis(), 800);
    assert!(config.auth_token.is_none());
    assert!(!config.debug);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_bad_base_url() {
    let config = crate::core::config::AppConfig {
        base_url: "localhost:8000".into(),
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}
