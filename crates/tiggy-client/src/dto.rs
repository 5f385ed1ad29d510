//! Wire shapes of the backend API

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tiggy_core::{Message, Origin, Thread, ThreadId, UserProfile};

use crate::error::{ClientError, ClientResult};

/// Document ids come back either as plain strings or as extended JSON
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Plain(String),
    Oid {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

impl WireId {
    pub fn into_string(self) -> String {
        match self {
            WireId::Plain(id) => id,
            WireId::Oid { oid } => oid,
        }
    }
}

/// Accepts RFC 3339 and zone-less ISO 8601 (taken as UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireMessage {
    fn into_message(self, origin: Origin, fallback: DateTime<Utc>) -> Message {
        Message::at(origin, self.message, self.timestamp.unwrap_or(fallback))
    }
}

/// A chat as stored by the backend: user and model messages kept apart
#[derive(Debug, Clone, Deserialize)]
pub struct ChatDto {
    #[serde(default, rename = "_id")]
    pub object_id: Option<WireId>,
    #[serde(default)]
    pub id: Option<WireId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "createdAt", deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt", deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "userMessages")]
    pub user_messages: Vec<WireMessage>,
    #[serde(default, alias = "modelMessages")]
    pub model_messages: Vec<WireMessage>,
}

impl ChatDto {
    /// Merge both collections into one thread
    pub fn into_thread(self) -> ClientResult<Thread> {
        let id = self
            .object_id
            .or(self.id)
            .map(WireId::into_string)
            .ok_or_else(|| ClientError::Decode("chat without an id".to_string()))?;

        let stamps = self
            .user_messages
            .iter()
            .chain(&self.model_messages)
            .filter_map(|m| m.timestamp);
        let latest = stamps.clone().max();
        let earliest = stamps.min();

        let created_at = self
            .created_at
            .or(earliest)
            .unwrap_or_else(Utc::now);
        let updated_at = self.updated_at.or(latest).unwrap_or(created_at);

        let user_messages = self
            .user_messages
            .into_iter()
            .map(|m| m.into_message(Origin::User, created_at))
            .collect();
        let assistant_messages = self
            .model_messages
            .into_iter()
            .map(|m| m.into_message(Origin::Assistant, created_at))
            .collect();

        Ok(Thread::merged(
            ThreadId::new(id),
            self.title,
            user_messages,
            assistant_messages,
            created_at,
            updated_at,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatList {
    #[serde(default)]
    pub chats: Vec<ChatDto>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyDto {
    #[serde(alias = "modelMessage")]
    pub model_message: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletedDto {
    #[serde(default, alias = "chatId")]
    pub chat_id: Option<WireId>,
}

#[derive(Debug, Deserialize)]
pub struct ConcentrationDto {
    pub concentration: String,
}

#[derive(Debug, Deserialize)]
pub struct CertificatesDto {
    #[serde(default)]
    pub certificates: Vec<String>,
}

/// Body of create-user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub grad_year: Option<i32>,
    pub concentration: Option<String>,
    pub certificates: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDto {
    #[serde(default, rename = "_id")]
    pub object_id: Option<WireId>,
    #[serde(default)]
    pub id: Option<WireId>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub grad_year: Option<i32>,
    #[serde(default)]
    pub concentration: Option<String>,
    #[serde(default)]
    pub certificates: Vec<String>,
}

impl From<UserDto> for UserProfile {
    fn from(dto: UserDto) -> Self {
        UserProfile {
            id: dto.object_id.or(dto.id).map(WireId::into_string),
            name: dto.name,
            email: dto.email,
            grad_year: dto.grad_year,
            concentration: dto.concentration,
            certificates: dto.certificates,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeEncoded<T> {
    Plain(T),
    Encoded(String),
}

/// Decode a response body that is either the JSON value itself or a JSON
/// string holding it
pub fn decode_body<T: DeserializeOwned>(body: &str) -> ClientResult<T> {
    match serde_json::from_str::<MaybeEncoded<T>>(body) {
        Ok(MaybeEncoded::Plain(value)) => Ok(value),
        Ok(MaybeEncoded::Encoded(inner)) => {
            serde_json::from_str(&inner).map_err(|e| ClientError::Decode(e.to_string()))
        }
        Err(e) => Err(ClientError::Decode(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-09-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-09-01T10:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-09-01T10:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2025-09-01 10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_chat_merges_collections() {
        let body = r#"{
            "_id": "66f1",
            "created_at": "2025-09-01T09:00:00Z",
            "updated_at": "2025-09-01T10:03:00Z",
            "user_messages": [
                {"message": "hi", "timestamp": "2025-09-01T10:00:00Z"},
                {"message": "and then?", "timestamp": "2025-09-01T10:02:00Z"}
            ],
            "model_messages": [
                {"message": "hello", "timestamp": "2025-09-01T10:01:00Z"},
                {"message": "that's all", "timestamp": "2025-09-01T10:03:00Z"}
            ]
        }"#;
        let thread = decode_body::<ChatDto>(body).unwrap().into_thread().unwrap();

        assert_eq!(thread.id.as_str(), "66f1");
        assert_eq!(thread.title, "hi");
        let texts: Vec<&str> = thread.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hi", "hello", "and then?", "that's all"]);
    }

    #[test]
    fn test_created_chat_as_json_string() {
        let body = r#""{\"_id\": {\"$oid\": \"66f2\"}, \"user_messages\": [], \"model_messages\": []}""#;
        let thread = decode_body::<ChatDto>(body).unwrap().into_thread().unwrap();
        assert_eq!(thread.id.as_str(), "66f2");
        assert!(thread.is_empty());
        assert!(thread.has_sentinel_title());
    }

    #[test]
    fn test_chat_without_id() {
        let dto = decode_body::<ChatDto>(r#"{"user_messages": []}"#).unwrap();
        assert!(matches!(dto.into_thread(), Err(ClientError::Decode(_))));
    }

    #[test]
    fn test_user_with_both_ids() {
        let body = r#"{"id":"tiger@princeton.edu","_id":"tiger@princeton.edu","name":"Tiger",
            "email":"tiger@princeton.edu","grad_year":2027,"concentration":"COS","certificates":["SML"]}"#;
        let profile: UserProfile = decode_body::<UserDto>(body).unwrap().into();
        assert_eq!(profile.id.as_deref(), Some("tiger@princeton.edu"));
        assert_eq!(profile.certificates, vec!["SML".to_string()]);
    }
}
