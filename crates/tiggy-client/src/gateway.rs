//! HTTP implementation of [`ChatBackend`]

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, Method, Response};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tiggy_config::{ApiFlavor, BackendConfig};
use tiggy_core::{Identity, Thread, ThreadId, UserProfile};
use tiggy_observability::request_span;
use tracing::{debug, warn, Instrument};

use crate::backend::ChatBackend;
use crate::dto::{
    decode_body, CertificatesDto, ChatDto, ChatList, ConcentrationDto, DeletedDto, NewUser,
    ReplyDto, UserDto, WireId,
};
use crate::error::{ClientError, ClientResult};

/// Talks to the backend over HTTP
///
/// Reads go through a client with transient-failure retries; writes use a
/// plain client and are sent exactly once.
pub struct HttpGateway {
    reads: ClientWithMiddleware,
    writes: Client,
    base_url: String,
    flavor: ApiFlavor,
}

impl HttpGateway {
    pub fn new(config: &BackendConfig) -> ClientResult<Self> {
        let writes = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(200), Duration::from_secs(5))
            .base(2)
            .build_with_max_retries(config.max_read_retries);

        let reads = reqwest_middleware::ClientBuilder::new(writes.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let base_url = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.api_prefix.trim_end_matches('/')
        );

        Ok(Self {
            reads,
            writes,
            base_url,
            flavor: config.api_flavor,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn body<'a>(&self, fields: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<Map<String, Value>>(),
        )
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<T> {
        async {
            let response = self
                .reads
                .get(self.url(path))
                .query(query)
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;
            decode(response).await
        }
        .instrument(request_span("GET", path))
        .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> ClientResult<T> {
        let span = request_span(method.as_str(), path);
        async {
            let response = self
                .writes
                .request(method.clone(), self.url(path))
                .header(header::ACCEPT, "application/json")
                .json(body)
                .send()
                .await?;
            decode(response).await
        }
        .instrument(span)
        .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = error_message(status.as_u16(), &body);
        warn!(status = status.as_u16(), "Backend request failed: {}", message);
        return Err(ClientError::backend(status.as_u16(), message));
    }

    debug!(status = status.as_u16(), bytes = body.len(), "Backend response");
    decode_body(&body)
}

/// The body's `error` field, or a generic status line
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status))
}

#[async_trait]
impl ChatBackend for HttpGateway {
    async fn create_user(&self, user: &NewUser) -> ClientResult<UserProfile> {
        let body = serde_json::to_value(user).map_err(|e| ClientError::Decode(e.to_string()))?;
        let user: UserDto = self
            .send_json(Method::POST, "/user/create-user", &body)
            .await?;
        Ok(user.into())
    }

    async fn get_user(&self, identity: &Identity) -> ClientResult<UserProfile> {
        let user: UserDto = self
            .get(
                "/user/get-user",
                &[(self.flavor.user_key(), identity.as_str())],
            )
            .await?;
        Ok(user.into())
    }

    async fn get_user_by_email(&self, email: &str) -> ClientResult<UserProfile> {
        let user: UserDto = self
            .get("/user/get-user-by-email", &[("email", email)])
            .await?;
        Ok(user.into())
    }

    async fn update_concentration(
        &self,
        identity: &Identity,
        concentration: &str,
    ) -> ClientResult<String> {
        let body = self.body([
            (self.flavor.user_key(), Value::from(identity.as_str())),
            ("concentration", Value::from(concentration)),
        ]);
        let updated: ConcentrationDto = self
            .send_json(Method::PATCH, "/user/update-concentration", &body)
            .await?;
        Ok(updated.concentration)
    }

    async fn update_certificates(
        &self,
        identity: &Identity,
        certificates: &[String],
    ) -> ClientResult<Vec<String>> {
        let body = self.body([
            (self.flavor.user_key(), Value::from(identity.as_str())),
            ("certificates", Value::from(certificates.to_vec())),
        ]);
        let updated: CertificatesDto = self
            .send_json(Method::PATCH, "/user/update-certificates", &body)
            .await?;
        Ok(updated.certificates)
    }

    async fn create_chat(&self, identity: &Identity) -> ClientResult<Thread> {
        let body = self.body([(self.flavor.user_key(), Value::from(identity.as_str()))]);
        let chat: ChatDto = self
            .send_json(Method::POST, "/chat/create-chat", &body)
            .await?;
        chat.into_thread()
    }

    async fn list_chats(&self, identity: &Identity) -> ClientResult<Vec<Thread>> {
        let list: ChatList = self
            .get(
                "/chat/list-chats",
                &[(self.flavor.user_key(), identity.as_str())],
            )
            .await?;

        Ok(list
            .chats
            .into_iter()
            .filter_map(|chat| match chat.into_thread() {
                Ok(thread) => Some(thread),
                Err(e) => {
                    warn!("Skipping unreadable chat in listing: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn get_chat(&self, chat_id: &ThreadId, identity: &Identity) -> ClientResult<Thread> {
        let chat: ChatDto = self
            .get(
                "/chat/get-chat",
                &[
                    (self.flavor.chat_key(), chat_id.as_str()),
                    (self.flavor.user_key(), identity.as_str()),
                ],
            )
            .await?;
        chat.into_thread()
    }

    async fn send_message(
        &self,
        chat_id: &ThreadId,
        identity: &Identity,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> ClientResult<String> {
        let body = self.body([
            (self.flavor.chat_key(), Value::from(chat_id.as_str())),
            (self.flavor.user_key(), Value::from(identity.as_str())),
            ("message", Value::from(message)),
            (
                "timestamp",
                Value::from(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
        ]);
        let reply: ReplyDto = self
            .send_json(Method::POST, "/chat/send-message", &body)
            .await?;
        Ok(reply.model_message)
    }

    async fn delete_chat(&self, chat_id: &ThreadId, identity: &Identity) -> ClientResult<ThreadId> {
        let body = self.body([
            (self.flavor.chat_key(), Value::from(chat_id.as_str())),
            (self.flavor.user_key(), Value::from(identity.as_str())),
        ]);
        let deleted: DeletedDto = self
            .send_json(Method::DELETE, "/chat/delete-chat", &body)
            .await?;
        Ok(deleted
            .chat_id
            .map(WireId::into_string)
            .map(ThreadId::new)
            .unwrap_or_else(|| chat_id.clone()))
    }
}
