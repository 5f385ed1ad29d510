use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tiggy_core::{Identity, Thread, ThreadId, UserProfile};

use crate::dto::NewUser;
use crate::error::ClientResult;

/// Every call the client makes against the chat backend
///
/// Implementations hold no session state; `identity` scopes each call.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> ClientResult<UserProfile>;

    async fn get_user(&self, identity: &Identity) -> ClientResult<UserProfile>;

    async fn get_user_by_email(&self, email: &str) -> ClientResult<UserProfile>;

    /// Returns the stored concentration
    async fn update_concentration(
        &self,
        identity: &Identity,
        concentration: &str,
    ) -> ClientResult<String>;

    /// Returns the stored certificates
    async fn update_certificates(
        &self,
        identity: &Identity,
        certificates: &[String],
    ) -> ClientResult<Vec<String>>;

    async fn create_chat(&self, identity: &Identity) -> ClientResult<Thread>;

    async fn list_chats(&self, identity: &Identity) -> ClientResult<Vec<Thread>>;

    async fn get_chat(&self, chat_id: &ThreadId, identity: &Identity) -> ClientResult<Thread>;

    /// Returns the assistant's reply text
    async fn send_message(
        &self,
        chat_id: &ThreadId,
        identity: &Identity,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> ClientResult<String>;

    /// Returns the id of the deleted chat
    async fn delete_chat(&self, chat_id: &ThreadId, identity: &Identity) -> ClientResult<ThreadId>;
}
