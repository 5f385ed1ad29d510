//! Tiggy client
//!
//! [`HttpGateway`] speaks the backend's JSON API; [`SessionController`]
//! keeps the session state in step with it.

pub mod backend;
pub mod controller;
pub mod dto;
pub mod error;
pub mod gateway;

pub use backend::ChatBackend;
pub use controller::{SessionController, DEFAULT_REPLY_DELAY};
pub use dto::NewUser;
pub use error::{ClientError, ClientResult};
pub use gateway::HttpGateway;
