//! Identity resolution for the Tiggy client
//!
//! The backend keys everything on the user's email. [`AuthGate`] answers
//! "who is signed in", either through an OAuth 2.0 device authorization grant
//! ([`DeviceCodeAuth`]) or through a configured email ([`LocalAuth`]).

pub mod cache;
pub mod device_code;
pub mod error;
pub mod gate;

pub use cache::CredentialCache;
pub use device_code::{DeviceCodeResponse, DeviceFlow};
pub use error::{AuthError, Result};
pub use gate::{build_auth_gate, AuthGate, DeviceCodeAuth, LocalAuth, LoginPrompt};
