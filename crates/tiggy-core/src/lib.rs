//! # Tiggy Core
//!
//! Client-side state for the Tiggy chat assistant.
//!
//! - **Threads and messages**: user and assistant messages merged into one
//!   chronological sequence per thread
//! - **Session state**: the thread set, the active thread and the composer,
//!   advanced by [`Command`] values through [`SessionState::apply`]
//! - **Rendering**: display order, time labels, transcript export
//!
//! Nothing here performs I/O; the backend and the auth provider live in
//! `tiggy-client` and `tiggy-auth`.

pub mod composer;
pub mod error;
pub mod render;
pub mod state;
pub mod title;
pub mod types;

pub use composer::{Composer, PendingSend};
pub use error::{TiggyError, TiggyResult};
pub use render::{export_transcript, render_messages, transcript_file_name, RenderedMessage};
pub use state::{Command, Notice, NoticeKind, SessionState};
pub use title::{derive_title, SENTINEL_TITLE};
pub use types::{Identity, Message, Origin, Thread, ThreadId, UserProfile};
