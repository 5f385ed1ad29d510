//! # Session State
//!
//! The thread set, the active thread and the composer, advanced only through
//! [`SessionState::apply`]. Each command is one whole-state transition: the
//! old state goes in, the new state comes out.

use tracing::{debug, warn};

use crate::composer::{Composer, PendingSend};
use crate::error::TiggyError;
use crate::types::{Message, Thread, ThreadId};

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A one-line banner shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    pub retryable: bool,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
            retryable: false,
        }
    }

    pub fn error(error: &TiggyError) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Every user action and backend outcome the session reacts to
#[derive(Debug, Clone)]
pub enum Command {
    /// Backend listing completed; replaces the thread set
    ThreadsListed(Vec<Thread>),
    /// A new thread was created and becomes active
    ThreadCreated(Thread),
    /// A placeholder thread got its server id
    ThreadPersisted { placeholder: ThreadId, id: ThreadId },
    SelectThread(ThreadId),
    /// Backend confirmed deletion
    ThreadDeleted(ThreadId),
    AppendMessage { thread_id: ThreadId, message: Message },
    InputChanged(String),
    /// Composer accepted a user message for sending
    SubmitAccepted { thread_id: ThreadId, message: Message },
    /// The assistant reply for the in-flight send arrived
    ReplyReceived { thread_id: ThreadId, message: Message },
    /// The in-flight send failed; roll back and report
    ReplyFailed { thread_id: ThreadId, error: TiggyError },
    ShowNotice(Notice),
    DismissNotice,
    SignedOut,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    threads: Vec<Thread>,
    active: Option<ThreadId>,
    composer: Composer,
    notice: Option<Notice>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Threads in display order
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: &ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| &t.id == id)
    }

    fn thread_mut(&mut self, id: &ThreadId) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| &t.id == id)
    }

    pub fn contains(&self, id: &ThreadId) -> bool {
        self.thread(id).is_some()
    }

    pub fn active_id(&self) -> Option<&ThreadId> {
        self.active.as_ref()
    }

    pub fn active_thread(&self) -> Option<&Thread> {
        self.active.as_ref().and_then(|id| self.thread(id))
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Deleting is only offered while more than one thread exists
    pub fn can_delete(&self) -> bool {
        self.threads.len() > 1
    }

    /// Whether the in-flight send targets `id`
    fn is_pending_for(&self, id: &ThreadId) -> bool {
        self.composer.pending().map(|p| &p.thread_id) == Some(id)
    }

    /// Apply one command and return the resulting state
    pub fn apply(mut self, command: Command) -> Self {
        match command {
            Command::ThreadsListed(mut threads) => {
                threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                if threads.is_empty() {
                    debug!("Backend reported no threads, synthesizing a default one");
                    threads.push(Thread::placeholder());
                }
                self.active = threads.first().map(|t| t.id.clone());
                self.threads = threads;
            }
            Command::ThreadCreated(thread) => {
                self.active = Some(thread.id.clone());
                self.threads.insert(0, thread);
                self.composer.clear_input();
            }
            Command::ThreadPersisted { placeholder, id } => {
                if let Some(thread) = self.thread_mut(&placeholder) {
                    thread.id = id.clone();
                }
                if self.active.as_ref() == Some(&placeholder) {
                    self.active = Some(id.clone());
                }
                self.composer.retarget(&placeholder, &id);
            }
            Command::SelectThread(id) => {
                if self.contains(&id) {
                    self.active = Some(id);
                    self.composer.clear_input();
                } else {
                    debug!(thread_id = %id, "Ignoring selection of unknown thread");
                }
            }
            Command::ThreadDeleted(id) => {
                if !self.can_delete() || !self.contains(&id) {
                    return self;
                }
                self.threads.retain(|t| t.id != id);
                if self.active.as_ref() == Some(&id) {
                    self.active = self.threads.first().map(|t| t.id.clone());
                }
                if self.composer.pending().map(|p| &p.thread_id) == Some(&id) {
                    self.composer.finish();
                }
            }
            Command::AppendMessage { thread_id, message } => match self.thread_mut(&thread_id) {
                Some(thread) => thread.append(message),
                None => warn!(thread_id = %thread_id, "Dropping message for unknown thread"),
            },
            Command::InputChanged(text) => {
                self.composer.set_input(text);
            }
            Command::SubmitAccepted { thread_id, message } => {
                let Some(thread) = self.thread_mut(&thread_id) else {
                    warn!(thread_id = %thread_id, "Submit for unknown thread ignored");
                    return self;
                };
                let pending = PendingSend {
                    thread_id: thread_id.clone(),
                    message_id: message.id.clone(),
                    text: message.text.clone(),
                    previous_title: thread.title.clone(),
                    previous_updated_at: thread.updated_at,
                };
                thread.append(message);
                self.composer.begin(pending);
                self.notice = None;
            }
            Command::ReplyReceived { thread_id, message } => {
                if !self.is_pending_for(&thread_id) {
                    debug!(thread_id = %thread_id, "Stale reply discarded");
                    return self;
                }
                self.composer.finish();
                match self.thread_mut(&thread_id) {
                    Some(thread) => thread.append(message),
                    None => debug!(thread_id = %thread_id, "Reply for a removed thread discarded"),
                }
            }
            Command::ReplyFailed { thread_id, error } => {
                if !self.is_pending_for(&thread_id) {
                    debug!(thread_id = %thread_id, error = %error, "Stale send failure discarded");
                    return self;
                }
                if let Some(pending) = self.composer.finish() {
                    if let Some(thread) = self.thread_mut(&pending.thread_id) {
                        thread.remove_message(&pending.message_id);
                        thread.title = pending.previous_title;
                        thread.updated_at = pending.previous_updated_at;
                    }
                    if self.composer.input().is_empty() {
                        self.composer.set_input(pending.text);
                    }
                }
                warn!(thread_id = %thread_id, error = %error, "Send failed");
                self.notice = Some(Notice::error(&error));
            }
            Command::ShowNotice(notice) => {
                self.notice = Some(notice);
            }
            Command::DismissNotice => {
                self.notice = None;
            }
            Command::SignedOut => {
                return Self::default();
            }
        }
        self
    }
}
