//! Session controller
//!
//! Drives [`SessionState`] against a [`ChatBackend`]. User actions run here;
//! sends run as spawned tasks whose outcomes come back as [`Command`]s over a
//! channel and are applied by [`SessionController::handle_outcome`].

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tiggy_auth::AuthGate;
use tiggy_core::{
    Command, Identity, Message, Notice, SessionState, Thread, ThreadId, TiggyError, TiggyResult,
};
use tiggy_observability::thread_span;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::backend::ChatBackend;
use crate::error::ClientError;

pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);

pub struct SessionController {
    backend: Arc<dyn ChatBackend>,
    identity: Option<Identity>,
    state: SessionState,
    reply_delay: Duration,
    outcome_tx: mpsc::UnboundedSender<Command>,
    outcome_rx: mpsc::UnboundedReceiver<Command>,
    sends: HashMap<ThreadId, CancellationToken>,
    shutdown: CancellationToken,
}

impl SessionController {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            identity: None,
            state: SessionState::new(),
            reply_delay: DEFAULT_REPLY_DELAY,
            outcome_tx,
            outcome_rx,
            sends: HashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Pause between receiving a reply and showing it
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn apply(&mut self, command: Command) {
        let state = std::mem::take(&mut self.state);
        self.state = state.apply(command);
    }

    fn require_identity(&self) -> TiggyResult<Identity> {
        self.identity.clone().ok_or(TiggyError::Unauthenticated)
    }

    /// Surface a failed write as a notice
    fn fail_write(&mut self, error: ClientError) -> TiggyError {
        let error = TiggyError::from(error);
        self.apply(Command::ShowNotice(Notice::error(&error)));
        error
    }

    /// Load every thread of `identity`, most recent first
    ///
    /// Without an identity nothing is fetched. A failed read leaves the
    /// current view as it was.
    pub async fn list_threads(&mut self, identity: Option<&Identity>) -> TiggyResult<()> {
        let identity = identity.cloned().ok_or(TiggyError::Unauthenticated)?;
        self.identity = Some(identity.clone());

        match self.backend.list_chats(&identity).await {
            Ok(threads) => {
                info!(count = threads.len(), "Threads listed");
                self.apply(Command::ThreadsListed(threads));
                Ok(())
            }
            Err(e) => {
                warn!("Failed to list threads: {}", e);
                Err(e.into())
            }
        }
    }

    /// Create an empty thread on the backend and make it active
    pub async fn create_thread(&mut self) -> TiggyResult<ThreadId> {
        let identity = self.require_identity()?;
        match self.backend.create_chat(&identity).await {
            Ok(thread) => {
                let id = thread.id.clone();
                info!(thread_id = %id, "Thread created");
                self.apply(Command::ThreadCreated(thread));
                Ok(id)
            }
            Err(e) => Err(self.fail_write(e)),
        }
    }

    /// Make `id` active; unknown ids change nothing
    pub fn select_thread(&mut self, id: &ThreadId) -> bool {
        let known = self.state.contains(id);
        self.apply(Command::SelectThread(id.clone()));
        known
    }

    /// Delete a thread. The last remaining thread is never deleted.
    pub async fn delete_thread(&mut self, id: &ThreadId) -> TiggyResult<()> {
        if !self.state.can_delete() {
            debug!(thread_id = %id, "Refusing to delete the only thread");
            return Ok(());
        }
        if !self.state.contains(id) {
            return Err(TiggyError::ThreadNotFound { id: id.to_string() });
        }

        if !id.is_placeholder() {
            let identity = self.require_identity()?;
            if let Err(e) = self.backend.delete_chat(id, &identity).await {
                return Err(self.fail_write(e));
            }
        }

        if let Some(token) = self.sends.remove(id) {
            token.cancel();
        }
        info!(thread_id = %id, "Thread deleted");
        self.apply(Command::ThreadDeleted(id.clone()));
        Ok(())
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.apply(Command::InputChanged(text.into()));
    }

    pub fn notify(&mut self, notice: Notice) {
        self.apply(Command::ShowNotice(notice));
    }

    pub fn dismiss_notice(&mut self) {
        self.apply(Command::DismissNotice);
    }

    /// Send `explicit` text, or the pending input when `None`
    ///
    /// Blank text and a send already in flight are rejected with
    /// `Validation` before anything changes. Otherwise the user message is
    /// appended at once and the backend call runs in the background.
    pub fn submit(&mut self, explicit: Option<&str>) -> TiggyResult<()> {
        let identity = self.require_identity()?;
        let text = self.state.composer().resolve(explicit)?;
        let thread_id = self
            .state
            .active_id()
            .cloned()
            .ok_or_else(|| TiggyError::validation("no active thread"))?;

        let message = Message::user(text.clone());
        let timestamp = message.timestamp;
        self.apply(Command::SubmitAccepted {
            thread_id: thread_id.clone(),
            message,
        });

        let cancel = self.shutdown.child_token();
        self.sends.insert(thread_id.clone(), cancel.clone());

        let job = SendJob {
            backend: Arc::clone(&self.backend),
            identity,
            thread_id: thread_id.clone(),
            text,
            timestamp,
            delay: self.reply_delay,
            outcomes: self.outcome_tx.clone(),
            cancel,
        };
        tokio::spawn(job.run().instrument(thread_span(thread_id.as_str())));
        Ok(())
    }

    /// Apply one outcome produced by a background send
    pub fn handle_outcome(&mut self, command: Command) {
        match &command {
            Command::ThreadPersisted { placeholder, id } => {
                if let Some(token) = self.sends.remove(placeholder) {
                    self.sends.insert(id.clone(), token);
                }
            }
            Command::ReplyReceived { thread_id, .. } | Command::ReplyFailed { thread_id, .. } => {
                self.sends.remove(thread_id);
            }
            _ => {}
        }
        self.apply(command);
    }

    /// Apply every outcome that has already arrived
    pub fn process_outcomes(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.outcome_rx.try_recv() {
            self.handle_outcome(command);
            applied += 1;
        }
        applied
    }

    /// Wait until no send is in flight
    pub async fn settle(&mut self) {
        while self.state.composer().is_in_flight() {
            match self.outcome_rx.recv().await {
                Some(command) => self.handle_outcome(command),
                None => break,
            }
        }
    }

    /// Fetch one thread with its merged history
    pub async fn fetch_thread(&self, id: &ThreadId) -> TiggyResult<Thread> {
        let identity = self.require_identity()?;
        self.backend.get_chat(id, &identity).await.map_err(|e| {
            warn!(thread_id = %id, "Failed to fetch thread: {}", e);
            TiggyError::from(e)
        })
    }

    /// Cancel every in-flight send
    pub fn shutdown(&mut self) {
        self.shutdown.cancel();
        self.sends.clear();
    }

    /// Cancel sends, drop all session state and sign out of `auth`
    pub async fn sign_out(&mut self, auth: &dyn AuthGate) -> TiggyResult<()> {
        self.shutdown();
        self.shutdown = CancellationToken::new();
        self.identity = None;
        self.apply(Command::SignedOut);
        auth.logout().await.map_err(TiggyError::from)
    }
}

struct SendJob {
    backend: Arc<dyn ChatBackend>,
    identity: Identity,
    thread_id: ThreadId,
    text: String,
    timestamp: chrono::DateTime<Utc>,
    delay: Duration,
    outcomes: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl SendJob {
    async fn run(self) {
        let cancel = self.cancel.clone();
        let delivered = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Send cancelled");
                return;
            }
            delivered = self.deliver() => delivered,
        };

        let command = match delivered {
            Ok((thread_id, reply)) => {
                if !self.delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.delay) => {}
                    }
                }
                Command::ReplyReceived {
                    thread_id,
                    message: Message::assistant(reply),
                }
            }
            Err((thread_id, error)) => Command::ReplyFailed {
                thread_id,
                error: error.into(),
            },
        };

        if self.outcomes.send(command).is_err() {
            debug!("Session closed before the send outcome arrived");
        }
    }

    /// Persist a placeholder thread if needed, then send
    async fn deliver(&self) -> Result<(ThreadId, String), (ThreadId, ClientError)> {
        let mut chat_id = self.thread_id.clone();

        if chat_id.is_placeholder() {
            let created = self
                .backend
                .create_chat(&self.identity)
                .await
                .map_err(|e| (chat_id.clone(), e))?;
            debug!(thread_id = %created.id, "Placeholder thread persisted");
            let _ = self.outcomes.send(Command::ThreadPersisted {
                placeholder: chat_id.clone(),
                id: created.id.clone(),
            });
            chat_id = created.id;
        }

        let reply = self
            .backend
            .send_message(&chat_id, &self.identity, &self.text, self.timestamp)
            .await
            .map_err(|e| (chat_id.clone(), e))?;
        Ok((chat_id, reply))
    }
}
