use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use std::sync::Arc;
use tiggy_auth::{AuthError, AuthGate, LoginPrompt};
use tiggy_client::SessionController;
use tiggy_config::{LocalState, UiConfig};
use tiggy_core::{
    export_transcript, transcript_file_name, Identity, Notice, ThreadId, TiggyError,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Send,
    Newline,
    NewThread,
    NextThread,
    PrevThread,
    DeleteThread,
    Export,
    Logout,
    DismissNotice,
    Input(char),
    Backspace,
    ScrollUp,
    ScrollDown,
}

pub fn key_action(key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let action = match key.code {
        KeyCode::Char('c') if ctrl => Action::Quit,
        KeyCode::Char('n') if ctrl => Action::NewThread,
        KeyCode::Char('x') if ctrl => Action::DeleteThread,
        KeyCode::Char('d') if ctrl => Action::Export,
        KeyCode::Char('o') if ctrl => Action::Logout,
        KeyCode::Up if ctrl => Action::PrevThread,
        KeyCode::Down if ctrl => Action::NextThread,
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            Action::Newline
        }
        KeyCode::Enter => Action::Send,
        KeyCode::Tab => Action::NextThread,
        KeyCode::BackTab => Action::PrevThread,
        KeyCode::Esc => Action::DismissNotice,
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Up | KeyCode::PageUp => Action::ScrollUp,
        KeyCode::Down | KeyCode::PageDown => Action::ScrollDown,
        KeyCode::Char(_) if ctrl => return None,
        KeyCode::Char(c) => Action::Input(c),
        _ => return None,
    };
    Some(action)
}

/// `'1'..='4'` picks a suggested question
fn suggestion_index(c: char, available: usize) -> Option<usize> {
    let n = c.to_digit(10)? as usize;
    (1..=available.min(4)).contains(&n).then(|| n - 1)
}

/// The thread after (or before) `current`, wrapping around
fn neighbor(ids: &[ThreadId], current: Option<&ThreadId>, forward: bool) -> Option<ThreadId> {
    if ids.is_empty() {
        return None;
    }
    let idx = current
        .and_then(|c| ids.iter().position(|id| id == c))
        .unwrap_or(0);
    let next = if forward {
        (idx + 1) % ids.len()
    } else {
        (idx + ids.len() - 1) % ids.len()
    };
    ids.get(next).cloned()
}

#[derive(Debug, Clone, Default)]
pub struct LoginView {
    pub prompt: Option<LoginPrompt>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Screen {
    Login(LoginView),
    Chat,
}

pub struct App {
    pub controller: SessionController,
    pub screen: Screen,
    pub suggestions: Vec<String>,
    pub assistant_name: String,
    pub scroll_offset: usize,
    auth: Arc<dyn AuthGate>,
    state_path: PathBuf,
    export_dir: PathBuf,
    login_rx: Option<oneshot::Receiver<Result<Identity, AuthError>>>,
}

impl App {
    pub fn new(
        controller: SessionController,
        auth: Arc<dyn AuthGate>,
        state_path: PathBuf,
        export_dir: PathBuf,
        ui: &UiConfig,
    ) -> Self {
        Self {
            controller,
            screen: Screen::Login(LoginView::default()),
            suggestions: ui.suggested_questions.clone(),
            assistant_name: ui.assistant_name.clone(),
            scroll_offset: 0,
            auth,
            state_path,
            export_dir,
            login_rx: None,
        }
    }

    pub fn is_logging_in(&self) -> bool {
        self.login_rx.is_some()
    }

    /// Resolve the signed-in user and load their threads
    pub async fn start(&mut self) {
        match self.auth.resolve_identity().await {
            Ok(identity) => self.enter_chat(identity).await,
            Err(e) => {
                info!("No signed-in user: {}", e);
                self.screen = Screen::Login(LoginView::default());
            }
        }
    }

    async fn enter_chat(&mut self, identity: Identity) {
        self.screen = Screen::Chat;
        self.scroll_offset = 0;

        match self.controller.list_threads(Some(&identity)).await {
            Ok(()) => {}
            Err(TiggyError::Unauthenticated) => {
                self.screen = Screen::Login(LoginView::default());
                return;
            }
            Err(e) => {
                self.controller
                    .notify(Notice::info(format!("Could not load chats: {}", e)));
                return;
            }
        }

        let local = LocalState::load(&self.state_path)
            .await
            .unwrap_or_default();
        if let Some(last) = local.active_thread_id.map(ThreadId::new) {
            self.controller.select_thread(&last);
        }
        if !local.has_completed_welcome {
            self.controller.notify(Notice::info(
                "Welcome! Run `tiggy profile setup` to finish your profile.",
            ));
        }
    }

    pub async fn begin_login(&mut self) {
        if self.login_rx.is_some() {
            return;
        }

        match self.auth.login().await {
            Ok(prompt) => {
                let (tx, rx) = oneshot::channel();
                let auth = Arc::clone(&self.auth);
                let pending = prompt.clone();
                tokio::spawn(async move {
                    let _ = tx.send(auth.complete_login(&pending).await);
                });
                self.login_rx = Some(rx);
                self.screen = Screen::Login(LoginView {
                    prompt: Some(prompt),
                    error: None,
                });
            }
            Err(e) => {
                warn!("Login could not start: {}", e);
                self.screen = Screen::Login(LoginView {
                    prompt: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    /// Apply send outcomes and a finished login, if any
    pub async fn process_events(&mut self) {
        self.controller.process_outcomes();

        let Some(rx) = self.login_rx.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(identity)) => {
                self.login_rx = None;
                self.enter_chat(identity).await;
            }
            Ok(Err(e)) => {
                self.login_rx = None;
                self.screen = Screen::Login(LoginView {
                    prompt: None,
                    error: Some(e.to_string()),
                });
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                self.login_rx = None;
            }
        }
    }

    /// Returns true when the app should exit
    pub async fn handle_key(&mut self, key: KeyEvent) -> bool {
        let Some(action) = key_action(key) else {
            return false;
        };

        if let Screen::Login(_) = self.screen {
            match action {
                Action::Quit | Action::DismissNotice => return true,
                Action::Send => self.begin_login().await,
                _ => {}
            }
            return false;
        }

        match action {
            Action::Quit => return true,
            Action::Send => self.submit(None),
            Action::Newline => self.edit_input(|input| input.push('\n')),
            Action::Input(c) => self.type_char(c),
            Action::Backspace => self.edit_input(|input| {
                input.pop();
            }),
            Action::NewThread => {
                if let Err(e) = self.controller.create_thread().await {
                    debug!("Create failed: {}", e);
                }
                self.scroll_offset = 0;
            }
            Action::NextThread | Action::PrevThread => {
                let ids: Vec<ThreadId> = self
                    .controller
                    .state()
                    .threads()
                    .iter()
                    .map(|t| t.id.clone())
                    .collect();
                let forward = action == Action::NextThread;
                if let Some(id) = neighbor(&ids, self.controller.state().active_id(), forward) {
                    self.controller.select_thread(&id);
                    self.scroll_offset = 0;
                }
            }
            Action::DeleteThread => {
                if let Some(id) = self.controller.state().active_id().cloned() {
                    if let Err(e) = self.controller.delete_thread(&id).await {
                        debug!("Delete failed: {}", e);
                    }
                }
            }
            Action::Export => self.export().await,
            Action::Logout => {
                if let Err(e) = self.controller.sign_out(self.auth.as_ref()).await {
                    warn!("Logout failed: {}", e);
                }
                self.screen = Screen::Login(LoginView::default());
            }
            Action::DismissNotice => self.controller.dismiss_notice(),
            Action::ScrollUp => self.scroll_offset = self.scroll_offset.saturating_add(1),
            Action::ScrollDown => self.scroll_offset = self.scroll_offset.saturating_sub(1),
        }
        false
    }

    fn edit_input(&mut self, edit: impl FnOnce(&mut String)) {
        let mut input = self.controller.state().composer().input().to_string();
        edit(&mut input);
        self.controller.set_input(input);
    }

    fn type_char(&mut self, c: char) {
        let state = self.controller.state();
        let on_welcome = state.active_thread().map_or(false, |t| t.is_empty())
            && state.composer().input().is_empty();

        if on_welcome {
            if let Some(idx) = suggestion_index(c, self.suggestions.len()) {
                let question = self.suggestions[idx].clone();
                self.submit(Some(&question));
                return;
            }
        }
        self.edit_input(|input| input.push(c));
    }

    fn submit(&mut self, explicit: Option<&str>) {
        match self.controller.submit(explicit) {
            Ok(()) => self.scroll_offset = 0,
            Err(TiggyError::Unauthenticated) => {
                self.screen = Screen::Login(LoginView::default());
            }
            Err(e) => debug!("Submit rejected: {}", e),
        }
    }

    async fn export(&mut self) {
        let Some(thread) = self.controller.state().active_thread() else {
            return;
        };
        let Some(transcript) = export_transcript(thread.messages()) else {
            self.controller.notify(Notice::info("Nothing to export yet"));
            return;
        };

        let path = self
            .export_dir
            .join(transcript_file_name(Local::now().date_naive()));
        match tokio::fs::write(&path, transcript).await {
            Ok(()) => {
                info!("Transcript saved to {:?}", path);
                self.controller
                    .notify(Notice::info(format!("Saved {}", path.display())));
            }
            Err(e) => {
                warn!("Export failed: {}", e);
                self.controller
                    .notify(Notice::info(format!("Export failed: {}", e)));
            }
        }
    }

    /// Cancel in-flight work and remember the active thread
    pub async fn shutdown(&mut self) {
        self.controller.shutdown();

        let Some(active) = self.controller.state().active_id() else {
            return;
        };
        if active.is_placeholder() {
            return;
        }
        let mut local = LocalState::load(&self.state_path)
            .await
            .unwrap_or_default();
        local.active_thread_id = Some(active.to_string());
        if let Err(e) = local.save(&self.state_path).await {
            warn!("Could not save local state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(
            key_action(key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Action::Send)
        );
        assert_eq!(
            key_action(key(KeyCode::Enter, KeyModifiers::SHIFT)),
            Some(Action::Newline)
        );
        assert_eq!(
            key_action(key(KeyCode::Char('n'), KeyModifiers::CONTROL)),
            Some(Action::NewThread)
        );
        assert_eq!(
            key_action(key(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            Some(Action::DeleteThread)
        );
        assert_eq!(
            key_action(key(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            Some(Action::Export)
        );
        assert_eq!(
            key_action(key(KeyCode::Down, KeyModifiers::CONTROL)),
            Some(Action::NextThread)
        );
        assert_eq!(
            key_action(key(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(Action::PrevThread)
        );
        assert_eq!(
            key_action(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(
            key_action(key(KeyCode::Char('Q'), KeyModifiers::SHIFT)),
            Some(Action::Input('Q'))
        );
        assert_eq!(key_action(key(KeyCode::Char('z'), KeyModifiers::CONTROL)), None);
    }

    #[test]
    fn test_suggestion_index() {
        assert_eq!(suggestion_index('1', 4), Some(0));
        assert_eq!(suggestion_index('4', 4), Some(3));
        assert_eq!(suggestion_index('5', 4), None);
        assert_eq!(suggestion_index('3', 2), None);
        assert_eq!(suggestion_index('a', 4), None);
        assert_eq!(suggestion_index('0', 4), None);
    }

    #[test]
    fn test_neighbor_wraps() {
        let ids: Vec<ThreadId> = ["a", "b", "c"].into_iter().map(ThreadId::new).collect();
        let b = ThreadId::new("b");
        let c = ThreadId::new("c");
        assert_eq!(neighbor(&ids, Some(&b), true), Some(c.clone()));
        assert_eq!(neighbor(&ids, Some(&c), true), Some(ThreadId::new("a")));
        assert_eq!(neighbor(&ids, Some(&ThreadId::new("a")), false), Some(c));
        assert_eq!(neighbor(&[], None, true), None);
    }
}
