use anyhow::{bail, Context};
use chrono::Local;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tiggy_auth::{build_auth_gate, AuthError, AuthGate};
use tiggy_client::{ChatBackend, HttpGateway, NewUser, SessionController};
use tiggy_config::{Config, ConfigManager, LocalState};
use tiggy_core::render::thread_meta;
use tiggy_core::{
    export_transcript, render_messages, transcript_file_name, Identity, NoticeKind, Origin,
    Thread, ThreadId,
};
use tiggy_observability::{LogManager, LogSink};

use crate::{ConfigCommands, ProfileCommands};

/// Everything a signed-in command needs
pub struct Session {
    dir: PathBuf,
    auth: Arc<dyn AuthGate>,
    backend: Arc<dyn ChatBackend>,
    _log_manager: LogManager,
}

impl Session {
    pub async fn open(config_path: &Path, debug: bool) -> anyhow::Result<Self> {
        tiggy_config::init_tiggy_dirs().await?;
        let dir = tiggy_config::tiggy_dir().context("Could not determine home directory")?;

        let manager = ConfigManager::load(config_path).await?;
        let config = manager.snapshot().await;

        // Keep stderr quiet unless asked
        let mut logging = config.logging.clone();
        logging.level = if debug { "debug" } else { "warn" }.to_string();
        let log_manager = LogManager::init(&logging, LogSink::Stderr)?;

        let auth = build_auth_gate(&config.auth, &dir)?;
        let backend: Arc<dyn ChatBackend> = Arc::new(HttpGateway::new(&config.backend)?);

        Ok(Self {
            dir,
            auth,
            backend,
            _log_manager: log_manager,
        })
    }

    fn state_path(&self) -> PathBuf {
        LocalState::path_in(&self.dir)
    }

    async fn identity(&self) -> anyhow::Result<Identity> {
        match self.auth.resolve_identity().await {
            Ok(identity) => Ok(identity),
            Err(AuthError::Unauthenticated) | Err(AuthError::Expired) => {
                bail!("Not signed in. Run `tiggy login` first.")
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A controller holding the user's thread listing
    async fn controller(&self) -> anyhow::Result<SessionController> {
        let identity = self.identity().await?;
        // The reply delay is a UI effect; the CLI prints as soon as it can
        let mut controller =
            SessionController::new(Arc::clone(&self.backend)).with_reply_delay(Duration::ZERO);
        controller.list_threads(Some(&identity)).await?;
        Ok(controller)
    }

    pub async fn login(&self) -> anyhow::Result<()> {
        let prompt = self.auth.login().await?;
        for line in prompt.instructions() {
            println!("{}", line.cyan());
        }

        let identity = self.auth.complete_login(&prompt).await?;
        println!("{}", format!("✅ Signed in as {}", identity).green());

        let state = LocalState::load(&self.state_path()).await?;
        if !state.has_completed_welcome {
            println!(
                "{}",
                "Run `tiggy profile setup --name <name>` to finish setting up your profile"
                    .dimmed()
            );
        }
        Ok(())
    }

    pub async fn logout(&self) -> anyhow::Result<()> {
        let mut controller = SessionController::new(Arc::clone(&self.backend));
        controller.sign_out(self.auth.as_ref()).await?;
        println!("{}", "✅ Signed out".green());
        Ok(())
    }

    pub async fn whoami(&self) -> anyhow::Result<()> {
        let identity = self.identity().await?;
        let state = LocalState::load(&self.state_path()).await?;

        println!("{}", identity.to_string().cyan().bold());
        if let Some(name) = &state.user_name {
            println!("Name: {}", name);
        }
        if !state.has_completed_welcome {
            println!("{}", "Profile not set up yet".yellow());
        }
        Ok(())
    }

    pub async fn chats(&self) -> anyhow::Result<()> {
        let controller = self.controller().await?;
        let state = controller.state();

        let persisted: Vec<&Thread> = state
            .threads()
            .iter()
            .filter(|t| t.is_persisted())
            .collect();
        if persisted.is_empty() {
            println!("{}", "No chats yet. Start one with `tiggy send <text>`".dimmed());
            return Ok(());
        }

        for thread in persisted {
            let marker = if state.active_id() == Some(&thread.id) {
                "*"
            } else {
                " "
            };
            println!("{} {}", marker.yellow(), thread.title.bold());
            println!("    {}  {}", thread_meta(thread).dimmed(), thread.id.as_str().dimmed());
        }
        Ok(())
    }

    pub async fn new_chat(&self) -> anyhow::Result<()> {
        let mut controller = self.controller().await?;
        let id = controller.create_thread().await?;
        println!("{}", format!("✅ Created chat {}", id).green());
        Ok(())
    }

    pub async fn send(&self, text: &str, chat: Option<&str>) -> anyhow::Result<()> {
        let mut controller = self.controller().await?;

        if let Some(chat) = chat {
            let id = ThreadId::new(chat);
            if !controller.select_thread(&id) {
                bail!("Unknown chat: {}", chat);
            }
        }

        controller.submit(Some(text))?;
        println!("{}", "Tiggy is thinking...".dimmed());
        controller.settle().await;

        let state = controller.state();
        if let Some(notice) = state.notice() {
            if notice.kind == NoticeKind::Error {
                bail!("{}", notice.text);
            }
        }

        let thread = state.active_thread().context("No active chat")?;
        if let Some(reply) = thread.messages().last().filter(|m| !m.is_user()) {
            println!("{}", "Tiggy:".green().bold());
            println!("{}", reply.text);
        }

        let mut local = LocalState::load(&self.state_path()).await?;
        local.active_thread_id = Some(thread.id.to_string());
        local.save(&self.state_path()).await?;
        Ok(())
    }

    pub async fn history(&self, chat: &str) -> anyhow::Result<()> {
        let controller = self.controller().await?;
        let thread = controller.fetch_thread(&ThreadId::new(chat)).await?;

        println!("{}", thread.title.cyan().bold());
        println!();
        if thread.is_empty() {
            println!("{}", "No messages yet".dimmed());
            return Ok(());
        }

        for message in render_messages(thread.messages()) {
            let sender = match message.origin {
                Origin::User => message.sender.cyan().bold(),
                Origin::Assistant => message.sender.green().bold(),
            };
            println!("{} {}", format!("[{}]", message.time_label).dimmed(), sender);
            println!("{}", message.text);
            println!();
        }
        Ok(())
    }

    pub async fn delete(&self, chat: &str) -> anyhow::Result<()> {
        let mut controller = self.controller().await?;
        if !controller.state().can_delete() {
            bail!("Cannot delete your only chat");
        }
        controller.delete_thread(&ThreadId::new(chat)).await?;
        println!("{}", format!("✅ Deleted chat {}", chat).green());
        Ok(())
    }

    pub async fn export(&self, chat: &str, out: Option<PathBuf>) -> anyhow::Result<()> {
        let controller = self.controller().await?;
        let thread = controller.fetch_thread(&ThreadId::new(chat)).await?;

        let Some(transcript) = export_transcript(thread.messages()) else {
            println!("{}", "Nothing to export yet".yellow());
            return Ok(());
        };

        let dir = match out {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let path = dir.join(transcript_file_name(Local::now().date_naive()));
        tokio::fs::write(&path, transcript)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("{}", format!("✅ Saved {}", path.display()).green());
        Ok(())
    }

    pub async fn profile(&self, command: ProfileCommands) -> anyhow::Result<()> {
        let identity = self.identity().await?;

        match command {
            ProfileCommands::Show => {
                let profile = self.backend.get_user(&identity).await?;
                println!("{}", "📋 Profile:".cyan().bold());
                println!("Name:          {}", profile.name);
                println!("Email:         {}", profile.email);
                if let Some(year) = profile.grad_year {
                    println!("Class of:      {}", year);
                }
                println!(
                    "Concentration: {}",
                    profile.concentration.as_deref().unwrap_or("-")
                );
                if !profile.certificates.is_empty() {
                    println!("Certificates:  {}", profile.certificates.join(", "));
                }
            }
            ProfileCommands::Setup {
                name,
                grad_year,
                concentration,
                certificates,
            } => {
                let user = NewUser {
                    email: identity.to_string(),
                    name,
                    grad_year,
                    concentration,
                    certificates,
                };
                let profile = self.backend.create_user(&user).await?;

                let path = self.state_path();
                let mut local = LocalState::load(&path).await?;
                local.has_completed_welcome = true;
                local.user_name = Some(profile.name.clone());
                local.user_email = Some(profile.email.clone());
                local.save(&path).await?;

                println!("{}", format!("✅ Welcome, {}!", profile.name).green());
            }
            ProfileCommands::SetConcentration { concentration } => {
                let stored = self
                    .backend
                    .update_concentration(&identity, &concentration)
                    .await?;
                println!("{}", format!("✅ Concentration set to {}", stored).green());
            }
            ProfileCommands::SetCertificates { certificates } => {
                let stored = self
                    .backend
                    .update_certificates(&identity, &certificates)
                    .await?;
                println!(
                    "{}",
                    format!("✅ Certificates set to {}", stored.join(", ")).green()
                );
            }
        }
        Ok(())
    }
}

pub async fn handle_config(command: ConfigCommands, config_path: &Path) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => println!("{}", format!("{} = {}", key, value).green()),
                None => bail!("Key not found: {}", key),
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(config_path).await?;

            manager
                .update(|config| config.set_value(&key, &value))
                .await?;
            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!(
                    "{}",
                    format!("⚠️  Config already exists at {:?}", config_path).yellow()
                );
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            tiggy_config::init_tiggy_dirs().await?;

            let manager = ConfigManager::new(Config::default(), config_path.to_path_buf());
            manager.save().await?;

            println!(
                "{}",
                format!("✅ Config initialized at {:?}", config_path).green()
            );
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            println!("{}", "📋 Current Configuration:".cyan().bold());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
