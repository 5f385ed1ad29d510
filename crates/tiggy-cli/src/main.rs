use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "tiggy")]
#[command(about = "Command-line client for the Tiggy campus assistant")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Config file path
    #[arg(long, env = "TIGGY_CONFIG", default_value = "~/.tiggy/config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login,
    /// Sign out and forget local session data
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List chats, most recent first
    Chats,
    /// Start a new chat
    New,
    /// Send a message and print the reply
    Send {
        /// Message text
        text: String,
        /// Chat to send to (defaults to the most recent one)
        #[arg(long)]
        chat: Option<String>,
    },
    /// Print the messages of a chat
    History {
        /// Chat id
        chat: String,
    },
    /// Delete a chat
    Delete {
        /// Chat id
        chat: String,
    },
    /// Save a chat transcript to a text file
    Export {
        /// Chat id
        chat: String,
        /// Output directory (defaults to the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Account profile
    Profile(ProfileArgs),
    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct ProfileArgs {
    #[command(subcommand)]
    command: ProfileCommands,
}

#[derive(Subcommand, Clone)]
enum ProfileCommands {
    /// Show the stored profile
    Show,
    /// Create the backend profile for the signed-in user
    Setup {
        /// Display name
        #[arg(long)]
        name: String,
        /// Graduation year
        #[arg(long)]
        grad_year: Option<i32>,
        /// Concentration (e.g. COS)
        #[arg(long)]
        concentration: Option<String>,
        /// Certificates, comma separated
        #[arg(long, value_delimiter = ',')]
        certificates: Vec<String>,
    },
    /// Change the concentration
    SetConcentration {
        concentration: String,
    },
    /// Replace the certificate list
    SetCertificates {
        #[arg(required = true)]
        certificates: Vec<String>,
    },
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Get a config value
    Get {
        /// Config key (e.g. backend.base_url, ui.reply_delay_ms)
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key (e.g. backend.base_url, ui.reply_delay_ms)
        key: String,
        /// New value
        value: String,
    },
    /// Write the default config
    Init {
        /// Overwrite an existing config
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// Show the current config
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path =
        tiggy_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    if cli.debug {
        eprintln!("{}", "[DEBUG] Debug mode enabled".dimmed());
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    // Config commands must work even when the config is broken
    let command = match cli.command {
        Commands::Config(args) => return commands::handle_config(args.command, &config_path).await,
        other => other,
    };

    let session = commands::Session::open(&config_path, cli.debug).await?;

    match command {
        Commands::Login => session.login().await,
        Commands::Logout => session.logout().await,
        Commands::Whoami => session.whoami().await,
        Commands::Chats => session.chats().await,
        Commands::New => session.new_chat().await,
        Commands::Send { text, chat } => session.send(&text, chat.as_deref()).await,
        Commands::History { chat } => session.history(&chat).await,
        Commands::Delete { chat } => session.delete(&chat).await,
        Commands::Export { chat, out } => session.export(&chat, out).await,
        Commands::Profile(args) => session.profile(args.command).await,
        Commands::Config(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send_with_chat() {
        let cli = Cli::parse_from(["tiggy", "send", "How do I register?", "--chat", "66f1"]);
        match cli.command {
            Commands::Send { text, chat } => {
                assert_eq!(text, "How do I register?");
                assert_eq!(chat.as_deref(), Some("66f1"));
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_parse_profile_setup_certificates() {
        let cli = Cli::parse_from([
            "tiggy",
            "profile",
            "setup",
            "--name",
            "Tiger",
            "--grad-year",
            "2027",
            "--certificates",
            "SML,TPP",
        ]);
        match cli.command {
            Commands::Profile(ProfileArgs {
                command:
                    ProfileCommands::Setup {
                        name,
                        grad_year,
                        certificates,
                        ..
                    },
            }) => {
                assert_eq!(name, "Tiger");
                assert_eq!(grad_year, Some(2027));
                assert_eq!(certificates, vec!["SML", "TPP"]);
            }
            _ => panic!("expected profile setup"),
        }
    }
}
