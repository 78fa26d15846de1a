mod commands;
mod output;
mod repl;


use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppConfig;
use crate::core::error::HtpError;
use crate::core::persistence::{SessionPersistence, TokenStore};
use crate::http::HttpApi;
use crate::storage::{Database, MemoryStore};

#[derive(Parser, Debug)]
#[command(name = "htp", version, about = "Terminal client for the HTP drawing test service")]
struct Cli {
    /// Working directory
    #[arg(short = 'c', long = "cwd", global = true)]
    working_dir: Option<PathBuf>,

    /// Owner id (overrides config)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Keep tokens and the last session in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the stored bearer token
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Upload a drawing and wait for its analysis
    Analyze {
        image: PathBuf,
        /// Free-text note sent with the drawing
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Chat with a persona
    Chat {
        /// Persona id or key (e.g. 3 or analyst)
        #[arg(short, long)]
        persona: String,
        /// Name for a newly created session
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List chat sessions grouped by day
    Sessions,
    /// Show or edit the profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Debug)]
enum AuthAction {
    Login {
        #[arg(short, long)]
        token: String,
    },
    Logout,
    Status,
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    Show,
    Rename { name: String },
}

pub struct App {
    pub config: AppConfig,
    pub api: Arc<HttpApi>,
    pub persistence: Arc<dyn SessionPersistence>,
    pub tokens: Arc<dyn TokenStore>,
}

impl App {
    pub fn owner(&self) -> Result<&str> {
        self.config
            .user_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .context("No user id. Pass --user or set HTP_USER_ID.")
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.working_dir.clone())?;
    if let Some(user) = cli.user.clone() {
        config.user_id = Some(user);
    }
    config.debug |= cli.debug;

    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let app = build_app(config, cli.ephemeral).await?;

    match cli.command {
        Command::Auth { action } => match action {
            AuthAction::Login { token } => commands::login(&app, token).await,
            AuthAction::Logout => commands::logout(&app).await,
            AuthAction::Status => commands::auth_status(&app).await,
        },
        Command::Analyze { image, note } => commands::analyze(&app, image, note).await,
        Command::Chat { persona, name } => repl::run(app, &persona, name).await,
        Command::Sessions => commands::sessions(&app).await,
        Command::Profile { action } => match action {
            ProfileAction::Show => commands::profile_show(&app).await,
            ProfileAction::Rename { name } => commands::profile_rename(&app, &name).await,
        },
    }
}

fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig> {
    crate::core::config::load_config(working_dir).map_err(|e| anyhow::anyhow!("{e}"))
}

async fn build_app(config: AppConfig, ephemeral: bool) -> Result<App, HtpError> {
    let (persistence, tokens): (Arc<dyn SessionPersistence>, Arc<dyn TokenStore>) = if ephemeral {
        let store = Arc::new(MemoryStore::new());
        let persistence: Arc<dyn SessionPersistence> = store.clone();
        let tokens: Arc<dyn TokenStore> = store;
        (persistence, tokens)
    } else {
        let db = Database::open(&config).await?;
        db.run_migrations().await?;
        let store = Arc::new(db.local_store());
        let persistence: Arc<dyn SessionPersistence> = store.clone();
        let tokens: Arc<dyn TokenStore> = store;
        (persistence, tokens)
    };

    // A configured token only seeds the store; an explicit login wins.
    if let Some(seed) = config.auth_token.as_deref().filter(|t| !t.trim().is_empty()) {
        if tokens.token().await?.is_none() {
            tokens.set_token(seed).await?;
        }
    }

    let api = Arc::new(HttpApi::new(&config, tokens.clone())?);

    Ok(App {
        config,
        api,
        persistence,
        tokens,
    })
}
