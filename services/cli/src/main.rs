//! Chirp command line client (`chirp`)

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use api_client::{ApiClient, ClientConfig, LoginRedirect};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "chirp")]
#[command(author, version, about = "Chirp - post, comment and follow from the terminal", long_about = None)]
struct Cli {
    /// API base URL (overrides CHIRP_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Print raw JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        username: String,
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Log out and forget the session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show the timeline
    Timeline {
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Manage posts
    Post {
        #[command(subcommand)]
        action: PostAction,
    },

    /// Manage comments
    Comments {
        #[command(subcommand)]
        action: CommentAction,
    },

    /// Browse and edit users
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum PostAction {
    /// Publish a post
    Create { content: String },
    /// Show a post
    Show { id: i64 },
    /// Delete one of your posts
    Delete { id: i64 },
    /// List a user's posts
    List {
        user_id: i64,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum CommentAction {
    /// List comments on a post
    List {
        post_id: i64,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Comment on a post
    Add { post_id: i64, content: String },
}

#[derive(Subcommand)]
enum UserAction {
    /// List users
    List {
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show a user
    Show { id: i64 },
    /// Update your profile
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
}

/// Tells the user to log in again once the session is gone
struct TerminalRedirect;

impl LoginRedirect for TerminalRedirect {
    fn redirect_to_login(&self) {
        eprintln!("Session expired. Run `chirp login <username>` to sign in again.");
    }
}

fn default_session_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".chirp").join("session.json"))
}

fn build_client(cli: &Cli) -> Result<ApiClient> {
    let mut config = ClientConfig::from_env()?;

    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.as_str());
    }

    if let Some(secs) = cli.timeout {
        config = config.with_request_timeout(Duration::from_secs(secs));
    }

    if config.session_file.is_none() {
        config.session_file = default_session_file();
    }

    debug!("Using API at {} (session file: {:?})", config.base_url, config.session_file);

    Ok(ApiClient::builder()
        .config(config)
        .redirect(Arc::new(TerminalRedirect))
        .build()?)
}

async fn run(cli: Cli) -> Result<()> {
    let client = build_client(&cli)?;
    let out = output::Output::new(cli.json);

    match cli.command {
        Commands::Login { username, password } => {
            commands::login(&client, &out, username, password).await
        }
        Commands::Register {
            username,
            email,
            password,
        } => commands::register(&client, &out, username, email, password).await,
        Commands::Logout => commands::logout(&client).await,
        Commands::Whoami => commands::whoami(&client, &out),
        Commands::Timeline { offset, limit } => {
            commands::timeline(&client, &out, offset, limit).await
        }
        Commands::Post { action } => match action {
            PostAction::Create { content } => commands::create_post(&client, &out, content).await,
            PostAction::Show { id } => commands::show_post(&client, &out, id).await,
            PostAction::Delete { id } => commands::delete_post(&client, id).await,
            PostAction::List {
                user_id,
                offset,
                limit,
            } => commands::user_posts(&client, &out, user_id, offset, limit).await,
        },
        Commands::Comments { action } => match action {
            CommentAction::List {
                post_id,
                offset,
                limit,
            } => commands::comments(&client, &out, post_id, offset, limit).await,
            CommentAction::Add { post_id, content } => {
                commands::add_comment(&client, &out, post_id, content).await
            }
        },
        Commands::Users { action } => match action {
            UserAction::List { offset, limit } => {
                commands::users(&client, &out, offset, limit).await
            }
            UserAction::Show { id } => commands::show_user(&client, &out, id).await,
            UserAction::Update {
                username,
                email,
                bio,
            } => commands::update_profile(&client, &out, username, email, bio).await,
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {}", e);
    }

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::report(&err);
            ExitCode::FAILURE
        }
    }
}
