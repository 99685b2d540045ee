//! Consult CLI: command-line interface for multi-agent consultations.
//!
//! Reuses the same core domain logic (consult-core) and server bootstrap
//! (consult-server) that power the HTTP API.

mod commands;

use clap::{Parser, Subcommand};

/// Consult CLI: multi-agent medical consultation orchestrator
#[derive(Parser)]
#[command(name = "consult", version, about = "Consult CLI: multi-agent consultation orchestrator")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "CONSULT_DB_PATH")]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Consult HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3210)]
        port: u16,
        /// Evict idle sessions after this many seconds (defaults to CONSULT_SESSION_TTL_SECS)
        #[arg(long)]
        session_ttl_secs: Option<u64>,
    },

    /// Interactive consultation in the terminal
    Chat {
        /// Opening complaint; prompted for when omitted
        #[arg(long, short = 'm')]
        message: Option<String>,
        /// Continue a suspended session instead of starting a new one
        #[arg(long)]
        session_id: Option<String>,
    },

    /// List registered roles in routing order
    Roles,

    /// Inspect and manage checkpointed sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List sessions, most recently updated first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show a session snapshot
    Show {
        /// Session ID
        id: String,
    },
    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },
    /// Delete sessions that have been idle (not running) for longer than the given age
    Evict {
        /// Maximum idle age in seconds
        #[arg(long, default_value_t = 86_400)]
        older_than_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consult_core=warn,consult_server=warn,consult_cli=info".into()),
        )
        .init();

    let db = cli
        .db
        .unwrap_or_else(consult_core::config::default_db_path);

    let result = match cli.command {
        Commands::Server {
            host,
            port,
            session_ttl_secs,
        } => commands::server::run(host, port, db, session_ttl_secs).await,

        Commands::Chat {
            message,
            session_id,
        } => {
            let state = commands::init_state(&db).await;
            commands::chat::run(&state, message, session_id).await
        }

        Commands::Roles => {
            let state = commands::init_state(&db).await;
            commands::roles::list(&state)
        }

        Commands::Sessions { action } => {
            let state = commands::init_state(&db).await;
            match action {
                SessionAction::List { limit } => commands::sessions::list(&state, limit).await,
                SessionAction::Show { id } => commands::sessions::show(&state, &id).await,
                SessionAction::Delete { id } => commands::sessions::delete(&state, &id).await,
                SessionAction::Evict { older_than_secs } => {
                    commands::sessions::evict(&state, older_than_secs).await
                }
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
