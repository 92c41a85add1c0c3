mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "jobpilot")]
#[command(about = "LLM-driven job application automation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Run environment diagnostics
    Doctor,

    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config server.host)
        #[arg(long)]
        host: Option<String>,
    },

    /// Run one application task from the command line
    Apply {
        /// Job URL or search query
        #[arg(short, long)]
        url: String,

        /// Path to a resume PDF
        #[arg(short, long)]
        resume: Option<String>,

        /// Inline resume text (used when no PDF is given)
        #[arg(long, default_value = "")]
        resume_text: String,

        /// Platform name (LinkedIn, Indeed, Glassdoor)
        #[arg(short = 'P', long, default_value = "LinkedIn")]
        platform: String,

        /// Login page override
        #[arg(long)]
        login_url: Option<String>,

        /// Platform account username
        #[arg(long, default_value = "")]
        username: String,

        /// Platform account password
        #[arg(long, default_value = "")]
        password: String,

        /// Free-text rules for the agent
        #[arg(long, default_value = "")]
        rules: String,
    },

    /// Manage stored platform sessions
    Sessions {
        #[command(subcommand)]
        command: SessionsCommands,
    },

    /// Show recent application submissions
    Submissions {
        /// How many records to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum SessionsCommands {
    /// List stored sessions
    List,
    /// Delete one stored session
    Delete {
        username: String,
        platform: String,
    },
    /// Delete all stored sessions
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init_cmd::run(force)?;
        }
        Commands::Doctor => {
            commands::doctor::run()?;
        }
        Commands::Serve { port, host } => {
            commands::serve::run(host, port).await?;
        }
        Commands::Apply {
            url,
            resume,
            resume_text,
            platform,
            login_url,
            username,
            password,
            rules,
        } => {
            commands::apply::run(
                url,
                resume,
                resume_text,
                platform,
                login_url,
                username,
                password,
                rules,
            )
            .await?;
        }
        Commands::Sessions { command } => match command {
            SessionsCommands::List => commands::sessions::list()?,
            SessionsCommands::Delete { username, platform } => {
                commands::sessions::delete(&username, &platform)?
            }
            SessionsCommands::Clear => commands::sessions::clear()?,
        },
        Commands::Submissions { limit } => {
            commands::submissions::run(limit)?;
        }
    }

    Ok(())
}
