//! CLI entry point for the Vector Wave editorial console.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use dotenvy::dotenv;
use serde_json::Value;

use vector_wave_console::bridge::{self, BridgeOptions};
use vector_wave_console::config::Config;
use vector_wave_console::logging;
use vector_wave_console::repl::{Repl, ReplCommand};
use vector_wave_console::session::Session;

#[derive(Parser, Debug)]
#[command(
    name = "vector-wave",
    author,
    version,
    about = "Vector Wave editorial console",
    long_about = "Editorial assistant console for Vector Wave.\n\nRun 'vector-wave' to open the interactive console, or 'vector-wave serve' to expose actions to an assistant runtime."
)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config profile name
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the editorial backend URL
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Open the interactive console (default)
    Repl,
    /// Serve the assistant bridge over HTTP
    Serve {
        /// Bind host (defaults to the configured bridge host)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (defaults to the configured bridge port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List content folders
    Folders,
    /// Analyze one content folder
    Analyze {
        /// Folder path, e.g. content/raw/my-topic
        path: String,
    },
    /// Save editorial metadata for a folder
    SaveMetadata {
        /// Folder path
        path: String,
        /// Metadata document to save verbatim (generated when omitted)
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Run the editorial pipeline and print its console
    Pipeline {
        /// Content path to process
        path: String,
    },
    /// Print the readable context an assistant would see
    Context,
    /// List invocable actions
    Actions,
    /// Invoke an action by name with JSON arguments
    Invoke {
        /// Action name
        name: String,
        /// JSON arguments
        json: Option<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let command = cli.command.clone().unwrap_or(Commands::Repl);
    if let Commands::Completions { shell } = command {
        generate_completions(shell);
        return Ok(());
    }

    let config = load_config_from_cli(&cli)?;
    logging::info(format!(
        "Using backend {} with content root {}",
        config.base_url(),
        config.content_root()
    ));
    let session = Session::from_config(&config)?;

    match command {
        Commands::Repl => Repl::new(session).run().await,
        Commands::Serve { host, port } => {
            let (default_host, default_port) = config.bridge_addr();
            let options = BridgeOptions {
                host: host.unwrap_or(default_host),
                port: port.unwrap_or(default_port),
            };
            bridge::serve(session, options).await
        }
        Commands::Folders => run_once(session, ReplCommand::List).await,
        Commands::Analyze { path } => run_once(session, ReplCommand::Analyze(path)).await,
        Commands::SaveMetadata { path, metadata } => {
            run_once(
                session,
                ReplCommand::Save {
                    folder_path: path,
                    metadata,
                },
            )
            .await
        }
        Commands::Pipeline { path } => run_once(session, ReplCommand::Pipeline(path)).await,
        Commands::Context => {
            session.initialize().await;
            run_once(session, ReplCommand::Context(None)).await
        }
        Commands::Actions => run_once(session, ReplCommand::Actions).await,
        Commands::Invoke { name, json } => {
            let input = match json {
                Some(raw) => serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid JSON arguments for '{name}'"))?,
                None => Value::Null,
            };
            run_once(session, ReplCommand::Invoke { name, input }).await
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn run_once(session: Session, command: ReplCommand) -> Result<()> {
    let output = Repl::new(session).execute(command).await;
    if !output.is_empty() {
        println!("{}", output.trim_end());
    }
    Ok(())
}

fn load_config_from_cli(cli: &Cli) -> Result<Config> {
    let profile = cli
        .profile
        .clone()
        .or_else(|| std::env::var("VECTOR_WAVE_PROFILE").ok());
    let mut config = Config::load(cli.config.clone(), profile.as_deref())?;
    if let Some(url) = &cli.base_url {
        config.base_url = Some(url.clone());
        config.validate()?;
    }
    Ok(config)
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
