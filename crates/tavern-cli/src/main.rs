mod config;

use clap::{Parser, Subcommand};
use config::TavernConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tavern_agent::{ChatService, ChatSettings, HttpGenerationClient};
use tavern_core::{Character, Persona};
use tavern_gateway::GatewayServer;
use tavern_session::FileSessionMemory;
use tavern_store::JsonEntityStore;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tavern", about = "Tavern: character chat persistence and session service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "tavern.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List stored personas
    Personas,
    /// List stored characters
    Characters,
    /// List stored conversations, newest first
    History,
    /// Forget the conversation between a character and a user
    Reset {
        character: String,
        user: String,
    },
}

async fn build_service(config: &TavernConfig) -> anyhow::Result<Arc<ChatService>> {
    let characters = Arc::new(JsonEntityStore::<Character>::new(config.characters_path()));
    let personas = Arc::new(JsonEntityStore::<Persona>::new(config.personas_path()));
    let sessions =
        Arc::new(FileSessionMemory::with_window(config.history_dir(), config.memory.window).await?);
    let client = Arc::new(HttpGenerationClient::new(&config.backend)?);

    let settings = ChatSettings {
        default_model: config.backend.default_model.clone(),
        record_replies: config.memory.record_replies,
        assets_dir: config.assets_dir.clone(),
    };

    Ok(Arc::new(ChatService::new(
        characters, personas, sessions, client, settings,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = TavernConfig::load(&cli.config)?;
    config.apply_env(|key| std::env::var(key).ok());
    let service = build_service(&config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            let shutdown = CancellationToken::new();
            let app = GatewayServer::build_with_shutdown(service, shutdown.clone());

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(
                addr = %addr,
                data_dir = %config.data_dir.display(),
                backend = %config.backend.base_url,
                "Tavern listening"
            );

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Shutdown requested");
                    shutdown.cancel();
                })
                .await?;
        }
        Commands::Personas => {
            let personas = service.list_personas().await?;
            if personas.is_empty() {
                println!("No personas stored in {}", config.personas_path().display());
            } else {
                for p in &personas {
                    println!("  {} ({})", p.display_name, p.id);
                }
                println!("\nTotal: {} persona(s)", personas.len());
            }
        }
        Commands::Characters => {
            let characters = service.list_characters().await?;
            if characters.is_empty() {
                println!(
                    "No characters stored in {}",
                    config.characters_path().display()
                );
            } else {
                for c in &characters {
                    if c.tagline.is_empty() {
                        println!("  {} ({})", c.name, c.id);
                    } else {
                        println!("  {} ({}): {}", c.name, c.id, c.tagline);
                    }
                }
                println!("\nTotal: {} character(s)", characters.len());
            }
        }
        Commands::History => {
            let history = service.list_history().await?;
            if history.is_empty() {
                println!("No conversations stored.");
            }
            for entry in &history {
                let who = entry.character_name.as_deref().unwrap_or("<deleted>");
                let last = entry
                    .last_message
                    .as_ref()
                    .map(|m| m.content.as_str())
                    .unwrap_or("");
                println!(
                    "  {} [{}] {} message(s), {}: {}",
                    entry.session_key,
                    who,
                    entry.message_count,
                    entry.updated_at.format("%Y-%m-%d %H:%M"),
                    last
                );
            }
        }
        Commands::Reset { character, user } => {
            service.reset_session(&character, &user).await?;
            println!("Conversation {character}_{user} cleared.");
        }
    }

    Ok(())
}
