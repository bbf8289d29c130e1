//! livepaste CLI client - read, watch and write shared pastes

mod client;
mod messages;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::PasteClient;
use crate::messages::ServerMessage;

#[derive(Parser)]
#[command(name = "livepaste")]
#[command(about = "CLI client for livepaste - real-time shared pastes")]
#[command(version)]
struct Cli {
    /// Server URL
    #[arg(short, long, global = true, default_value = "ws://localhost:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current content of a paste
    Get {
        /// Passphrase of the paste
        passphrase: String,
    },

    /// Print the paste and every update until interrupted
    Watch {
        /// Passphrase of the paste
        passphrase: String,
    },

    /// Replace the content of a paste
    Set {
        /// Passphrase of the paste
        passphrase: String,

        /// New content (read from stdin when omitted)
        #[arg(short, long)]
        content: Option<String>,

        /// How often to retry after a conflicting edit
        #[arg(short, long, default_value_t = 3)]
        retries: u32,
    },

    /// Check that the server answers in a room
    Ping {
        /// Passphrase of the paste
        passphrase: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livepaste_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Get { passphrase } => run_get(&cli.server, &passphrase).await,
        Commands::Watch { passphrase } => run_watch(&cli.server, &passphrase).await,
        Commands::Set {
            passphrase,
            content,
            retries,
        } => run_set(&cli.server, &passphrase, content, retries).await,
        Commands::Ping { passphrase } => run_ping(&cli.server, &passphrase).await,
    }
}

async fn run_get(server: &str, passphrase: &str) -> Result<()> {
    let client = PasteClient::connect(server, passphrase).await?;
    print!("{}", client.content());
    std::io::stdout().flush()?;
    Ok(())
}

async fn run_watch(server: &str, passphrase: &str) -> Result<()> {
    let mut client = PasteClient::connect(server, passphrase).await?;
    println!("── version {} ──", client.version());
    println!("{}", client.content());

    client
        .listen(|event| {
            if let ServerMessage::Update { version, content } = event {
                println!("── version {} ──", version);
                println!("{}", content);
            }
            true
        })
        .await?;

    println!("Connection closed.");
    Ok(())
}

async fn run_set(
    server: &str,
    passphrase: &str,
    content: Option<String>,
    retries: u32,
) -> Result<()> {
    let content = match content {
        Some(content) => content,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut client = PasteClient::connect(server, passphrase).await?;
    let version = client.set(content, retries).await?;
    println!("Saved as version {}", version);
    Ok(())
}

async fn run_ping(server: &str, passphrase: &str) -> Result<()> {
    let mut client = PasteClient::connect(server, passphrase).await?;
    let started = std::time::Instant::now();
    client.ping().await?;
    println!("pong in {:?}", started.elapsed());
    Ok(())
}
