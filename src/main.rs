//! Direct Line CLI entry point.
//!
//! Provides `chat`, `start`, `send`, and `fetch` subcommands for talking to a
//! bot interactively or exercising single protocol calls.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use directline::chat::ChatSession;
use directline::config::Config;
use directline::credentials::resolve_default_secret;
use directline::directline::{BotEvent, DirectLineClient, ReqwestTransport};
use directline::logging;

/// Direct Line: talk to a bot over the Direct Line v3 protocol.
#[derive(Parser)]
#[command(name = "directline", version, about)]
struct Cli {
    /// Config file (defaults to `$DIRECTLINE_CONFIG_PATH` or `./directline.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write JSON logs with daily rotation into this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Open a conversation and chat line by line on stdin.
    Chat,
    /// Open a conversation and print its id.
    Start,
    /// Post one message to an existing conversation.
    Send {
        /// Conversation id.
        #[arg(long)]
        conversation: String,
        /// Message text.
        text: String,
    },
    /// Fetch activities of an existing conversation.
    Fetch {
        /// Conversation id.
        #[arg(long)]
        conversation: String,
        /// Only activities after this watermark.
        #[arg(long)]
        watermark: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _logging_guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_file(dir)?),
        None => {
            logging::init_cli();
            None
        }
    };

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let client = build_client(&config)?;

    match cli.command {
        Command::Chat => handle_chat(client, &config).await,
        Command::Start => {
            let event = client.start_conversation().await?;
            report(event.as_ref())
        }
        Command::Send { conversation, text } => {
            let event = client
                .send_message(
                    &conversation,
                    &config.user.id,
                    &text,
                    config.user.name.as_deref(),
                )
                .await?;
            report(event.as_ref())
        }
        Command::Fetch {
            conversation,
            watermark,
        } => {
            let event = client
                .fetch_messages(&conversation, watermark.as_deref())
                .await?;
            report(event.as_ref())
        }
    }
}

/// Build an initialized client from configuration and the resolved secret.
fn build_client(config: &Config) -> anyhow::Result<Arc<DirectLineClient>> {
    let secret = resolve_default_secret(&config.service.secret_env)?;
    let transport = ReqwestTransport::new(
        &config.service.base_url,
        config.service.request_timeout(),
    )
    .context("failed to build HTTP transport")?;

    let client = DirectLineClient::new(Arc::new(transport))
        .with_channel_id(config.service.channel_id.clone());
    client.initialize(secret.expose())?;
    Ok(Arc::new(client))
}

/// Interactive loop: each stdin line is sent, replies are printed.
async fn handle_chat(client: Arc<DirectLineClient>, config: &Config) -> anyhow::Result<()> {
    let mut session =
        ChatSession::open(client, config.user.clone(), config.chat.fetch_delay()).await?;
    println!(
        "connected to conversation {} (empty line polls, /quit exits)",
        session.conversation_id()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" {
            break;
        }

        let result = if line.is_empty() {
            session.poll().await
        } else {
            session.say(line).await.map(|turn| turn.replies)
        };

        match result {
            Ok(replies) => {
                for activity in replies {
                    let speaker = activity
                        .sender_name
                        .as_deref()
                        .unwrap_or(&activity.sender_id);
                    println!("{speaker}> {}", activity.text);
                }
            }
            Err(e) => {
                warn!(error = %e, "chat turn failed");
                eprintln!("error: {e}");
            }
        }
    }

    info!("chat session closed");
    Ok(())
}

/// Print the outcome of a single protocol call.
fn report(event: Option<&BotEvent>) -> anyhow::Result<()> {
    match event {
        None => {
            println!("no response");
            Ok(())
        }
        Some(BotEvent::ConversationStarted { conversation_id }) => {
            println!("conversation {conversation_id}");
            Ok(())
        }
        Some(BotEvent::MessageSent { sent_message_id }) => {
            println!("sent {sent_message_id}");
            Ok(())
        }
        Some(BotEvent::MessageReceived {
            watermark,
            activities,
        }) => {
            for activity in activities {
                println!("{}> {}", activity.sender_id, activity.text);
            }
            if let Some(watermark) = watermark {
                println!("watermark {watermark}");
            }
            Ok(())
        }
        Some(BotEvent::Error { code, message }) => Err(anyhow::anyhow!(
            "bot service error {code}: {}",
            message.as_deref().unwrap_or("no details")
        )),
        Some(BotEvent::TransportError { message, .. }) => {
            Err(anyhow::anyhow!("transport error: {message}"))
        }
        Some(BotEvent::MalformedResponse { detail }) => {
            Err(anyhow::anyhow!("malformed response: {detail}"))
        }
    }
}
