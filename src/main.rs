//! Campus Connect chat core
//!
//! Terminal front end over the chat transport: hydrates history, then
//! submits lines from stdin and renders streamed reply fragments as they
//! land in the conversation store.

mod api;
mod config;
mod identity;
mod session;
mod store;
mod stream;
mod system_prompt;

use api::AssistantApi;
use config::Config;
use identity::{IdentitySource, StaticIdentity};
use session::ChatSession;
use std::sync::Arc;
use store::{ChatMessage, ConversationStore, Sender};
use stream::{StreamConfig, StreamingChat, WsConnector};
use system_prompt::build_system_prompt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_chat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(api = %config.api_base_url, "starting campus chat");
    if config.user_email.is_none() {
        tracing::warn!("CAMPUS_USER_EMAIL not set; streaming and history are unavailable");
    }

    let store = Arc::new(ConversationStore::new());
    let identity: Arc<dyn IdentitySource> =
        Arc::new(StaticIdentity::new(config.user_email.clone()));
    let backend = Arc::new(AssistantApi::new(&config.api_base_url, config.request_timeout)?);
    let connector = WsConnector::new(config.stream_base_url());
    let chat = StreamingChat::spawn(
        connector,
        Arc::clone(&identity),
        Arc::clone(&store),
        StreamConfig::default(),
    );
    let session = ChatSession::new(
        Arc::clone(&store),
        chat,
        backend,
        identity,
        build_system_prompt(&config.prompt),
    );

    if let Err(error) = session.hydrate_history(config.history_limit).await {
        tracing::warn!(%error, "history hydration failed");
    }

    let mut stdout = tokio::io::stdout();
    for message in store.messages() {
        print_message(&mut stdout, &message).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => {}
            "/quit" | "/exit" => break,
            "/clear" => store.clear(),
            text => {
                session.submit(text).await;
                render_reply(&store, &mut stdout).await?;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn print_message(
    stdout: &mut tokio::io::Stdout,
    message: &ChatMessage,
) -> std::io::Result<()> {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "CampusAI",
    };
    stdout
        .write_all(format!("{who}> {}\n", message.text).as_bytes())
        .await
}

/// Print the reply as fragments land, returning once the responding flag
/// clears. Fallback replies arrive whole and print in one pass.
async fn render_reply(
    store: &ConversationStore,
    stdout: &mut tokio::io::Stdout,
) -> std::io::Result<()> {
    let mut events = store.subscribe();
    let mut reply_id: Option<String> = None;
    let mut printed = 0usize;

    stdout.write_all(b"CampusAI> ").await?;
    stdout.flush().await?;

    loop {
        let trailing = store
            .messages()
            .into_iter()
            .rev()
            .find(|m| m.sender == Sender::Assistant);
        if let Some(message) = trailing {
            let matches_reply =
                *reply_id.get_or_insert_with(|| message.id.clone()) == message.id;
            if matches_reply {
                // Fragments always end on char boundaries, so the printed
                // byte offset stays valid.
                if let Some(chunk) = message.text.get(printed..) {
                    if !chunk.is_empty() {
                        stdout.write_all(chunk.as_bytes()).await?;
                        stdout.flush().await?;
                        printed = message.text.len();
                    }
                }
            }
        }

        if !store.flags().response_in_flight {
            break;
        }
        match events.recv().await {
            Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }

    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
