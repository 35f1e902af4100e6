//! whytree-chat: terminal client
//!
//! Talks to a `whytree` server when `WHYTREE_SERVER_URL` is set, otherwise
//! calls the model directly with the local `GEMINI_API_KEY`. Finished
//! analyses are saved to the local database.

use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whytree::config::Config;
use whytree::gateway::ModelGateway;
use whytree::model::Analysis;
use whytree::session::{ChatBackend, GatewayBackend, HttpChatBackend, Session, SessionError};
use whytree::store::{AnalysisStore, SqliteBlobStore};

const HELP: &str = "\
Commands:
  /tree          build the cause tree from the dialogue
  /reset         start a new analysis
  /history       list saved analyses
  /open <id>     reopen a saved analysis
  /delete <id>   delete a saved analysis
  /clear         delete every saved analysis
  /help          show this help
  /quit          exit";

type ChatSession = Session<Arc<dyn ChatBackend>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Config::from_env();
    let backend = build_backend(&config)?;
    let mut session: ChatSession = Session::new(backend);

    let db_path = config.db_path();
    match SqliteBlobStore::open(&db_path) {
        Ok(blob) => session = session.with_store(AnalysisStore::open(Box::new(blob))),
        Err(error) => {
            tracing::warn!(path = %db_path.display(), error = %error, "Saved analyses are unavailable");
        }
    }

    println!("What problem would you like to think through? (/help for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let (command, argument) = match input.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (input, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/tree" => build_tree(&mut session).await,
            "/reset" => {
                session.reset();
                println!("Started a new analysis. What problem would you like to think through?");
            }
            "/history" => print_history(&session),
            "/open" => open(&mut session, argument),
            "/delete" => delete(&mut session, argument),
            "/clear" => clear(&mut session),
            _ if command.starts_with('/') => println!("Unknown command. {HELP}"),
            _ => send(&mut session, input).await,
        }
    }

    Ok(())
}

fn build_backend(config: &Config) -> Result<Arc<dyn ChatBackend>, Box<dyn std::error::Error>> {
    if let Some(url) = &config.server_url {
        tracing::info!(server = %url, "Using remote server");
        return Ok(Arc::new(HttpChatBackend::new(url)?));
    }
    let gateway = ModelGateway::from_config(config)?;
    if !gateway.is_configured() {
        tracing::warn!("Neither WHYTREE_SERVER_URL nor GEMINI_API_KEY is set; requests will fail");
    }
    Ok(Arc::new(GatewayBackend::new(gateway)))
}

async fn send(session: &mut ChatSession, text: &str) {
    match session.send_message(text).await {
        Ok(()) => {
            if let Some(reply) = session.messages().last() {
                println!("\n{}\n", reply.content);
            }
            if session.can_request_tree() {
                println!("(Type /tree when you are ready to see the cause tree.)");
            }
        }
        Err(error) => report(session, &error),
    }
}

async fn build_tree(session: &mut ChatSession) {
    match session.request_tree().await {
        Ok(analysis) => {
            print_tree(&analysis);
            if let Some(error) = session.persistence_error() {
                println!("Warning: the analysis could not be saved: {error}");
            }
        }
        Err(error) => report(session, &error),
    }
}

fn print_tree(analysis: &Analysis) {
    match &analysis.tree_artifact {
        Some(diagram) => {
            println!("\nCause tree for \"{}\":\n", analysis.title);
            println!("```mermaid\n{diagram}\n```\n");
        }
        None => println!("\nNo tree could be built from this dialogue yet.\n"),
    }
}

fn report(session: &mut ChatSession, error: &SessionError) {
    let message = session
        .last_error()
        .map_or_else(|| error.to_string(), str::to_string);
    println!("Error: {message}");
    session.clear_error();
}

fn print_history(session: &ChatSession) {
    let Some(store) = session.store() else {
        println!("Saved analyses are unavailable.");
        return;
    };
    if store.list().is_empty() {
        println!("No saved analyses yet.");
        return;
    }
    for analysis in store.list() {
        let updated = DateTime::from_timestamp_millis(analysis.updated_at)
            .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let marker = if analysis.has_tree() { "*" } else { " " };
        println!(
            "{marker} {}  {updated}  {} ({} messages)",
            analysis.id,
            analysis.title,
            analysis.messages.len()
        );
    }
}

fn open(session: &mut ChatSession, id: &str) {
    let found = session
        .store()
        .and_then(|store| store.get_by_id(id))
        .cloned();
    match found {
        Some(analysis) => {
            for message in &analysis.messages {
                println!("[{:?}] {}", message.role, message.content);
            }
            print_tree(&analysis);
            session.resume(analysis);
        }
        None => println!("No saved analysis with id {id}"),
    }
}

fn delete(session: &mut ChatSession, id: &str) {
    let Some(store) = session.store_mut() else {
        println!("Saved analyses are unavailable.");
        return;
    };
    match store.delete(id) {
        Ok(()) => println!("Deleted {id}"),
        Err(error) => println!("Error: {error}"),
    }
}

fn clear(session: &mut ChatSession) {
    let Some(store) = session.store_mut() else {
        println!("Saved analyses are unavailable.");
        return;
    };
    match store.clear() {
        Ok(()) => println!("Deleted every saved analysis."),
        Err(error) => println!("Error: {error}"),
    }
}
