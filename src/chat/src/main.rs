use std::collections::HashMap;
use std::env;
use std::io::Write;
use std::time::Duration;

use docnav_core::{
    ClientConfig, ConversationEvent, DocnavSettings, Role, SendOutcome, SessionClient,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_filter())
        .with_writer(std::io::stderr)
        .init();

    let mut config = ClientConfig::default();
    match DocnavSettings::load() {
        Ok(settings) => settings.apply(&mut config),
        Err(err) => tracing::warn!(error = %err, "ignoring settings file"),
    }
    apply_env(&mut config);

    let client = match SessionClient::new(config) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "failed to create session client");
            std::process::exit(1);
        }
    };
    tracing::info!(
        api_url = %client.config().api_url,
        graph_id = %client.config().graph_id,
        "connected"
    );

    let printer = tokio::spawn(print_events(client.subscribe()));

    let mut runs = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::error!(error = %err, "stdin read failed");
                break;
            }
        };
        runs.spawn(dispatch(client.clone(), line));
    }

    while runs.join_next().await.is_some() {}
    drop(client);
    printer.abort();
}

/// Send one line without blocking stdin. Lines arriving while a reply is
/// streaming hit the client's guard and are dropped.
async fn dispatch(client: SessionClient, line: String) -> SendOutcome {
    let outcome = client.send_message(&line).await;
    match &outcome {
        SendOutcome::Ignored if !line.trim().is_empty() => {
            eprintln!("  (still answering; message dropped)");
        }
        SendOutcome::Ignored => {}
        SendOutcome::Completed | SendOutcome::Failed(_) => {
            println!();
            prompt();
        }
    }
    outcome
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Render assistant text as it streams, plus one line per visited node.
async fn print_events(mut events: broadcast::Receiver<ConversationEvent>) {
    let mut printed: HashMap<Uuid, String> = HashMap::new();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event printer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            ConversationEvent::MessageAppended(message) if message.role == Role::Assistant => {
                print!("{}", message.content);
                printed.insert(message.id, message.content);
            }
            ConversationEvent::MessageUpdated { id, content } => {
                let shown = printed.entry(id).or_default();
                match content.strip_prefix(shown.as_str()) {
                    Some(suffix) => print!("{suffix}"),
                    None => print!("\n{content}"),
                }
                *shown = content;
            }
            ConversationEvent::TraceRecorded(entry) => {
                eprintln!("  [trace] {} {}", entry.tool, entry.node_id);
            }
            _ => {}
        }
        let _ = std::io::stdout().flush();
    }
}

fn apply_env(config: &mut ClientConfig) {
    if let Some(url) = non_empty_env("DOCNAV_API_URL") {
        config.api_url = url;
    }
    if let Some(graph) = non_empty_env("DOCNAV_GRAPH_ID") {
        config.graph_id = graph;
    }
    if let Some(mode) = non_empty_env("DOCNAV_STREAM_MODE") {
        config.stream_mode = mode;
    }
    if let Some(secs) = non_empty_env("DOCNAV_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
        config.connect_timeout = Duration::from_secs(secs);
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn tracing_filter() -> tracing_subscriber::EnvFilter {
    let explicit = env::var("DOCNAV_LOG").or_else(|_| env::var("RUST_LOG")).ok();
    if let Some(filter) = explicit {
        return tracing_subscriber::EnvFilter::new(filter);
    }
    if matches!(
        env::var("DOCNAV_DEBUG").as_deref(),
        Ok("1" | "true" | "TRUE" | "yes" | "YES")
    ) {
        return tracing_subscriber::EnvFilter::new("debug");
    }
    tracing_subscriber::EnvFilter::new("warn")
}
