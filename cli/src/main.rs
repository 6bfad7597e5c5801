use std::time::Duration;

use clap::{Parser, Subcommand};
use netws::{Client, ClientConfig, CloseReason, Inbox, WireMessage};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] netws::ClientError),
    #[error("message target must not be empty")]
    EmptyTarget,
    #[error("timed out after {0:?} waiting for a status reply")]
    Timeout(Duration),
    #[error("connection closed before a reply arrived: {0}")]
    Closed(CloseReason),
}

#[derive(Parser, Debug)]
#[command(name = "netws-cli", about = "Message websocket client")]
struct Cli {
    #[arg(long, env = "NETWS_URL", default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every inbound message until the connection ends.
    Listen,
    /// Send one broadcast to every peer.
    Broadcast { payload: String },
    /// Send one message to a single peer.
    Message { target: String, payload: String },
    /// Ask the server for its status and print the reply.
    Status {
        #[arg(long, default_value_t = 5000)]
        wait_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Command::Message { target, .. } = &cli.command {
        if target.is_empty() {
            return Err(CliError::EmptyTarget);
        }
    }

    let config = ClientConfig::from_env();
    let (client, inbox) = netws::dial(&cli.url, &config).await?;

    let result = match cli.command {
        Command::Listen => run_listen(&client, inbox).await,
        Command::Broadcast { payload } => {
            client.send_broadcast(payload).await;
            Ok(())
        }
        Command::Message { target, payload } => {
            client.send_message(payload, &target).await;
            Ok(())
        }
        Command::Status { wait_ms } => run_status(&client, inbox, Duration::from_millis(wait_ms)).await,
    };

    client.close().await;
    result
}

async fn run_listen(client: &Client, mut inbox: Inbox) -> Result<(), CliError> {
    let mut interrupted = false;
    loop {
        let message = tokio::select! {
            Some(message) = inbox.status.recv() => message,
            Some(message) = inbox.connect.recv() => message,
            Some(message) = inbox.disconnect.recv() => message,
            Some(message) = inbox.message.recv() => message,
            Some(message) = inbox.broadcast.recv() => message,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                client.close().await;
                continue;
            }
            else => break,
        };
        println!("{}", format_line(&message));
    }

    eprintln!("connection closed: {}", client.closed().await);
    Ok(())
}

async fn run_status(client: &Client, mut inbox: Inbox, wait: Duration) -> Result<(), CliError> {
    client.send_status_request().await;
    match tokio::time::timeout(wait, inbox.status.recv()).await {
        Ok(Some(reply)) => {
            println!("{}", reply.payload);
            Ok(())
        }
        Ok(None) => Err(CliError::Closed(client.closed().await)),
        Err(_) => Err(CliError::Timeout(wait)),
    }
}

fn format_line(message: &WireMessage) -> String {
    let target = if message.target.is_empty() { "-" } else { &message.target };
    format!("{} {target} {}", message.action, message.payload)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
