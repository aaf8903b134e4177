//! Chat room over taglink.
//!
//! Run the relay:
//!
//! ```text
//! cargo run -p taglink-chat -- server 9000
//! ```
//!
//! Then any number of clients:
//!
//! ```text
//! cargo run -p taglink-chat -- client alice 127.0.0.1:9000
//! ```
//!
//! Every line typed into a client is broadcast to everyone else in the
//! room. The server pings the room every five seconds and drops clients
//! that stop answering.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use taglink::prelude::*;

/// The one user tag this demo speaks: a chat line.
const CHAT: u16 = 500;

const HEARTBEAT_STEP: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<(), TaglinkError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taglink=info,taglink_chat=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("server") => {
            let port = args.get(1).and_then(|p| p.parse().ok()).unwrap_or(9000);
            run_server(port).await
        }
        Some("client") => {
            let name = args.get(1).cloned().unwrap_or_else(|| "anonymous".into());
            let addr = args
                .get(2)
                .and_then(|a| a.parse().ok())
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 9000)));
            run_client(name, addr).await
        }
        _ => {
            eprintln!("usage: taglink-chat server [port] | client <name> [addr]");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Server: relay every chat line to everyone but its sender
// ---------------------------------------------------------------------------

async fn run_server(port: u16) -> Result<(), TaglinkError> {
    let server = Arc::new(
        UdpServer::bind_with_heartbeat(port, Duration::from_secs(5), Duration::from_secs(5))
            .await
            .map_err(TaglinkError::Server)?,
    );
    println!("chat relay on port {port}");

    server.hooks().client_connected.connect(|event| {
        println!("* {} joined from {}", event.info.name, event.endpoint);
    });
    server.hooks().client_disconnected.connect(|event| {
        let how = if event.local { "left" } else { "timed out" };
        println!("* {} {how}", event.info.name);
    });

    // Hooks are synchronous; forward messages into an async relay task.
    let (relay_tx, mut relay_rx) = mpsc::unbounded_channel::<Message>();
    server.hooks().message.connect(move |message| {
        let _ = relay_tx.send(message.clone());
    });

    let _ = server.listen();

    let heartbeat = Arc::clone(&server);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_STEP);
        loop {
            interval.tick().await;
            heartbeat.update(HEARTBEAT_STEP).await;
        }
    });

    while let Some(message) = relay_rx.recv().await {
        if message.tag() != Tag(CHAT) {
            continue;
        }
        let sender = message.sender_id();
        let reached = server.send_others(sender, &message).await;
        tracing::debug!(sender, reached, "chat line relayed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Client: stdin lines out, everyone else's lines in
// ---------------------------------------------------------------------------

async fn run_client(name: String, addr: SocketAddr) -> Result<(), TaglinkError> {
    let client = Arc::new(UdpClient::new(name));

    client.hooks().connected.connect(|event| {
        println!("* connected as #{}", event.info.id);
    });
    client.hooks().disconnected.connect(|event| {
        if !event.local {
            println!("* kicked by the server");
            std::process::exit(0);
        }
    });

    // Route incoming chat lines through a dispatcher, drained by its own
    // task, so printing never blocks the receive loop.
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(CHAT, |event| {
        let mut message = event.message.clone();
        let mut reader = message.reader();
        let who = reader.read_str();
        let line = reader.read_str();
        println!("<{who}> {line}");
    });
    {
        let dispatcher = Arc::clone(&dispatcher);
        client.hooks().message.connect(move |message| {
            dispatcher.stage(DispatchEvent::from_message(message.clone()));
        });
    }
    {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(20));
            loop {
                interval.tick().await;
                while dispatcher.tick() {}
            }
        });
    }

    client
        .connect_addr(addr)
        .await
        .map_err(TaglinkError::Client)?;
    let _ = client.listen().map_err(TaglinkError::Client)?;
    client
        .send_connection_info()
        .await
        .map_err(TaglinkError::Client)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim() == "/quit" {
            break;
        }
        let mut message = Message::outgoing(CHAT);
        {
            let mut writer = message.writer();
            writer.write_str(client.name()).map_err(TaglinkError::Wire)?;
            writer.write_str(&line).map_err(TaglinkError::Wire)?;
        }
        if let Err(e) = client.send(&mut message).await {
            tracing::warn!(error = %e, "send failed");
        }
    }

    client.disconnect().await.map_err(TaglinkError::Client)?;
    Ok(())
}
