//! `UdpServer`: roster, receive loop, heartbeat, and send fan-out.
//!
//! One task owns the receive loop ([`listen`](UdpServer::listen)); the
//! embedder drives liveness from its own schedule by calling
//! [`update`](UdpServer::update) with the elapsed time. Everything the two
//! paths share — the roster — sits behind one mutex, and fan-out sends
//! iterate snapshots taken under it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use taglink_heartbeat::{Heartbeat, HeartbeatEvent};
use taglink_session::{ClientRecord, Roster};
use taglink_wire::{default_capacity, ConnectionInfo, Message, Tag};

use crate::events::{ClientConnectedEvent, ClientDisconnectedEvent, ServerHooks};
use crate::ServerError;

/// State shared between the handle and the receive loop task.
struct ServerShared {
    socket: Arc<UdpSocket>,
    roster: Mutex<Roster>,
    hooks: ServerHooks,
}

/// A tagged-message server over a bound UDP socket.
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    shared: Arc<ServerShared>,
    heartbeat: Mutex<Heartbeat>,
    cancel: CancellationToken,
}

impl UdpServer {
    /// Binds on the given port with the default heartbeat windows.
    pub async fn bind(port: u16) -> Result<Self, ServerError> {
        Self::bind_with_heartbeat(
            port,
            taglink_heartbeat::DEFAULT_WINDOW,
            taglink_heartbeat::DEFAULT_WINDOW,
        )
        .await
    }

    /// Binds on the given port with explicit pong/ping windows.
    ///
    /// The socket is created with address reuse enabled, so a restarted
    /// server can rebind its port immediately.
    pub async fn bind_with_heartbeat(
        port: u16,
        pong_window: Duration,
        ping_window: Duration,
    ) -> Result<Self, ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let raw = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_reuse_address(true)?;
        raw.set_nonblocking(true)?;
        raw.bind(&addr.into())?;
        let socket = Arc::new(UdpSocket::from_std(raw.into())?);

        tracing::info!(addr = %socket.local_addr()?, "server listening");

        let shared = Arc::new(ServerShared {
            socket: Arc::clone(&socket),
            roster: Mutex::new(Roster::new()),
            hooks: ServerHooks::default(),
        });

        Ok(Self {
            socket,
            shared,
            heartbeat: Mutex::new(Heartbeat::new(pong_window, ping_window)),
            cancel: CancellationToken::new(),
        })
    }

    /// The bound local address (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The lifecycle hooks. Connect handlers before calling
    /// [`listen`](Self::listen).
    pub fn hooks(&self) -> &ServerHooks {
        &self.shared.hooks
    }

    /// Spawns the receive loop.
    pub fn listen(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        tokio::spawn(listen_loop(shared, cancel))
    }

    /// Advances the heartbeat by `dt` and performs whatever the closed
    /// window demands: pings out when the pong window ends, evictions when
    /// the ping window ends. The reaction completes before this returns,
    /// so windows never overlap.
    pub async fn update(&self, dt: Duration) {
        let event = self.heartbeat.lock().await.update(dt);
        match event {
            Some(HeartbeatEvent::PongWindowEnded) => self.send_pings().await,
            Some(HeartbeatEvent::PingWindowEnded) => self.evict_silent().await,
            None => {}
        }
    }

    /// Sends to one client by id.
    ///
    /// # Errors
    /// [`SessionError::UnknownClient`](taglink_session::SessionError) if
    /// the id is not on the roster.
    pub async fn send_to(&self, id: i16, message: &Message) -> Result<usize, ServerError> {
        let endpoint = self
            .shared
            .roster
            .lock()
            .await
            .endpoint_of(id)
            .ok_or(taglink_session::SessionError::UnknownClient(id))?;
        Ok(self.socket.send_to(message.bytes(), endpoint).await?)
    }

    /// Sends to every client registered under a name. Returns how many
    /// endpoints were reached.
    pub async fn send_to_name(&self, name: &str, message: &Message) -> usize {
        let endpoints = {
            let roster = self.shared.roster.lock().await;
            roster
                .ids_named(name)
                .into_iter()
                .filter_map(|id| roster.endpoint_of(id))
                .collect()
        };
        self.fan_out(endpoints, message).await
    }

    /// Sends to the whole roster. Returns how many endpoints were reached.
    pub async fn send_all(&self, message: &Message) -> usize {
        let endpoints = self.endpoints_where(|_| true).await;
        self.fan_out(endpoints, message).await
    }

    /// Sends to everyone except the given id.
    pub async fn send_others(&self, id: i16, message: &Message) -> usize {
        let endpoints = self.endpoints_where(|record| record.id != id).await;
        self.fan_out(endpoints, message).await
    }

    /// Sends to everyone not registered under the given name.
    pub async fn send_others_named(&self, name: &str, message: &Message) -> usize {
        let endpoints = self.endpoints_where(|record| record.name != name).await;
        self.fan_out(endpoints, message).await
    }

    /// Number of clients on the roster.
    pub async fn client_count(&self) -> usize {
        self.shared.roster.lock().await.len()
    }

    /// Whether an id is on the roster.
    pub async fn contains_client(&self, id: i16) -> bool {
        self.shared.roster.lock().await.contains(id)
    }

    /// The ids registered under a name, in admission order.
    pub async fn ids_named(&self, name: &str) -> Vec<i16> {
        self.shared.roster.lock().await.ids_named(name)
    }

    /// Snapshot of every client record.
    pub async fn clients(&self) -> Vec<ClientRecord> {
        self.shared.roster.lock().await.records()
    }

    /// Cancels the receive loop. In-flight sends complete or fail on
    /// their own; nothing waits on them.
    pub fn shutdown(&self) {
        tracing::info!("server shutting down");
        self.cancel.cancel();
    }

    /// Snapshot of the endpoints whose records match the filter, taken
    /// under the roster lock.
    async fn endpoints_where(&self, keep: impl Fn(&ClientRecord) -> bool) -> Vec<SocketAddr> {
        self.shared
            .roster
            .lock()
            .await
            .records()
            .into_iter()
            .filter(|record| keep(record))
            .map(|record| record.endpoint)
            .collect()
    }

    /// Concurrent per-endpoint sends; waits for all, logs the failures.
    async fn fan_out(&self, endpoints: Vec<SocketAddr>, message: &Message) -> usize {
        let sends = endpoints
            .iter()
            .map(|endpoint| self.socket.send_to(message.bytes(), *endpoint));
        let mut reached = 0;
        for (endpoint, result) in endpoints.iter().zip(join_all(sends).await) {
            match result {
                Ok(_) => reached += 1,
                Err(e) => tracing::warn!(%endpoint, error = %e, "fan-out send failed"),
            }
        }
        reached
    }

    /// Pong window closed: everyone becomes suspect and gets a ping.
    async fn send_pings(&self) {
        let endpoints: Vec<SocketAddr> = {
            let mut roster = self.shared.roster.lock().await;
            roster.mark_all_suspect();
            roster
                .records()
                .into_iter()
                .map(|record| record.endpoint)
                .collect()
        };
        if endpoints.is_empty() {
            return;
        }
        tracing::debug!(clients = endpoints.len(), "pong window ended, pinging");
        let ping = Message::outgoing(Tag::PING);
        self.fan_out(endpoints, &ping).await;
    }

    /// Ping window closed: notify and evict everyone still suspect.
    async fn evict_silent(&self) {
        let victims = self.shared.roster.lock().await.silent();
        if victims.is_empty() {
            return;
        }

        // Notify first, then evict, then fire the hooks — so a hook that
        // inspects the roster already sees the eviction.
        let farewells = victims.iter().map(|record| async move {
            let mut farewell = Message::outgoing(Tag::CLIENT_DISCONNECTED);
            let payload = ConnectionInfo {
                name: record.name.clone(),
                id: record.id,
                success: false,
            };
            if let Err(e) = farewell.writer().write_value(&payload) {
                tracing::warn!(id = record.id, error = %e, "farewell encode failed");
                return;
            }
            if let Err(e) = self.socket.send_to(farewell.bytes(), record.endpoint).await {
                tracing::warn!(id = record.id, error = %e, "farewell send failed");
            }
        });
        join_all(farewells).await;

        {
            let mut roster = self.shared.roster.lock().await;
            for record in &victims {
                let _ = roster.evict(record.id);
            }
        }

        for record in victims {
            tracing::info!(id = record.id, name = %record.name, "evicted: no pong");
            self.shared
                .hooks
                .client_disconnected
                .emit(&ClientDisconnectedEvent {
                    info: ConnectionInfo {
                        name: record.name,
                        id: record.id,
                        success: false,
                    },
                    local: false,
                });
        }
    }
}

/// The receive loop: one iteration per datagram until cancelled.
async fn listen_loop(shared: Arc<ServerShared>, cancel: CancellationToken) {
    let mut buf = vec![0u8; default_capacity()];
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = shared.socket.recv_from(&mut buf) => received,
        };
        let (len, addr) = match received {
            Ok(pair) => pair,
            Err(e) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::warn!(error = %e, "receive failed, continuing");
                continue;
            }
        };
        let message = match Message::incoming(buf[..len].to_vec()) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(%addr, error = %e, "short datagram dropped");
                continue;
            }
        };
        handle_datagram(&shared, message, addr).await;
    }
    tracing::debug!("server listen loop exited");
}

/// Reacts to one received message by tag.
async fn handle_datagram(shared: &ServerShared, mut message: Message, addr: SocketAddr) {
    match message.tag() {
        Tag::CLIENT_CONNECTED => handle_connect(shared, &mut message, addr).await,
        Tag::CLIENT_DISCONNECTED => handle_disconnect(shared, &mut message).await,
        Tag::PONG => handle_pong(shared, message.sender_id(), addr).await,
        _ => handle_user_message(shared, &message, addr).await,
    }
}

/// Handshake request: emit the hook, then create the record and ack it.
async fn handle_connect(shared: &ServerShared, message: &mut Message, addr: SocketAddr) {
    let info: ConnectionInfo = message.reader().read_value();
    tracing::info!(name = %info.name, %addr, "handshake request");
    shared.hooks.client_connected.emit(&ClientConnectedEvent {
        info: info.clone(),
        endpoint: addr,
    });

    let assigned = {
        let mut roster = shared.roster.lock().await;
        // A sender id already on the roster means a re-handshake: the old
        // record is stale and gets replaced, not kept alongside.
        roster.remove_stale(message.sender_id());
        roster.admit(&info.name, addr).id
    };

    let mut ack = Message::outgoing(Tag::CLIENT_CONNECTED);
    let payload = ConnectionInfo {
        name: info.name,
        id: assigned,
        success: true,
    };
    if let Err(e) = ack.writer().write_value(&payload) {
        tracing::warn!(id = assigned, error = %e, "ack encode failed");
        return;
    }
    if let Err(e) = shared.socket.send_to(ack.bytes(), addr).await {
        tracing::warn!(id = assigned, %addr, error = %e, "ack send failed");
    }
}

/// Client-initiated goodbye: evict and forward the payload's origin flag.
async fn handle_disconnect(shared: &ServerShared, message: &mut Message) {
    let info: ConnectionInfo = message.reader().read_value();
    let evicted = shared.roster.lock().await.evict(info.id);
    match evicted {
        Ok(_) => {
            let local = info.success;
            shared
                .hooks
                .client_disconnected
                .emit(&ClientDisconnectedEvent { info, local });
        }
        Err(e) => tracing::debug!(id = info.id, error = %e, "goodbye from unknown client"),
    }
}

/// A pong marks its sender alive; unknown senders are told so.
async fn handle_pong(shared: &ServerShared, sender_id: i16, addr: SocketAddr) {
    let known = shared.roster.lock().await.mark_alive(sender_id);
    if !known {
        tracing::debug!(id = sender_id, %addr, "pong from unknown client");
        send_unknown_client(shared, addr).await;
    }
}

/// User-tagged traffic only flows for registered senders.
async fn handle_user_message(shared: &ServerShared, message: &Message, addr: SocketAddr) {
    let known = shared.roster.lock().await.contains(message.sender_id());
    if known {
        shared.hooks.message.emit(message);
    } else {
        tracing::debug!(id = message.sender_id(), tag = %message.tag(), %addr, "message from unknown client");
        send_unknown_client(shared, addr).await;
    }
}

/// Tells an endpoint the server holds no record of it.
async fn send_unknown_client(shared: &ServerShared, addr: SocketAddr) {
    let notice = Message::outgoing(Tag::UNKNOWN_CLIENT);
    if let Err(e) = shared.socket.send_to(notice.bytes(), addr).await {
        tracing::warn!(%addr, error = %e, "unknown-client notice send failed");
    }
}
