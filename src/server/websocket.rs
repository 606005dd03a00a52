use crate::error::RelayError;
use crate::models::relay::RelayEvent;
use crate::server::auth;
use crate::server::registry::{ ConnectionId, ConnectionRegistry };

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;

use rustls::ServerConfig;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use chrono::Utc;
use futures::{ SinkExt, StreamExt };
use log::{ debug, error, info, warn };

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

type ConnectionLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct RelayOptions {
    pub secret: Option<String>,
    pub connection_rate: u32,
    pub tls: Option<Arc<ServerConfig>>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self { secret: None, connection_rate: 10, tls: None }
    }
}

/// Fan-out relay: every `message-sent` from one connection goes out as
/// `new-remote-message` to all the others. Nothing is stored and new
/// connections get no backlog.
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    secret: Option<String>,
    limiter: Arc<ConnectionLimiter>,
    tls_acceptor: Option<TlsAcceptor>,
}

impl RelayServer {
    pub async fn bind(addr: &str, options: RelayOptions) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr).await?;
        let rate = NonZeroU32::new(options.connection_rate).unwrap_or(NonZeroU32::MIN);
        let secret = options.secret.filter(|k| !k.trim().is_empty());

        if secret.is_some() {
            info!("Relay configured with signed handshake authentication.");
        } else {
            warn!("Relay configured WITHOUT authentication. Connections are open.");
        }

        Ok(Self {
            listener,
            registry: Arc::new(ConnectionRegistry::new()),
            secret,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
            tls_acceptor: options.tls.map(TlsAcceptor::from),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub async fn run(self) -> Result<(), RelayError> {
        let protocol = if self.tls_acceptor.is_some() { "wss" } else { "ws" };
        info!("{} relay listening on: {}", protocol.to_uppercase(), self.local_addr()?);

        loop {
            let (stream, peer) = self.listener.accept().await?;

            if self.limiter.check().is_err() {
                warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
                continue;
            }

            info!("Incoming connection from: {}", peer);
            let registry = Arc::clone(&self.registry);
            let secret = self.secret.clone();
            let tls_acceptor = self.tls_acceptor.clone();

            tokio::spawn(async move {
                let process_result = if let Some(acceptor) = tls_acceptor {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            info!("TLS handshake successful for {}", peer);
                            process_connection(peer, tls_stream, registry, secret).await
                        }
                        Err(e) => {
                            error!("TLS handshake error for {}: {}", peer, e);
                            Err(RelayError::Io(e))
                        }
                    }
                } else {
                    process_connection(peer, stream, registry, secret).await
                };

                if let Err(e) = process_result {
                    error!("Failed to process connection for {}: {}", peer, e);
                }
            });
        }
    }
}

fn unauthorized(reason: &str) -> ErrorResponse {
    let mut res = ErrorResponse::new(Some(reason.to_string()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    registry: Arc<ConnectionRegistry>,
    secret: Option<String>
) -> Result<(), RelayError>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let secret = match &secret {
            Some(k) => k,
            None => {
                return Ok(response);
            }
        };
        let query = req.uri().query().unwrap_or("");
        match auth::verify(secret, query, Utc::now().timestamp()) {
            Ok(()) => {
                info!("{} authenticated", peer);
                Ok(response)
            }
            Err(reason) => {
                warn!("{}: rejected handshake ({})", peer, reason);
                Err(unauthorized(reason))
            }
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, registry).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(RelayError::WebSocket(e))
        }
    }
}

/// Connected until the socket closes; every inbound `message-sent` is fanned
/// out once, so each receiver sees a sender's messages in emission order.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    registry: Arc<ConnectionRegistry>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let (mut tx, mut rx) = websocket.split();
    let (outbound, inbound) = mpsc::unbounded_channel();
    let id = registry.register(peer, outbound);
    info!("New relay connection {} from {} ({} connected)", id, peer, registry.len());

    let writer = tokio::spawn(async move {
        let mut frames = UnboundedReceiverStream::new(inbound);
        while let Some(frame) = frames.next().await {
            if let Err(e) = tx.send(frame).await {
                debug!("Writer for {} stopped: {}", peer, e);
                break;
            }
        }
        let _ = tx.close().await;
    });

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    break;
                }

                match message {
                    Message::Text(text) => relay_text(&registry, id, peer, &text),
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if !registry.send_to(id, Message::Pong(ping_data)) {
                            error!("Failed to queue pong for {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("Relay connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("Relay connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }

    // Dropping the sink ends the writer task.
    registry.unregister(id);
    if let Err(e) = writer.await {
        debug!("Writer task for {} ended abnormally: {}", peer, e);
    }
    info!("Relay connection {} closed for {} ({} connected)", id, peer, registry.len());
}

fn relay_text(registry: &ConnectionRegistry, sender: ConnectionId, peer: SocketAddr, text: &str) {
    match serde_json::from_str::<RelayEvent>(text) {
        Ok(RelayEvent::MessageSent(payload)) => {
            let frame = match serde_json::to_string(&RelayEvent::NewRemoteMessage(payload)) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    error!("Failed to encode relay frame from {}: {}", peer, e);
                    return;
                }
            };
            let delivered = registry.broadcast_except(sender, &frame);
            debug!("Relayed message from {} to {} peer(s)", peer, delivered);
        }
        Ok(RelayEvent::NewRemoteMessage(_)) => {
            warn!("Ignoring server-only event from {}", peer);
        }
        Err(e) => {
            warn!("Failed to parse relay event from {}: {}", peer, e);
        }
    }
}
