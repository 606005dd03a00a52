//! Client side of the relay: joins a widget instance to the fan-out.

use chrono::Utc;
use futures::{ SinkExt, StreamExt };
use log::{ debug, error, info, warn };
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{ mpsc, Mutex };
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as Frame;
use url::Url;

use crate::error::RelayError;
use crate::models::message::Message;
use crate::models::relay::RelayEvent;
use crate::server::auth;
use crate::widget::{ Conversation, HistoryListener, ListenerId, WidgetHost };

/// History listener that emits `message-sent` for every local message
/// appended since it last looked. Remote messages are never echoed back.
pub struct RelayForwarder {
    outbound: mpsc::UnboundedSender<RelayEvent>,
    seen: AtomicUsize,
}

impl RelayForwarder {
    pub fn new(outbound: mpsc::UnboundedSender<RelayEvent>, already_seen: usize) -> Self {
        Self { outbound, seen: AtomicUsize::new(already_seen) }
    }
}

impl HistoryListener for RelayForwarder {
    fn on_history_changed(&self, history: &[Message]) {
        let previous = self.seen.swap(history.len(), Ordering::SeqCst);
        if history.len() <= previous {
            return;
        }

        for message in history[previous..].iter().filter(|m| m.is_local) {
            let payload = match serde_json::to_value(message) {
                Ok(v) => v,
                Err(e) => {
                    error!("Failed to encode message for relay: {}", e);
                    continue;
                }
            };
            if self.outbound.send(RelayEvent::MessageSent(payload)).is_err() {
                warn!("Relay connection is gone, message not forwarded");
            }
        }
    }
}

pub struct RelayBridge {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    host: Arc<Mutex<WidgetHost>>,
    forwarder: Option<ListenerId>,
}

impl RelayBridge {
    /// Connects to `url` and wires the socket to `conversation` in both
    /// directions. With a secret the handshake carries a signed timestamp.
    pub async fn connect(
        url: &str,
        secret: Option<&str>,
        conversation: Conversation
    ) -> Result<Self, RelayError> {
        let mut url = Url::parse(url)?;
        if let Some(secret) = secret.filter(|s| !s.trim().is_empty()) {
            url.set_query(Some(&auth::signed_query(secret, Utc::now().timestamp())));
        }

        let (ws, _) = connect_async(url.as_str()).await?;
        info!("Joined relay at {}", url.host_str().unwrap_or("?"));
        let (mut sink, mut stream) = ws.split();

        let (outbound, inbound) = mpsc::unbounded_channel();
        let already_seen = conversation.history().await.len();
        let forwarder = Arc::new(RelayForwarder::new(outbound, already_seen));
        let host = conversation.host();
        let forwarder = host.lock().await.add_history_listener(forwarder);

        let writer = tokio::spawn(async move {
            let mut events = UnboundedReceiverStream::new(inbound);
            while let Some(event) = events.next().await {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode relay event: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Frame::Text(json)).await {
                    error!("Failed to send to relay: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Frame::Text(text)) => receive_event(&conversation, &text).await,
                    Ok(Frame::Close(_)) => {
                        info!("Relay closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Relay connection lost: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self { reader, writer, host, forwarder: Some(forwarder) })
    }

    /// Waits until the relay side of the connection ends.
    pub async fn closed(&mut self) {
        if let Err(e) = (&mut self.reader).await {
            debug!("Relay reader ended abnormally: {}", e);
        }
    }

    /// Stops both tasks and detaches the forwarder from the widget.
    pub async fn close(mut self) {
        self.abort();
        if let Some(id) = self.forwarder.take() {
            self.host.lock().await.remove_history_listener(id);
        }
    }

    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for RelayBridge {
    fn drop(&mut self) {
        self.abort();
        let Some(id) = self.forwarder.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(runtime) => {
                let host = self.host.clone();
                runtime.spawn(async move {
                    host.lock().await.remove_history_listener(id);
                });
            }
            Err(_) => debug!("No runtime left, relay forwarder stays attached"),
        }
    }
}

async fn receive_event(conversation: &Conversation, text: &str) {
    match serde_json::from_str::<RelayEvent>(text) {
        Ok(RelayEvent::NewRemoteMessage(payload)) => {
            match serde_json::from_value::<Message>(payload) {
                Ok(message) => conversation.receive_remote(message).await,
                Err(e) => warn!("Dropping malformed remote message: {}", e),
            }
        }
        Ok(RelayEvent::MessageSent(_)) => {
            debug!("Ignoring client-only event from relay");
        }
        Err(e) => {
            warn!("Failed to parse relay event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Part;
    use serde_json::json;

    #[test]
    fn test_forwards_new_local_messages_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let forwarder = RelayForwarder::new(tx, 0);
        let mut history = vec![Message::local_user(vec![Part::text("hi")])];

        forwarder.on_history_changed(&history);
        forwarder.on_history_changed(&history);

        assert_eq!(
            rx.try_recv().unwrap(),
            RelayEvent::MessageSent(json!({"role": "user", "parts": [{"text": "hi"}], "isLocal": true}))
        );
        assert!(rx.try_recv().is_err());

        history.push(Message::local_model("T").into_remote());
        forwarder.on_history_changed(&history);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_preexisting_history_is_not_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let forwarder = RelayForwarder::new(tx, 2);
        let history = vec![
            Message::local_user(vec![Part::text("a")]),
            Message::local_model("b"),
            Message::local_model("c")
        ];

        forwarder.on_history_changed(&history);

        match rx.try_recv().unwrap() {
            RelayEvent::MessageSent(v) => assert_eq!(v["parts"][0]["text"], "c"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
