use serde::{ Deserialize, Serialize };
use serde_json::Value;

/// Envelope carried in every relay text frame. The payload is opaque to the
/// relay and forwarded as-is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum RelayEvent {
    #[serde(rename = "message-sent")] MessageSent(Value),
    #[serde(rename = "new-remote-message")] NewRemoteMessage(Value),
}
