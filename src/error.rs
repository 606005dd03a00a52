use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("completion endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed completion response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("completion response contained no candidate text")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("relay payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid relay url: {0}")]
    Url(#[from] url::ParseError),

    #[error("TLS configuration error: {0}")]
    Tls(String),
}
