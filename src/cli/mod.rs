use clap::{ Args as ClapArgs, Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the relay server (and optionally the static asset server).
    Serve(ServeArgs),
    /// Open a terminal chat widget.
    Chat(ChatArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the relay WebSocket server.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4173")]
    pub server_addr: String,

    /// Port for the static asset HTTP server. Not started when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Directory served under /dist (the built widget bundle).
    #[arg(long, env = "DIST_DIR", default_value = "dist")]
    pub dist_dir: String,

    /// Directory served at the root (demo page).
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: String,

    /// Shared secret for signed handshakes. If set, clients must send ts/sig query params.
    #[arg(long, env = "RELAY_SECRET")]
    pub relay_secret: Option<String>,

    /// Maximum accepted connections per second across all peers.
    #[arg(long, env = "CONNECTION_RATE", default_value = "10")]
    pub connection_rate: u32,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS/HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS/HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ChatArgs {
    /// API key for the generation endpoint. Not validated; a bad key shows up as failed completions in the log.
    #[arg(long, env = "GEMINI_API_KEY")]
    pub api_key: Option<String>,

    /// Model name (e.g., gemini-2.5-flash)
    #[arg(long, env = "GEMINI_MODEL")]
    pub model: Option<String>,

    /// Base URL of the generation API, up to and including the version segment.
    #[arg(long, env = "GEMINI_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds. No timeout when unset.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Render model replies as markdown (HTML output).
    #[arg(long, env = "USE_MARKDOWN", default_value = "false")]
    pub use_markdown: bool,

    /// Name shown for the assistant.
    #[arg(long, env = "DISPLAY_NAME", default_value = "AI Assistant")]
    pub display_name: String,

    /// System context sent with every completion.
    #[arg(long, env = "SYSTEM_CONTEXT")]
    pub context: Option<String>,

    /// Start with completions enabled. Toggle at runtime with /ai on|off.
    #[arg(long, env = "AI_ENABLED", default_value = "false")]
    pub ai_enabled: bool,

    /// Relay to join (e.g., ws://127.0.0.1:4173). Runs standalone when unset.
    #[arg(long, env = "RELAY_URL")]
    pub relay_url: Option<String>,

    /// Shared secret used to sign the relay handshake.
    #[arg(long, env = "RELAY_SECRET")]
    pub relay_secret: Option<String>,
}
