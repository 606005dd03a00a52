pub mod bridge;
pub mod cli;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;
pub mod terminal;
pub mod widget;

use cli::{ Args, Command, ServeArgs, ChatArgs };
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve) => serve_relay(serve).await,
        Command::Chat(chat) => open_chat(chat).await,
    }
}

async fn serve_relay(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Relay Configuration ---");
    info!("Relay Address: {}", args.server_addr);
    match args.http_port {
        Some(port) => info!("Static Assets: port {} (dist='{}', public='{}')", port, args.dist_dir, args.public_dir),
        None => info!("Static Assets: disabled"),
    }
    info!("Signed Handshake: {}", args.relay_secret.is_some());
    info!("Connection Rate: {}/s", args.connection_rate);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("---------------------------");

    Server::new(args).run().await
}

async fn open_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Widget Configuration ---");
    info!("API Key Set: {}", args.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false));
    info!("Model: {}", args.model.as_deref().unwrap_or(llm::DEFAULT_MODEL));
    info!("Markdown: {}", args.use_markdown);
    info!("Display Name: {}", args.display_name);
    info!("System Context: {}", args.context.is_some());
    info!("AI Enabled: {}", args.ai_enabled);
    info!("Relay: {}", args.relay_url.as_deref().unwrap_or("none"));
    info!("----------------------------");

    terminal::run_chat(args).await
}
