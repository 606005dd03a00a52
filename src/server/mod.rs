pub mod api;
pub mod auth;
pub mod registry;
pub mod tls;
pub mod websocket;

use crate::cli::ServeArgs;
use self::websocket::{ RelayOptions, RelayServer };
use std::error::Error;

pub struct Server {
    args: ServeArgs,
}

impl Server {
    pub fn new(args: ServeArgs) -> Self {
        Self { args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let tls = tls::resolve_tls(
            self.args.enable_tls,
            self.args.tls_cert_path.as_deref(),
            self.args.tls_key_path.as_deref()
        )?;

        if let Some(http_port) = self.args.http_port {
            api::start_http_server(
                http_port,
                self.args.dist_dir.clone(),
                self.args.public_dir.clone(),
                tls.clone()
            ).await?;
        }

        let options = RelayOptions {
            secret: self.args.relay_secret.clone(),
            connection_rate: self.args.connection_rate,
            tls,
        };
        let relay = RelayServer::bind(&self.args.server_addr, options).await?;
        relay.run().await?;

        Ok(())
    }
}
