use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use log::{ error, info };
use rustls::ServerConfig;
use tower_http::cors::{ Any, CorsLayer };
use tower_http::services::ServeDir;

/// `/dist/*` serves the built widget bundle, everything else the demo page.
pub fn static_router(dist_dir: impl AsRef<Path>, public_dir: impl AsRef<Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest_service("/dist", ServeDir::new(dist_dir))
        .fallback_service(ServeDir::new(public_dir))
        .layer(cors)
}

pub async fn start_http_server(
    http_port: u16,
    dist_dir: String,
    public_dir: String,
    tls: Option<Arc<ServerConfig>>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Serving '{}' at /dist and '{}' at /", dist_dir, public_dir);

    let app = static_router(&dist_dir, &public_dir);

    if let Some(config) = tls {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_config(config);

        tokio::spawn(async move {
            let result = axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });

        info!("HTTPS static server started on https://{}", addr);
    } else {
        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                        error!("HTTP server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                }
            }
        });

        info!("HTTP static server started on http://{}", addr);
    }

    Ok(())
}
