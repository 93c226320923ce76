mod dto;
mod error;
mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use ollamadeck_core::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "ollamadeck", about = "Web dashboard for a local Ollama instance")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on (overrides APP_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .compact()
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let port = args.port.unwrap_or(config.app_port);

    info!(
        "Inference server configured at {}",
        config.ollama_base_url()
    );

    let state = Arc::new(AppState::new(config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/models", get(handlers::models::list))
        .route("/api/models/available", get(handlers::models::available))
        .route("/api/models/install", post(handlers::models::install))
        .route("/api/models/delete", post(handlers::models::delete))
        .route("/api/models/progress", get(handlers::models::progress))
        .route("/api/terminal/execute", post(handlers::terminal::execute))
        .route("/api/terminal/history", get(handlers::terminal::history))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/system/gpu", get(handlers::system::gpu))
        .fallback_service(ServeDir::new("static"))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", args.host, port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
