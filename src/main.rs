use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use nurse_assistant::http::{self, AppState};
use nurse_assistant::repl::Repl;
use nurse_assistant::{AzureConnector, Config, Mode, QueryDispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for the chat
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(Config::load());
    let dispatcher = QueryDispatcher::new(config.clone(), Arc::new(AzureConnector));

    match config.server.transport.as_str() {
        "http" => {
            let bind: SocketAddr = config
                .server
                .http_bind
                .parse()
                .with_context(|| format!("Invalid NURSE_HTTP_BIND '{}'", config.server.http_bind))?;

            let state = Arc::new(AppState::new(dispatcher));
            let router = http::router(state, config.server.bearer_token.clone());

            let listener = tokio::net::TcpListener::bind(bind).await?;
            tracing::info!(
                %bind,
                auth = %config.server.bearer_token.as_deref().map(|_| "bearer").unwrap_or("none"),
                "Starting HTTP server"
            );
            axum::serve(listener, router).await?;
        }
        _ => {
            let mut repl = Repl::new(&dispatcher, Mode::AdmissionAssistance);
            repl.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
            tracing::info!("Session closed");
        }
    }

    Ok(())
}
