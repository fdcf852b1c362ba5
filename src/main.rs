mod cli;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use chromux_cdp::{CdpBackend, CdpBroker, ControlChannel, Launcher};
use chromux_config::Config;
use chromux_mcp::McpServer;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve { port } => {
            let config = chromux_config::load(cli.config.as_deref())?;
            run_serve(port, config).await
        }
        Commands::Call { payload, api } => run_call(payload, &api).await,
        Commands::ShowConfig => {
            let config = chromux_config::load(cli.config.as_deref())?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Diagnostics go to stderr: stdout belongs to the MCP line protocol.
fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Run both front-ends against one shared broker: the HTTP API as a task,
/// the MCP pump on this task over stdin/stdout.
async fn run_serve(port_override: Option<u16>, config: Config) -> anyhow::Result<()> {
    let launcher = Launcher::new(&config.browser);
    let channel = ControlChannel::new(launcher);
    let broker: Arc<dyn CdpBackend> = Arc::new(CdpBroker::new(
        channel,
        Duration::from_secs(config.cdp.request_timeout_secs),
    ));

    let port = port_override.unwrap_or(config.api.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let http = tokio::spawn(chromux_api::serve(addr, Arc::clone(&broker)));

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    McpServer::new(broker).run(stdin, tokio::io::stdout()).await?;

    // stdin closed; keep serving HTTP clients until the server itself stops.
    http.await??;
    Ok(())
}

/// One-shot HTTP client for a running relay.
async fn run_call(payload: Option<String>, api: &str) -> anyhow::Result<()> {
    let Some(payload) = payload else {
        eprintln!("Usage: chromux call '<json>'");
        eprintln!();
        eprintln!("Examples:");
        eprintln!(
            r#"  chromux call '{{"method": "Runtime.evaluate", "params": {{"expression": "1+1"}}}}'"#
        );
        eprintln!(
            r#"  chromux call '{{"method": "Page.navigate", "params": {{"url": "https://example.com"}}}}'"#
        );
        std::process::exit(1);
    };

    let body: Value = serde_json::from_str(&payload).context("payload is not valid JSON")?;

    let client = reqwest::Client::new();
    let res = match client.post(format!("{api}/cdp")).json(&body).send().await {
        Ok(res) => res,
        Err(_) => {
            eprintln!("Server not running. Start: chromux serve");
            std::process::exit(1);
        }
    };

    let reply: Value = res.json().await.context("parsing server response")?;
    if let Some(err) = reply.get("error") {
        match err.as_str() {
            Some(msg) => eprintln!("Error: {msg}"),
            None => eprintln!("Error: {err}"),
        }
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
