//! MCP Server entry point for lakehouse operations.
//!
//! Resolves the deployment mode, builds the backend once (so configuration
//! and credential problems stop the process before it serves anything), then
//! serves MCP over stdio or streamable HTTP.

mod admin;
mod schemas;
mod server;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use lakehouse_core::{BackendFactory, CliOverrides, CoreError, Settings, Transport};
use rmcp::ServiceExt;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use server::LakehouseMcp;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for configuration problems (bad flags, environment or endpoints).
const EXIT_CONFIGURATION: u8 = 2;
/// Exit code when credential discovery finds nothing.
const EXIT_AUTHENTICATION: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "lakehouse-mcp", version, about = "MCP server for lakehouse catalogs")]
struct Cli {
    /// Deployment preset: remote, local or legacy.
    #[arg(long, value_name = "PRESET")]
    deployment: Option<String>,

    /// Backend override: remote-api or local-library.
    #[arg(long, value_name = "BACKEND")]
    backend: Option<String>,

    /// Catalog endpoint for the remote backend.
    #[arg(long, value_name = "URL")]
    catalog_url: Option<String>,

    /// Registry endpoint for the remote backend.
    #[arg(long, value_name = "URL")]
    registry_url: Option<String>,

    /// Bucket that package tools use when no registry is given.
    #[arg(long, value_name = "BUCKET")]
    default_bucket: Option<String>,

    /// Listen address for the HTTP transport.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

impl From<Cli> for CliOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            deployment: cli.deployment,
            backend: cli.backend,
            catalog_url: cli.catalog_url,
            registry_url: cli.registry_url,
            default_bucket: cli.default_bucket,
            bind: cli.bind,
        }
    }
}

fn exit_status(error: &CoreError) -> u8 {
    match error {
        CoreError::Authentication(_) => EXIT_AUTHENTICATION,
        CoreError::Configuration(_) => EXIT_CONFIGURATION,
        CoreError::Ops(_) => 1,
    }
}

fn exit_code(error: &CoreError) -> ExitCode {
    ExitCode::from(exit_status(error))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing to stderr (MCP uses stdout for protocol)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::from_env().and_then(|s| s.with_cli(cli.into())) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{e}");
            return exit_code(&e);
        }
    };
    tracing::debug!("Settings: {settings:?}");

    let factory = Arc::new(BackendFactory::new(settings));
    let mode = match factory.mode() {
        Ok(mode) => mode,
        Err(e) => {
            tracing::error!("{e}");
            return exit_code(&e);
        }
    };
    tracing::info!(
        "Starting lakehouse MCP server: backend={}, transport={}, multiuser={}",
        mode.backend,
        mode.transport,
        mode.multiuser
    );

    if let Err(e) = factory.get_backend().await {
        tracing::error!("{e}");
        return exit_code(&e);
    }

    let mcp_server = LakehouseMcp::new(Arc::clone(&factory));
    let served = match mode.transport {
        Transport::Stdio => serve_stdio(mcp_server).await,
        Transport::Http => serve_http(mcp_server, &factory.settings().http_addr).await,
    };

    if let Err(e) = served {
        tracing::error!("MCP server error: {e:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn serve_stdio(server: LakehouseMcp) -> anyhow::Result<()> {
    tracing::info!("Serving MCP on stdio");
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}

async fn serve_http(server: LakehouseMcp, addr: &str) -> anyhow::Result<()> {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Serving MCP on http://{}/mcp", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {e}");
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_maps_onto_overrides() {
        let cli = Cli::parse_from([
            "lakehouse-mcp",
            "--deployment",
            "remote",
            "--catalog-url",
            "https://catalog.example.com",
            "--default-bucket",
            "s3://demo",
            "--bind",
            "0.0.0.0:9000",
        ]);
        let overrides = CliOverrides::from(cli);
        assert_eq!(overrides.deployment.as_deref(), Some("remote"));
        assert_eq!(overrides.catalog_url.as_deref(), Some("https://catalog.example.com"));
        assert_eq!(overrides.default_bucket.as_deref(), Some("s3://demo"));
        assert_eq!(overrides.bind.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(overrides.backend, None);
    }

    #[test]
    fn startup_failures_have_distinct_exit_codes() {
        let configuration = exit_status(&CoreError::Configuration("bad".into()));
        let authentication = exit_status(&CoreError::Authentication(
            lakehouse_core::DiscoveryFailure { attempts: Vec::new() },
        ));
        assert_eq!(configuration, EXIT_CONFIGURATION);
        assert_eq!(authentication, EXIT_AUTHENTICATION);
        assert_ne!(configuration, 0);
    }
}
