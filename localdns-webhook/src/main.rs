use std::{net::SocketAddr, process::exit};

use anyhow::Context;
use clap::Parser;
use cli::{Cli, LogLevel};
use localdns_webhook_core::{config::WebhookConfig, review::ReviewHandler};
use log::{error, info, LevelFilter};
use tls::TlsCredentials;

mod cli;
mod server;
mod tls;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    configure_logging(&cli);

    if let Err(err) = run(cli).await {
        error!("{err:#}");
        exit(1)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let credentials = TlsCredentials::load(&cli.tls_cert_file, &cli.tls_key_file)
        .await
        .context("Couldn't load the webhook key pair!")?;

    info!(
        "Ignoring namespaces: {}",
        config
            .ignored_namespaces
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!(
        "Injecting nameservers {:?} for cluster domain '{}'",
        config.dns.nameservers, config.dns.cluster_domain
    );

    server::run(
        SocketAddr::new(cli.address, cli.port),
        ReviewHandler::new(config),
        credentials,
    )
    .await;

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<WebhookConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading config from '{}'...", path.display());
            WebhookConfig::from_file(path)
                .with_context(|| format!("Couldn't load config from '{}'!", path.display()))
        }
        None => Ok(WebhookConfig::default()),
    }
}

fn configure_logging(cli: &Cli) {
    let log_level = cli.get_log_level();
    let mut logger = env_logger::builder();

    logger
        .format_module_path(matches!(log_level, LogLevel::Trace))
        .filter_level(LevelFilter::Warn);

    match log_level {
        LogLevel::Normal => logger.filter(Some("localdns_webhook"), LevelFilter::Info),
        LogLevel::Verbose => logger.filter(Some("localdns_webhook"), LevelFilter::Debug),
        LogLevel::Trace => logger.filter(None, LevelFilter::Debug),
    };

    logger.parse_default_env().init();
}
