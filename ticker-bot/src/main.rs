use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use price_feed::CryptoPricesClient;
use ticker_bot::discord::{DiscordConnector, DiscordSession};
use ticker_bot::telemetry::init_telemetry;
use ticker_bot::{metrics, GuildTarget, RefreshFlow, UpdateMetrics};
use ticker_common::{Args, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_telemetry();

    info!("Crypto ticker bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_args(&args).context("invalid configuration")?;
    debug!("{:?}", config);

    let update_metrics = UpdateMetrics::new(&config.symbol)?;
    let server_metrics = update_metrics.clone();
    let metrics_addr = config.metrics_addr;
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr, server_metrics).await {
            error!("Metrics server on {} stopped: {}", metrics_addr, e);
        }
    });

    let source = CryptoPricesClient::new(&config.quote_url, config.fetch_timeout)?;

    let session = DiscordSession::connect(&config.token)
        .await
        .context("unable to open discord session")?;

    let guilds = if config.set_nickname {
        nickname_guilds(&session.connector).await
    } else {
        Vec::new()
    };

    let flow = RefreshFlow::new(
        &config,
        Arc::new(source),
        Arc::new(session.connector.clone()),
        guilds,
        update_metrics,
    );

    tokio::select! {
        _ = flow.run(config.refresh) => {}
        finished = session.gateway => {
            session.shard_manager.shutdown_all().await;
            match finished {
                Ok(Ok(())) => anyhow::bail!("discord gateway closed"),
                Ok(Err(e)) => return Err(e).context("discord gateway failed"),
                Err(e) => return Err(e).context("discord gateway task panicked"),
            }
        }
        _ = shutdown_signal() => info!("Shutdown signal received"),
    }

    session.shard_manager.shutdown_all().await;
    info!("Shutting down.");
    Ok(())
}

/// Nickname updates are turned off when the guild list is unavailable or empty
async fn nickname_guilds(connector: &DiscordConnector) -> Vec<GuildTarget> {
    match connector.guilds().await {
        Ok(guilds) if guilds.is_empty() => {
            warn!("Bot is not in any guild, nickname updates disabled");
            guilds
        }
        Ok(guilds) => {
            info!("Updating nickname in {} guilds", guilds.len());
            guilds
        }
        Err(e) => {
            warn!("Unable to list guilds, nickname updates disabled: {}", e);
            Vec::new()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
