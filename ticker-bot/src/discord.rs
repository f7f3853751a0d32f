use crate::sink::{GuildTarget, PresentationSink};
use async_trait::async_trait;
use serenity::all::{
    ActivityData, Client, ConnectionStage, Context, EventHandler, GatewayIntents, GuildId, Http,
    Ready, ShardId, ShardManager,
};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use ticker_common::{SinkError, StatusMode};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// Guild listing page size, matching a single request
const GUILD_PAGE_LIMIT: u64 = 100;

/// The client runs a single shard
const PRESENCE_SHARD: ShardId = ShardId(0);

#[derive(Error, Debug)]
pub enum DiscordError {
    #[error("discord API error: {0}")]
    Api(#[from] serenity::Error),

    #[error("gateway closed before the session was ready")]
    GatewayClosed,

    #[error("gateway task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Signals `connect` on the first ready event
struct ReadyHandler {
    ready_tx: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl EventHandler for ReadyHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let sender = self.ready_tx.lock().ok().and_then(|mut slot| slot.take());
        match sender {
            Some(sender) => {
                info!("Gateway ready as {} in {} guilds", ready.user.name, ready.guilds.len());
                let _ = sender.send(());
            }
            None => info!("Gateway re-identified as {}", ready.user.name),
        }
    }
}

/// Connected bot: REST client for nicknames, shard runners for presence
#[derive(Clone)]
pub struct DiscordConnector {
    http: Arc<Http>,
    /// Runners are replaced on every re-identify, so they are looked up per update
    shard_manager: Arc<ShardManager>,
}

/// Everything `main` needs to drive and stop the gateway
pub struct DiscordSession {
    pub connector: DiscordConnector,
    pub shard_manager: Arc<ShardManager>,
    pub gateway: JoinHandle<Result<(), serenity::Error>>,
}

impl DiscordSession {
    /// Authenticates, opens the gateway and waits for the first ready event
    pub async fn connect(token: &str) -> Result<Self, DiscordError> {
        let me = Http::new(token).get_current_user().await?;
        info!("Running as {}", me.id);

        let (ready_tx, ready_rx) = oneshot::channel();
        let handler = ReadyHandler {
            ready_tx: Mutex::new(Some(ready_tx)),
        };

        let mut client = Client::builder(token, GatewayIntents::GUILDS)
            .event_handler(handler)
            .await?;
        let http = client.http.clone();
        let shard_manager = client.shard_manager.clone();
        let mut gateway = tokio::spawn(async move { client.start().await });

        tokio::select! {
            ready = ready_rx => ready.map_err(|_| DiscordError::GatewayClosed)?,
            finished = &mut gateway => {
                finished??;
                return Err(DiscordError::GatewayClosed);
            }
        }

        Ok(Self {
            connector: DiscordConnector {
                http,
                shard_manager: shard_manager.clone(),
            },
            shard_manager,
            gateway,
        })
    }
}

impl DiscordConnector {
    /// Guilds the bot belongs to (first page only)
    pub async fn guilds(&self) -> Result<Vec<GuildTarget>, DiscordError> {
        let guilds = self.http.get_guilds(None, Some(GUILD_PAGE_LIMIT)).await?;

        Ok(guilds
            .into_iter()
            .map(|guild| GuildTarget {
                id: guild.id.get(),
                name: guild.name,
            })
            .collect())
    }
}

fn activity(mode: StatusMode, text: &str) -> ActivityData {
    match mode {
        StatusMode::Playing => ActivityData::playing(text),
        StatusMode::Listening => ActivityData::listening(text),
        StatusMode::Watching => ActivityData::watching(text),
    }
}

/// Only a fully connected runner delivers presence updates
fn check_presence_stage(stage: Option<ConnectionStage>) -> Result<(), SinkError> {
    match stage {
        Some(ConnectionStage::Connected) => Ok(()),
        Some(stage) => Err(SinkError::Presence {
            reason: format!("shard {} is {:?}", PRESENCE_SHARD, stage),
        }),
        None => Err(SinkError::Presence {
            reason: format!("no runner for shard {}", PRESENCE_SHARD),
        }),
    }
}

#[async_trait]
impl PresentationSink for DiscordConnector {
    async fn set_nickname(&self, guild: &GuildTarget, nickname: &str) -> Result<(), SinkError> {
        GuildId::new(guild.id)
            .edit_nickname(&self.http, Some(nickname))
            .await
            .map_err(|e| SinkError::Nickname {
                guild: guild.name.clone(),
                reason: e.to_string(),
            })
    }

    async fn set_presence(&self, mode: StatusMode, text: &str) -> Result<(), SinkError> {
        let runners = self.shard_manager.runners.lock().await;
        let runner = runners.get(&PRESENCE_SHARD);
        check_presence_stage(runner.map(|info| info.stage))?;

        if let Some(info) = runner {
            info.runner_tx.set_activity(Some(activity(mode, text)));
        }
        Ok(())
    }
}
