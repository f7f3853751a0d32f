use async_trait::async_trait;
use ticker_common::{SinkError, StatusMode};

/// A guild the bot's nickname is set in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildTarget {
    pub id: u64,
    pub name: String,
}

/// Where formatted text ends up on the chat platform
#[async_trait]
pub trait PresentationSink: Send + Sync {
    /// Set the bot's display name in a single guild
    async fn set_nickname(&self, guild: &GuildTarget, nickname: &str) -> Result<(), SinkError>;

    /// Replace the bot's presence text
    async fn set_presence(&self, mode: StatusMode, text: &str) -> Result<(), SinkError>;
}
