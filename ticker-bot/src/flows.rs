use crate::metrics::UpdateMetrics;
use crate::rotation::{DisplaySlot, RotationScheduler};
use crate::sink::{GuildTarget, PresentationSink};
use price_feed::{format_price, format_quote, PriceSource};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use ticker_common::{Config, CycleMode, QuoteKind, StatusMode, Symbol, UpstreamError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A tick that stopped before presenting anything new
#[derive(Error, Debug)]
pub enum TickError {
    #[error("spot price fetch failed: {0}")]
    Spot(#[source] UpstreamError),

    /// The rotation cursor was left on `kind`
    #[error("{kind} fetch failed, slot kept for next tick: {source}")]
    Rotation {
        kind: QuoteKind,
        #[source]
        source: UpstreamError,
    },
}

/// What happened to the status line during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceOutcome {
    Applied(String),
    Rejected(String),
    /// Fallback slot with no configured text
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub nickname: String,
    pub nicknames_set: usize,
    pub nickname_failures: usize,
    pub presence: PresenceOutcome,
}

/// Update cycle: quote source → formatter → nickname + status
pub struct RefreshFlow {
    source: Arc<dyn PriceSource>,
    sink: Arc<dyn PresentationSink>,
    metrics: UpdateMetrics,
    symbol: Symbol,
    nickname_header: String,
    status: StatusMode,
    cycle_mode: CycleMode,
    /// Empty when nickname updates are off
    guilds: Vec<GuildTarget>,
    rotation: RotationScheduler,
    ticks: u64,
}

impl RefreshFlow {
    /// Nickname updates are only attempted when enabled and `guilds` is non-empty
    pub fn new(
        config: &Config,
        source: Arc<dyn PriceSource>,
        sink: Arc<dyn PresentationSink>,
        guilds: Vec<GuildTarget>,
        metrics: UpdateMetrics,
    ) -> Self {
        let guilds = if config.set_nickname { guilds } else { Vec::new() };

        Self {
            source,
            sink,
            metrics,
            symbol: config.symbol.clone(),
            nickname_header: config.nickname_header.clone(),
            status: config.status,
            cycle_mode: config.cycle_mode,
            guilds,
            rotation: RotationScheduler::new(config.rotation.clone(), config.activity_msg.clone()),
            ticks: 0,
        }
    }

    pub fn rotation(&self) -> &RotationScheduler {
        &self.rotation
    }

    fn nicknames_enabled(&self) -> bool {
        !self.guilds.is_empty()
    }

    /// Runs forever; the first tick fires immediately
    pub async fn run(mut self, period: Duration) {
        info!(
            "Refreshing {} every {}s via {}",
            self.symbol,
            period.as_secs(),
            self.source.name()
        );

        let mut ticker = interval(period);
        // A slow tick pushes the next one back instead of bunching them up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.tick().await {
                Ok(report) => info!(
                    "✅ Tick {}: {} (nicknames {}/{}), status {:?}",
                    self.ticks,
                    report.nickname,
                    report.nicknames_set,
                    report.nicknames_set + report.nickname_failures,
                    report.presence
                ),
                Err(e) => warn!("❌ Tick {} skipped: {}", self.ticks, e),
            }
        }
    }

    /// One refresh cycle
    pub async fn tick(&mut self) -> Result<TickReport, TickError> {
        self.ticks += 1;

        let spot = self
            .source
            .fetch(&self.symbol, QuoteKind::Spot)
            .await
            .map_err(TickError::Spot)?;
        debug!("Spot {} = {} at {}", self.symbol, spot.value, spot.fetched_at);

        let nickname = format!("{} {}", self.nickname_header, format_price(spot.value));

        let (nicknames_set, nickname_failures) = if self.nicknames_enabled() {
            self.apply_nicknames(&nickname).await
        } else {
            (0, 0)
        };

        let status_text = if self.nicknames_enabled() && self.cycle_mode == CycleMode::Rotate {
            self.next_rotation_text().await?
        } else {
            Some(nickname.clone())
        };

        let presence = match status_text {
            Some(text) => self.apply_presence(text).await,
            None => PresenceOutcome::Unchanged,
        };

        Ok(TickReport {
            nickname,
            nicknames_set,
            nickname_failures,
            presence,
        })
    }

    /// Each guild is independent: a rejection is logged and the rest continue
    async fn apply_nicknames(&self, nickname: &str) -> (usize, usize) {
        let mut set = 0;
        let mut failed = 0;

        for guild in &self.guilds {
            match self.sink.set_nickname(guild, nickname).await {
                Ok(()) => {
                    debug!("Set nickname in {}: {}", guild.name, nickname);
                    self.metrics.record_nickname_update();
                    set += 1;
                }
                Err(e) => {
                    warn!("{}", e);
                    failed += 1;
                }
            }
        }

        (set, failed)
    }

    /// Text for the current rotation slot; the cursor only moves on success
    async fn next_rotation_text(&mut self) -> Result<Option<String>, TickError> {
        match self.rotation.current() {
            DisplaySlot::Quote(kind) => {
                let quote = self
                    .source
                    .fetch(&self.symbol, kind)
                    .await
                    .map_err(|source| TickError::Rotation { kind, source })?;

                // Market caps past 1e15 have no unit and render empty
                let value = format_quote(&quote).unwrap_or_default();
                self.rotation.advance();
                Ok(Some(format!("{}: {}", kind.label(), value)))
            }
            DisplaySlot::StaticFallback(text) => {
                let text = text.map(str::to_string);
                self.rotation.advance();
                Ok(text)
            }
        }
    }

    async fn apply_presence(&self, text: String) -> PresenceOutcome {
        match self.sink.set_presence(self.status, &text).await {
            Ok(()) => {
                debug!("Set activity: {}", text);
                self.metrics.record_activity_update();
                PresenceOutcome::Applied(text)
            }
            Err(e) => {
                warn!("Unable to set activity: {}", e);
                PresenceOutcome::Rejected(text)
            }
        }
    }
}
