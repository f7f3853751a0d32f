use async_trait::async_trait;
use clap::Parser;
use mockall::mock;
use price_feed::PriceSource;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticker_bot::{
    GuildTarget, PresenceOutcome, PresentationSink, RefreshFlow, TickError, UpdateMetrics,
};
use ticker_common::{Args, Config, Quote, QuoteKind, SinkError, StatusMode, Symbol, UpstreamError};

const SPOT: f64 = 67_012.4;
const ATH: f64 = 73_750.0;
const MCAP: f64 = 1_300_000_000_000.0;

/// Simulated quote service: scripted results per kind, steady values otherwise
#[derive(Default)]
struct ScriptedSource {
    scripted: Mutex<HashMap<QuoteKind, VecDeque<Option<f64>>>>,
    calls: Mutex<Vec<QuoteKind>>,
}

impl ScriptedSource {
    /// `None` makes that call fail
    fn script(&self, kind: QuoteKind, results: &[Option<f64>]) {
        self.scripted
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .extend(results.iter().copied());
    }

    fn calls(&self) -> Vec<QuoteKind> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch(&self, _symbol: &Symbol, kind: QuoteKind) -> Result<Quote, UpstreamError> {
        self.calls.lock().unwrap().push(kind);

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(|queue| queue.pop_front());

        let value = match scripted {
            Some(Some(value)) => value,
            Some(None) => {
                return Err(UpstreamError::Status {
                    url: format!("http://quotes/BTC/{}", kind.path_segment()),
                    status: 502,
                })
            }
            None => match kind {
                QuoteKind::Spot => SPOT,
                QuoteKind::AllTimeHigh => ATH,
                QuoteKind::MarketCap => MCAP,
            },
        };

        Ok(Quote::new(kind, value))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Quote service that answers spot requests after `delay`, tracking overlap
struct SlowSource {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Mutex<Vec<tokio::time::Instant>>,
}

impl SlowSource {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PriceSource for SlowSource {
    async fn fetch(&self, _symbol: &Symbol, kind: QuoteKind) -> Result<Quote, UpstreamError> {
        self.started.lock().unwrap().push(tokio::time::Instant::now());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Quote::new(kind, SPOT))
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Records every update; selected guilds and the presence can be made to fail
#[derive(Default)]
struct RecordingSink {
    failing_guilds: HashSet<u64>,
    reject_presence: bool,
    nicknames: Mutex<Vec<(u64, String)>>,
    presences: Mutex<Vec<(StatusMode, String)>>,
}

impl RecordingSink {
    fn nicknames(&self) -> Vec<(u64, String)> {
        self.nicknames.lock().unwrap().clone()
    }

    fn presences(&self) -> Vec<String> {
        self.presences
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl PresentationSink for RecordingSink {
    async fn set_nickname(&self, guild: &GuildTarget, nickname: &str) -> Result<(), SinkError> {
        if self.failing_guilds.contains(&guild.id) {
            return Err(SinkError::Nickname {
                guild: guild.name.clone(),
                reason: "Missing Permissions".to_string(),
            });
        }
        self.nicknames
            .lock()
            .unwrap()
            .push((guild.id, nickname.to_string()));
        Ok(())
    }

    async fn set_presence(&self, mode: StatusMode, text: &str) -> Result<(), SinkError> {
        if self.reject_presence {
            return Err(SinkError::Presence {
                reason: "rate limited".to_string(),
            });
        }
        self.presences.lock().unwrap().push((mode, text.to_string()));
        Ok(())
    }
}

mock! {
    Sink {}

    #[async_trait]
    impl PresentationSink for Sink {
        async fn set_nickname(&self, guild: &GuildTarget, nickname: &str) -> Result<(), SinkError>;
        async fn set_presence(&self, mode: StatusMode, text: &str) -> Result<(), SinkError>;
    }
}

/// Builds a config from flags alone, whatever the host environment holds
fn config(extra: &[&str]) -> Config {
    for key in [
        "TOKEN",
        "SYMBOL",
        "SET_NICKNAME",
        "NICKNAME_HEADER",
        "ACTIVITY_MSG",
        "STATUS",
        "REFRESH",
        "METRICS",
        "CYCLE_MODE",
        "ROTATION",
        "QUOTE_URL",
        "FETCH_TIMEOUT",
    ] {
        std::env::remove_var(key);
    }

    let mut argv = vec!["ticker-bot", "--token", "t", "--symbol", "BTC"];
    argv.extend_from_slice(extra);
    Config::from_args(&Args::try_parse_from(argv).unwrap()).unwrap()
}

fn guilds(count: u64) -> Vec<GuildTarget> {
    (1..=count)
        .map(|id| GuildTarget {
            id,
            name: format!("guild-{}", id),
        })
        .collect()
}

fn metrics() -> UpdateMetrics {
    UpdateMetrics::new(&Symbol::new("BTC").unwrap()).unwrap()
}

struct Harness {
    flow: RefreshFlow,
    source: Arc<ScriptedSource>,
    sink: Arc<RecordingSink>,
    metrics: UpdateMetrics,
}

fn harness(config: &Config, sink: RecordingSink, guild_count: u64) -> Harness {
    let source = Arc::new(ScriptedSource::default());
    let sink = Arc::new(sink);
    let metrics = metrics();
    let flow = RefreshFlow::new(
        config,
        source.clone(),
        sink.clone(),
        guilds(guild_count),
        metrics.clone(),
    );

    Harness {
        flow,
        source,
        sink,
        metrics,
    }
}

#[tokio::test]
async fn test_status_rotates_through_slots_and_fallback() {
    // Given
    let config = config(&["--activity-msg", "cryptoprices.cc"]);
    let mut h = harness(&config, RecordingSink::default(), 1);

    // When - four successful ticks
    for _ in 0..4 {
        h.flow.tick().await.unwrap();
    }

    // Then
    assert_eq!(
        h.sink.presences(),
        vec![
            "ATH: $73,750",
            "MCAP: $1.30T",
            "cryptoprices.cc",
            "ATH: $73,750",
        ]
    );
    assert_eq!(h.metrics.activity_updates(), 4);
    assert_eq!(h.metrics.nickname_updates(), 4);
    assert_eq!(h.flow.rotation().cursor(), 1);
}

#[tokio::test]
async fn test_nickname_carries_header_and_price() {
    let config = config(&["--nickname-header", "Bitcoin"]);
    let mut h = harness(&config, RecordingSink::default(), 2);

    let report = h.flow.tick().await.unwrap();

    assert_eq!(report.nickname, "Bitcoin $67,012");
    assert_eq!(report.nicknames_set, 2);
    assert_eq!(
        h.sink.nicknames(),
        vec![
            (1, "Bitcoin $67,012".to_string()),
            (2, "Bitcoin $67,012".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_spot_failure_skips_whole_tick() {
    // Given - the first spot fetch fails
    let config = config(&[]);
    let mut h = harness(&config, RecordingSink::default(), 2);
    h.source.script(QuoteKind::Spot, &[None]);

    // When
    let result = h.flow.tick().await;

    // Then - nothing was touched
    assert!(matches!(result, Err(TickError::Spot(_))));
    assert!(h.sink.nicknames().is_empty());
    assert!(h.sink.presences().is_empty());
    assert_eq!(h.metrics.nickname_updates(), 0);
    assert_eq!(h.metrics.activity_updates(), 0);
    assert_eq!(h.flow.rotation().cursor(), 0);
    assert_eq!(h.source.calls(), vec![QuoteKind::Spot]);

    // The next tick presents the slot the failed one would have
    let report = h.flow.tick().await.unwrap();
    assert_eq!(report.presence, PresenceOutcome::Applied("ATH: $73,750".to_string()));
}

#[tokio::test]
async fn test_rotation_failure_keeps_cursor_on_same_slot() {
    // Given - the first market cap fetch fails
    let config = config(&[]);
    let mut h = harness(&config, RecordingSink::default(), 1);
    h.source.script(QuoteKind::MarketCap, &[None]);

    // When
    h.flow.tick().await.unwrap();
    let failed = h.flow.tick().await;

    // Then - presence untouched, cursor still on MCAP
    match failed {
        Err(TickError::Rotation { kind, .. }) => assert_eq!(kind, QuoteKind::MarketCap),
        other => panic!("unexpected tick result: {:?}", other),
    }
    assert_eq!(h.flow.rotation().cursor(), 1);
    assert_eq!(h.sink.presences(), vec!["ATH: $73,750"]);
    assert_eq!(h.metrics.activity_updates(), 1);
    // Nicknames were already updated before the rotation step
    assert_eq!(h.metrics.nickname_updates(), 2);

    let retried = h.flow.tick().await.unwrap();
    assert_eq!(retried.presence, PresenceOutcome::Applied("MCAP: $1.30T".to_string()));
    assert_eq!(h.flow.rotation().cursor(), 2);
}

#[tokio::test]
async fn test_guild_failures_are_isolated() {
    let config = config(&[]);
    let sink = RecordingSink {
        failing_guilds: HashSet::from([2]),
        ..Default::default()
    };
    let mut h = harness(&config, sink, 3);

    let report = h.flow.tick().await.unwrap();

    assert_eq!(report.nicknames_set, 2);
    assert_eq!(report.nickname_failures, 1);
    assert_eq!(h.metrics.nickname_updates(), 2);
    let updated: Vec<u64> = h.sink.nicknames().into_iter().map(|(id, _)| id).collect();
    assert_eq!(updated, vec![1, 3]);
    assert_eq!(report.presence, PresenceOutcome::Applied("ATH: $73,750".to_string()));
}

#[tokio::test]
async fn test_fallback_without_text_leaves_status_alone() {
    let config = config(&[]);
    let mut h = harness(&config, RecordingSink::default(), 1);

    h.flow.tick().await.unwrap();
    h.flow.tick().await.unwrap();
    let report = h.flow.tick().await.unwrap();

    assert_eq!(report.presence, PresenceOutcome::Unchanged);
    assert_eq!(h.sink.presences().len(), 2);
    assert_eq!(h.metrics.activity_updates(), 2);
    assert_eq!(h.flow.rotation().cursor(), 0);
}

#[tokio::test]
async fn test_rejected_presence_counts_nothing_but_rotation_moves_on() {
    let config = config(&[]);
    let sink = RecordingSink {
        reject_presence: true,
        ..Default::default()
    };
    let mut h = harness(&config, sink, 1);

    let report = h.flow.tick().await.unwrap();

    assert_eq!(report.presence, PresenceOutcome::Rejected("ATH: $73,750".to_string()));
    assert_eq!(h.metrics.activity_updates(), 0);
    assert_eq!(h.flow.rotation().cursor(), 1);
}

#[tokio::test]
async fn test_disabled_nicknames_show_price_in_status() {
    let config = config(&["--set-nickname", "false"]);
    let mut h = harness(&config, RecordingSink::default(), 3);

    for _ in 0..3 {
        let report = h.flow.tick().await.unwrap();
        assert_eq!(report.presence, PresenceOutcome::Applied("BTC $67,012".to_string()));
    }

    assert!(h.sink.nicknames().is_empty());
    assert_eq!(h.source.calls(), vec![QuoteKind::Spot; 3]);
    assert_eq!(h.flow.rotation().cursor(), 0);
}

#[tokio::test]
async fn test_no_guilds_behaves_like_disabled_nicknames() {
    let config = config(&[]);
    let mut h = harness(&config, RecordingSink::default(), 0);

    let report = h.flow.tick().await.unwrap();

    assert_eq!(report.nicknames_set, 0);
    assert_eq!(report.presence, PresenceOutcome::Applied("BTC $67,012".to_string()));
    assert_eq!(h.source.calls(), vec![QuoteKind::Spot]);
}

#[tokio::test]
async fn test_mirror_mode_sets_nickname_and_status() {
    let config = config(&["--cycle-mode", "mirror"]);
    let mut h = harness(&config, RecordingSink::default(), 2);

    let report = h.flow.tick().await.unwrap();

    assert_eq!(report.nicknames_set, 2);
    assert_eq!(report.presence, PresenceOutcome::Applied("BTC $67,012".to_string()));
    assert_eq!(h.source.calls(), vec![QuoteKind::Spot]);
}

#[tokio::test]
async fn test_unformattable_market_cap_renders_empty_value() {
    let config = config(&["--rotation", "MCAP"]);
    let mut h = harness(&config, RecordingSink::default(), 1);
    h.source.script(QuoteKind::MarketCap, &[Some(2e15)]);

    let report = h.flow.tick().await.unwrap();

    assert_eq!(report.presence, PresenceOutcome::Applied("MCAP: ".to_string()));
}

#[tokio::test]
async fn test_status_mode_reaches_sink() {
    // Given - a sink that only accepts "listening" presences
    let config = config(&["--status", "1", "--set-nickname", "off"]);
    let mut sink = MockSink::new();
    sink.expect_set_nickname().never();
    sink.expect_set_presence()
        .withf(|mode, text| *mode == StatusMode::Listening && text == "BTC $67,012")
        .times(1)
        .returning(|_, _| Ok(()));

    let metrics = metrics();
    let mut flow = RefreshFlow::new(
        &config,
        Arc::new(ScriptedSource::default()),
        Arc::new(sink),
        guilds(1),
        metrics.clone(),
    );

    // When
    flow.tick().await.unwrap();

    // Then
    assert_eq!(metrics.activity_updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_ticks_immediately_then_once_per_period() {
    // Given - price-only status so every tick makes exactly one fetch
    let config = config(&["--set-nickname", "false"]);
    let Harness { flow, source, .. } = harness(&config, RecordingSink::default(), 0);
    let spot_fetches = || {
        source
            .calls()
            .into_iter()
            .filter(|kind| *kind == QuoteKind::Spot)
            .count()
    };

    // When
    let runner = tokio::spawn(flow.run(Duration::from_secs(60)));

    // Then
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(spot_fetches(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(spot_fetches(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(spot_fetches(), 2);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(spot_fetches(), 4);

    runner.abort();
}

#[tokio::test(start_paused = true)]
async fn test_run_never_overlaps_slow_ticks() {
    // Given - every fetch outlasts the refresh period
    let config = config(&["--set-nickname", "false"]);
    let delay = Duration::from_secs(90);
    let source = Arc::new(SlowSource::new(delay));
    let flow = RefreshFlow::new(
        &config,
        source.clone(),
        Arc::new(RecordingSink::default()),
        Vec::new(),
        metrics(),
    );

    // When
    let runner = tokio::spawn(flow.run(Duration::from_secs(60)));
    tokio::time::sleep(Duration::from_secs(400)).await;
    runner.abort();

    // Then - one tick at a time, each starting after the previous finished
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    let started = source.started.lock().unwrap().clone();
    assert!(started.len() >= 3, "only {} ticks started", started.len());
    for pair in started.windows(2) {
        assert!(pair[1] - pair[0] >= delay, "ticks overlapped: {:?}", pair);
    }
}
