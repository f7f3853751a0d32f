//! Startup configuration.
//!
//! Every value can come from a flag or an environment variable. Values are
//! read as raw strings first so that a malformed number or toggle can be
//! logged and replaced by its default instead of aborting startup. Only a
//! missing token or symbol is fatal.

use clap::Parser;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

use crate::error::ConfigError;
use crate::types::{QuoteKind, Symbol};

pub const DEFAULT_QUOTE_URL: &str = "https://cryptoprices.cc";
pub const DEFAULT_REFRESH_SECS: u64 = 120;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ROTATION: [QuoteKind; 2] = [QuoteKind::AllTimeHigh, QuoteKind::MarketCap];

/// Raw command line / environment input
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ticker-bot",
    version,
    about = "Shows a crypto price as a Discord bot nickname and status"
)]
pub struct Args {
    /// Discord bot token
    #[arg(long, env = "TOKEN", default_value = "", hide_env_values = true)]
    pub token: String,

    /// Crypto symbol to watch
    #[arg(long, env = "SYMBOL", default_value = "")]
    pub symbol: String,

    /// Update the bot nickname in every guild
    #[arg(long, env = "SET_NICKNAME", default_value = "true")]
    pub set_nickname: String,

    /// Text shown before the price in the nickname (defaults to the symbol)
    #[arg(long, env = "NICKNAME_HEADER", default_value = "")]
    pub nickname_header: String,

    /// Static status text shown once per rotation
    #[arg(long, env = "ACTIVITY_MSG", default_value = "")]
    pub activity_msg: String,

    /// 0: playing, 1: listening, 2: watching
    #[arg(long, env = "STATUS", default_value = "2")]
    pub status: String,

    /// Seconds between refreshes
    #[arg(long, env = "REFRESH", default_value = "120")]
    pub refresh: String,

    /// Address for prometheus metric serving
    #[arg(long, env = "METRICS", default_value = ":8080")]
    pub metrics: String,

    /// `rotate` cycles ATH/MCAP in the status, `mirror` shows the nickname there
    #[arg(long, env = "CYCLE_MODE", default_value = "rotate")]
    pub cycle_mode: String,

    /// Comma separated status rotation (ATH, MCAP, PRICE)
    #[arg(long, env = "ROTATION", default_value = "ATH,MCAP")]
    pub rotation: String,

    /// Base URL of the quote service
    #[arg(long, env = "QUOTE_URL", default_value = DEFAULT_QUOTE_URL)]
    pub quote_url: String,

    /// Seconds before a quote request is abandoned
    #[arg(long, env = "FETCH_TIMEOUT", default_value = "10")]
    pub fetch_timeout: String,
}

/// Presence style used for the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusMode {
    Playing,
    Listening,
    #[default]
    Watching,
}

impl StatusMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(StatusMode::Playing),
            1 => Some(StatusMode::Listening),
            2 => Some(StatusMode::Watching),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            StatusMode::Playing => 0,
            StatusMode::Listening => 1,
            StatusMode::Watching => 2,
        }
    }
}

/// What the status line does on ticks where nicknames are updated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleMode {
    /// Nicknames carry the price, the status rotates through the slots
    #[default]
    Rotate,
    /// Nicknames and status both carry the price
    Mirror,
}

/// Resolved, immutable configuration
#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub symbol: Symbol,
    pub set_nickname: bool,
    pub nickname_header: String,
    pub activity_msg: Option<String>,
    pub status: StatusMode,
    pub refresh: Duration,
    pub metrics_addr: SocketAddr,
    pub cycle_mode: CycleMode,
    pub rotation: Vec<QuoteKind>,
    pub quote_url: String,
    pub fetch_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("symbol", &self.symbol)
            .field("set_nickname", &self.set_nickname)
            .field("nickname_header", &self.nickname_header)
            .field("activity_msg", &self.activity_msg)
            .field("status", &self.status)
            .field("refresh", &self.refresh)
            .field("metrics_addr", &self.metrics_addr)
            .field("cycle_mode", &self.cycle_mode)
            .field("rotation", &self.rotation)
            .field("quote_url", &self.quote_url)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl Config {
    /// Resolves raw input, substituting defaults for malformed values
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let token = args.token.trim();
        if token.is_empty() {
            return Err(ConfigError::Missing { key: "TOKEN" });
        }
        let symbol = Symbol::new(&args.symbol)?;

        let nickname_header = match args.nickname_header.trim() {
            "" => symbol.to_string(),
            header => header.to_string(),
        };
        let activity_msg = match args.activity_msg.trim() {
            "" => None,
            msg => Some(msg.to_string()),
        };

        let refresh = recover(
            parse_refresh(&args.refresh),
            Duration::from_secs(DEFAULT_REFRESH_SECS),
        );
        // A request may never outlive the tick it belongs to
        let fetch_timeout = recover(
            parse_fetch_timeout(&args.fetch_timeout),
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        )
        .min(refresh);

        Ok(Self {
            token: token.to_string(),
            symbol,
            set_nickname: recover(parse_toggle(&args.set_nickname), true),
            nickname_header,
            activity_msg,
            status: recover(parse_status(&args.status), StatusMode::default()),
            refresh,
            metrics_addr: recover(parse_metrics_addr(&args.metrics), default_metrics_addr()),
            cycle_mode: recover(parse_cycle_mode(&args.cycle_mode), CycleMode::default()),
            rotation: recover(parse_rotation(&args.rotation), DEFAULT_ROTATION.to_vec()),
            quote_url: args.quote_url.trim().trim_end_matches('/').to_string(),
            fetch_timeout,
        })
    }
}

fn recover<T>(parsed: Result<T, ConfigError>, default: T) -> T {
    match parsed {
        Ok(value) => value,
        Err(e) => {
            warn!("{}", e);
            default
        }
    }
}

fn invalid(key: &'static str, value: &str, default: impl fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        default: default.to_string(),
    }
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Boolean-like toggle; an empty value counts as off
pub fn parse_toggle(raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid("SET_NICKNAME", raw, true)),
    }
}

pub fn parse_status(raw: &str) -> Result<StatusMode, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(StatusMode::from_code)
        .ok_or_else(|| invalid("STATUS", raw, StatusMode::default().code()))
}

pub fn parse_refresh(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(invalid("REFRESH", raw, DEFAULT_REFRESH_SECS)),
    }
}

pub fn parse_fetch_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(invalid("FETCH_TIMEOUT", raw, DEFAULT_FETCH_TIMEOUT_SECS)),
    }
}

/// Accepts `host:port` or a bare `:port`, which binds every interface
pub fn parse_metrics_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.starts_with(':') {
        format!("0.0.0.0{trimmed}")
    } else {
        trimmed.to_string()
    };
    candidate
        .parse::<SocketAddr>()
        .map_err(|_| invalid("METRICS", raw, DEFAULT_METRICS_ADDR))
}

pub fn parse_cycle_mode(raw: &str) -> Result<CycleMode, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "rotate" => Ok(CycleMode::Rotate),
        "mirror" => Ok(CycleMode::Mirror),
        _ => Err(invalid("CYCLE_MODE", raw, "rotate")),
    }
}

/// Ordered rotation slots; an empty list leaves only the fallback slot
pub fn parse_rotation(raw: &str) -> Result<Vec<QuoteKind>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| code.parse::<QuoteKind>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid("ROTATION", raw, "ATH,MCAP"))
}
