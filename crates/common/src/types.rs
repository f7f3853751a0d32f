use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Ticker symbol the bot watches, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    /// Builds a symbol from a non-empty, trimmed string
    pub fn new(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Missing { key: "SYMBOL" });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which quantity a quote represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteKind {
    Spot,
    AllTimeHigh,
    MarketCap,
}

impl QuoteKind {
    /// Path segment used by the quote service (`<base>/<symbol>/<segment>`)
    pub fn path_segment(&self) -> &'static str {
        match self {
            QuoteKind::Spot => "",
            QuoteKind::AllTimeHigh => "ATH",
            QuoteKind::MarketCap => "MCAP",
        }
    }

    /// Label shown in front of a rotated presence value
    pub fn label(&self) -> &'static str {
        match self {
            QuoteKind::Spot => "PRICE",
            QuoteKind::AllTimeHigh => "ATH",
            QuoteKind::MarketCap => "MCAP",
        }
    }
}

impl fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QuoteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRICE" | "SPOT" => Ok(QuoteKind::Spot),
            "ATH" => Ok(QuoteKind::AllTimeHigh),
            "MCAP" => Ok(QuoteKind::MarketCap),
            other => Err(format!("unknown quote kind: {other:?}")),
        }
    }
}

/// A single fetched magnitude; never cached between ticks
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub kind: QuoteKind,
    pub value: f64,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(kind: QuoteKind, value: f64) -> Self {
        Self {
            kind,
            value,
            fetched_at: Utc::now(),
        }
    }
}
