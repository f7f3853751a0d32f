use crate::price_provider::PriceSource;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use ticker_common::{Quote, QuoteKind, Symbol, UpstreamError};
use tracing::debug;

/// The quote service rejects requests without a browser-like agent
const USER_AGENT: &str = "Mozilla/5.0";
const PROJECT_HEADER: (&str, &str) = ("github", "rssnyder/discord-bot-cryptoprices");
/// Longest body echoed back in a `Malformed` error
const MAX_BODY_ECHO: usize = 64;

/// Client for the plain-text cryptoprices.cc API
pub struct CryptoPricesClient {
    client: Client,
    base_url: String,
}

impl CryptoPricesClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(PROJECT_HEADER.0, HeaderValue::from_static(PROJECT_HEADER.1));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| UpstreamError::Client { source: Box::new(e) })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `<base>/<symbol>/<segment>`; spot keeps the trailing slash
    pub fn quote_url(&self, symbol: &Symbol, kind: QuoteKind) -> String {
        format!("{}/{}/{}", self.base_url, symbol, kind.path_segment())
    }
}

/// Parses a plain-text quote body such as `"67012.5\n"`
pub fn parse_quote_body(body: &str) -> Result<f64, UpstreamError> {
    let trimmed = body.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(UpstreamError::Malformed {
            body: trimmed.chars().take(MAX_BODY_ECHO).collect(),
        }),
    }
}

#[async_trait]
impl PriceSource for CryptoPricesClient {
    async fn fetch(&self, symbol: &Symbol, kind: QuoteKind) -> Result<Quote, UpstreamError> {
        let url = self.quote_url(symbol, kind);
        debug!("🌐 GET {}", url);

        let transport = |e: reqwest::Error| UpstreamError::Transport {
            url: url.clone(),
            source: Box::new(e),
        };

        let response = self.client.get(&url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        let value = parse_quote_body(&body)?;
        debug!("📊 {} {} = {}", symbol, kind, value);

        Ok(Quote::new(kind, value))
    }

    fn name(&self) -> &str {
        "cryptoprices"
    }
}
