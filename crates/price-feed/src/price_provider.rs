use async_trait::async_trait;
use ticker_common::{Quote, QuoteKind, Symbol, UpstreamError};

/// Quote source interface
///
/// One call is one outbound request: no retry, no caching. Any failure is
/// handed straight back to the caller.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch a single quote of `kind` for `symbol`
    async fn fetch(&self, symbol: &Symbol, kind: QuoteKind) -> Result<Quote, UpstreamError>;

    /// Name of the source, used in logs
    fn name(&self) -> &str;
}
