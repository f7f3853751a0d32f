pub mod cryptoprices;
pub mod format;
pub mod price_provider;

pub use cryptoprices::CryptoPricesClient;
pub use format::{format_market_cap, format_price, format_quote};
pub use price_provider::PriceSource;
