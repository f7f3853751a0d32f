//! Discord price ticker.
//!
//! Polls a quote service on a fixed interval and publishes the price as the
//! bot's nickname in every guild, while the status line rotates through the
//! all-time-high, the market cap and an optional static message.
//!
//! # Architecture
//!
//! - **Single mutator**: `RefreshFlow` owns the rotation cursor and runs ticks
//!   strictly one after another
//! - **Trait seams**: quotes come from a `PriceSource`, updates go to a
//!   `PresentationSink`, so a tick can run without network access
//! - **Failure isolation**: no error from a single tick stops the loop

pub mod discord;
pub mod flows;
pub mod metrics;
pub mod rotation;
pub mod sink;
pub mod telemetry;

pub use flows::{PresenceOutcome, RefreshFlow, TickError, TickReport};
pub use metrics::UpdateMetrics;
pub use rotation::{DisplaySlot, RotationScheduler};
pub use sink::{GuildTarget, PresentationSink};
