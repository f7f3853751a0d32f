//! Common types and configuration shared across the ticker bot components

pub mod config;
pub mod error;
pub mod types;

pub use config::{Args, Config, CycleMode, StatusMode};
pub use error::*;
pub use types::*;
