//! Daily image supply: search providers, curated fallbacks, and
//! normalization into a compact data URL.

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod providers;
pub mod supply;

pub use config::ImageConfig;
pub use error::ImageError;
pub use supply::{DailyImageSource, ImageSupply, ResolvedImage};
