pub mod config;
pub mod error;
pub mod expiry;
pub mod miniflux;
pub mod sweeper;

pub use config::{AppConfig, ExpiryRule, Target, TargetKind};
pub use error::{Error, Result};
pub use expiry::{calculate_expiry_timestamp, expiry_cutoff, parse_duration};
pub use miniflux::{MinifluxClient, ReaderApi};
pub use sweeper::{find_and_mark_expired_entries, SweepOptions, SweepReport};
