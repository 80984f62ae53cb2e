// Per-user transfer statistics and quota enforcement, shared across all
// concurrent sessions of the same user.

pub mod counters;
pub mod error;

pub use counters::{QuotaRegistry, StatLimits, UserCounters};
pub use error::QuotaError;
