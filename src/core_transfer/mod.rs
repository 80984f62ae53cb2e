// The transfer engine: retrieve/store orchestration, throughput limiting and
// the shared per-transfer state polled for cancellation and progress.

pub mod error;
pub mod limiter;
pub mod orchestrator;
pub mod state;

pub use error::TransferError;
pub use limiter::RateLimiter;
pub use state::{Direction, TransferSlot, TransferState};
