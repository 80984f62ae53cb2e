// SSL/TLS support for the data channel.

pub mod context;
pub mod error;

pub use context::TlsContext;
pub use error::TlsError;
