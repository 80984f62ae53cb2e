use thiserror::Error;

use crate::core_framing::FramingError;
use crate::core_network::ChannelError;
use crate::core_quota::QuotaError;

/// Everything a transfer can terminate with, each mapping to a distinct
/// terminal status line. `Aborted` is a terminal status, not an error
/// condition.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("permission denied")]
    Permission,

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("destination already exists")]
    UniqueViolation,

    #[error("unsupported character encoding")]
    UnsupportedEncoding,

    #[error("transfer aborted by client")]
    Aborted,

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("framing error: {0}")]
    Framing(FramingError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FramingError> for TransferError {
    fn from(e: FramingError) -> Self {
        match e {
            FramingError::Io(io) => TransferError::Io(io),
            other => TransferError::Framing(other),
        }
    }
}

impl From<QuotaError> for TransferError {
    fn from(_: QuotaError) -> Self {
        TransferError::QuotaExceeded
    }
}

impl TransferError {
    pub fn to_ftp_response(&self) -> &'static str {
        match self {
            TransferError::Protocol(_) => {
                "504 Command not implemented for that parameter.\r\n"
            }
            TransferError::Permission => "550 Permission denied.\r\n",
            TransferError::QuotaExceeded => {
                "552 Requested file action aborted. Exceeded storage allocation.\r\n"
            }
            TransferError::UniqueViolation => "553 File already exists.\r\n",
            TransferError::UnsupportedEncoding => {
                "504 Unsupported character encoding.\r\n"
            }
            TransferError::Aborted => "426 Transfer aborted.\r\n",
            TransferError::Channel(e) => e.to_ftp_response(),
            TransferError::Framing(_) | TransferError::Io(_) => {
                "451 Requested action aborted. Local error in processing.\r\n"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_rejections_map_to_504() {
        let err = TransferError::Protocol("MODE X".to_string());
        assert!(err.to_ftp_response().starts_with("504"));
        assert_eq!(err.to_string(), "protocol error: MODE X");
        assert!(TransferError::UnsupportedEncoding
            .to_ftp_response()
            .starts_with("504"));
    }
}
