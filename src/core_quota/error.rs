use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Quota exceeded for user {0}")]
    QuotaExceeded(String),
}

impl QuotaError {
    pub fn to_ftp_response(&self) -> &'static str {
        match self {
            QuotaError::QuotaExceeded(_) => {
                "552 Requested file action aborted. Exceeded storage allocation.\r\n"
            }
        }
    }
}
