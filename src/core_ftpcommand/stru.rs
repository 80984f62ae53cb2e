use log::debug;

use crate::core_transfer::TransferError;
use crate::helpers::{send_response, ControlWriter};
use crate::session::{FileStructure, Session};

/// Handles STRU: F (file) or R (record).
pub async fn handle_stru_command(
    writer: &ControlWriter,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    match arg.trim().to_ascii_uppercase().as_str() {
        "F" => {
            session.file_structure = FileStructure::File;
            send_response(writer, "200 Structure set to F.\r\n").await
        }
        "R" => {
            session.file_structure = FileStructure::Record;
            send_response(writer, "200 Structure set to R.\r\n").await
        }
        other => {
            let err = TransferError::Protocol(format!("STRU {}", other));
            debug!("{}", err);
            send_response(writer, err.to_ftp_response()).await
        }
    }
}
