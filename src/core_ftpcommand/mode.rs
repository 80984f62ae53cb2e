use log::debug;

use crate::core_transfer::TransferError;
use crate::helpers::{send_response, ControlWriter};
use crate::session::{Session, TransferMode};

/// Handles MODE: S (stream), B (block) or Z (deflate-compressed).
pub async fn handle_mode_command(
    writer: &ControlWriter,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    match arg.trim().to_ascii_uppercase().as_str() {
        "S" => {
            session.transfer_mode = TransferMode::Stream;
            send_response(writer, "200 Mode set to S.\r\n").await
        }
        "B" => {
            session.transfer_mode = TransferMode::Block;
            send_response(writer, "200 Mode set to B.\r\n").await
        }
        "Z" => {
            session.transfer_mode = TransferMode::Compressed;
            send_response(writer, "200 Mode set to Z.\r\n").await
        }
        other => {
            let err = TransferError::Protocol(format!("MODE {}", other));
            debug!("{}", err);
            send_response(writer, err.to_ftp_response()).await
        }
    }
}
