use crate::helpers::{send_response, ControlWriter};
use crate::session::{DataType, FileStructure, Session, TransferMode};

/// Handles STAT with no transfer in flight: reports the session's negotiated
/// parameters. A mid-transfer STAT is answered by the reader task with the
/// live progress of the running transfer.
pub async fn handle_stat_command(
    writer: &ControlWriter,
    session: &mut Session,
) -> Result<(), std::io::Error> {
    let user = session.username.as_deref().unwrap_or("-");
    let data_type = match session.data_type {
        DataType::Ascii => "ASCII",
        DataType::Ebcdic => "EBCDIC",
        DataType::Image => "Image",
    };
    let mode = match session.transfer_mode {
        TransferMode::Stream => "Stream",
        TransferMode::Block => "Block",
        TransferMode::Compressed => "Compressed",
    };
    let structure = match session.file_structure {
        FileStructure::File => "File",
        FileStructure::Record => "Record",
    };
    let reply = format!(
        "211 Logged in as {}. Type {}, mode {}, structure {}.\r\n",
        user, data_type, mode, structure
    );
    send_response(writer, &reply).await
}
