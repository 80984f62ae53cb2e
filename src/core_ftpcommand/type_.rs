use crate::core_transfer::TransferError;
use crate::helpers::{send_response, ControlWriter};
use crate::session::{DataType, Session};

/// Handles TYPE: selects the representation type for following transfers.
/// `TYPE L` is accepted only with a byte size of 8, where it is equivalent
/// to Image.
pub async fn handle_type_command(
    writer: &ControlWriter,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    let arg = arg.trim().to_ascii_uppercase();
    let mut parts = arg.split_whitespace();

    let selected = match (parts.next(), parts.next()) {
        (Some("A"), None) | (Some("A"), Some("N")) => Some(DataType::Ascii),
        (Some("E"), None) | (Some("E"), Some("N")) => Some(DataType::Ebcdic),
        (Some("I"), None) => Some(DataType::Image),
        (Some("L"), Some("8")) => Some(DataType::Image),
        (Some("L"), Some(_)) => {
            return send_response(writer, TransferError::UnsupportedEncoding.to_ftp_response())
                .await
        }
        _ => None,
    };

    match selected {
        Some(data_type) => {
            session.data_type = data_type;
            let label = match data_type {
                DataType::Ascii => "A",
                DataType::Ebcdic => "E",
                DataType::Image => "I",
            };
            let reply = format!("200 Type set to {}.\r\n", label);
            send_response(writer, &reply).await
        }
        None => send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await,
    }
}
