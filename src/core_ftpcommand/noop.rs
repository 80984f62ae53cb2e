use crate::helpers::{send_response, ControlWriter};

pub async fn handle_noop_command(writer: &ControlWriter) -> Result<(), std::io::Error> {
    send_response(writer, "200 NOOP command successful.\r\n").await
}
