use crate::helpers::{send_response, ControlWriter};

pub async fn handle_feat_command(writer: &ControlWriter) -> Result<(), std::io::Error> {
    let features = "211-Features:\r\n \
        SIZE\r\n \
        MDTM\r\n \
        REST STREAM\r\n \
        EPRT\r\n \
        EPSV\r\n \
        MODE Z\r\n\
        211 End\r\n";
    send_response(writer, features).await
}
