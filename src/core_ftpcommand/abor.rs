use crate::helpers::{send_response, ControlWriter};
use crate::session::Session;

/// Handles ABOR arriving with no transfer in flight. A mid-transfer ABOR is
/// intercepted by the reader task and never reaches this handler; the
/// aborted transfer answers with its own 426.
pub async fn handle_abor_command(
    writer: &ControlWriter,
    session: &mut Session,
) -> Result<(), std::io::Error> {
    // A described-but-unused data channel is discarded as well.
    session.provider.close();
    send_response(writer, "225 No transfer to abort.\r\n").await
}
