use crate::helpers::{send_response, ControlWriter};
use crate::session::{RestartOffset, Session};

/// Handles REST: arms a restart offset for the next transfer command.
pub async fn handle_rest_command(
    writer: &ControlWriter,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    match arg.trim().parse::<u64>() {
        Ok(offset) => {
            session.set_restart_offset(RestartOffset::At(offset));
            let reply = format!("350 Restarting at {}. Send STORE or RETRIEVE.\r\n", offset);
            send_response(writer, &reply).await
        }
        Err(_) => {
            send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await
        }
    }
}
