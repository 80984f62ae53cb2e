use log::info;

use crate::helpers::{send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

/// Handles USER: records the name and asks for a password. Unknown names get
/// the same reply so user enumeration stays impossible.
pub async fn handle_user_command(
    writer: &ControlWriter,
    _ctx: &ServerContext,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    let name = arg.trim();
    if name.is_empty() {
        return send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await;
    }
    info!("USER {}", name);
    session.username = Some(name.to_string());
    session.is_authenticated = false;
    send_response(writer, "331 User name okay, need password.\r\n").await
}
