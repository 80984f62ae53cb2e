use log::{info, warn};

use crate::helpers::{send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

/// Handles PASS: verifies the password for the name given with USER.
pub async fn handle_pass_command(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    let name = match &session.username {
        Some(name) => name.clone(),
        None => return send_response(writer, "503 Login with USER first.\r\n").await,
    };

    if ctx.users.authenticate(&name, arg.trim()) {
        session.is_authenticated = true;
        info!("User {} logged in", name);
        send_response(writer, "230 User logged in, proceed.\r\n").await
    } else {
        warn!("Failed login for {}", name);
        session.is_authenticated = false;
        send_response(writer, "530 Login incorrect.\r\n").await
    }
}
