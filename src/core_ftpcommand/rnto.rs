use log::warn;

use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

/// Handles RNTO: completes the rename started by RNFR. The stored source is
/// consumed either way.
pub async fn handle_rnto_command(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await;
    }
    let from = match session.rename_from.take() {
        Some(from) => from,
        None => return send_response(writer, "503 RNFR required first.\r\n").await,
    };
    let to = resolve_path(&session.base_path, &session.current_dir, &arg);

    let user = session.username.clone().unwrap_or_default();
    if !ctx.users.permissions_for(&user, &to).can_rename {
        return send_response(writer, "550 Permission denied.\r\n").await;
    }

    match tokio::fs::rename(&from, &to).await {
        Ok(()) => send_response(writer, "250 Rename successful.\r\n").await,
        Err(e) => {
            warn!("RNTO {} -> {} failed: {}", from.display(), to.display(), e);
            send_response(writer, "550 Rename failed.\r\n").await
        }
    }
}
