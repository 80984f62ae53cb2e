use log::warn;

use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

pub async fn handle_rmd_command(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await;
    }
    let path = resolve_path(&session.base_path, &session.current_dir, &arg);

    let user = session.username.clone().unwrap_or_default();
    if !ctx.users.permissions_for(&user, &path).can_delete {
        return send_response(writer, "550 Permission denied.\r\n").await;
    }

    match tokio::fs::remove_dir(&path).await {
        Ok(()) => send_response(writer, "250 Directory removed.\r\n").await,
        Err(e) => {
            warn!("RMD {} failed: {}", path.display(), e);
            send_response(writer, "550 Failed to remove directory.\r\n").await
        }
    }
}
