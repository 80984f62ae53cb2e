use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

/// Handles RNFR: remembers the rename source for the following RNTO.
pub async fn handle_rnfr_command(
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
    if !ctx.users.permissions_for(&user, &path).can_rename {
        return send_response(writer, "550 Permission denied.\r\n").await;
    }

    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        session.rename_from = Some(path);
        send_response(writer, "350 Ready for RNTO.\r\n").await
    } else {
        send_response(writer, "550 File not found.\r\n").await
    }
}
