use log::warn;

use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

pub async fn handle_mkd_command(
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
    if !ctx.users.permissions_for(&user, &path).can_mkdir {
        return send_response(writer, "550 Permission denied.\r\n").await;
    }

    match tokio::fs::create_dir(&path).await {
        Ok(()) => {
            let reply = format!("257 \"{}\" directory created.\r\n", arg.trim());
            send_response(writer, &reply).await
        }
        Err(e) => {
            warn!("MKD {} failed: {}", path.display(), e);
            send_response(writer, "550 Failed to create directory.\r\n").await
        }
    }
}
