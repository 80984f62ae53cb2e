use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::session::Session;

pub async fn handle_size_command(
    writer: &ControlWriter,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await;
    }
    let path = resolve_path(&session.base_path, &session.current_dir, &arg);

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {
            let reply = format!("213 {}\r\n", meta.len());
            send_response(writer, &reply).await
        }
        _ => send_response(writer, "550 File not found.\r\n").await,
    }
}
