use chrono::{DateTime, Utc};

use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::session::Session;

pub async fn handle_mdtm_command(
    writer: &ControlWriter,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await;
    }
    let path = resolve_path(&session.base_path, &session.current_dir, &arg);

    let modified = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta.modified().ok(),
        _ => None,
    };

    match modified {
        Some(time) => {
            let stamp: DateTime<Utc> = time.into();
            let reply = format!("213 {}\r\n", stamp.format("%Y%m%d%H%M%S"));
            send_response(writer, &reply).await
        }
        None => send_response(writer, "550 File not found.\r\n").await,
    }
}
