use crate::helpers::{resolve_path, sanitize_input, send_response, ControlWriter};
use crate::session::Session;

/// The session-visible directory string after changing into `arg`. Parent
/// segments are stripped by sanitization, so the result never points above
/// the virtual root; CDUP is the only way up.
pub fn virtual_dir(current: &str, arg: &str) -> String {
    let sanitized = sanitize_input(arg);
    if arg.starts_with('/') {
        format!("/{}", sanitized)
    } else if sanitized.is_empty() {
        current.to_string()
    } else if current == "/" {
        format!("/{}", sanitized)
    } else {
        format!("{}/{}", current, sanitized)
    }
}

pub async fn handle_cwd_command(
    writer: &ControlWriter,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await;
    }

    let dir_path = resolve_path(&session.base_path, &session.current_dir, &arg);
    match tokio::fs::metadata(&dir_path).await {
        Ok(meta) if meta.is_dir() => {
            session.current_dir = virtual_dir(&session.current_dir, &arg);
            send_response(writer, "250 Directory successfully changed.\r\n").await
        }
        _ => send_response(writer, "550 Failed to change directory.\r\n").await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_dir_handles_absolute_and_relative() {
        assert_eq!(virtual_dir("/", "pub"), "/pub");
        assert_eq!(virtual_dir("/pub", "incoming"), "/pub/incoming");
        assert_eq!(virtual_dir("/pub", "/other"), "/other");
        assert_eq!(virtual_dir("/pub", "../secret"), "/pub/secret");
    }

    #[test]
    fn virtual_dir_stays_inside_the_root() {
        assert_eq!(virtual_dir("/", ".."), "/");
        assert_eq!(virtual_dir("/pub", ".."), "/pub");
        assert_eq!(virtual_dir("/pub", "/.."), "/");
        assert_eq!(virtual_dir("/", "../../etc"), "/etc");
    }
}
