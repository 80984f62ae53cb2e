use crate::helpers::{send_response, ControlWriter};
use crate::session::Session;

/// Parent of a session-visible directory, never above the root.
pub fn parent_dir(current: &str) -> String {
    let current = current.trim_end_matches('/');
    match current.rfind('/') {
        Some(0) | None => String::from("/"),
        Some(idx) => current[..idx].to_string(),
    }
}

pub async fn handle_cdup_command(
    writer: &ControlWriter,
    session: &mut Session,
) -> Result<(), std::io::Error> {
    session.current_dir = parent_dir(&session.current_dir);
    send_response(writer, "250 Directory successfully changed.\r\n").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_stops_at_the_root() {
        assert_eq!(parent_dir("/pub/incoming"), "/pub");
        assert_eq!(parent_dir("/pub"), "/");
        assert_eq!(parent_dir("/"), "/");
    }
}
