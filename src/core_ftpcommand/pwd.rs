use crate::helpers::{send_response, ControlWriter};
use crate::session::Session;

pub async fn handle_pwd_command(
    writer: &ControlWriter,
    session: &mut Session,
) -> Result<(), std::io::Error> {
    let reply = format!("257 \"{}\" is the current directory.\r\n", session.current_dir);
    send_response(writer, &reply).await
}
