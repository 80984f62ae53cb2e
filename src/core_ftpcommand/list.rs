use chrono::{DateTime, Local};
use log::warn;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

/// One ls-style line for a directory entry.
fn format_entry(name: &str, meta: &std::fs::Metadata) -> String {
    let kind = if meta.is_dir() { 'd' } else { '-' };
    let stamp: DateTime<Local> = meta
        .modified()
        .map(Into::into)
        .unwrap_or_else(|_| Local::now());
    format!(
        "{}rw-r--r-- 1 ftp ftp {:>12} {} {}\r\n",
        kind,
        meta.len(),
        stamp.format("%b %e %H:%M"),
        name
    )
}

/// Builds the full listing for a directory.
async fn build_listing(path: &Path) -> std::io::Result<String> {
    let mut entries = tokio::fs::read_dir(path).await?;
    let mut lines = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = entry.metadata().await?;
        lines.push(format_entry(&name, &meta));
    }
    lines.sort();
    Ok(lines.concat())
}

/// Handles LIST: sends a directory listing over the data channel. The
/// listing always travels in stream mode regardless of the negotiated
/// transfer mode.
pub async fn handle_list_command(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    let target = if arg.trim().is_empty() {
        session.current_dir.clone()
    } else {
        arg.trim().to_string()
    };
    let path = resolve_path(&session.base_path, &session.current_dir, &target);

    let user = session.username.clone().unwrap_or_default();
    if !ctx.users.permissions_for(&user, &path).can_list {
        return send_response(writer, "550 Permission denied.\r\n").await;
    }

    let listing = match build_listing(&path).await {
        Ok(listing) => listing,
        Err(e) => {
            warn!("LIST {} failed: {}", path.display(), e);
            return send_response(writer, "550 Failed to list directory.\r\n").await;
        }
    };

    if !session.provider.is_ready() {
        return send_response(writer, "425 Can't open data connection.\r\n").await;
    }
    send_response(writer, "150 Here comes the directory listing.\r\n").await?;

    let result = async {
        let conn = session.provider.connection().await?;
        conn.write_all(listing.as_bytes()).await?;
        conn.shutdown().await?;
        Ok::<(), crate::core_network::ChannelError>(())
    }
    .await;
    session.provider.close();

    match result {
        Ok(()) => send_response(writer, "226 Directory send OK.\r\n").await,
        Err(e) => {
            warn!("LIST transfer failed: {}", e);
            send_response(writer, e.to_ftp_response()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listing_contains_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"abc").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();

        let listing = build_listing(dir.path()).await.unwrap();
        assert!(listing.contains("a.txt"));
        assert!(listing.contains("sub"));
        assert!(listing.lines().all(|l| l.ends_with('\r') || !l.is_empty()));
        assert!(listing.contains('d'));
    }
}
