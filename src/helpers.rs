use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// Shared writer half of a session's control connection.
pub type ControlWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Sends a reply line to the client over the control connection.
pub async fn send_response(writer: &ControlWriter, message: &str) -> Result<(), std::io::Error> {
    let mut writer = writer.lock().await;
    writer.write_all(message.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Sanitizes a client-supplied path: drops empty, `.` and `..` segments so
/// the result is a relative path that cannot climb out of the directory it
/// is joined onto. Backslashes are treated as separators too.
pub fn sanitize_input(input: &str) -> String {
    input
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolves a client-supplied path against the chroot base and current directory.
///
/// Absolute arguments are taken relative to the chroot root, relative ones
/// against the session's current directory. Both parts are sanitized, so the
/// result always stays inside `base`.
pub fn resolve_path(base: &Path, current_dir: &str, arg: &str) -> PathBuf {
    let sanitized = sanitize_input(arg);
    if arg.starts_with('/') {
        base.join(sanitized)
    } else {
        base.join(sanitize_input(current_dir)).join(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_traversal() {
        assert_eq!(sanitize_input("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_input("/abs/path"), "abs/path");
        assert_eq!(sanitize_input("plain.txt"), "plain.txt");
    }

    #[test]
    fn sanitize_drops_bare_parent_segments() {
        assert_eq!(sanitize_input(".."), "");
        assert_eq!(sanitize_input("a/../b"), "a/b");
        assert_eq!(sanitize_input("..\\..\\x"), "x");
        assert_eq!(sanitize_input("./a/./b"), "a/b");
    }

    #[test]
    fn resolve_never_escapes_the_base() {
        let base = Path::new("/srv/ftp/home");
        for arg in ["..", "../secret.txt", "/../secret.txt", "a/../../../etc/passwd"] {
            let p = resolve_path(base, "/", arg);
            assert!(p.starts_with(base), "{:?} escaped via {:?}", p, arg);
            assert!(!p
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir)));
        }
        // A poisoned current directory cannot escape either.
        let p = resolve_path(base, "/..", "file.txt");
        assert_eq!(p, PathBuf::from("/srv/ftp/home/file.txt"));
    }

    #[test]
    fn resolve_relative_uses_current_dir() {
        let p = resolve_path(Path::new("/srv/ftp"), "/pub", "file.bin");
        assert_eq!(p, PathBuf::from("/srv/ftp/pub/file.bin"));
    }

    #[test]
    fn resolve_absolute_ignores_current_dir() {
        let p = resolve_path(Path::new("/srv/ftp"), "/pub", "/incoming/file.bin");
        assert_eq!(p, PathBuf::from("/srv/ftp/incoming/file.bin"));
    }
}
