use std::path::PathBuf;

use crate::core_network::provider::DataChannelProvider;

/// Representation type negotiated with TYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Ascii,
    Ebcdic,
    Image,
}

/// Transmission mode negotiated with MODE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Stream,
    Block,
    Compressed,
}

/// File structure negotiated with STRU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStructure {
    File,
    Record,
}

/// Pending restart position for the next transfer command.
///
/// Consumed exactly once via [`Session::take_restart_offset`]; whichever
/// command reads it clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartOffset {
    #[default]
    Absent,
    At(u64),
    Append,
}

/// Per-connection state, created on accept and dropped on disconnect.
pub struct Session {
    pub current_dir: String,
    pub base_path: PathBuf,
    pub username: Option<String>,
    pub is_authenticated: bool,
    pub data_type: DataType,
    pub transfer_mode: TransferMode,
    pub file_structure: FileStructure,
    pub rename_from: Option<PathBuf>,
    pub provider: DataChannelProvider,
    restart_offset: RestartOffset,
}

impl Session {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            current_dir: String::from("/"),
            base_path,
            username: None,
            is_authenticated: false,
            data_type: DataType::Ascii,
            transfer_mode: TransferMode::Stream,
            file_structure: FileStructure::File,
            rename_from: None,
            provider: DataChannelProvider::new(),
            restart_offset: RestartOffset::Absent,
        }
    }

    pub fn set_restart_offset(&mut self, offset: RestartOffset) {
        self.restart_offset = offset;
    }

    /// Takes the pending restart offset, resetting it to `Absent`.
    pub fn take_restart_offset(&mut self) -> RestartOffset {
        std::mem::take(&mut self.restart_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_offset_is_consumed_once() {
        let mut session = Session::new(PathBuf::from("/srv/ftp"));
        session.set_restart_offset(RestartOffset::At(512));
        assert_eq!(session.take_restart_offset(), RestartOffset::At(512));
        assert_eq!(session.take_restart_offset(), RestartOffset::Absent);
    }

    #[test]
    fn defaults_match_protocol_defaults() {
        let session = Session::new(PathBuf::from("/srv/ftp"));
        assert_eq!(session.data_type, DataType::Ascii);
        assert_eq!(session.transfer_mode, TransferMode::Stream);
        assert_eq!(session.file_structure, FileStructure::File);
        assert!(!session.is_authenticated);
    }
}
