// Wire framing for the data channel: translates between the raw byte stream
// and logical transfer units so the orchestrator can read and write one unit
// at a time regardless of the negotiated mode and structure.

pub mod block;
pub mod channel;
pub mod deflate;
pub mod file_io;
pub mod record;
pub mod stream;
pub mod text;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::{FileStructure, TransferMode};
use block::{BlockSink, BlockSource};
use channel::{PlainChannel, WireConn};
use deflate::DeflateChannel;
use record::{RecordSink, RecordSource};
use stream::{StreamSink, StreamSource};

#[derive(Error, Debug)]
pub enum FramingError {
    #[error("data channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record stream ended without an end-of-file marker")]
    UnterminatedStream,

    #[error("peer flagged a block as errored")]
    ErroredBlock,

    #[error("malformed restart marker in block stream")]
    BadRestartMarker,
}

/// One logical unit of a transfer: a chunk for file-structured data, a whole
/// record for record-structured data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub data: Vec<u8>,
    pub end_of_record: bool,
}

impl Unit {
    pub fn chunk(data: Vec<u8>) -> Self {
        Self {
            data,
            end_of_record: false,
        }
    }

    pub fn record(data: Vec<u8>) -> Self {
        Self {
            data,
            end_of_record: true,
        }
    }
}

/// Writing side of an assembled framing pipeline.
#[async_trait]
pub trait TransferSink: Send {
    async fn write_unit(&mut self, data: &[u8], end_of_record: bool) -> Result<(), FramingError>;

    /// Records the resume position in the outgoing framing where the mode
    /// carries one (block mode's restart marker); a no-op elsewhere.
    async fn note_restart_offset(&mut self, _offset: u64) -> Result<(), FramingError> {
        Ok(())
    }

    /// Emits the end-of-file marker where the framing has one, flushes and
    /// shuts down the underlying channel.
    async fn finish(&mut self) -> Result<(), FramingError>;
}

/// Reading side of an assembled framing pipeline. `Ok(None)` means the
/// transfer ended cleanly.
#[async_trait]
pub trait TransferSource: Send {
    async fn read_unit(&mut self) -> Result<Option<Unit>, FramingError>;
}

/// Assembles the sink pipeline for an outbound transfer.
///
/// Block mode frames both structures itself; compressed mode wraps the raw or
/// record-escaped stream in a deflate stage before the wire.
pub fn open_sink<'a>(
    conn: &'a mut WireConn,
    mode: TransferMode,
    structure: FileStructure,
) -> Box<dyn TransferSink + 'a> {
    let plain = PlainChannel::new(conn);
    match (mode, structure) {
        (TransferMode::Stream, FileStructure::File) => Box::new(StreamSink::new(plain)),
        (TransferMode::Stream, FileStructure::Record) => Box::new(RecordSink::new(plain)),
        (TransferMode::Block, _) => Box::new(BlockSink::new(plain)),
        (TransferMode::Compressed, FileStructure::File) => {
            Box::new(StreamSink::new(DeflateChannel::new(plain)))
        }
        (TransferMode::Compressed, FileStructure::Record) => {
            Box::new(RecordSink::new(DeflateChannel::new(plain)))
        }
    }
}

/// Assembles the source pipeline for an inbound transfer.
pub fn open_source<'a>(
    conn: &'a mut WireConn,
    mode: TransferMode,
    structure: FileStructure,
    buffer_size: usize,
) -> Box<dyn TransferSource + 'a> {
    let plain = PlainChannel::new(conn);
    match (mode, structure) {
        (TransferMode::Stream, FileStructure::File) => {
            Box::new(StreamSource::new(plain, buffer_size))
        }
        (TransferMode::Stream, FileStructure::Record) => Box::new(RecordSource::new(plain)),
        (TransferMode::Block, _) => Box::new(BlockSource::new(plain)),
        (TransferMode::Compressed, FileStructure::File) => {
            Box::new(StreamSource::new(DeflateChannel::new(plain), buffer_size))
        }
        (TransferMode::Compressed, FileStructure::Record) => {
            Box::new(RecordSource::new(DeflateChannel::new(plain)))
        }
    }
}
