//! Block-mode framing: every unit on the wire is
//! `[1 descriptor byte][2-byte big-endian length][payload]`.
//!
//! Used for both file- and record-structured transfers. A logical record ends
//! with a unit carrying the EOR flag; the transfer ends with a unit carrying
//! EOF (a trailing empty one when the final length is not known up front).

use async_trait::async_trait;

use super::channel::{recv_exact, ByteChannel};
use super::{FramingError, TransferSink, TransferSource, Unit};

pub const DESC_EOR: u8 = 0x80;
pub const DESC_EOF: u8 = 0x40;
pub const DESC_ERR: u8 = 0x20;
pub const DESC_REST: u8 = 0x10;

const MAX_PAYLOAD: usize = u16::MAX as usize;

pub struct BlockSink<C> {
    ch: C,
}

impl<C: ByteChannel> BlockSink<C> {
    pub fn new(ch: C) -> Self {
        Self { ch }
    }

    async fn send_block(&mut self, desc: u8, payload: &[u8]) -> Result<(), FramingError> {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        let len = payload.len() as u16;
        let header = [desc, (len >> 8) as u8, (len & 0xFF) as u8];
        self.ch.send(&header).await?;
        if !payload.is_empty() {
            self.ch.send(payload).await?;
        }
        Ok(())
    }

    /// Sends a restart marker carrying the byte offset as decimal text.
    pub async fn send_restart_marker(&mut self, offset: u64) -> Result<(), FramingError> {
        let text = offset.to_string();
        self.send_block(DESC_REST, text.as_bytes()).await
    }
}

#[async_trait]
impl<C: ByteChannel> TransferSink for BlockSink<C> {
    async fn note_restart_offset(&mut self, offset: u64) -> Result<(), FramingError> {
        self.send_restart_marker(offset).await
    }

    async fn write_unit(&mut self, data: &[u8], end_of_record: bool) -> Result<(), FramingError> {
        if data.is_empty() {
            if end_of_record {
                self.send_block(DESC_EOR, &[]).await?;
            }
            return Ok(());
        }

        // Payloads longer than the 16-bit length field are split; only the
        // final block of a record carries EOR.
        let mut chunks = data.chunks(MAX_PAYLOAD).peekable();
        while let Some(chunk) = chunks.next() {
            let last = chunks.peek().is_none();
            let desc = if last && end_of_record { DESC_EOR } else { 0 };
            self.send_block(desc, chunk).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), FramingError> {
        self.send_block(DESC_EOF, &[]).await?;
        self.ch.flush().await?;
        self.ch.shutdown().await?;
        Ok(())
    }
}

pub struct BlockSource<C> {
    ch: C,
    finished: bool,
    restart_marker: Option<u64>,
}

impl<C: ByteChannel> BlockSource<C> {
    pub fn new(ch: C) -> Self {
        Self {
            ch,
            finished: false,
            restart_marker: None,
        }
    }

    /// Offset carried by the most recent restart-marker block, if any.
    pub fn restart_marker(&self) -> Option<u64> {
        self.restart_marker
    }
}

#[async_trait]
impl<C: ByteChannel> TransferSource for BlockSource<C> {
    async fn read_unit(&mut self) -> Result<Option<Unit>, FramingError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let mut header = [0u8; 3];
            recv_exact(&mut self.ch, &mut header).await?;
            let desc = header[0];
            let len = u16::from_be_bytes([header[1], header[2]]) as usize;

            let mut payload = vec![0u8; len];
            recv_exact(&mut self.ch, &mut payload).await?;

            if desc & DESC_ERR != 0 {
                return Err(FramingError::ErroredBlock);
            }

            if desc & DESC_REST != 0 {
                let text = std::str::from_utf8(&payload)
                    .map_err(|_| FramingError::BadRestartMarker)?;
                let offset = text
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| FramingError::BadRestartMarker)?;
                self.restart_marker = Some(offset);
                continue;
            }

            let end_of_record = desc & DESC_EOR != 0;
            if desc & DESC_EOF != 0 {
                self.finished = true;
            }

            if payload.is_empty() && !end_of_record {
                // Trailing empty EOF block, or an empty filler block.
                continue;
            }

            return Ok(Some(Unit {
                data: payload,
                end_of_record,
            }));
        }
    }
}
