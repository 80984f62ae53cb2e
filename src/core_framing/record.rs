//! Record boundaries for stream-mode, record-structured transfers.
//!
//! Boundaries travel in-line: the escape byte `0xFF` followed by a control
//! byte whose bit 0 marks end-of-record and bit 1 end-of-file. A literal
//! `0xFF` in the payload is doubled on write and collapsed on read. A stream
//! that ends without ever carrying the EOF marker is a decode error.

use async_trait::async_trait;

use super::channel::ByteChannel;
use super::{FramingError, TransferSink, TransferSource, Unit};

pub const ESCAPE: u8 = 0xFF;
pub const CTRL_EOR: u8 = 0x01;
pub const CTRL_EOF: u8 = 0x02;

pub struct RecordSink<C> {
    ch: C,
    out: Vec<u8>,
}

impl<C: ByteChannel> RecordSink<C> {
    pub fn new(ch: C) -> Self {
        Self {
            ch,
            out: Vec::new(),
        }
    }
}

#[async_trait]
impl<C: ByteChannel> TransferSink for RecordSink<C> {
    async fn write_unit(&mut self, data: &[u8], end_of_record: bool) -> Result<(), FramingError> {
        self.out.clear();
        for &b in data {
            if b == ESCAPE {
                self.out.push(ESCAPE);
            }
            self.out.push(b);
        }
        if end_of_record {
            self.out.push(ESCAPE);
            self.out.push(CTRL_EOR);
        }
        self.ch.send(&self.out).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), FramingError> {
        self.ch.send(&[ESCAPE, CTRL_EOF]).await?;
        self.ch.flush().await?;
        self.ch.shutdown().await?;
        Ok(())
    }
}

pub struct RecordSource<C> {
    ch: C,
    buf: Vec<u8>,
    len: usize,
    pos: usize,
    finished: bool,
}

impl<C: ByteChannel> RecordSource<C> {
    pub fn new(ch: C) -> Self {
        Self {
            ch,
            buf: vec![0; 8192],
            len: 0,
            pos: 0,
            finished: false,
        }
    }

    /// Next raw byte, or `None` at connection end.
    async fn next_byte(&mut self) -> Result<Option<u8>, FramingError> {
        if self.pos == self.len {
            self.len = self.ch.recv(&mut self.buf).await?;
            self.pos = 0;
            if self.len == 0 {
                return Ok(None);
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }
}

#[async_trait]
impl<C: ByteChannel> TransferSource for RecordSource<C> {
    async fn read_unit(&mut self) -> Result<Option<Unit>, FramingError> {
        if self.finished {
            return Ok(None);
        }

        let mut record = Vec::new();
        loop {
            let b = match self.next_byte().await? {
                Some(b) => b,
                None => return Err(FramingError::UnterminatedStream),
            };
            if b != ESCAPE {
                record.push(b);
                continue;
            }

            let ctrl = match self.next_byte().await? {
                Some(c) => c,
                None => return Err(FramingError::UnterminatedStream),
            };
            if ctrl == ESCAPE {
                record.push(ESCAPE);
                continue;
            }

            let eor = ctrl & CTRL_EOR != 0;
            let eof = ctrl & CTRL_EOF != 0;
            if eof {
                self.finished = true;
            }
            if eor {
                return Ok(Some(Unit::record(record)));
            }
            if eof {
                // EOF without EOR: any pending bytes form a final partial unit.
                if record.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(Unit::chunk(record)));
            }
        }
    }
}
