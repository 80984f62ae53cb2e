use async_trait::async_trait;

use super::channel::ByteChannel;
use super::{FramingError, TransferSink, TransferSource, Unit};

/// Stream mode, file structure: no framing at all.
pub struct StreamSink<C> {
    ch: C,
}

impl<C: ByteChannel> StreamSink<C> {
    pub fn new(ch: C) -> Self {
        Self { ch }
    }
}

#[async_trait]
impl<C: ByteChannel> TransferSink for StreamSink<C> {
    async fn write_unit(&mut self, data: &[u8], _end_of_record: bool) -> Result<(), FramingError> {
        self.ch.send(data).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), FramingError> {
        self.ch.flush().await?;
        self.ch.shutdown().await?;
        Ok(())
    }
}

/// Stream-mode source: end of transfer is the peer closing the connection.
pub struct StreamSource<C> {
    ch: C,
    buf: Vec<u8>,
}

impl<C: ByteChannel> StreamSource<C> {
    pub fn new(ch: C, buffer_size: usize) -> Self {
        Self {
            ch,
            buf: vec![0; buffer_size.max(512)],
        }
    }
}

#[async_trait]
impl<C: ByteChannel> TransferSource for StreamSource<C> {
    async fn read_unit(&mut self) -> Result<Option<Unit>, FramingError> {
        let n = self.ch.recv(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Unit::chunk(self.buf[..n].to_vec())))
    }
}
