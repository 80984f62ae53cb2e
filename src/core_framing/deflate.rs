//! Compressed transmission mode: a deflate stage between the framing layer
//! and the wire. Sends are compressed and flushed per unit so the peer can
//! make progress without waiting for the transfer to end.

use async_trait::async_trait;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

use super::channel::ByteChannel;

const RECV_BUF: usize = 8192;

pub struct DeflateChannel<C> {
    inner: C,
    encoder: Option<DeflateEncoder<Vec<u8>>>,
    decoder: Decompress,
    inbuf: Vec<u8>,
    in_len: usize,
    in_pos: usize,
}

impl<C: ByteChannel> DeflateChannel<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            encoder: Some(DeflateEncoder::new(Vec::new(), Compression::default())),
            decoder: Decompress::new(false),
            inbuf: vec![0; RECV_BUF],
            in_len: 0,
            in_pos: 0,
        }
    }

    async fn drain_encoder(&mut self) -> std::io::Result<()> {
        if let Some(enc) = self.encoder.as_mut() {
            if !enc.get_ref().is_empty() {
                let pending = std::mem::take(enc.get_mut());
                self.inner.send(&pending).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<C: ByteChannel> ByteChannel for DeflateChannel<C> {
    async fn send(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let enc = self
            .encoder
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "deflate stream finished"))?;
        enc.write_all(buf)?;
        // Sync flush so every consumed byte reaches the wire.
        enc.flush()?;
        self.drain_encoder().await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.in_pos < self.in_len {
                let before_in = self.decoder.total_in();
                let before_out = self.decoder.total_out();
                let status = self
                    .decoder
                    .decompress(
                        &self.inbuf[self.in_pos..self.in_len],
                        buf,
                        FlushDecompress::None,
                    )
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                self.in_pos += (self.decoder.total_in() - before_in) as usize;
                let produced = (self.decoder.total_out() - before_out) as usize;
                if produced > 0 {
                    return Ok(produced);
                }
                if status == Status::StreamEnd {
                    return Ok(0);
                }
                // Consumed input without output yet; fall through to refill.
            }
            let n = self.inner.recv(&mut self.inbuf).await?;
            self.in_len = n;
            self.in_pos = 0;
            if n == 0 {
                return Ok(0);
            }
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.drain_encoder().await?;
        self.inner.flush().await
    }

    async fn shutdown(&mut self) -> std::io::Result<()> {
        if let Some(enc) = self.encoder.take() {
            let finished = enc.finish()?;
            if !finished.is_empty() {
                self.inner.send(&finished).await?;
            }
        }
        self.inner.flush().await?;
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::super::channel::PlainChannel;
    use super::*;

    #[tokio::test]
    async fn deflate_roundtrip() {
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();

        let (client, server) = tokio::io::duplex(1 << 20);
        let send = async {
            let mut ch = DeflateChannel::new(PlainChannel::new(server));
            for chunk in payload.chunks(4096) {
                ch.send(chunk).await.unwrap();
            }
            ch.shutdown().await.unwrap();
        };
        let recv = async {
            let mut ch = DeflateChannel::new(PlainChannel::new(client));
            let mut out = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = ch.recv(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&buf[..n]);
            }
            out
        };
        let (_, out) = tokio::join!(send, recv);
        assert_eq!(out, payload);
    }

    #[tokio::test]
    async fn per_chunk_flush_lets_peer_progress() {
        // A single send must be decodable before the stream is finished.
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut tx = DeflateChannel::new(PlainChannel::new(server));
        tx.send(b"first chunk").await.unwrap();

        let mut rx = DeflateChannel::new(PlainChannel::new(client));
        let mut buf = [0u8; 64];
        let mut got = Vec::new();
        while got.len() < b"first chunk".len() {
            let n = rx.recv(&mut buf).await.unwrap();
            assert!(n > 0);
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"first chunk");
    }
}
