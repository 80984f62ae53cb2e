use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Anything the data channel provider can hand out: a plain TCP stream or a
/// TLS-wrapped one.
pub trait WireStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> WireStream for T {}

pub type WireConn = Box<dyn WireStream>;

/// Byte-level seam between framing and the wire. The deflate stage implements
/// this too, so compressed mode composes with any framing.
#[async_trait]
pub trait ByteChannel: Send {
    async fn send(&mut self, buf: &[u8]) -> std::io::Result<()>;
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    async fn flush(&mut self) -> std::io::Result<()>;
    async fn shutdown(&mut self) -> std::io::Result<()>;
}

/// Pass-through channel over the raw connection.
pub struct PlainChannel<S> {
    inner: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> PlainChannel<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> ByteChannel for PlainChannel<S> {
    async fn send(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf).await
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }

    async fn shutdown(&mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }
}

/// Reads exactly `buf.len()` bytes or fails with `UnexpectedEof`.
pub(crate) async fn recv_exact<C: ByteChannel + ?Sized>(
    ch: &mut C,
    buf: &mut [u8],
) -> std::io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = ch.recv(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "data channel closed mid-unit",
            ));
        }
        filled += n;
    }
    Ok(())
}
