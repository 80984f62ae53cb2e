//! Lazy data-channel provider.
//!
//! A provider is described first (address and port known, nothing connected)
//! and only materializes the connection on first demand: the active variant
//! dials out to the client-supplied endpoint, the passive variant accepts on
//! its bound listener. `close` is idempotent, and re-initializing an already
//! described or connected provider closes the prior resource first so no
//! listener leaks between transfers.

use log::{debug, info, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::core_framing::channel::WireConn;
use crate::core_network::port_pool::PassivePortPool;
use crate::core_tls::{TlsContext, TlsError};

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("no data channel has been negotiated")]
    NotInitialized,

    #[error("requested address family does not match the endpoint")]
    FamilyMismatch,

    #[error("no passive port could be bound")]
    PortsExhausted,

    #[error("timed out waiting for the data connection")]
    AcceptTimeout,

    #[error("data channel already closed")]
    Closed,

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    pub fn to_ftp_response(&self) -> &'static str {
        match self {
            ChannelError::FamilyMismatch => "522 Network protocol not supported, use (1,2).\r\n",
            _ => "425 Can't open data connection.\r\n",
        }
    }
}

/// Address family requested by the client (EPRT/EPSV protocol codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Unspecified,
    V4,
    V6,
}

impl AddressFamily {
    pub fn from_proto(code: u8) -> Option<Self> {
        match code {
            0 => Some(AddressFamily::Unspecified),
            1 => Some(AddressFamily::V4),
            2 => Some(AddressFamily::V6),
            _ => None,
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Whether an endpoint of the given address satisfies this request.
    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            AddressFamily::Unspecified => true,
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }
}

/// Endpoint advertised in the PORT/PASV-family reply.
#[derive(Debug, Clone, Copy)]
pub struct ChannelDescriptor {
    pub addr: IpAddr,
    pub port: u16,
    pub family: AddressFamily,
}

enum Endpoint {
    Active { peer: SocketAddr },
    Passive { listener: TcpListener },
}

enum ProviderState {
    Uninitialized,
    Described {
        endpoint: Endpoint,
        descriptor: ChannelDescriptor,
    },
    Connected {
        conn: WireConn,
    },
    Closed,
}

pub struct DataChannelProvider {
    state: ProviderState,
    tls: Option<Arc<TlsContext>>,
    accept_timeout: Duration,
}

impl Default for DataChannelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataChannelProvider {
    pub fn new() -> Self {
        Self {
            state: ProviderState::Uninitialized,
            tls: None,
            accept_timeout: Duration::from_secs(30),
        }
    }

    /// Describes an active-mode channel toward a client-supplied endpoint.
    /// Any previously negotiated channel is closed first.
    pub fn init_active(
        &mut self,
        peer: SocketAddr,
        requested: AddressFamily,
        tls: Option<Arc<TlsContext>>,
        accept_timeout: Duration,
    ) -> Result<&ChannelDescriptor, ChannelError> {
        self.close();
        if !requested.matches(&peer.ip()) {
            return Err(ChannelError::FamilyMismatch);
        }
        let descriptor = ChannelDescriptor {
            addr: peer.ip(),
            port: peer.port(),
            family: AddressFamily::of(&peer.ip()),
        };
        self.tls = tls;
        self.accept_timeout = accept_timeout;
        self.state = ProviderState::Described {
            endpoint: Endpoint::Active { peer },
            descriptor,
        };
        debug!("Active data channel described: {}", peer);
        self.descriptor().ok_or(ChannelError::NotInitialized)
    }

    /// Binds a passive listener on a pool port and describes the channel.
    /// Any previously negotiated channel (including a still-listening
    /// socket) is closed first.
    pub async fn init_passive(
        &mut self,
        local_ip: IpAddr,
        pool: &PassivePortPool,
        requested: AddressFamily,
        tls: Option<Arc<TlsContext>>,
        accept_timeout: Duration,
    ) -> Result<&ChannelDescriptor, ChannelError> {
        self.close();
        if !requested.matches(&local_ip) {
            return Err(ChannelError::FamilyMismatch);
        }
        let listener = pool.bind(local_ip).await?;
        let port = listener.local_addr()?.port();
        let descriptor = ChannelDescriptor {
            addr: local_ip,
            port,
            family: AddressFamily::of(&local_ip),
        };
        self.tls = tls;
        self.accept_timeout = accept_timeout;
        self.state = ProviderState::Described {
            endpoint: Endpoint::Passive { listener },
            descriptor,
        };
        debug!("Passive data channel listening on {}:{}", local_ip, port);
        self.descriptor().ok_or(ChannelError::NotInitialized)
    }

    pub fn descriptor(&self) -> Option<&ChannelDescriptor> {
        match &self.state {
            ProviderState::Described { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            ProviderState::Described { .. } | ProviderState::Connected { .. }
        )
    }

    /// The live connection. Connects or accepts on first call; cached
    /// thereafter. Only the caller demanding the connection blocks here.
    pub async fn connection(&mut self) -> Result<&mut WireConn, ChannelError> {
        if let ProviderState::Connected { .. } = self.state {
            return match &mut self.state {
                ProviderState::Connected { conn } => Ok(conn),
                _ => unreachable!(),
            };
        }

        let state = std::mem::replace(&mut self.state, ProviderState::Closed);
        let endpoint = match state {
            ProviderState::Described { endpoint, .. } => endpoint,
            ProviderState::Uninitialized => return Err(ChannelError::NotInitialized),
            ProviderState::Closed => return Err(ChannelError::Closed),
            ProviderState::Connected { .. } => unreachable!(),
        };

        let stream = match endpoint {
            Endpoint::Active { peer } => {
                let stream =
                    match tokio::time::timeout(self.accept_timeout, TcpStream::connect(peer)).await
                    {
                        Ok(result) => result?,
                        Err(_) => return Err(ChannelError::AcceptTimeout),
                    };
                info!("Active data connection established with {}", peer);
                stream
            }
            Endpoint::Passive { listener } => {
                let (stream, peer) =
                    match tokio::time::timeout(self.accept_timeout, listener.accept()).await {
                        Ok(result) => result?,
                        Err(_) => return Err(ChannelError::AcceptTimeout),
                    };
                // The listener is dropped here; one connection per transfer.
                info!("Passive data connection accepted from {}", peer);
                stream
            }
        };

        let conn: WireConn = match &self.tls {
            Some(tls) => Box::new(tls.accept(stream).await?),
            None => Box::new(stream),
        };

        self.state = ProviderState::Connected { conn };
        match &mut self.state {
            ProviderState::Connected { conn } => Ok(conn),
            _ => unreachable!(),
        }
    }

    /// Closes the channel, dropping any listener or live connection.
    /// Idempotent; the provider may be re-initialized afterwards.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.state, ProviderState::Closed) {
            ProviderState::Described { .. } => debug!("Dropping described data channel"),
            ProviderState::Connected { .. } => debug!("Closing data connection"),
            _ => {}
        }
    }
}

impl Drop for DataChannelProvider {
    fn drop(&mut self) {
        if self.is_ready() {
            warn!("Data channel provider dropped while still open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn loopback() -> IpAddr {
        IpAddr::from([127, 0, 0, 1])
    }

    fn pool() -> PassivePortPool {
        PassivePortPool::new(None)
    }

    #[tokio::test]
    async fn passive_connects_lazily_and_caches() {
        let mut provider = DataChannelProvider::new();
        let pool = pool();
        let descriptor = provider
            .init_passive(
                loopback(),
                &pool,
                AddressFamily::V4,
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        let port = descriptor.port;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect((std::net::Ipv4Addr::LOCALHOST, port))
                .await
                .unwrap();
            stream.write_all(b"ping").await.unwrap();
        });

        let conn = provider.connection().await.unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        client.await.unwrap();

        // Second call must not block on a new accept.
        assert!(provider.connection().await.is_ok());
        provider.close();
    }

    #[tokio::test]
    async fn reinit_closes_previous_listener() {
        let mut provider = DataChannelProvider::new();
        let pool = pool();
        let first_port = provider
            .init_passive(
                loopback(),
                &pool,
                AddressFamily::Unspecified,
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap()
            .port;

        let second_port = provider
            .init_passive(
                loopback(),
                &pool,
                AddressFamily::Unspecified,
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap()
            .port;
        assert_ne!(first_port, second_port);

        // The first listener must be gone: connecting to it fails.
        let refused = TcpStream::connect((std::net::Ipv4Addr::LOCALHOST, first_port)).await;
        assert!(refused.is_err());
        provider.close();
    }

    #[tokio::test]
    async fn family_mismatch_is_a_distinct_failure() {
        let mut provider = DataChannelProvider::new();
        let pool = pool();
        let err = provider
            .init_passive(
                loopback(),
                &pool,
                AddressFamily::V6,
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::FamilyMismatch));

        let err = provider
            .init_active(
                SocketAddr::from(([127, 0, 0, 1], 2048)),
                AddressFamily::V6,
                None,
                Duration::from_secs(5),
            )
            .unwrap_err();
        assert!(matches!(err, ChannelError::FamilyMismatch));
    }

    #[tokio::test]
    async fn connection_without_negotiation_fails() {
        let mut provider = DataChannelProvider::new();
        assert!(matches!(
            provider.connection().await,
            Err(ChannelError::NotInitialized)
        ));
        provider.close();
        assert!(matches!(
            provider.connection().await,
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut provider = DataChannelProvider::new();
        let pool = pool();
        provider
            .init_passive(
                loopback(),
                &pool,
                AddressFamily::V4,
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        provider.close();
        provider.close();
    }
}
