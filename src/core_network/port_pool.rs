//! Server-wide passive port allocation.
//!
//! One pool is owned by the server and injected into every session. Ports are
//! handed out round-robin through an atomic cursor; a bind failure (another
//! session raced us to the port, or the OS still holds it) moves on to the
//! next candidate, up to a small retry count. With no configured range the
//! pool falls back to ephemeral ports.

use log::warn;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

use super::provider::ChannelError;

const BIND_ATTEMPTS: usize = 3;

pub struct PassivePortPool {
    ports: Vec<u16>,
    next: AtomicUsize,
}

impl PassivePortPool {
    pub fn new(ports: Option<Vec<u16>>) -> Self {
        Self {
            ports: ports.unwrap_or_default(),
            next: AtomicUsize::new(0),
        }
    }

    /// Binds a listener on the next pool port, retrying on collision.
    pub async fn bind(&self, ip: IpAddr) -> Result<TcpListener, ChannelError> {
        if self.ports.is_empty() {
            return Ok(TcpListener::bind((ip, 0)).await?);
        }

        for _ in 0..BIND_ATTEMPTS {
            let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.ports.len();
            let port = self.ports[idx];
            match TcpListener::bind((ip, port)).await {
                Ok(listener) => return Ok(listener),
                Err(e) => warn!("Passive port {} unavailable: {}", port, e),
            }
        }
        Err(ChannelError::PortsExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn empty_pool_uses_ephemeral_ports() {
        let pool = PassivePortPool::new(None);
        let listener = pool.bind(IpAddr::V4(Ipv4Addr::LOCALHOST)).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn pool_rotates_over_configured_ports() {
        // Grab two ephemeral ports, free them, then configure them as a pool.
        let a = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let b = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let (pa, pb) = (
            a.local_addr().unwrap().port(),
            b.local_addr().unwrap().port(),
        );
        drop(a);
        drop(b);

        let pool = PassivePortPool::new(Some(vec![pa, pb]));
        let first = pool.bind(IpAddr::V4(Ipv4Addr::LOCALHOST)).await.unwrap();
        let second = pool.bind(IpAddr::V4(Ipv4Addr::LOCALHOST)).await.unwrap();
        assert_eq!(first.local_addr().unwrap().port(), pa);
        assert_eq!(second.local_addr().unwrap().port(), pb);
    }

    #[tokio::test]
    async fn occupied_port_is_skipped() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let free = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let (taken, open) = (
            held.local_addr().unwrap().port(),
            free.local_addr().unwrap().port(),
        );
        drop(free);

        let pool = PassivePortPool::new(Some(vec![taken, open]));
        let listener = pool.bind(IpAddr::V4(Ipv4Addr::LOCALHOST)).await.unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), open);
    }
}
