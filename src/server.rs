use anyhow::{Context, Result};
use log::{error, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::core_network::PassivePortPool;
use crate::core_quota::QuotaRegistry;
use crate::core_session::control;
use crate::core_tls::TlsContext;
use crate::core_users::UserStore;

/// Live sessions by id, for logging and operator visibility. Sessions are
/// registered on accept and deregistered when their task finishes, whether
/// by QUIT, timeout or error.
#[derive(Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, SocketAddr>>,
}

impl SessionRegistry {
    pub fn register(&self, peer: SocketAddr) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.active
            .lock()
            .expect("session registry poisoned")
            .insert(id, peer);
        id
    }

    pub fn deregister(&self, id: u64) {
        self.active
            .lock()
            .expect("session registry poisoned")
            .remove(&id);
    }

    pub fn count(&self) -> usize {
        self.active.lock().expect("session registry poisoned").len()
    }
}

/// Immutable server-wide state shared by every session.
pub struct ServerContext {
    pub config: Config,
    pub users: UserStore,
    pub quotas: QuotaRegistry,
    pub port_pool: PassivePortPool,
    pub tls: Option<Arc<TlsContext>>,
    pub sessions: SessionRegistry,
}

/// Root directory every session starts in.
pub fn base_path(config: &Config) -> PathBuf {
    PathBuf::from(&config.server.chroot_dir)
        .join(config.server.min_homedir.trim_start_matches('/'))
}

/// Runs the FTP server: loads users and TLS material, binds the control
/// port and spawns one task per accepted connection.
pub async fn run(config: Config) -> Result<()> {
    let users = UserStore::load(&config.server.user_file)?;

    let tls = match &config.tls {
        Some(section) if section.enabled => {
            let context = TlsContext::new(section)
                .with_context(|| "Failed to initialize TLS for data channels")?;
            info!("TLS enabled for data channels");
            Some(Arc::new(context))
        }
        _ => None,
    };

    let port_pool = PassivePortPool::new(config.server.pasv_ports.clone());
    let listen_port = config.server.listen_port;
    let ctx = Arc::new(ServerContext {
        config,
        users,
        quotas: QuotaRegistry::new(),
        port_pool,
        tls,
        sessions: SessionRegistry::default(),
    });

    let listener = TcpListener::bind(("0.0.0.0", listen_port))
        .await
        .with_context(|| format!("Failed to bind control port {}", listen_port))?;
    info!("Listening on port {}", listen_port);

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .context("Failed to accept control connection")?;
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            let id = ctx.sessions.register(peer);
            info!(
                "Control connection from {} ({} active)",
                peer,
                ctx.sessions.count()
            );
            if let Err(e) = control::drive(stream, Arc::clone(&ctx)).await {
                error!("Session with {} ended with error: {}", peer, e);
            }
            ctx.sessions.deregister(id);
            info!("Control connection with {} closed", peer);
        });
    }
}
