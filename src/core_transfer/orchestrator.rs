//! Drives a single file transfer end to end.
//!
//! A transfer command resolves its target and runs every access check before
//! the data channel is touched, sends the 150 preliminary mark, pumps units
//! between the local file and the negotiated framing pipeline, and finishes
//! with exactly one terminal status line. The data channel is closed on every
//! exit path.

use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core_framing::file_io::{FileSink, FileSource};
use crate::core_framing::text::TextCodec;
use crate::core_framing::{open_sink, open_source, TransferSink, TransferSource};
use crate::core_network::provider::DataChannelProvider;
use crate::core_quota::{QuotaRegistry, StatLimits};
use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::{DataType, FileStructure, RestartOffset, Session, TransferMode};

use super::error::TransferError;
use super::limiter::RateLimiter;
use super::state::{Direction, TransferSlot, TransferState};

/// How a store command treats the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// STOR: overwrite, or resume at the pending restart offset.
    Create,
    /// APPE: always write at end-of-file.
    Append,
    /// STOU: refuse to touch an existing file.
    Unique,
}

/// Charges received bytes against the uploading user's daily byte quota,
/// one chunk at a time, so concurrent sessions cannot jointly overshoot by
/// more than one buffered chunk.
pub struct UploadCharge<'a> {
    pub quotas: &'a QuotaRegistry,
    pub user: &'a str,
    pub limits: StatLimits,
}

impl UploadCharge<'_> {
    async fn charge(&self, bytes: u64) -> Result<(), TransferError> {
        self.quotas
            .charge_upload(self.user, &self.limits, bytes)
            .await?;
        Ok(())
    }
}

/// Handles RETR: sends the file at `arg` over the data channel.
pub async fn retrieve(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    slot: &TransferSlot,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return send_response(writer, "501 Syntax error in parameters or arguments.\r\n").await;
    }
    let path = resolve_path(&session.base_path, &session.current_dir, &arg);

    let offset = match session.take_restart_offset() {
        RestartOffset::At(n) => n,
        _ => 0,
    };

    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta,
        _ => return send_response(writer, "550 File not found.\r\n").await,
    };

    let user = session.username.clone().unwrap_or_default();
    let perms = ctx.users.permissions_for(&user, &path);
    if !perms.can_read || !perms.can_download {
        return send_response(writer, TransferError::Permission.to_ftp_response()).await;
    }
    let limits = ctx.users.limits_for(&user);
    if let Err(e) = ctx.quotas.check_download(&user, &limits).await {
        warn!("Download refused for {}: {}", user, e);
        return send_response(writer, TransferError::QuotaExceeded.to_ftp_response()).await;
    }

    if !session.provider.is_ready() {
        return send_response(writer, "425 Can't open data connection.\r\n").await;
    }

    let expected = meta.len().saturating_sub(offset);
    let state = Arc::new(TransferState::new(Direction::Retrieve, Some(expected)));
    slot.attach(Arc::clone(&state));

    send_response(
        writer,
        &format!("150 Opening data connection for {} ({} bytes).\r\n", arg, expected),
    )
    .await?;

    let mut limiter = RateLimiter::new(RateLimiter::effective_ceiling(
        ctx.users.rate_ceiling_for(&user),
        ctx.config.server.rate_ceiling(),
    ));
    let buffer_size = ctx.config.server.download_buffer_size.unwrap_or(128 * 1024);
    let result = run_retrieve(
        &mut session.provider,
        &path,
        session.transfer_mode,
        session.file_structure,
        session.data_type,
        offset,
        buffer_size,
        &state,
        &mut limiter,
    )
    .await;

    session.provider.close();
    slot.clear();

    // Bytes that left the server count against the daily quota whether the
    // transfer completed, failed or was aborted.
    ctx.quotas.record_download(&user, state.bytes()).await;

    match result {
        Ok(()) => {
            ctx.quotas.record_download_file(&user).await;
            ctx.quotas
                .note_rate_sample(&user, limiter.current_rate())
                .await;
            info!(
                "RETR {} complete for {}: {} bytes",
                arg,
                user,
                state.bytes()
            );
            send_response(writer, "226 Transfer complete.\r\n").await
        }
        Err(e) => {
            warn!("RETR {} failed for {}: {}", arg, user, e);
            send_response(writer, e.to_ftp_response()).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_retrieve(
    provider: &mut DataChannelProvider,
    path: &Path,
    mode: TransferMode,
    structure: FileStructure,
    data_type: DataType,
    offset: u64,
    buffer_size: usize,
    state: &TransferState,
    limiter: &mut RateLimiter,
) -> Result<(), TransferError> {
    let mut file = FileSource::open(path, structure, offset, buffer_size).await?;
    let mut codec = TextCodec::new(data_type);
    let conn = provider.connection().await?;
    let mut sink = open_sink(conn, mode, structure);
    if offset > 0 {
        sink.note_restart_offset(offset).await?;
    }
    pump_retrieve(&mut file, sink.as_mut(), &mut codec, state, limiter).await
}

/// Handles STOR, APPE and STOU: receives a file over the data channel.
pub async fn store(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    slot: &TransferSlot,
    arg: String,
    kind: StoreKind,
) -> Result<(), std::io::Error> {
    let arg = arg.trim().to_string();
    let name = if arg.is_empty() {
        match kind {
            StoreKind::Unique => unique_name(),
            _ => {
                return send_response(writer, "501 Syntax error in parameters or arguments.\r\n")
                    .await
            }
        }
    } else {
        arg
    };
    let path = resolve_path(&session.base_path, &session.current_dir, &name);

    let user = session.username.clone().unwrap_or_default();
    let perms = ctx.users.permissions_for(&user, &path);
    if !perms.can_write || !perms.can_upload {
        return send_response(writer, TransferError::Permission.to_ftp_response()).await;
    }
    let limits = ctx.users.limits_for(&user);
    if let Err(e) = ctx.quotas.check_upload(&user, &limits).await {
        warn!("Upload refused for {}: {}", user, e);
        return send_response(writer, TransferError::QuotaExceeded.to_ftp_response()).await;
    }

    // The pending restart offset is consumed even when the kind ignores it.
    let pending = session.take_restart_offset();
    let resume = match kind {
        StoreKind::Create => pending,
        StoreKind::Append => RestartOffset::Append,
        StoreKind::Unique => RestartOffset::Absent,
    };
    if kind == StoreKind::Unique && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return send_response(writer, TransferError::UniqueViolation.to_ftp_response()).await;
    }

    if !session.provider.is_ready() {
        return send_response(writer, "425 Can't open data connection.\r\n").await;
    }

    let state = Arc::new(TransferState::new(Direction::Store, None));
    slot.attach(Arc::clone(&state));

    send_response(
        writer,
        &format!("150 Opening data connection for {}.\r\n", name),
    )
    .await?;

    let mut limiter = RateLimiter::new(RateLimiter::effective_ceiling(
        ctx.users.rate_ceiling_for(&user),
        ctx.config.server.rate_ceiling(),
    ));
    let buffer_size = ctx.config.server.upload_buffer_size.unwrap_or(256 * 1024);
    let charge = UploadCharge {
        quotas: &ctx.quotas,
        user: &user,
        limits,
    };
    let result = run_store(
        &mut session.provider,
        &path,
        session.transfer_mode,
        session.file_structure,
        session.data_type,
        resume,
        buffer_size,
        &state,
        &mut limiter,
        Some(&charge),
    )
    .await;

    session.provider.close();
    slot.clear();

    match result {
        Ok(()) => {
            ctx.quotas.record_upload_file(&user).await;
            ctx.quotas
                .note_rate_sample(&user, limiter.current_rate())
                .await;
            info!(
                "Upload of {} complete for {}: {} bytes",
                name,
                user,
                state.bytes()
            );
            match kind {
                StoreKind::Unique => {
                    send_response(writer, &format!("226 Transfer complete ({}).\r\n", name)).await
                }
                _ => send_response(writer, "226 Transfer complete.\r\n").await,
            }
        }
        Err(e) => {
            warn!("Upload of {} failed for {}: {}", name, user, e);
            send_response(writer, e.to_ftp_response()).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_store(
    provider: &mut DataChannelProvider,
    path: &Path,
    mode: TransferMode,
    structure: FileStructure,
    data_type: DataType,
    resume: RestartOffset,
    buffer_size: usize,
    state: &TransferState,
    limiter: &mut RateLimiter,
    charge: Option<&UploadCharge<'_>>,
) -> Result<(), TransferError> {
    let mut file = FileSink::open(path, structure, resume).await?;
    let mut codec = TextCodec::new(data_type);
    let conn = provider.connection().await?;
    let mut source = open_source(conn, mode, structure, buffer_size);
    pump_store(source.as_mut(), &mut file, &mut codec, state, limiter, charge).await
}

fn unique_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("stou_{}", nanos)
}

/// Outbound copy loop: local file to framed data channel. Polls the abort
/// flag once per unit.
pub(crate) async fn pump_retrieve(
    source: &mut FileSource,
    sink: &mut (dyn TransferSink + '_),
    codec: &mut TextCodec,
    state: &TransferState,
    limiter: &mut RateLimiter,
) -> Result<(), TransferError> {
    loop {
        if state.abort_requested() {
            return Err(TransferError::Aborted);
        }
        let unit = match source.read_unit().await? {
            Some(unit) => unit,
            None => break,
        };
        let data = if codec.is_identity() {
            unit.data
        } else {
            codec.outbound(&unit.data)
        };
        sink.write_unit(&data, unit.end_of_record).await?;
        state.add_bytes(data.len() as u64);
        if unit.end_of_record {
            state.add_record();
        }
        limiter.throttle(data.len() as u64).await;
        state.set_current_rate(limiter.current_rate());
    }
    sink.finish().await?;
    Ok(())
}

/// Inbound copy loop: framed data channel to local file. Each received chunk
/// is charged against the user's quota before the next is read.
pub(crate) async fn pump_store(
    source: &mut (dyn TransferSource + '_),
    sink: &mut FileSink,
    codec: &mut TextCodec,
    state: &TransferState,
    limiter: &mut RateLimiter,
    charge: Option<&UploadCharge<'_>>,
) -> Result<(), TransferError> {
    loop {
        if state.abort_requested() {
            return Err(TransferError::Aborted);
        }
        let unit = match source.read_unit().await? {
            Some(unit) => unit,
            None => break,
        };
        let data = if codec.is_identity() {
            unit.data
        } else {
            codec.inbound(&unit.data)
        };
        sink.write_unit(&data, unit.end_of_record).await?;
        state.add_bytes(data.len() as u64);
        if unit.end_of_record {
            state.add_record();
        }
        if let Some(charge) = charge {
            charge.charge(data.len() as u64).await?;
        }
        limiter.throttle(data.len() as u64).await;
        state.set_current_rate(limiter.current_rate());
    }
    let tail = codec.finish_inbound();
    if !tail.is_empty() {
        sink.write_unit(&tail, false).await?;
        state.add_bytes(tail.len() as u64);
        if let Some(charge) = charge {
            charge.charge(tail.len() as u64).await?;
        }
    }
    sink.finish().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_framing::channel::WireConn;
    use tokio::io::AsyncReadExt;

    fn wire(side: tokio::io::DuplexStream) -> WireConn {
        Box::new(side)
    }

    #[tokio::test]
    async fn retrieve_pump_applies_ascii_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("text.txt");
        tokio::fs::write(&path, b"one\ntwo\n").await.unwrap();

        let (server, mut client) = tokio::io::duplex(4096);
        let mut conn = wire(server);
        let mut source = FileSource::open(&path, FileStructure::File, 0, 4096)
            .await
            .unwrap();
        let mut codec = TextCodec::new(DataType::Ascii);
        let state = TransferState::new(Direction::Retrieve, None);
        let mut limiter = RateLimiter::new(None);

        let mut sink = open_sink(&mut conn, TransferMode::Stream, FileStructure::File);
        pump_retrieve(&mut source, sink.as_mut(), &mut codec, &state, &mut limiter)
            .await
            .unwrap();
        drop(sink);
        drop(conn);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"one\r\ntwo\r\n");
        assert_eq!(state.records(), 0);
        assert_eq!(state.bytes(), 10);
    }

    #[tokio::test]
    async fn abort_mid_transfer_halts_within_one_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        tokio::fs::write(&path, vec![0u8; 1 << 20]).await.unwrap();

        let (server, mut client) = tokio::io::duplex(64 * 1024);
        let drain = tokio::spawn(async move {
            let mut sink = tokio::io::sink();
            tokio::io::copy(&mut client, &mut sink).await.ok();
        });

        let mut conn = wire(server);
        let mut source = FileSource::open(&path, FileStructure::File, 0, 8192)
            .await
            .unwrap();
        let mut codec = TextCodec::new(DataType::Image);
        let state = Arc::new(TransferState::new(Direction::Retrieve, Some(1 << 20)));
        let mut limiter = RateLimiter::new(None);

        // Abort from a concurrent task once the transfer is demonstrably in
        // flight, then record how far it had gotten.
        let watcher = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                while state.bytes() < 64 * 1024 {
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
                state.request_abort();
                state.bytes()
            })
        };

        let mut sink = open_sink(&mut conn, TransferMode::Stream, FileStructure::File);
        let err = pump_retrieve(&mut source, sink.as_mut(), &mut codec, &state, &mut limiter)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Aborted));

        let at_abort = watcher.await.unwrap();
        assert!(state.bytes() >= 64 * 1024);
        assert!(state.bytes() < 1 << 20);
        // At most the unit already in flight completes after the flag is set.
        assert!(
            state.bytes() - at_abort <= 8192,
            "overshoot of {} bytes past the abort point",
            state.bytes() - at_abort
        );

        drop(sink);
        drop(conn);
        drain.await.unwrap();
    }

    #[tokio::test]
    async fn store_pump_halts_on_quota_within_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");

        // 8 KiB incoming against a 2 KiB daily limit.
        let (server, client) = tokio::io::duplex(64 * 1024);
        let feeder = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let mut client = client;
            client.write_all(&vec![7u8; 8 * 1024]).await.unwrap();
            client.shutdown().await.unwrap();
        });

        let registry = QuotaRegistry::new();
        let limits = StatLimits {
            max_bytes_up: Some(2 * 1024),
            ..Default::default()
        };
        let charge = UploadCharge {
            quotas: &registry,
            user: "dave",
            limits,
        };

        let mut conn = wire(server);
        let mut file = FileSink::open(&path, FileStructure::File, RestartOffset::Absent)
            .await
            .unwrap();
        let mut codec = TextCodec::new(DataType::Image);
        let state = TransferState::new(Direction::Store, None);
        let mut limiter = RateLimiter::new(None);

        let mut source = open_source(&mut conn, TransferMode::Stream, FileStructure::File, 1024);
        let err = pump_store(
            source.as_mut(),
            &mut file,
            &mut codec,
            &state,
            &mut limiter,
            Some(&charge),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransferError::QuotaExceeded));
        assert!(state.bytes() <= 2 * 1024 + 1024);

        drop(source);
        drop(conn);
        feeder.await.unwrap();
    }

    #[tokio::test]
    async fn record_structure_counts_records_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("records.txt");
        let dst_path = dir.path().join("copy.txt");
        tokio::fs::write(&src_path, b"alpha\nbeta\ngamma\n")
            .await
            .unwrap();

        let (server, client) = tokio::io::duplex(4096);
        let mut send_conn = wire(server);
        let mut recv_conn = wire(client);

        let send_state = TransferState::new(Direction::Retrieve, None);
        let recv_state = TransferState::new(Direction::Store, None);

        let sender = async {
            let mut source = FileSource::open(&src_path, FileStructure::Record, 0, 4096)
                .await
                .unwrap();
            let mut codec = TextCodec::new(DataType::Image);
            let mut limiter = RateLimiter::new(None);
            let mut sink = open_sink(&mut send_conn, TransferMode::Stream, FileStructure::Record);
            pump_retrieve(&mut source, sink.as_mut(), &mut codec, &send_state, &mut limiter).await
        };
        let receiver = async {
            let mut file = FileSink::open(&dst_path, FileStructure::Record, RestartOffset::Absent)
                .await
                .unwrap();
            let mut codec = TextCodec::new(DataType::Image);
            let mut limiter = RateLimiter::new(None);
            let mut source =
                open_source(&mut recv_conn, TransferMode::Stream, FileStructure::Record, 4096);
            pump_store(
                source.as_mut(),
                &mut file,
                &mut codec,
                &recv_state,
                &mut limiter,
                None,
            )
            .await
        };

        let (sent, received) = tokio::join!(sender, receiver);
        sent.unwrap();
        received.unwrap();

        assert_eq!(send_state.records(), 3);
        assert_eq!(recv_state.records(), 3);
        assert_eq!(
            tokio::fs::read(&dst_path).await.unwrap(),
            tokio::fs::read(&src_path).await.unwrap()
        );
    }

    #[tokio::test]
    async fn aborted_retrieve_still_debits_download_bytes() {
        use crate::config::Config;
        use crate::core_network::{AddressFamily, PassivePortPool};
        use crate::core_users::UserStore;
        use crate::server::{ServerContext, SessionRegistry};
        use crate::session::Session;
        use std::net::IpAddr;
        use std::time::Duration;
        use tokio::net::{TcpListener, TcpStream};

        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("big.bin"), vec![0u8; 8 << 20])
            .await
            .unwrap();

        let ctx = ServerContext {
            config: Config {
                server: Default::default(),
                tls: None,
            },
            users: UserStore::from_defs(Vec::new(), Vec::new()),
            quotas: QuotaRegistry::new(),
            port_pool: PassivePortPool::new(None),
            tls: None,
            sessions: SessionRegistry::default(),
        };

        let control = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut control_client = TcpStream::connect(control.local_addr().unwrap())
            .await
            .unwrap();
        let (control_stream, _) = control.accept().await.unwrap();
        let (_control_read, control_write) = control_stream.into_split();
        let writer: ControlWriter = Arc::new(tokio::sync::Mutex::new(control_write));

        let mut session = Session::new(dir.path().to_path_buf());
        session.username = Some("erin".to_string());
        session.is_authenticated = true;
        session.data_type = DataType::Image;

        let port = session
            .provider
            .init_passive(
                IpAddr::from([127, 0, 0, 1]),
                &ctx.port_pool,
                AddressFamily::V4,
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap()
            .port;

        let slot = TransferSlot::new();
        let (abort_tx, abort_rx) = tokio::sync::oneshot::channel();
        let aborter = {
            let slot = slot.clone();
            tokio::spawn(async move {
                loop {
                    if let Some(state) = slot.current() {
                        if state.bytes() >= 64 * 1024 {
                            state.request_abort();
                            let _ = abort_tx.send(());
                            break;
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };
        let data_client = tokio::spawn(async move {
            let mut stream = TcpStream::connect((std::net::Ipv4Addr::LOCALHOST, port))
                .await
                .unwrap();
            // Take enough for the abort to trigger, hold until it has, then
            // drain whatever the server still has in flight.
            let mut buf = vec![0u8; 64 * 1024];
            stream.read_exact(&mut buf).await.unwrap();
            abort_rx.await.unwrap();
            let mut sink = tokio::io::sink();
            tokio::io::copy(&mut stream, &mut sink).await.ok();
        });

        retrieve(&writer, &ctx, &mut session, &slot, "big.bin".to_string())
            .await
            .unwrap();
        aborter.await.unwrap();
        data_client.await.unwrap();

        drop(writer);
        let mut replies = String::new();
        control_client.read_to_string(&mut replies).await.unwrap();
        assert!(replies.contains("150 "));
        assert!(replies.contains("426 Transfer aborted."));

        // The bytes that went out count even though the transfer aborted.
        let cell = ctx.quotas.counters("erin");
        let counters = cell.lock().await;
        assert!(counters.bytes_downloaded >= 64 * 1024);
        assert!(counters.bytes_downloaded < 8 << 20);
        assert_eq!(counters.files_downloaded, 0);
    }
}
