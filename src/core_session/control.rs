//! The control-connection loop.
//!
//! Each session runs as two tasks. The reader task owns the read half of the
//! control socket and does nothing but read lines: when a transfer is in
//! flight it services ABOR and STAT immediately against the shared transfer
//! slot, everything else is forwarded to the executor through a
//! single-command channel. The executor owns the session state, runs one
//! command at a time and enforces the idle timeout between commands.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::{dispatch, CommandOutcome};
use crate::core_transfer::TransferSlot;
use crate::helpers::{send_response, ControlWriter};
use crate::server::{base_path, ServerContext};
use crate::session::Session;

const IDLE_TICK: Duration = Duration::from_secs(1);

/// Splits a raw command line into its verb and argument.
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (line, ""),
    }
}

/// Drives one control connection to completion.
pub async fn drive(stream: TcpStream, ctx: Arc<ServerContext>) -> Result<(), std::io::Error> {
    let (read_half, write_half) = stream.into_split();
    let writer: ControlWriter = Arc::new(Mutex::new(write_half));

    send_response(&writer, "220 Service ready.\r\n").await?;

    let slot = TransferSlot::new();
    let (tx, mut rx) = mpsc::channel::<String>(1);

    let reader_writer = Arc::clone(&writer);
    let reader_slot = slot.clone();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(read_half);
        let mut line = String::new();
        loop {
            line.clear();
            match lines.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Control read failed: {}", e);
                    break;
                }
            }

            // ABOR and STAT act on the in-flight transfer without queueing
            // behind it; anything else waits its turn.
            if let Some(state) = reader_slot.current() {
                let (verb, _) = split_command(&line);
                match FtpCommand::from_str(verb) {
                    Some(FtpCommand::ABOR) => {
                        info!("ABOR received mid-transfer");
                        state.request_abort();
                        continue;
                    }
                    Some(FtpCommand::STAT) => {
                        let progress = state.progress_line();
                        if send_response(&reader_writer, &progress).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            if tx.send(line.clone()).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(base_path(&ctx.config));
    let idle_budget = ctx.config.server.idle_timeout();
    let mut idle = Duration::ZERO;

    let result = loop {
        let line = match timeout(IDLE_TICK, rx.recv()).await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(_) => {
                idle += IDLE_TICK;
                if idle >= idle_budget {
                    warn!("Session idle for {:?}, disconnecting", idle);
                    break send_response(
                        &writer,
                        "421 Idle timeout, closing control connection.\r\n",
                    )
                    .await;
                }
                continue;
            }
        };
        idle = Duration::ZERO;

        let (verb, arg) = split_command(&line);
        if verb.is_empty() {
            continue;
        }
        debug!("Command: {} {}", verb, arg);

        let command = match FtpCommand::from_str(verb) {
            Some(command) => command,
            None => {
                if let Err(e) =
                    send_response(&writer, "502 Command not implemented.\r\n").await
                {
                    break Err(e);
                }
                continue;
            }
        };

        if !session.is_authenticated && command.requires_auth() {
            if let Err(e) = send_response(&writer, "530 Not logged in.\r\n").await {
                break Err(e);
            }
            continue;
        }

        match dispatch(
            command,
            &writer,
            &ctx,
            &mut session,
            &slot,
            arg.to_string(),
        )
        .await
        {
            Ok(CommandOutcome::Continue) => {}
            Ok(CommandOutcome::Quit) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    session.provider.close();
    reader.abort();
    result
}
