//! PASV and EPSV: passive-mode data channel negotiation.

use log::warn;
use std::net::IpAddr;

use crate::helpers::{send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

use super::provider::AddressFamily;

/// Handles PASV: binds a pool port and advertises it in the classic
/// six-octet reply. PASV implies IPv4.
pub async fn handle_pasv_command(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
) -> Result<(), std::io::Error> {
    let local_ip: IpAddr = match ctx.config.server.pasv_address.parse() {
        Ok(ip) => ip,
        Err(e) => {
            warn!(
                "Configured pasv_address {} is invalid: {}",
                ctx.config.server.pasv_address, e
            );
            return send_response(writer, "425 Can't open data connection.\r\n").await;
        }
    };

    let (addr, port) = match session
        .provider
        .init_passive(
            local_ip,
            &ctx.port_pool,
            AddressFamily::V4,
            ctx.tls.clone(),
            ctx.config.server.accept_timeout(),
        )
        .await
    {
        Ok(descriptor) => (descriptor.addr, descriptor.port),
        Err(e) => {
            warn!("PASV negotiation failed: {}", e);
            return send_response(writer, e.to_ftp_response()).await;
        }
    };

    let reply = match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!(
                "227 Entering Passive Mode ({},{},{},{},{},{}).\r\n",
                a,
                b,
                c,
                d,
                port >> 8,
                port & 0xFF
            )
        }
        IpAddr::V6(_) => {
            // Unreachable with the V4 family request above, but degrade
            // gracefully rather than panic.
            session.provider.close();
            return send_response(writer, "425 Can't open data connection.\r\n").await;
        }
    };
    send_response(writer, &reply).await
}

/// Handles EPSV: like PASV but protocol-neutral, advertising only the port.
/// An optional argument requests an address family (1 = IPv4, 2 = IPv6).
pub async fn handle_epsv_command(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    let requested = match arg.trim() {
        "" => AddressFamily::Unspecified,
        "1" => AddressFamily::V4,
        "2" => AddressFamily::V6,
        other => {
            warn!("EPSV with unsupported protocol argument: {}", other);
            return send_response(writer, "522 Network protocol not supported, use (1,2).\r\n")
                .await;
        }
    };

    let local_ip: IpAddr = match ctx.config.server.pasv_address.parse() {
        Ok(ip) => ip,
        Err(_) => return send_response(writer, "425 Can't open data connection.\r\n").await,
    };

    match session
        .provider
        .init_passive(
            local_ip,
            &ctx.port_pool,
            requested,
            ctx.tls.clone(),
            ctx.config.server.accept_timeout(),
        )
        .await
    {
        Ok(descriptor) => {
            let reply = format!(
                "229 Entering Extended Passive Mode (|||{}|).\r\n",
                descriptor.port
            );
            send_response(writer, &reply).await
        }
        Err(e) => {
            warn!("EPSV negotiation failed: {}", e);
            send_response(writer, e.to_ftp_response()).await
        }
    }
}
