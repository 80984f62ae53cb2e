//! PORT and EPRT: active-mode data channel negotiation.

use log::warn;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::helpers::{send_response, ControlWriter};
use crate::server::ServerContext;
use crate::session::Session;

use super::provider::AddressFamily;

/// Parses the classic PORT argument: six comma-separated decimal octets,
/// four of address and two of port.
pub fn parse_port_argument(arg: &str) -> Option<SocketAddr> {
    let parts: Vec<u8> = arg
        .trim()
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.len() != 6 {
        return None;
    }
    let ip = Ipv4Addr::new(parts[0], parts[1], parts[2], parts[3]);
    let port = u16::from(parts[4]) << 8 | u16::from(parts[5]);
    if port == 0 {
        return None;
    }
    Some(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Parses the EPRT argument: `<d><proto><d><addr><d><port><d>` where `<d>`
/// is the first character of the argument.
pub fn parse_eprt_argument(arg: &str) -> Option<(AddressFamily, SocketAddr)> {
    let arg = arg.trim();
    let delim = arg.chars().next()?;
    let fields: Vec<&str> = arg.split(delim).collect();
    // Leading and trailing delimiters produce empty first and last fields.
    if fields.len() != 5 || !fields[0].is_empty() || !fields[4].is_empty() {
        return None;
    }
    let family = AddressFamily::from_proto(fields[1].parse::<u8>().ok()?)?;
    let ip: IpAddr = fields[2].parse().ok()?;
    let port: u16 = fields[3].parse().ok()?;
    if port == 0 {
        return None;
    }
    Some((family, SocketAddr::new(ip, port)))
}

/// Handles PORT: records the client-supplied IPv4 endpoint for a later
/// active-mode connection. Nothing is dialed until a transfer demands it.
pub async fn handle_port_command(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    let peer = match parse_port_argument(&arg) {
        Some(peer) => peer,
        None => {
            warn!("Malformed PORT argument: {}", arg);
            return send_response(writer, "501 Syntax error in parameters or arguments.\r\n")
                .await;
        }
    };

    match session.provider.init_active(
        peer,
        AddressFamily::V4,
        ctx.tls.clone(),
        ctx.config.server.accept_timeout(),
    ) {
        Ok(_) => send_response(writer, "200 PORT command successful.\r\n").await,
        Err(e) => {
            warn!("PORT negotiation failed: {}", e);
            send_response(writer, e.to_ftp_response()).await
        }
    }
}

/// Handles EPRT: the protocol-neutral PORT variant. A protocol code that
/// does not match the supplied address is refused with 522.
pub async fn handle_eprt_command(
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    arg: String,
) -> Result<(), std::io::Error> {
    let (family, peer) = match parse_eprt_argument(&arg) {
        Some(parsed) => parsed,
        None => {
            warn!("Malformed EPRT argument: {}", arg);
            return send_response(writer, "501 Syntax error in parameters or arguments.\r\n")
                .await;
        }
    };

    match session.provider.init_active(
        peer,
        family,
        ctx.tls.clone(),
        ctx.config.server.accept_timeout(),
    ) {
        Ok(_) => send_response(writer, "200 EPRT command successful.\r\n").await,
        Err(e) => {
            warn!("EPRT negotiation failed: {}", e);
            send_response(writer, e.to_ftp_response()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_argument_parses_address_and_port() {
        let addr = parse_port_argument("192,168,1,5,19,137").unwrap();
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)));
        assert_eq!(addr.port(), 19 * 256 + 137);
    }

    #[test]
    fn port_argument_rejects_malformed_input() {
        assert!(parse_port_argument("192,168,1,5,19").is_none());
        assert!(parse_port_argument("192,168,1,5,19,137,9").is_none());
        assert!(parse_port_argument("300,168,1,5,19,137").is_none());
        assert!(parse_port_argument("192,168,1,5,0,0").is_none());
        assert!(parse_port_argument("garbage").is_none());
    }

    #[test]
    fn eprt_argument_parses_both_families() {
        let (family, addr) = parse_eprt_argument("|1|132.235.1.2|6275|").unwrap();
        assert_eq!(family, AddressFamily::V4);
        assert_eq!(addr, "132.235.1.2:6275".parse().unwrap());

        let (family, addr) = parse_eprt_argument("|2|::1|7000|").unwrap();
        assert_eq!(family, AddressFamily::V6);
        assert_eq!(addr.port(), 7000);
        assert!(addr.ip().is_ipv6());
    }

    #[test]
    fn eprt_argument_honors_custom_delimiter() {
        let (family, addr) = parse_eprt_argument("!1!10.0.0.1!2100!").unwrap();
        assert_eq!(family, AddressFamily::V4);
        assert_eq!(addr, "10.0.0.1:2100".parse().unwrap());
    }

    #[test]
    fn eprt_argument_rejects_malformed_input() {
        assert!(parse_eprt_argument("").is_none());
        assert!(parse_eprt_argument("|9|10.0.0.1|2100|").is_none());
        assert!(parse_eprt_argument("|1|not-an-ip|2100|").is_none());
        assert!(parse_eprt_argument("|1|10.0.0.1|0|").is_none());
        assert!(parse_eprt_argument("|1|10.0.0.1|2100").is_none());
    }
}
