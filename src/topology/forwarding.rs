//! Forwarding method and tunnel encapsulation.
//!
//! Grammar of the directive tail:
//! ```text
//! <NAT|DR|TUN> [type <ipip|gue|gre>] [port <1-65535>] [csum|nocsum|remcsum]
//! ```
//! Options after the method may come in any order. Cross-option rules are
//! checked once the whole tail has been read, so a rejected directive never
//! leaves a half-applied forwarding setting behind.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::config::Capabilities;

/// How traffic reaches a real server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum Forwarding {
    /// Masquerading.
    #[default]
    Nat,
    DirectRoute,
    Tunnel(Tunnel),
}

impl Forwarding {
    pub fn is_tunnel(&self) -> bool {
        matches!(self, Forwarding::Tunnel(_))
    }
}

impl fmt::Display for Forwarding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forwarding::Nat => write!(f, "NAT"),
            Forwarding::DirectRoute => write!(f, "DR"),
            Forwarding::Tunnel(tunnel) => write!(f, "TUN {}", tunnel),
        }
    }
}

/// Tunnel encapsulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Tunnel {
    pub kind: TunnelKind,
    pub checksum: Checksum,
}

impl fmt::Display for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TunnelKind::Ipip => write!(f, "type ipip")?,
            TunnelKind::Gue { port } => write!(f, "type gue port {}", port)?,
            TunnelKind::Gre => write!(f, "type gre")?,
        }
        match self.checksum {
            Checksum::None => Ok(()),
            Checksum::Checksum => write!(f, " csum"),
            Checksum::Remote => write!(f, " remcsum"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TunnelKind {
    #[default]
    Ipip,
    /// Generic UDP encapsulation; always carries its destination port.
    Gue { port: u16 },
    Gre,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checksum {
    #[default]
    None,
    Checksum,
    Remote,
}

/// Why a forwarding directive was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardingError {
    #[error("missing routing method for {server} server")]
    MissingMethod { server: &'static str },

    #[error("unknown [{method}] routing method for {server} server")]
    UnknownMethod { method: String, server: &'static str },

    #[error("tunnel options are not supported by this kernel interface ({server} server)")]
    TunnelOptionsUnsupported { server: &'static str },

    #[error("missing tunnel type for {server} server")]
    MissingTunnelType { server: &'static str },

    #[error("unknown tunnel type {kind} for {server} server")]
    UnknownTunnelType { kind: String, server: &'static str },

    #[error("missing port for {server} server gue tunnel")]
    MissingPort { server: &'static str },

    #[error("invalid gue tunnel port {port} for {server} server")]
    InvalidPort { port: String, server: &'static str },

    #[error("invalid tunnel option {option} for {server} server")]
    InvalidOption { option: String, server: &'static str },

    #[error("gue tunnels require port, otherwise cannot have port")]
    GuePortMismatch,

    #[error("ipip tunnels do not support checksum option")]
    IpipChecksum,

    #[error("gre tunnels do not support remote checksum option")]
    GreRemoteChecksum,
}

impl ForwardingError {
    /// The token the error is about, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            ForwardingError::UnknownMethod { method, .. } => Some(method.as_str()),
            ForwardingError::UnknownTunnelType { kind, .. } => Some(kind.as_str()),
            ForwardingError::InvalidPort { port, .. } => Some(port.as_str()),
            ForwardingError::InvalidOption { option, .. } => Some(option.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum KindToken {
    Ipip,
    Gue,
    Gre,
}

/// Parse a forwarding directive. `tokens[0]` is the keyword.
///
/// `server` names the entity kind ("virtual", "real", "sorry") for messages.
pub fn parse_forwarding(
    tokens: &[String],
    caps: &Capabilities,
    server: &'static str,
) -> Result<Forwarding, ForwardingError> {
    let method = tokens.get(1).ok_or(ForwardingError::MissingMethod { server })?;
    let options = &tokens[2..];

    let tunnelled = match method.as_str() {
        "NAT" | "DR" => false,
        "TUN" => true,
        _ => {
            return Err(ForwardingError::UnknownMethod {
                method: method.clone(),
                server,
            })
        }
    };

    if !options.is_empty() && !caps.tunnel_encap {
        return Err(ForwardingError::TunnelOptionsUnsupported { server });
    }

    let mut kind = KindToken::Ipip;
    let mut port: Option<u16> = None;
    let mut checksum = Checksum::None;

    let mut iter = options.iter();
    while let Some(option) = iter.next() {
        match option.as_str() {
            "type" => {
                let value = iter.next().ok_or(ForwardingError::MissingTunnelType { server })?;
                kind = match value.as_str() {
                    "ipip" => KindToken::Ipip,
                    "gue" => KindToken::Gue,
                    "gre" if caps.tunnel_gre => KindToken::Gre,
                    _ => {
                        return Err(ForwardingError::UnknownTunnelType {
                            kind: value.clone(),
                            server,
                        })
                    }
                };
            }
            "port" => {
                let value = iter.next().ok_or(ForwardingError::MissingPort { server })?;
                let parsed = value
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| ForwardingError::InvalidPort {
                        port: value.clone(),
                        server,
                    })?;
                port = Some(parsed);
            }
            "nocsum" if caps.tunnel_checksum => checksum = Checksum::None,
            "csum" if caps.tunnel_checksum => checksum = Checksum::Checksum,
            "remcsum" if caps.tunnel_checksum => checksum = Checksum::Remote,
            _ => {
                return Err(ForwardingError::InvalidOption {
                    option: option.clone(),
                    server,
                })
            }
        }
    }

    let kind = match (kind, port) {
        (KindToken::Gue, Some(port)) => TunnelKind::Gue { port },
        (KindToken::Ipip, None) => TunnelKind::Ipip,
        (KindToken::Gre, None) => TunnelKind::Gre,
        _ => return Err(ForwardingError::GuePortMismatch),
    };

    match (kind, checksum) {
        (TunnelKind::Ipip, Checksum::Checksum | Checksum::Remote) => {
            return Err(ForwardingError::IpipChecksum)
        }
        (TunnelKind::Gre, Checksum::Remote) => return Err(ForwardingError::GreRemoteChecksum),
        _ => {}
    }

    // NAT and DR validate the tail but keep no tunnel parameters.
    Ok(match (tunnelled, method.as_str()) {
        (true, _) => Forwarding::Tunnel(Tunnel { kind, checksum }),
        (false, "NAT") => Forwarding::Nat,
        (false, _) => Forwarding::DirectRoute,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Forwarding, ForwardingError> {
        let tokens: Vec<String> = line.split_whitespace().map(String::from).collect();
        parse_forwarding(&tokens, &Capabilities::default(), "real")
    }

    #[test]
    fn test_plain_methods() {
        assert_eq!(parse("lvs_method NAT"), Ok(Forwarding::Nat));
        assert_eq!(parse("lvs_method DR"), Ok(Forwarding::DirectRoute));
        assert_eq!(parse("lvs_method TUN"), Ok(Forwarding::Tunnel(Tunnel::default())));
        assert!(matches!(parse("lvs_method FOO"), Err(ForwardingError::UnknownMethod { .. })));
        assert!(matches!(parse("lvs_method"), Err(ForwardingError::MissingMethod { .. })));
    }

    #[test]
    fn test_gue_port_truth_table() {
        // gue with port
        assert_eq!(
            parse("lvs_method TUN type gue port 6080"),
            Ok(Forwarding::Tunnel(Tunnel {
                kind: TunnelKind::Gue { port: 6080 },
                checksum: Checksum::None
            }))
        );
        // gue without port
        assert_eq!(parse("lvs_method TUN type gue"), Err(ForwardingError::GuePortMismatch));
        // not gue, with port
        assert_eq!(parse("lvs_method TUN type ipip port 6080"), Err(ForwardingError::GuePortMismatch));
        assert_eq!(parse("lvs_method TUN port 6080"), Err(ForwardingError::GuePortMismatch));
        // not gue, without port
        assert_eq!(parse("lvs_method TUN type ipip"), Ok(Forwarding::Tunnel(Tunnel::default())));
    }

    #[test]
    fn test_options_any_order() {
        assert_eq!(
            parse("lvs_method TUN csum port 5555 type gue"),
            Ok(Forwarding::Tunnel(Tunnel {
                kind: TunnelKind::Gue { port: 5555 },
                checksum: Checksum::Checksum
            }))
        );
    }

    #[test]
    fn test_checksum_restrictions() {
        assert_eq!(parse("lvs_method TUN type ipip csum"), Err(ForwardingError::IpipChecksum));
        assert_eq!(parse("lvs_method TUN remcsum"), Err(ForwardingError::IpipChecksum));
        assert_eq!(
            parse("lvs_method TUN type ipip nocsum"),
            Ok(Forwarding::Tunnel(Tunnel::default()))
        );
        assert_eq!(parse("lvs_method TUN type gre remcsum"), Err(ForwardingError::GreRemoteChecksum));
        assert_eq!(
            parse("lvs_method TUN type gre csum"),
            Ok(Forwarding::Tunnel(Tunnel {
                kind: TunnelKind::Gre,
                checksum: Checksum::Checksum
            }))
        );
    }

    #[test]
    fn test_malformed_options() {
        assert!(matches!(parse("lvs_method TUN type"), Err(ForwardingError::MissingTunnelType { .. })));
        assert!(matches!(parse("lvs_method TUN type vxlan"), Err(ForwardingError::UnknownTunnelType { .. })));
        assert!(matches!(parse("lvs_method TUN type gue port"), Err(ForwardingError::MissingPort { .. })));
        assert!(matches!(parse("lvs_method TUN type gue port 0"), Err(ForwardingError::InvalidPort { .. })));
        assert!(matches!(parse("lvs_method TUN type gue port 70000"), Err(ForwardingError::InvalidPort { .. })));
        assert!(matches!(parse("lvs_method TUN bogus"), Err(ForwardingError::InvalidOption { .. })));
    }

    #[test]
    fn test_tunnel_options_after_nat_and_dr() {
        assert_eq!(parse("lvs_method DR nocsum"), Ok(Forwarding::DirectRoute));
        assert_eq!(parse("lvs_method DR type gue port 6080"), Ok(Forwarding::DirectRoute));
        assert_eq!(parse("lvs_method NAT type gre csum"), Ok(Forwarding::Nat));

        assert_eq!(parse("lvs_method DR type gue"), Err(ForwardingError::GuePortMismatch));
        assert_eq!(parse("lvs_method NAT port 6080"), Err(ForwardingError::GuePortMismatch));
        assert_eq!(parse("lvs_method DR type ipip csum"), Err(ForwardingError::IpipChecksum));
        assert_eq!(parse("lvs_method NAT type gre remcsum"), Err(ForwardingError::GreRemoteChecksum));
        assert!(matches!(parse("lvs_method DR bogus"), Err(ForwardingError::InvalidOption { .. })));
    }

    #[test]
    fn test_capabilities_gate_options() {
        let tokens: Vec<String> = "lvs_method TUN type gre".split_whitespace().map(String::from).collect();
        let mut caps = Capabilities::default();
        caps.tunnel_gre = false;
        assert!(matches!(
            parse_forwarding(&tokens, &caps, "real"),
            Err(ForwardingError::UnknownTunnelType { .. })
        ));

        caps.tunnel_encap = false;
        assert!(matches!(
            parse_forwarding(&tokens, &caps, "real"),
            Err(ForwardingError::TunnelOptionsUnsupported { .. })
        ));
    }
}
