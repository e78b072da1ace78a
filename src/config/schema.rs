//! Parser options schema.
//!
//! This module defines the options that shape how a topology configuration
//! is interpreted: which kernel load-balancing capabilities are available,
//! symbolic fwmark names, and logging. All types derive Serde traits for
//! deserialization from a TOML options file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root options for the topology parser.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ParserOptions {
    /// Capabilities of the kernel load-balancing interface.
    pub capabilities: Capabilities,

    /// Symbolic fwmark names (name → numeric mark).
    pub fwmarks: BTreeMap<String, u32>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ParserOptions {
    /// Resolve a fwmark token, numeric (decimal or `0x` hex) or symbolic.
    pub fn resolve_fwmark(&self, token: &str) -> Option<u32> {
        let numeric = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => token.parse::<u32>().ok(),
        };
        numeric.or_else(|| self.fwmarks.get(token).copied())
    }
}

/// Kernel interface capabilities.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Capabilities {
    /// IPv6 virtual services are supported.
    pub ipv6: bool,

    /// The kernel accepts a per-destination address family, so tunnelled
    /// servers may differ in family from their virtual server.
    pub per_destination_family: bool,

    /// Tunnel `type` and `port` options are available.
    pub tunnel_encap: bool,

    /// GRE tunnels are available.
    pub tunnel_gre: bool,

    /// Tunnel checksum options are available.
    pub tunnel_checksum: bool,

    /// Scheduler flags (`flag-N`, `sh-*`, `mh-*`) are available.
    pub sched_flags: bool,

    /// SNMP names may be given to servers.
    pub snmp: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            ipv6: true,
            per_destination_family: true,
            tunnel_encap: true,
            tunnel_gre: true,
            tunnel_checksum: true,
            sched_flags: true,
            snmp: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
