//! Real and sorry servers.

use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::topology::{AddressFamily, Forwarding};

/// Default real server weight.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Checker timers shared by virtual and real servers. `None` means inherit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerTimers {
    pub connect_timeout: Option<Duration>,
    pub delay_loop: Option<Duration>,
    pub delay_before_retry: Option<Duration>,
    pub warmup: Option<Duration>,
    pub retry: Option<u32>,
}

/// A script run on a state change, stored as its argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyScript {
    pub command: Vec<String>,
}

impl NotifyScript {
    /// Build from a directive's arguments; `None` when there are none.
    pub fn from_args(args: &[String]) -> Option<Self> {
        (!args.is_empty()).then(|| Self {
            command: args.to_vec(),
        })
    }
}

/// A backend behind a virtual server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealServer {
    pub addr: SocketAddr,
    /// Weight as configured.
    pub initial_weight: u32,
    /// Weight currently in force; starts equal to the initial weight.
    pub effective_weight: u32,
    pub forwarding: Forwarding,
    /// Upper connection threshold, 0 = unlimited.
    pub upper_threshold: u32,
    /// Lower connection threshold, 0 = unset.
    pub lower_threshold: u32,
    pub timers: ServerTimers,
    pub alpha: bool,
    pub inhibit_on_failure: bool,
    pub smtp_alert: Option<bool>,
    pub notify_up: Option<NotifyScript>,
    pub notify_down: Option<NotifyScript>,
    pub virtualhost: Option<String>,
    pub snmp_name: Option<String>,
}

impl RealServer {
    /// New server inheriting the virtual server's forwarding method.
    pub fn new(addr: SocketAddr, forwarding: Forwarding) -> Self {
        Self {
            addr,
            initial_weight: DEFAULT_WEIGHT,
            effective_weight: DEFAULT_WEIGHT,
            forwarding,
            upper_threshold: 0,
            lower_threshold: 0,
            timers: ServerTimers::default(),
            alpha: false,
            inhibit_on_failure: false,
            smtp_alert: None,
            notify_up: None,
            notify_down: None,
            virtualhost: None,
            snmp_name: None,
        }
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.addr.ip())
    }

    /// Set both weights; they diverge only at runtime.
    pub fn set_weight(&mut self, weight: u32) {
        self.initial_weight = weight;
        self.effective_weight = weight;
    }
}

/// Fallback server used when no real server is available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SorryServer {
    #[serde(flatten)]
    pub server: RealServer,
    /// Keep the sorry server in the pool with weight 0 instead of removing it.
    pub inhibit: bool,
}

impl SorryServer {
    pub fn new(addr: SocketAddr, forwarding: Forwarding) -> Self {
        Self {
            server: RealServer::new(addr, forwarding),
            inhibit: false,
        }
    }

    pub fn family(&self) -> AddressFamily {
        self.server.family()
    }
}
