//! Virtual servers.

use serde::Serialize;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::topology::{AddressFamily, Forwarding, NotifyScript, RealServer, ServerTimers, SorryServer};

/// Default persistence timeout, in seconds.
pub const DEFAULT_PERSISTENCE_TIMEOUT: u32 = 6 * 60;

/// Upper bound for the persistence timeout, in seconds.
pub const MAX_PERSISTENCE_TIMEOUT: u32 = 86_400 * 31;

/// Kernel limit on scheduler and persistence engine names, including NUL.
pub const NAME_FIELD_LEN: usize = 16;

/// How clients reach the virtual service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VsSelector {
    Addr(SocketAddr),
    Fwmark(u32),
    Group(String),
}

impl fmt::Display for VsSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VsSelector::Addr(addr) => write!(f, "{}", addr),
            VsSelector::Fwmark(mark) => write!(f, "FWM {}", mark),
            VsSelector::Group(name) => write!(f, "GROUP {}", name),
        }
    }
}

/// Connection scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheduler {
    Rr,
    Wrr,
    Lc,
    Wlc,
    Lblc,
    Sh,
    Mh,
    Dh,
    Fo,
    Ovf,
    Lblcr,
    Sed,
    Nq,
    Twos,
}

impl Scheduler {
    pub const ALL: [Scheduler; 14] = [
        Scheduler::Rr,
        Scheduler::Wrr,
        Scheduler::Lc,
        Scheduler::Wlc,
        Scheduler::Lblc,
        Scheduler::Sh,
        Scheduler::Mh,
        Scheduler::Dh,
        Scheduler::Fo,
        Scheduler::Ovf,
        Scheduler::Lblcr,
        Scheduler::Sed,
        Scheduler::Nq,
        Scheduler::Twos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheduler::Rr => "rr",
            Scheduler::Wrr => "wrr",
            Scheduler::Lc => "lc",
            Scheduler::Wlc => "wlc",
            Scheduler::Lblc => "lblc",
            Scheduler::Sh => "sh",
            Scheduler::Mh => "mh",
            Scheduler::Dh => "dh",
            Scheduler::Fo => "fo",
            Scheduler::Ovf => "ovf",
            Scheduler::Lblcr => "lblcr",
            Scheduler::Sed => "sed",
            Scheduler::Nq => "nq",
            Scheduler::Twos => "twos",
        }
    }
}

impl FromStr for Scheduler {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() >= NAME_FIELD_LEN {
            return Err(());
        }
        Scheduler::ALL.into_iter().find(|sched| sched.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler capability bits, as understood by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct SchedFlags(u32);

impl SchedFlags {
    pub const ONE_PACKET: SchedFlags = SchedFlags(0x0004);
    pub const SCHED1: SchedFlags = SchedFlags(0x0008);
    pub const SCHED2: SchedFlags = SchedFlags(0x0010);
    pub const SCHED3: SchedFlags = SchedFlags(0x0020);

    pub const SH_FALLBACK: SchedFlags = Self::SCHED1;
    pub const SH_PORT: SchedFlags = Self::SCHED2;
    pub const MH_FALLBACK: SchedFlags = Self::SCHED1;
    pub const MH_PORT: SchedFlags = Self::SCHED2;

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: SchedFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: SchedFlags) {
        self.0 |= other.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            "SCTP" => Ok(Protocol::Sctp),
            _ => Err(()),
        }
    }
}

/// Client address grouping used for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Netmask; not required to be contiguous.
    Ipv4Mask(Ipv4Addr),
    /// Prefix length in 1..=128.
    Ipv6Prefix(u8),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Persistence {
    pub engine: Option<String>,
    /// Seconds; `None` means not persistent.
    pub timeout: Option<u32>,
    pub granularity: Option<Granularity>,
}

/// A load-balanced service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualServer {
    pub selector: VsSelector,
    /// `None` until resolved.
    pub family: Option<AddressFamily>,
    pub protocol: Protocol,
    pub scheduler: Option<Scheduler>,
    pub sched_flags: SchedFlags,
    pub forwarding: Forwarding,
    pub timers: ServerTimers,
    pub persistence: Persistence,
    pub quorum: u32,
    pub hysteresis: u32,
    pub weight: u32,
    pub sorry_server: Option<SorryServer>,
    pub real_servers: Vec<RealServer>,
    pub alpha: bool,
    pub omega: bool,
    pub ha_suspend: bool,
    pub inhibit_on_failure: bool,
    pub smtp_alert: Option<bool>,
    pub virtualhost: Option<String>,
    pub snmp_name: Option<String>,
    pub quorum_up: Option<NotifyScript>,
    pub quorum_down: Option<NotifyScript>,
}

impl VirtualServer {
    pub fn new(selector: VsSelector) -> Self {
        let family = match &selector {
            VsSelector::Addr(addr) => Some(AddressFamily::of(&addr.ip())),
            VsSelector::Fwmark(_) | VsSelector::Group(_) => None,
        };

        Self {
            selector,
            family,
            protocol: Protocol::default(),
            scheduler: None,
            sched_flags: SchedFlags::default(),
            forwarding: Forwarding::default(),
            timers: ServerTimers::default(),
            persistence: Persistence::default(),
            quorum: 1,
            hysteresis: 0,
            weight: 1,
            sorry_server: None,
            real_servers: Vec::new(),
            alpha: false,
            omega: false,
            ha_suspend: false,
            inhibit_on_failure: false,
            smtp_alert: None,
            virtualhost: None,
            snmp_name: None,
            quorum_up: None,
            quorum_down: None,
        }
    }

    /// Name of the group this service is defined by, if any.
    pub fn group_name(&self) -> Option<&str> {
        match &self.selector {
            VsSelector::Group(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn real_server_count(&self) -> usize {
        self.real_servers.len()
    }
}

impl fmt::Display for VirtualServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)
    }
}
