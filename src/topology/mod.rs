//! Load-balancer topology model.
//!
//! # Data Flow
//! ```text
//! parser builders (one open entity per level)
//!     → virtual_server.rs / real_server.rs / group.rs / ssl.rs (entities)
//!     → forwarding.rs (method + tunnel sub-grammar)
//!     → store.rs (Topology: accepted entities, declaration order)
//! ```
//!
//! # Design Decisions
//! - Entities are plain owned values; the builder owns them until commit
//! - Forwarding is a tagged variant, so invalid tunnel combinations
//!   cannot be represented
//! - An unresolved address family is `None`, never a sentinel

pub mod family;
pub mod forwarding;
pub mod group;
pub mod real_server;
pub mod ssl;
pub mod store;
pub mod virtual_server;

pub use family::AddressFamily;
pub use forwarding::{parse_forwarding, Checksum, Forwarding, ForwardingError, Tunnel, TunnelKind};
pub use group::{AddrRange, FwmarkEntry, GroupEntry, GroupEntryError, VirtualServerGroup};
pub use real_server::{NotifyScript, RealServer, ServerTimers, SorryServer};
pub use ssl::{SslContext, SslField};
pub use store::Topology;
pub use virtual_server::{
    Granularity, Persistence, Protocol, SchedFlags, Scheduler, VirtualServer, VsSelector,
};
