//! Entity store for accepted topology entities.
//!
//! # Responsibilities
//! - Hold committed virtual servers, groups and the SSL context
//! - Preserve declaration order
//! - Tally process-wide flag usage (smtp alerts)

use serde::Serialize;

use crate::topology::{SslContext, VirtualServer, VirtualServerGroup};

/// The validated configuration model produced by a parse pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Topology {
    pub virtual_servers: Vec<VirtualServer>,
    pub groups: Vec<VirtualServerGroup>,
    pub ssl: Option<SslContext>,
    /// Number of `smtp_alert` directives seen on accepted or pending servers.
    pub smtp_alert_count: u32,
    /// Set once any `virtual_server` block was opened.
    pub has_checker_config: bool,
}

impl Topology {
    pub fn group(&self, name: &str) -> Option<&VirtualServerGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn real_server_count(&self) -> usize {
        self.virtual_servers.iter().map(VirtualServer::real_server_count).sum()
    }
}
