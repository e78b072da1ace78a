//! Virtual server builder.
//!
//! # Responsibilities
//! - Open a virtual server from its selector (address, fwmark or group)
//! - Apply service-level directives to the open virtual server
//! - Reconcile the address family and commit or drop at block close

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tracing::debug;

use super::fields::{self, arg, invalid_number, optional_bool, parse_unsigned, set_once};
use super::ParserContext;
use crate::observability::{DiagnosticKind, Diagnostics, Severity};
use crate::topology::virtual_server::{DEFAULT_PERSISTENCE_TIMEOUT, MAX_PERSISTENCE_TIMEOUT, NAME_FIELD_LEN};
use crate::topology::{
    parse_forwarding, AddressFamily, Granularity, NotifyScript, Protocol, SchedFlags, Scheduler,
    SorryServer, VirtualServer, VsSelector,
};

/// Largest weight the kernel accepts.
pub(super) const WEIGHT_LIMIT: u64 = i32::MAX as u64;

const UINT_MAX: u64 = u32::MAX as u64;

/// `virtual_server <ip> [port] | fwmark <mark> | group <name>`
pub(super) fn open(ctx: &mut ParserContext, tokens: &[String]) {
    ctx.topology.has_checker_config = true;

    let selector = match parse_selector(ctx, tokens) {
        Ok(selector) => selector,
        Err((token, message)) => {
            ctx.diagnostics.error(token.as_deref(), message);
            ctx.request_skip();
            return;
        }
    };

    if let VsSelector::Addr(addr) = &selector {
        if addr.is_ipv6() && !ctx.options.capabilities.ipv6 {
            ctx.diagnostics.report(
                Severity::Error,
                DiagnosticKind::Unsupported,
                Some(tokens[1].as_str()),
                "IPv6 virtual servers are not supported by this kernel interface",
            );
            ctx.request_skip();
            return;
        }
    }

    debug!(selector = %selector, "Virtual server opened");
    ctx.current_vs = Some(VirtualServer::new(selector));
}

type SelectorError = (Option<String>, String);

fn parse_selector(ctx: &ParserContext, tokens: &[String]) -> Result<VsSelector, SelectorError> {
    let first = tokens
        .get(1)
        .ok_or_else(|| (None, "virtual server requires an address, fwmark or group".to_string()))?;

    match first.as_str() {
        "fwmark" => {
            let token = tokens
                .get(2)
                .ok_or_else(|| (None, "virtual server fwmark missing".to_string()))?;
            ctx.options
                .resolve_fwmark(token)
                .map(VsSelector::Fwmark)
                .ok_or_else(|| (Some(token.clone()), format!("virtual server fwmark '{}' invalid", token)))
        }
        "group" => tokens
            .get(2)
            .map(|name| VsSelector::Group(name.clone()))
            .ok_or_else(|| (None, "virtual server group name missing".to_string())),
        addr => {
            let ip: IpAddr = addr
                .parse()
                .map_err(|_| (Some(addr.to_string()), format!("invalid virtual server address '{}'", addr)))?;
            let port = match tokens.get(2) {
                None => 0,
                Some(port) => port.parse::<u16>().map_err(|_| {
                    (Some(port.clone()), format!("invalid virtual server port '{}'", port))
                })?,
            };
            Ok(VsSelector::Addr(SocketAddr::new(ip, port)))
        }
    }
}

/// Block close: reconcile, then commit or drop.
pub(super) fn close(ctx: &mut ParserContext) {
    let Some(mut vs) = ctx.current_vs.take() else {
        return;
    };

    if vs.real_servers.is_empty() {
        ctx.diagnostics
            .error(None, format!("Virtual server {} has no real servers - ignoring", vs));
        debug!(selector = %vs, "Virtual server dropped");
        return;
    }

    resolve_family(
        &mut vs,
        ctx.options.capabilities.per_destination_family,
        &mut ctx.diagnostics,
    );

    if vs.family.is_none() {
        if let Some(group) = vs.group_name().and_then(|name| ctx.topology.group(name)) {
            vs.family = group.family();
        }
    }

    debug!(
        selector = %vs,
        family = ?vs.family,
        real_servers = vs.real_server_count(),
        "Virtual server committed"
    );
    ctx.topology.virtual_servers.push(vs);
}

/// Settle the address family of a virtual server from its attached servers.
///
/// A non-tunnelled sorry server decides (or is dropped on mismatch). A
/// virtual server still without a family and not defined by a group takes
/// the family its servers agree on, falling back to IPv4.
pub(super) fn resolve_family(vs: &mut VirtualServer, per_destination_family: bool, diags: &mut Diagnostics) {
    if let Some(sorry) = &vs.sorry_server {
        if !(per_destination_family && sorry.server.forwarding.is_tunnel()) {
            let family = sorry.family();
            match vs.family {
                None => vs.family = Some(family),
                Some(current) if current != family => {
                    diags.error(
                        None,
                        format!(
                            "Address family of virtual server and sorry server {} don't match - skipping sorry server.",
                            sorry.server.addr
                        ),
                    );
                    vs.sorry_server = None;
                }
                Some(_) => {}
            }
        }
    }

    if vs.family.is_some() || vs.group_name().is_some() {
        return;
    }

    // Only reachable when every server is tunnelled.
    let mut family = vs.sorry_server.as_ref().map(SorryServer::family);
    let mut mixed = false;
    for rs in &vs.real_servers {
        match family {
            None => family = Some(rs.family()),
            Some(current) if current != rs.family() => {
                mixed = true;
                break;
            }
            Some(_) => {}
        }
    }

    if mixed {
        diags.warn(
            None,
            format!("Virtual server {}: mixed address families encountered - defaulting to IPv4", vs),
        );
        family = None;
    }
    vs.family = Some(family.unwrap_or(AddressFamily::Inet));
}

/// `ip_family inet|inet6`
pub(super) fn ip_family(ctx: &mut ParserContext, tokens: &[String]) {
    let Some(word) = arg(&mut ctx.diagnostics, tokens) else {
        return;
    };
    let Some(family) = AddressFamily::from_keyword(word) else {
        ctx.diagnostics
            .error(Some(word), format!("unknown address family {}", word));
        return;
    };

    if family == AddressFamily::Inet6 && !ctx.options.capabilities.ipv6 {
        ctx.diagnostics.report(
            Severity::Error,
            DiagnosticKind::Unsupported,
            Some(word),
            "IPv6 virtual servers are not supported by this kernel interface",
        );
        ctx.current_vs = None;
        ctx.request_skip();
        return;
    }

    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    match vs.family {
        Some(current) if current != family => diags.error(
            Some(word),
            format!("Virtual server specified family {} conflicts with server family", word),
        ),
        _ => vs.family = Some(family),
    }
}

/// Timers shared with real servers.
pub(super) fn timer(ctx: &mut ParserContext, tokens: &[String]) {
    if let Some((vs, diags)) = ctx.virtual_server() {
        fields::timer_directive(diags, &mut vs.timers, tokens, "virtual server");
    }
}

/// `lb_algo` / `lvs_sched`
pub(super) fn scheduler(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(name) = arg(diags, tokens) else {
        return;
    };
    match name.parse::<Scheduler>() {
        Ok(scheduler) => vs.scheduler = Some(scheduler),
        Err(()) => diags.error(Some(name), format!("Invalid lvs_scheduler '{}' - ignoring", name)),
    }
}

/// Scheduler flag keywords. `sh-*` and `mh-*` only take effect when the
/// matching scheduler was set earlier in the block.
pub(super) fn sched_flag(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let keyword = tokens[0].as_str();

    let (flag, needs) = match keyword {
        "ops" => (SchedFlags::ONE_PACKET, None),
        "hashed" => {
            diags.warn(Some(keyword), "hashed is obsolete - ignoring");
            return;
        }
        "flag-1" => (SchedFlags::SCHED1, None),
        "flag-2" => (SchedFlags::SCHED2, None),
        "flag-3" => (SchedFlags::SCHED3, None),
        "sh-port" => (SchedFlags::SH_PORT, Some(Scheduler::Sh)),
        "sh-fallback" => (SchedFlags::SH_FALLBACK, Some(Scheduler::Sh)),
        "mh-port" => (SchedFlags::MH_PORT, Some(Scheduler::Mh)),
        "mh-fallback" => (SchedFlags::MH_FALLBACK, Some(Scheduler::Mh)),
        other => {
            diags.error(Some(other), format!("unknown scheduler flag {}", other));
            return;
        }
    };

    match (needs, vs.scheduler) {
        (None, _) => vs.sched_flags.insert(flag),
        (Some(required), Some(current)) if current == required => vs.sched_flags.insert(flag),
        // The other hashing scheduler: silently not applicable.
        (Some(_), Some(Scheduler::Sh | Scheduler::Mh)) => {}
        (Some(required), _) => diags.error(
            Some(keyword),
            format!("{} only applies to {} scheduler - ignoring", keyword, required),
        ),
    }
}

/// `lb_kind` / `lvs_method`
pub(super) fn forwarding(ctx: &mut ParserContext, tokens: &[String]) {
    let result = parse_forwarding(tokens, &ctx.options.capabilities, "virtual");
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    match result {
        Ok(forwarding) => vs.forwarding = forwarding,
        Err(err) => diags.error(err.token(), err.to_string()),
    }
}

pub(super) fn persistence_engine(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(name) = arg(diags, tokens) else {
        return;
    };

    let limit = NAME_FIELD_LEN - 1;
    let mut end = name.len().min(limit);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    if end < name.len() {
        diags.warn(Some(name), format!("persistence_name too long, truncating - {}", name));
    }
    vs.persistence.engine = Some(name[..end].to_string());
}

/// `persistence_timeout [secs]`; no argument means the default timeout.
pub(super) fn persistence_timeout(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(token) = tokens.get(1) else {
        vs.persistence.timeout = Some(DEFAULT_PERSISTENCE_TIMEOUT);
        return;
    };
    match parse_unsigned(token, 1, u64::from(MAX_PERSISTENCE_TIMEOUT)) {
        Some(timeout) => vs.persistence.timeout = Some(timeout as u32),
        None => invalid_number(diags, token, "persistence_timeout invalid"),
    }
}

/// `persistence_granularity <mask|prefix>`. An unresolved family is taken
/// from the shape of the value.
pub(super) fn persistence_granularity(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(token) = arg(diags, tokens) else {
        return;
    };

    let family = vs.family.unwrap_or(if token.contains('.') {
        AddressFamily::Inet
    } else {
        AddressFamily::Inet6
    });

    let granularity = match family {
        AddressFamily::Inet6 => match parse_unsigned(token, 1, 128) {
            Some(prefix) => Granularity::Ipv6Prefix(prefix as u8),
            None => {
                invalid_number(
                    diags,
                    token,
                    format!("Invalid IPv6 persistence_granularity specified - {}", token),
                );
                return;
            }
        },
        AddressFamily::Inet => match token.parse::<Ipv4Addr>() {
            Ok(mask) => Granularity::Ipv4Mask(mask),
            Err(_) => {
                diags.error(
                    Some(token),
                    format!("Invalid IPv4 persistence_granularity specified - {}", token),
                );
                return;
            }
        },
    };

    vs.persistence.granularity = Some(granularity);
    vs.family.get_or_insert(family);
    vs.persistence.timeout.get_or_insert(DEFAULT_PERSISTENCE_TIMEOUT);
}

pub(super) fn protocol(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(token) = arg(diags, tokens) else {
        return;
    };
    match token.parse::<Protocol>() {
        Ok(protocol) => vs.protocol = protocol,
        Err(()) => diags.error(Some(token), format!("Unknown protocol {} - ignoring", token)),
    }
}

/// Argument-less switches: `ha_suspend`, `alpha`, `omega`, `inhibit_on_failure`.
pub(super) fn switch(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, _)) = ctx.virtual_server() else {
        return;
    };
    match tokens[0].as_str() {
        "ha_suspend" => vs.ha_suspend = true,
        "alpha" => vs.alpha = true,
        "omega" => vs.omega = true,
        "inhibit_on_failure" => vs.inhibit_on_failure = true,
        _ => {}
    }
}

pub(super) fn smtp_alert(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    if let Some(enabled) = optional_bool(diags, tokens, "virtual_server smtp_alert") {
        vs.smtp_alert = Some(enabled);
        ctx.topology.smtp_alert_count += 1;
    }
}

pub(super) fn virtualhost(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(host) = tokens.get(1) else {
        diags.error(None, "virtual server virtualhost missing");
        return;
    };
    set_once(diags, &mut vs.virtualhost, host.clone(), host, || {
        format!("Duplicate vs virtualhost {} - ignoring", host)
    });
}

pub(super) fn snmp_name(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    if tokens.len() != 2 {
        diags.error(None, "virtual server snmp_name missing or extra parameters");
        return;
    }
    let name = &tokens[1];
    set_once(diags, &mut vs.snmp_name, name.clone(), name, || {
        format!("Duplicate vs snmp_name {} - ignoring", name)
    });
}

/// `quorum_up` / `quorum_down`; the script is every remaining token.
pub(super) fn quorum_script(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(first) = arg(diags, tokens) else {
        return;
    };
    let Some(script) = NotifyScript::from_args(&tokens[1..]) else {
        return;
    };

    let label = vs.to_string();
    let keyword = tokens[0].as_str();
    let slot = if keyword == "quorum_up" {
        &mut vs.quorum_up
    } else {
        &mut vs.quorum_down
    };
    set_once(diags, slot, script, first, || {
        format!("({}) {} script already specified - ignoring {}", label, keyword, first)
    });
}

/// `quorum`; an invalid value resets it to 1.
pub(super) fn quorum(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(token) = arg(diags, tokens) else {
        return;
    };
    match parse_unsigned(token, 1, UINT_MAX) {
        Some(quorum) => vs.quorum = quorum as u32,
        None => {
            invalid_number(
                diags,
                token,
                format!("Quorum {} must be in [1, {}]. Setting to 1.", token, UINT_MAX),
            );
            vs.quorum = 1;
        }
    }
}

pub(super) fn hysteresis(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(token) = arg(diags, tokens) else {
        return;
    };
    match parse_unsigned(token, 0, UINT_MAX) {
        Some(hysteresis) => vs.hysteresis = hysteresis as u32,
        None => invalid_number(
            diags,
            token,
            format!("Hysteresis {} must be in [0, {}] - ignoring", token, UINT_MAX),
        ),
    }
}

pub(super) fn weight(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(token) = arg(diags, tokens) else {
        return;
    };
    match parse_unsigned(token, 1, WEIGHT_LIMIT) {
        Some(weight) => vs.weight = weight as u32,
        None => invalid_number(
            diags,
            token,
            format!("Virtual server weight {} is outside range 1-{}", token, WEIGHT_LIMIT),
        ),
    }
}

/// `sorry_server <ip> [port]`
pub(super) fn sorry_server(ctx: &mut ParserContext, tokens: &[String]) {
    let ipv6 = ctx.options.capabilities.ipv6;
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(addr) = arg(diags, tokens) else {
        return;
    };
    let Some(addr) = super::real_server::parse_server_addr(diags, addr, tokens.get(2), "sorry") else {
        return;
    };

    if addr.is_ipv6() && !ipv6 {
        diags.report(
            Severity::Error,
            DiagnosticKind::Unsupported,
            Some(tokens[1].as_str()),
            "IPv6 sorry servers are not supported by this kernel interface",
        );
        return;
    }

    if vs.sorry_server.is_some() {
        diags.warn(Some(tokens[1].as_str()), "sorry server already specified - replacing");
    }
    vs.sorry_server = Some(SorryServer::new(addr, vs.forwarding));
}

pub(super) fn sorry_server_inhibit(ctx: &mut ParserContext, _tokens: &[String]) {
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    match vs.sorry_server.as_mut() {
        Some(sorry) => sorry.inhibit = true,
        None => diags.error(None, "Ignoring sorry_server inhibit used before or without sorry_server"),
    }
}

pub(super) fn sorry_server_forwarding(ctx: &mut ParserContext, tokens: &[String]) {
    let result = parse_forwarding(tokens, &ctx.options.capabilities, "sorry");
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };
    let Some(sorry) = vs.sorry_server.as_mut() else {
        diags.error(None, "sorry_server forwarding used without sorry_server");
        return;
    };
    match result {
        Ok(forwarding) => sorry.server.forwarding = forwarding,
        Err(err) => diags.error(err.token(), err.to_string()),
    }
}
