//! Real server builder.

use std::net::{IpAddr, SocketAddr};

use tracing::debug;

use super::fields::{self, arg, invalid_number, optional_bool, parse_unsigned, set_once};
use super::virtual_server::WEIGHT_LIMIT;
use super::ParserContext;
use crate::observability::{DiagnosticKind, Diagnostics, Severity};
use crate::topology::{parse_forwarding, NotifyScript, RealServer};

/// Parse `<ip> [port]` for a real or sorry server.
pub(super) fn parse_server_addr(
    diags: &mut Diagnostics,
    addr: &str,
    port: Option<&String>,
    server: &str,
) -> Option<SocketAddr> {
    let Ok(ip) = addr.parse::<IpAddr>() else {
        diags.error(Some(addr), format!("invalid {} server address '{}'", server, addr));
        return None;
    };
    let port = match port {
        None => 0,
        Some(port) => match port.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                diags.error(Some(port.as_str()), format!("invalid {} server port '{}'", server, port));
                return None;
            }
        },
    };
    Some(SocketAddr::new(ip, port))
}

/// `real_server <ip> [port]`
pub(super) fn open(ctx: &mut ParserContext, tokens: &[String]) {
    let ipv6 = ctx.options.capabilities.ipv6;
    let Some((vs, diags)) = ctx.virtual_server() else {
        ctx.request_skip();
        return;
    };
    let forwarding = vs.forwarding;

    let addr = arg(diags, tokens).and_then(|addr| parse_server_addr(diags, addr, tokens.get(2), "real"));
    let Some(addr) = addr else {
        ctx.request_skip();
        return;
    };

    if addr.is_ipv6() && !ipv6 {
        diags.report(
            Severity::Error,
            DiagnosticKind::Unsupported,
            Some(tokens[1].as_str()),
            "IPv6 real servers are not supported by this kernel interface",
        );
        ctx.request_skip();
        return;
    }

    ctx.current_rs = Some(RealServer::new(addr, forwarding));
}

/// Block close: attach to the open virtual server unless the families clash.
pub(super) fn close(ctx: &mut ParserContext) {
    let Some(rs) = ctx.current_rs.take() else {
        return;
    };
    let per_destination_family = ctx.options.capabilities.per_destination_family;
    let Some((vs, diags)) = ctx.virtual_server() else {
        return;
    };

    if !(per_destination_family && rs.forwarding.is_tunnel()) {
        match vs.family {
            None => vs.family = Some(rs.family()),
            Some(family) if family != rs.family() => {
                diags.error(
                    None,
                    format!(
                        "Address family of virtual server and real server {} don't match - skipping real server.",
                        rs.addr
                    ),
                );
                debug!(virtual_server = %vs, real_server = %rs.addr, "Real server dropped");
                return;
            }
            Some(_) => {}
        }
    }

    vs.real_servers.push(rs);
}

pub(super) fn weight(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((rs, diags)) = ctx.real_server() else {
        return;
    };
    let Some(token) = arg(diags, tokens) else {
        return;
    };
    match parse_unsigned(token, 0, WEIGHT_LIMIT) {
        Some(weight) => rs.set_weight(weight as u32),
        None => invalid_number(
            diags,
            token,
            format!("Real server weight {} is outside range 0-{}", token, WEIGHT_LIMIT),
        ),
    }
}

pub(super) fn forwarding(ctx: &mut ParserContext, tokens: &[String]) {
    let result = parse_forwarding(tokens, &ctx.options.capabilities, "real");
    let Some((rs, diags)) = ctx.real_server() else {
        return;
    };
    match result {
        Ok(forwarding) => rs.forwarding = forwarding,
        Err(err) => diags.error(err.token(), err.to_string()),
    }
}

/// `uthreshold` / `lthreshold`
pub(super) fn threshold(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((rs, diags)) = ctx.real_server() else {
        return;
    };
    let Some(token) = arg(diags, tokens) else {
        return;
    };
    let keyword = tokens[0].as_str();
    match parse_unsigned(token, 0, u64::from(u32::MAX)) {
        Some(value) if keyword == "uthreshold" => rs.upper_threshold = value as u32,
        Some(value) => rs.lower_threshold = value as u32,
        None => invalid_number(
            diags,
            token,
            format!("Invalid real_server {} '{}' - ignoring", keyword, token),
        ),
    }
}

pub(super) fn timer(ctx: &mut ParserContext, tokens: &[String]) {
    if let Some((rs, diags)) = ctx.real_server() {
        fields::timer_directive(diags, &mut rs.timers, tokens, "real server");
    }
}

/// `inhibit_on_failure`, `alpha`, `smtp_alert`, each with an optional bool.
pub(super) fn flag(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((rs, diags)) = ctx.real_server() else {
        return;
    };
    match tokens[0].as_str() {
        "inhibit_on_failure" => {
            if let Some(value) = optional_bool(diags, tokens, "inhibit_on_failure") {
                rs.inhibit_on_failure = value;
            }
        }
        "alpha" => {
            if let Some(value) = optional_bool(diags, tokens, "alpha") {
                rs.alpha = value;
            }
        }
        "smtp_alert" => {
            if let Some(value) = optional_bool(diags, tokens, "real_server smtp_alert") {
                rs.smtp_alert = Some(value);
                ctx.topology.smtp_alert_count += 1;
            }
        }
        _ => {}
    }
}

/// `notify_up` / `notify_down`
pub(super) fn notify(ctx: &mut ParserContext, tokens: &[String]) {
    let label = match ctx.current_vs.as_ref() {
        Some(vs) => vs.to_string(),
        None => return,
    };
    let Some((rs, diags)) = ctx.real_server() else {
        return;
    };
    let Some(first) = arg(diags, tokens) else {
        return;
    };
    let Some(script) = NotifyScript::from_args(&tokens[1..]) else {
        return;
    };

    let keyword = tokens[0].as_str();
    let slot = if keyword == "notify_up" {
        &mut rs.notify_up
    } else {
        &mut rs.notify_down
    };
    set_once(diags, slot, script, first, || {
        format!("({}) {} script already specified - ignoring {}", label, keyword, first)
    });
}

pub(super) fn virtualhost(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((rs, diags)) = ctx.real_server() else {
        return;
    };
    let Some(host) = tokens.get(1) else {
        diags.error(None, "real server virtualhost missing");
        return;
    };
    set_once(diags, &mut rs.virtualhost, host.clone(), host, || {
        format!("Duplicate rs virtualhost {} - ignoring", host)
    });
}

pub(super) fn snmp_name(ctx: &mut ParserContext, tokens: &[String]) {
    let Some((rs, diags)) = ctx.real_server() else {
        return;
    };
    if tokens.len() != 2 {
        diags.error(None, "real server snmp_name missing or extra parameters");
        return;
    }
    let name = &tokens[1];
    set_once(diags, &mut rs.snmp_name, name.clone(), name, || {
        format!("Duplicate rs snmp_name {} - ignoring", name)
    });
}
