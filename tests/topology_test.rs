//! End-to-end topology parsing tests.

use std::net::Ipv4Addr;

use lvs_topology::observability::DiagnosticKind;
use lvs_topology::topology::{
    AddressFamily, Forwarding, Granularity, SchedFlags, Scheduler, Tunnel, TunnelKind, VsSelector,
};
use lvs_topology::ParserOptions;

mod common;

#[test]
fn test_virtual_server_without_real_servers_dropped() {
    let outcome = common::parse(
        r#"
virtual_server 10.0.0.1 80 {
    lb_algo rr
}
"#,
    );
    assert!(outcome.topology.virtual_servers.is_empty());
    assert!(common::mentions(&outcome, "Virtual server 10.0.0.1:80 has no real servers - ignoring"));
    assert!(outcome.topology.has_checker_config);
}

#[test]
fn test_full_virtual_server() {
    let outcome = common::parse(
        r#"
# web tier
virtual_server 192.168.1.10 443 {
    delay_loop 6
    lb_algo wlc
    lb_kind DR
    persistence_timeout 600
    protocol tcp
    quorum 2
    hysteresis 1
    alpha
    omega
    virtualhost "www.example.com"

    real_server 10.0.0.1 443 {
        weight 5
        uthreshold 1000
        notify_down /usr/local/bin/rs_down.sh 10.0.0.1
    }
    real_server 10.0.0.2 443 {
        weight 3
        inhibit_on_failure
    }
}
"#,
    );
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);

    let vs = &outcome.topology.virtual_servers[0];
    assert_eq!(vs.family, Some(AddressFamily::Inet));
    assert_eq!(vs.scheduler, Some(Scheduler::Wlc));
    assert_eq!(vs.forwarding, Forwarding::DirectRoute);
    assert_eq!(vs.persistence.timeout, Some(600));
    assert_eq!(vs.quorum, 2);
    assert!(vs.alpha && vs.omega);
    assert_eq!(vs.virtualhost.as_deref(), Some("www.example.com"));

    assert_eq!(vs.real_server_count(), 2);
    let first = &vs.real_servers[0];
    assert_eq!(first.initial_weight, 5);
    assert_eq!(first.forwarding, Forwarding::DirectRoute);
    assert_eq!(
        first.notify_down.as_ref().unwrap().command,
        vec!["/usr/local/bin/rs_down.sh", "10.0.0.1"]
    );
    assert!(vs.real_servers[1].inhibit_on_failure);
    assert_eq!(outcome.topology.real_server_count(), 2);
}

#[test]
fn test_gue_port_truth_table() {
    let outcome = common::parse(
        r#"
virtual_server 10.0.0.1 80 {
    real_server 10.0.1.1 80 {
        lvs_method TUN type gue port 6080
    }
    real_server 10.0.1.2 80 {
        lvs_method TUN type gue
    }
    real_server 10.0.1.3 80 {
        lvs_method TUN type ipip port 6080
    }
    real_server 10.0.1.4 80 {
        lvs_method TUN type ipip
    }
}
"#,
    );
    let rs = &outcome.topology.virtual_servers[0].real_servers;
    assert_eq!(rs.len(), 4);
    assert_eq!(
        rs[0].forwarding,
        Forwarding::Tunnel(Tunnel {
            kind: TunnelKind::Gue { port: 6080 },
            ..Tunnel::default()
        })
    );
    // rejected directives leave the inherited method in place
    assert_eq!(rs[1].forwarding, Forwarding::Nat);
    assert_eq!(rs[2].forwarding, Forwarding::Nat);
    assert_eq!(rs[3].forwarding, Forwarding::Tunnel(Tunnel::default()));

    assert_eq!(common::errors(&outcome).len(), 2);
    assert!(common::mentions(&outcome, "gue tunnels require port, otherwise cannot have port"));
}

#[test]
fn test_tunnel_options_accepted_after_direct_route() {
    let outcome = common::parse(
        r#"
virtual_server 10.0.0.1 80 {
    lb_kind DR nocsum
    real_server 10.0.1.1 80 {
        lvs_method DR type gue port 6080
    }
    real_server 10.0.1.2 80 {
        lvs_method NAT type ipip csum
    }
}
"#,
    );
    let vs = &outcome.topology.virtual_servers[0];
    assert_eq!(vs.forwarding, Forwarding::DirectRoute);
    assert_eq!(vs.real_servers[0].forwarding, Forwarding::DirectRoute);
    // invalid pairing keeps the inherited DR
    assert_eq!(vs.real_servers[1].forwarding, Forwarding::DirectRoute);
    assert_eq!(common::errors(&outcome).len(), 1);
    assert!(common::mentions(&outcome, "ipip tunnels do not support checksum option"));
}

#[test]
fn test_fwmark_adopts_plain_sorry_server_family() {
    let outcome = common::parse(
        r#"
virtual_server fwmark 8 {
    lvs_method TUN
    sorry_server 2001:db8::9 80
    sorry_server_lvs_method NAT
    real_server 10.0.0.1 80 { }
}
"#,
    );
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    let vs = &outcome.topology.virtual_servers[0];
    assert_eq!(vs.family, Some(AddressFamily::Inet6));
    assert!(vs.sorry_server.is_some());
    assert_eq!(vs.real_server_count(), 1);
}

#[test]
fn test_tunnelled_sorry_server_and_real_server_mix_to_ipv4() {
    let outcome = common::parse(
        r#"
virtual_server fwmark 9 {
    lvs_method TUN
    sorry_server 2001:db8::9 80
    real_server 10.0.0.1 80 { }
}
"#,
    );
    let vs = &outcome.topology.virtual_servers[0];
    assert_eq!(vs.family, Some(AddressFamily::Inet));
    assert!(vs.sorry_server.is_some());
    assert!(common::mentions(&outcome, "mixed address families encountered - defaulting to IPv4"));
}

#[test]
fn test_mismatched_real_server_family_dropped() {
    let outcome = common::parse(
        r#"
virtual_server fwmark 5 {
    real_server 10.0.1.1 80 {
    }
    real_server 2001:db8::1 80 {
    }
}
"#,
    );
    let vs = &outcome.topology.virtual_servers[0];
    assert_eq!(vs.family, Some(AddressFamily::Inet));
    assert_eq!(vs.real_server_count(), 1);
    assert!(common::mentions(
        &outcome,
        "Address family of virtual server and real server [2001:db8::1]:80 don't match - skipping real server."
    ));
}

#[test]
fn test_all_tunnelled_fwmark_defaults_to_ipv4() {
    let outcome = common::parse(
        r#"
virtual_server fwmark 5 {
    lvs_method TUN
    real_server 2001:db8::1 80 {
    }
    real_server 10.0.0.1 80 {
    }
}
"#,
    );
    let vs = &outcome.topology.virtual_servers[0];
    assert_eq!(vs.family, Some(AddressFamily::Inet));
    assert_eq!(vs.real_server_count(), 2);
    assert!(common::mentions(&outcome, "mixed address families encountered"));
}

#[test]
fn test_tunnelled_family_checked_without_per_destination_support() {
    let mut options = ParserOptions::default();
    options.capabilities.per_destination_family = false;
    let outcome = common::parse_with(
        r#"
virtual_server 10.0.0.1 80 {
    lvs_method TUN
    real_server 2001:db8::1 80 {
    }
    real_server 10.0.0.2 80 {
    }
}
"#,
        options,
    );
    assert_eq!(outcome.topology.virtual_servers[0].real_server_count(), 1);
}

#[test]
fn test_persistence_granularity_sets_family() {
    let outcome = common::parse(
        r#"
virtual_server fwmark 1 {
    persistence_granularity 255.255.0.0
    real_server 10.0.0.1 80 { }
}
virtual_server fwmark 2 {
    persistence_granularity 64
    real_server 2001:db8::1 80 { }
}
"#,
    );
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);

    let v4 = &outcome.topology.virtual_servers[0];
    assert_eq!(v4.family, Some(AddressFamily::Inet));
    assert_eq!(
        v4.persistence.granularity,
        Some(Granularity::Ipv4Mask(Ipv4Addr::new(255, 255, 0, 0)))
    );
    assert_eq!(v4.persistence.timeout, Some(360));

    let v6 = &outcome.topology.virtual_servers[1];
    assert_eq!(v6.family, Some(AddressFamily::Inet6));
    assert_eq!(v6.persistence.granularity, Some(Granularity::Ipv6Prefix(64)));
}

#[test]
fn test_groups() {
    let outcome = common::parse(
        r#"
virtual_server_group empty {
}
virtual_server_group marks {
    fwmark 1
    fwmark 2
}
virtual_server_group web {
    192.168.1.10-20 80
    192.168.2.1 80
}
"#,
    );
    let names: Vec<_> = outcome.topology.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["marks", "web"]);
    assert!(common::mentions(&outcome, "virtual server group empty has no entries - removing"));
    assert_eq!(outcome.topology.groups[1].ranges()[0].address_count(), 11);
}

#[test]
fn test_group_virtual_server_adopts_group_family() {
    let outcome = common::parse(
        r#"
virtual_server_group v6 {
    2001:db8::10-1f 80
}
virtual_server group v6 {
    lvs_method TUN
    real_server 10.0.0.1 80 { }
}
virtual_server group unknown {
    lvs_method TUN
    real_server 10.0.0.1 80 { }
}
"#,
    );
    let servers = &outcome.topology.virtual_servers;
    assert_eq!(servers[0].selector, VsSelector::Group("v6".into()));
    assert_eq!(servers[0].family, Some(AddressFamily::Inet6));
    assert_eq!(servers[1].family, None);
}

#[test]
fn test_ssl_certificate_replaced() {
    let outcome = common::parse(
        r#"
SSL {
    certificate /etc/ssl/a.pem
    certificate /etc/ssl/b.pem
    key /etc/ssl/key.pem
}
"#,
    );
    let ssl = outcome.topology.ssl.as_ref().unwrap();
    assert_eq!(ssl.cert_file.as_deref(), Some("/etc/ssl/b.pem"));
    assert_eq!(ssl.key_file.as_deref(), Some("/etc/ssl/key.pem"));
    assert!(common::mentions(&outcome, "SSL certfile already specified - replacing"));
}

#[test]
fn test_sh_port_before_scheduler_has_no_effect() {
    let outcome = common::parse(
        r#"
virtual_server 10.0.0.1 80 {
    sh-port
    lb_algo sh
    real_server 10.0.0.2 80 { }
}
virtual_server 10.0.0.1 81 {
    lb_algo sh
    sh-port
    sh-fallback
    real_server 10.0.0.2 81 { }
}
"#,
    );
    let servers = &outcome.topology.virtual_servers;
    assert!(servers[0].sched_flags.is_empty());
    assert!(servers[1].sched_flags.contains(SchedFlags::SH_PORT));
    assert!(servers[1].sched_flags.contains(SchedFlags::SH_FALLBACK));
    assert!(common::mentions(&outcome, "sh-port only applies to sh scheduler - ignoring"));
}

#[test]
fn test_ipv6_unsupported_skips_block() {
    let mut options = ParserOptions::default();
    options.capabilities.ipv6 = false;
    let outcome = common::parse_with(
        r#"
virtual_server fwmark 1 {
    ip_family inet6
    real_server 10.0.0.1 80 {
        weight 2
    }
}
virtual_server 10.0.0.2 80 {
    real_server 10.0.0.3 80 { }
}
"#,
        options,
    );
    assert_eq!(outcome.topology.virtual_servers.len(), 1);
    assert_eq!(
        outcome.topology.virtual_servers[0].selector,
        VsSelector::Addr("10.0.0.2:80".parse().unwrap())
    );
    let unsupported: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Unsupported)
        .collect();
    assert_eq!(unsupported.len(), 1);
    assert_eq!(unsupported[0].line, Some(3));
}

#[test]
fn test_checker_blocks_skipped() {
    let outcome = common::parse(
        r#"
virtual_server 10.0.0.1 80 {
    real_server 10.0.0.2 80 {
        weight 3
        HTTP_GET {
            url {
                path /
            }
        }
        alpha
    }
}
"#,
    );
    let rs = &outcome.topology.virtual_servers[0].real_servers[0];
    assert_eq!(rs.initial_weight, 3);
    assert!(rs.alpha);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::UnknownKeyword);
}

#[test]
fn test_unclosed_blocks_still_commit() {
    let outcome = common::parse("virtual_server 10.0.0.1 80 {\n    real_server 10.0.0.2 80 {\n");
    assert_eq!(outcome.topology.virtual_servers.len(), 1);
    assert_eq!(outcome.topology.virtual_servers[0].real_server_count(), 1);
    assert_eq!(
        outcome
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::MissingBlockClose)
            .count(),
        2
    );
}

#[test]
fn test_sorry_server_family_mismatch_drops_sorry_server() {
    let outcome = common::parse(
        r#"
virtual_server 10.0.0.1 80 {
    sorry_server 2001:db8::9 80
    sorry_server_inhibit
    real_server 10.0.0.2 80 { }
}
"#,
    );
    let vs = &outcome.topology.virtual_servers[0];
    assert!(vs.sorry_server.is_none());
    assert_eq!(vs.real_server_count(), 1);
    assert!(common::mentions(&outcome, "skipping sorry server"));
}

#[test]
fn test_symbolic_fwmark_and_smtp_tally() {
    let mut options = ParserOptions::default();
    options.fwmarks.insert("web".into(), 10);
    let outcome = common::parse_with(
        r#"
virtual_server fwmark web {
    smtp_alert
    real_server 10.0.0.2 80 {
        smtp_alert off
    }
}
"#,
        options,
    );
    let vs = &outcome.topology.virtual_servers[0];
    assert_eq!(vs.selector, VsSelector::Fwmark(10));
    assert_eq!(vs.smtp_alert, Some(true));
    assert_eq!(vs.real_servers[0].smtp_alert, Some(false));
    assert_eq!(outcome.topology.smtp_alert_count, 2);
}

#[test]
fn test_snmp_name_needs_capability() {
    let text = r#"
virtual_server 10.0.0.1 80 {
    snmp_name web
    real_server 10.0.0.2 80 { }
}
"#;
    let outcome = common::parse(text);
    assert_eq!(outcome.topology.virtual_servers[0].snmp_name, None);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::UnknownKeyword);

    let mut options = ParserOptions::default();
    options.capabilities.snmp = true;
    let outcome = common::parse_with(text, options);
    assert_eq!(outcome.topology.virtual_servers[0].snmp_name.as_deref(), Some("web"));
}

#[test]
fn test_diagnostics_carry_line_numbers() {
    let outcome = common::parse("virtual_server 10.0.0.1 80 {\n    lb_algo bogus\n    real_server 10.0.0.2 80 { }\n}\n");
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].line, Some(2));
    assert_eq!(outcome.diagnostics[0].token.as_deref(), Some("bogus"));
    assert!(outcome.has_errors());
}

#[test]
fn test_outcome_serializes_to_json() {
    let outcome = common::parse(
        "virtual_server 10.0.0.1 80 {\n    lb_kind TUN type gue port 5555\n    real_server 10.0.0.2 80 { }\n}\n",
    );
    let json = serde_json::to_value(&outcome).unwrap();
    let vs = &json["topology"]["virtual_servers"][0];
    assert_eq!(vs["family"], "inet");
    assert_eq!(vs["forwarding"]["method"], "tunnel");
    assert_eq!(vs["real_servers"][0]["addr"], "10.0.0.2:80");
}
