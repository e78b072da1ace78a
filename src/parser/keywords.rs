//! Keyword tree for the topology grammar.

use super::{group, real_server, ssl, virtual_server, ParserContext};
use crate::config::dispatch::{DispatchError, Keyword, KeywordTable};
use crate::config::Capabilities;

type Kw = Keyword<ParserContext>;

const TIMERS: [&str; 5] = ["retry", "delay_before_retry", "warmup", "connect_timeout", "delay_loop"];

/// Build the table; optional keywords follow the kernel capabilities.
pub(super) fn keyword_table(caps: &Capabilities) -> Result<KeywordTable<ParserContext>, DispatchError> {
    KeywordTable::new(vec![
        Kw::new("SSL", ssl::open).block(vec![
            Kw::new("password", ssl::password),
            Kw::new("ca", ssl::ca),
            Kw::new("certificate", ssl::certificate),
            Kw::new("key", ssl::key),
        ]),
        Kw::new("virtual_server_group", group::open)
            .values(group::entry)
            .on_close(group::close),
        Kw::new("virtual_server", virtual_server::open)
            .block(virtual_server_keywords(caps))
            .on_close(virtual_server::close),
    ])
}

fn virtual_server_keywords(caps: &Capabilities) -> Vec<Kw> {
    let mut keywords = vec![Kw::new("ip_family", virtual_server::ip_family)];
    keywords.extend(TIMERS.into_iter().map(|name| Kw::new(name, virtual_server::timer)));
    keywords.extend([
        Kw::new("inhibit_on_failure", virtual_server::switch),
        Kw::new("lb_algo", virtual_server::scheduler),
        Kw::new("lvs_sched", virtual_server::scheduler),
        Kw::new("hashed", virtual_server::sched_flag),
        Kw::new("ops", virtual_server::sched_flag),
    ]);

    if caps.sched_flags {
        keywords.extend(
            ["flag-1", "flag-2", "flag-3", "sh-port", "sh-fallback", "mh-port", "mh-fallback"]
                .into_iter()
                .map(|name| Kw::new(name, virtual_server::sched_flag)),
        );
    }

    keywords.extend([
        Kw::new("lb_kind", virtual_server::forwarding),
        Kw::new("lvs_method", virtual_server::forwarding),
        Kw::new("persistence_engine", virtual_server::persistence_engine),
        Kw::new("persistence_timeout", virtual_server::persistence_timeout),
        Kw::new("persistence_granularity", virtual_server::persistence_granularity),
        Kw::new("protocol", virtual_server::protocol),
        Kw::new("ha_suspend", virtual_server::switch),
        Kw::new("smtp_alert", virtual_server::smtp_alert),
        Kw::new("virtualhost", virtual_server::virtualhost),
    ]);

    if caps.snmp {
        keywords.push(Kw::new("snmp_name", virtual_server::snmp_name));
    }

    keywords.extend([
        Kw::new("alpha", virtual_server::switch),
        Kw::new("omega", virtual_server::switch),
        Kw::new("quorum_up", virtual_server::quorum_script),
        Kw::new("quorum_down", virtual_server::quorum_script),
        Kw::new("quorum", virtual_server::quorum),
        Kw::new("hysteresis", virtual_server::hysteresis),
        Kw::new("weight", virtual_server::weight),
        Kw::new("sorry_server", virtual_server::sorry_server),
        Kw::new("sorry_server_inhibit", virtual_server::sorry_server_inhibit),
        Kw::new("sorry_server_lvs_method", virtual_server::sorry_server_forwarding),
        Kw::new("real_server", real_server::open)
            .block(real_server_keywords(caps))
            .on_close(real_server::close),
    ]);

    keywords
}

fn real_server_keywords(caps: &Capabilities) -> Vec<Kw> {
    let mut keywords = vec![
        Kw::new("weight", real_server::weight),
        Kw::new("lvs_method", real_server::forwarding),
        Kw::new("uthreshold", real_server::threshold),
        Kw::new("lthreshold", real_server::threshold),
        Kw::new("inhibit_on_failure", real_server::flag),
        Kw::new("notify_up", real_server::notify),
        Kw::new("notify_down", real_server::notify),
        Kw::new("alpha", real_server::flag),
    ];
    keywords.extend(TIMERS.into_iter().map(|name| Kw::new(name, real_server::timer)));
    keywords.extend([
        Kw::new("smtp_alert", real_server::flag),
        Kw::new("virtualhost", real_server::virtualhost),
    ]);
    if caps.snmp {
        keywords.push(Kw::new("snmp_name", real_server::snmp_name));
    }
    keywords
}
