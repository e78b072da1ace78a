//! Virtual server group builder.

use tracing::debug;

use super::ParserContext;
use crate::topology::{GroupEntry, VirtualServerGroup};

/// `virtual_server_group <name>`
pub(super) fn open(ctx: &mut ParserContext, tokens: &[String]) {
    match tokens.get(1) {
        Some(name) => ctx.current_vsg = Some(VirtualServerGroup::new(name.clone())),
        None => {
            ctx.diagnostics.error(None, "virtual server group name missing");
            ctx.request_skip();
        }
    }
}

/// One fwmark or address range line.
pub(super) fn entry(ctx: &mut ParserContext, tokens: &[String]) {
    let Some(vsg) = ctx.current_vsg.as_mut() else {
        return;
    };
    match GroupEntry::parse(tokens, &ctx.options) {
        Ok(entry) => vsg.add(entry),
        Err(err) => ctx.diagnostics.error(err.token(), err.to_string()),
    }
}

/// Block close: discard empty or ambiguous groups.
pub(super) fn close(ctx: &mut ParserContext) {
    let Some(vsg) = ctx.current_vsg.take() else {
        return;
    };

    if vsg.is_empty() {
        ctx.diagnostics.error(
            None,
            format!("virtual server group {} has no entries - removing", vsg.name),
        );
        return;
    }

    if vsg.is_ambiguous() {
        ctx.diagnostics.error(
            None,
            format!(
                "virtual server group {} cannot have IPv4, IPv6 and fwmark without family - removing",
                vsg.name
            ),
        );
        return;
    }

    debug!(
        group = %vsg.name,
        fwmarks = vsg.fwmarks().len(),
        ranges = vsg.ranges().len(),
        "Virtual server group committed"
    );
    ctx.topology.groups.push(vsg);
}
