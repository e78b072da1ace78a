//! SSL context builder. Repeated fields replace earlier ones.

use super::ParserContext;
use crate::topology::{SslContext, SslField};

/// `SSL`
pub(super) fn open(ctx: &mut ParserContext, _tokens: &[String]) {
    if ctx.topology.ssl.is_some() {
        ctx.diagnostics.warn(None, "SSL context already specified - replacing");
    }
    ctx.topology.ssl = Some(SslContext::default());
}

fn set(ctx: &mut ParserContext, tokens: &[String], field: SslField) {
    let Some(ssl) = ctx.topology.ssl.as_mut() else {
        return;
    };
    let label = field.label();
    let Some(value) = tokens.get(1) else {
        ctx.diagnostics.error(None, format!("SSL {} missing", label));
        return;
    };

    let slot = ssl.field_mut(field);
    if slot.is_some() {
        ctx.diagnostics
            .warn(Some(value.as_str()), format!("SSL {} already specified - replacing", label));
    }
    *slot = Some(value.clone());
}

pub(super) fn password(ctx: &mut ParserContext, tokens: &[String]) {
    set(ctx, tokens, SslField::Password);
}

pub(super) fn ca(ctx: &mut ParserContext, tokens: &[String]) {
    set(ctx, tokens, SslField::CaFile);
}

pub(super) fn certificate(ctx: &mut ParserContext, tokens: &[String]) {
    set(ctx, tokens, SslField::CertFile);
}

pub(super) fn key(ctx: &mut ParserContext, tokens: &[String]) {
    set(ctx, tokens, SslField::KeyFile);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserOptions;

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_certificate_replaced() {
        let mut ctx = ParserContext::new(ParserOptions::default());
        open(&mut ctx, &tokens("SSL"));
        certificate(&mut ctx, &tokens("certificate /etc/a.pem"));
        certificate(&mut ctx, &tokens("certificate /etc/b.pem"));

        let ssl = ctx.topology.ssl.as_ref().unwrap();
        assert_eq!(ssl.cert_file.as_deref(), Some("/etc/b.pem"));
        assert!(ctx.diagnostics.contains("SSL certfile already specified - replacing"));
        assert!(!ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_missing_value_and_second_block() {
        let mut ctx = ParserContext::new(ParserOptions::default());
        open(&mut ctx, &tokens("SSL"));
        key(&mut ctx, &tokens("key /etc/k.pem"));
        password(&mut ctx, &tokens("password"));
        assert!(ctx.diagnostics.contains("SSL password missing"));

        open(&mut ctx, &tokens("SSL"));
        ca(&mut ctx, &tokens("ca /etc/ca.pem"));
        let ssl = ctx.topology.ssl.as_ref().unwrap();
        assert_eq!(ssl.key_file, None);
        assert_eq!(ssl.ca_file.as_deref(), Some("/etc/ca.pem"));
        assert!(ctx.diagnostics.contains("SSL context already specified - replacing"));
    }
}
