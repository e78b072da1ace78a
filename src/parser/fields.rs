//! Single-directive field setters.
//!
//! Each helper parses one token, checks its range and reports through the
//! sink on failure. A `None` return means the caller must leave the field
//! untouched.

use std::time::Duration;

use crate::observability::{DiagnosticKind, Diagnostics, Severity};
use crate::topology::ServerTimers;

const MICROS_PER_SEC: u64 = 1_000_000;
const MAX_FRACTION_DIGITS: usize = 6;

/// Largest whole-second value a microsecond timer can hold; used where no
/// upper bound applies.
const UNBOUNDED_SECS: u64 = u64::MAX / MICROS_PER_SEC;

/// First argument of a directive, reporting when it is absent.
pub(super) fn arg<'a>(diags: &mut Diagnostics, tokens: &'a [String]) -> Option<&'a str> {
    match tokens.get(1) {
        Some(token) => Some(token.as_str()),
        None => {
            let keyword = tokens.first().map(String::as_str).unwrap_or("directive");
            diags.report(
                Severity::Error,
                DiagnosticKind::MissingParameter,
                Some(keyword),
                format!("{} missing parameter", keyword),
            );
            None
        }
    }
}

/// Report a number that failed to parse or fell outside its range.
pub(super) fn invalid_number(diags: &mut Diagnostics, token: &str, message: impl Into<String>) {
    diags.report(Severity::Error, DiagnosticKind::InvalidNumber, Some(token), message);
}

/// Decimal integer in `[min, max]`.
pub(super) fn parse_unsigned(token: &str, min: u64, max: u64) -> Option<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<u64>().ok().filter(|v| (min..=max).contains(v))
}

/// Decimal seconds with up to six fractional digits, in `[min_secs, max_secs]`.
pub(super) fn parse_timer(token: &str, min_secs: u64, max_secs: u64) -> Option<Duration> {
    let (whole, fraction) = match token.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (token, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > MAX_FRACTION_DIGITS
        || !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let secs = if whole.is_empty() { 0 } else { whole.parse::<u64>().ok()? };
    let micros = if fraction.is_empty() {
        0
    } else {
        let scale = 10u64.pow((MAX_FRACTION_DIGITS - fraction.len()) as u32);
        fraction.parse::<u64>().ok()? * scale
    };

    let total = secs.checked_mul(MICROS_PER_SEC)?.checked_add(micros)?;
    if total < min_secs * MICROS_PER_SEC || total > max_secs.saturating_mul(MICROS_PER_SEC) {
        return None;
    }
    Some(Duration::from_micros(total))
}

pub(super) fn parse_bool(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => Some(true),
        "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Boolean directive whose argument defaults to true.
pub(super) fn optional_bool(diags: &mut Diagnostics, tokens: &[String], what: &str) -> Option<bool> {
    let Some(token) = tokens.get(1) else {
        return Some(true);
    };
    match parse_bool(token) {
        Some(value) => Some(value),
        None => {
            diags.error(Some(token.as_str()), format!("Invalid {} parameter {}", what, token));
            None
        }
    }
}

/// Set a field that may only be given once; later values are ignored.
pub(super) fn set_once<T>(
    diags: &mut Diagnostics,
    slot: &mut Option<T>,
    value: T,
    token: &str,
    duplicate: impl FnOnce() -> String,
) {
    if slot.is_some() {
        diags.warn(Some(token), duplicate());
        return;
    }
    *slot = Some(value);
}

/// `connect_timeout`, `delay_loop`, `delay_before_retry`, `warmup` and
/// `retry`, shared by virtual and real servers.
pub(super) fn timer_directive(
    diags: &mut Diagnostics,
    timers: &mut ServerTimers,
    tokens: &[String],
    server: &str,
) {
    let Some(token) = arg(diags, tokens) else {
        return;
    };
    let max = u64::from(u32::MAX);

    match tokens[0].as_str() {
        "connect_timeout" => match parse_timer(token, 1, max) {
            Some(value) => timers.connect_timeout = Some(value),
            None => invalid_number(diags, token, format!("{} connect_timeout {} invalid - ignoring", server, token)),
        },
        "delay_loop" => match parse_timer(token, 1, UNBOUNDED_SECS) {
            Some(value) => timers.delay_loop = Some(value),
            None => invalid_number(diags, token, format!("{} delay_loop '{}' invalid - ignoring", server, token)),
        },
        "delay_before_retry" => match parse_timer(token, 0, UNBOUNDED_SECS) {
            Some(value) => timers.delay_before_retry = Some(value),
            None => invalid_number(
                diags,
                token,
                format!("{} delay_before_retry '{}' invalid - ignoring", server, token),
            ),
        },
        "warmup" => match parse_timer(token, 0, UNBOUNDED_SECS) {
            Some(value) => timers.warmup = Some(value),
            None => invalid_number(diags, token, format!("{} warmup '{}' invalid - ignoring", server, token)),
        },
        "retry" => match parse_unsigned(token, 1, max) {
            Some(value) => timers.retry = Some(value as u32),
            None => invalid_number(diags, token, format!("retry value invalid - {}", token)),
        },
        other => diags.error(Some(other), format!("{} is not a timer", other)),
    }
}
