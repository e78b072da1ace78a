//! Virtual server groups.
//!
//! A group is a named set of fwmarks and address ranges that share one
//! virtual server definition. The group remembers which families its
//! entries carry so ambiguous groups can be rejected when the block ends.

use serde::Serialize;
use std::net::IpAddr;
use thiserror::Error;

use crate::config::ParserOptions;
use crate::topology::AddressFamily;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FwmarkEntry {
    pub mark: u32,
    pub family: Option<AddressFamily>,
}

/// `start` through `start` with its last component replaced by `end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddrRange {
    pub start: IpAddr,
    /// Last octet (IPv4) or last 16-bit group (IPv6) of the range, if a range.
    pub end: Option<u16>,
    pub port: u16,
}

impl AddrRange {
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.start)
    }

    /// Number of addresses covered.
    pub fn address_count(&self) -> u32 {
        match self.end {
            Some(end) => u32::from(end) - last_component(&self.start) + 1,
            None => 1,
        }
    }
}

/// Why a group entry line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupEntryError {
    #[error("virtual server group fwmark missing")]
    MissingFwmark,

    #[error("virtual server group fwmark '{0}' invalid")]
    InvalidFwmark(String),

    #[error("virtual server group fwmark family '{0}' unknown")]
    UnknownFamily(String),

    #[error("invalid virtual server group address '{0}'")]
    InvalidAddress(String),

    #[error("virtual server group range end '{0}' invalid")]
    InvalidRangeEnd(String),

    #[error("invalid virtual server group port '{0}'")]
    InvalidPort(String),

    #[error("unexpected parameter '{0}' in virtual server group entry")]
    ExtraParameter(String),
}

impl GroupEntryError {
    pub fn token(&self) -> Option<&str> {
        match self {
            GroupEntryError::MissingFwmark => None,
            GroupEntryError::InvalidFwmark(t)
            | GroupEntryError::UnknownFamily(t)
            | GroupEntryError::InvalidAddress(t)
            | GroupEntryError::InvalidRangeEnd(t)
            | GroupEntryError::InvalidPort(t)
            | GroupEntryError::ExtraParameter(t) => Some(t.as_str()),
        }
    }
}

/// One parsed group entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEntry {
    Fwmark(FwmarkEntry),
    Range(AddrRange),
}

impl GroupEntry {
    /// Parse one line of a group block.
    pub fn parse(tokens: &[String], options: &ParserOptions) -> Result<Self, GroupEntryError> {
        match tokens.first().map(String::as_str) {
            Some("fwmark") => parse_fwmark(&tokens[1..], options).map(GroupEntry::Fwmark),
            Some(_) => parse_range(tokens).map(GroupEntry::Range),
            None => Err(GroupEntryError::InvalidAddress(String::new())),
        }
    }
}

fn parse_fwmark(args: &[String], options: &ParserOptions) -> Result<FwmarkEntry, GroupEntryError> {
    let token = args.first().ok_or(GroupEntryError::MissingFwmark)?;
    let mark = options
        .resolve_fwmark(token)
        .ok_or_else(|| GroupEntryError::InvalidFwmark(token.clone()))?;

    let family = match args.get(1) {
        None => None,
        Some(word) => Some(
            AddressFamily::from_keyword(word)
                .ok_or_else(|| GroupEntryError::UnknownFamily(word.clone()))?,
        ),
    };

    if let Some(extra) = args.get(2) {
        return Err(GroupEntryError::ExtraParameter(extra.clone()));
    }

    Ok(FwmarkEntry { mark, family })
}

fn parse_range(tokens: &[String]) -> Result<AddrRange, GroupEntryError> {
    let spec = &tokens[0];
    let (addr_str, end_str) = match spec.split_once('-') {
        Some((addr, end)) => (addr, Some(end)),
        None => (spec.as_str(), None),
    };

    let start: IpAddr = addr_str
        .parse()
        .map_err(|_| GroupEntryError::InvalidAddress(spec.clone()))?;

    let end = match end_str {
        None => None,
        Some(end_str) => {
            let (parsed, max) = match start {
                IpAddr::V4(_) => (end_str.parse::<u32>().ok(), 0xff),
                IpAddr::V6(_) => (u32::from_str_radix(end_str, 16).ok(), 0xffff),
            };
            let end = parsed
                .filter(|end| *end <= max && *end >= last_component(&start))
                .ok_or_else(|| GroupEntryError::InvalidRangeEnd(end_str.to_string()))?;
            Some(end as u16)
        }
    };

    let port = match tokens.get(1) {
        None => 0,
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| GroupEntryError::InvalidPort(port.clone()))?,
    };

    if let Some(extra) = tokens.get(2) {
        return Err(GroupEntryError::ExtraParameter(extra.clone()));
    }

    Ok(AddrRange { start, end, port })
}

fn last_component(addr: &IpAddr) -> u32 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4.octets()[3]),
        IpAddr::V6(v6) => u32::from(v6.segments()[7]),
    }
}

/// A named collection of fwmarks and address ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualServerGroup {
    pub name: String,
    fwmarks: Vec<FwmarkEntry>,
    ranges: Vec<AddrRange>,
    have_ipv4: bool,
    have_ipv6: bool,
    fwmark_no_family: bool,
}

impl VirtualServerGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fwmarks: Vec::new(),
            ranges: Vec::new(),
            have_ipv4: false,
            have_ipv6: false,
            fwmark_no_family: false,
        }
    }

    pub fn add(&mut self, entry: GroupEntry) {
        match entry {
            GroupEntry::Fwmark(fwmark) => {
                match fwmark.family {
                    Some(family) => self.note_family(family),
                    None => self.fwmark_no_family = true,
                }
                self.fwmarks.push(fwmark);
            }
            GroupEntry::Range(range) => {
                self.note_family(range.family());
                self.ranges.push(range);
            }
        }
    }

    fn note_family(&mut self, family: AddressFamily) {
        match family {
            AddressFamily::Inet => self.have_ipv4 = true,
            AddressFamily::Inet6 => self.have_ipv6 = true,
        }
    }

    pub fn fwmarks(&self) -> &[FwmarkEntry] {
        &self.fwmarks
    }

    pub fn ranges(&self) -> &[AddrRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.fwmarks.is_empty() && self.ranges.is_empty()
    }

    pub fn have_ipv4(&self) -> bool {
        self.have_ipv4
    }

    pub fn have_ipv6(&self) -> bool {
        self.have_ipv6
    }

    pub fn fwmark_no_family(&self) -> bool {
        self.fwmark_no_family
    }

    /// IPv4, IPv6 and a family-less fwmark together cannot be resolved.
    pub fn is_ambiguous(&self) -> bool {
        self.have_ipv4 && self.have_ipv6 && self.fwmark_no_family
    }

    /// The single family every entry agrees on, if there is one.
    pub fn family(&self) -> Option<AddressFamily> {
        if self.fwmark_no_family {
            return None;
        }
        match (self.have_ipv4, self.have_ipv6) {
            (true, false) => Some(AddressFamily::Inet),
            (false, true) => Some(AddressFamily::Inet6),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(line: &str) -> Result<GroupEntry, GroupEntryError> {
        let tokens: Vec<String> = line.split_whitespace().map(String::from).collect();
        GroupEntry::parse(&tokens, &ParserOptions::default())
    }

    #[test]
    fn test_parse_ipv4_range() {
        let GroupEntry::Range(range) = entry("192.168.1.10-20 80").unwrap() else {
            panic!("expected range");
        };
        assert_eq!(range.end, Some(20));
        assert_eq!(range.port, 80);
        assert_eq!(range.address_count(), 11);
        assert_eq!(range.family(), AddressFamily::Inet);
    }

    #[test]
    fn test_parse_ipv6_range_hex_end() {
        let GroupEntry::Range(range) = entry("2001:db8::10-1f 443").unwrap() else {
            panic!("expected range");
        };
        assert_eq!(range.end, Some(0x1f));
        assert_eq!(range.address_count(), 16);
    }

    #[test]
    fn test_bad_entries() {
        assert_eq!(entry("10.0.0.5-4 80"), Err(GroupEntryError::InvalidRangeEnd("4".into())));
        assert_eq!(entry("10.0.0.5-256"), Err(GroupEntryError::InvalidRangeEnd("256".into())));
        assert_eq!(entry("nothost 80"), Err(GroupEntryError::InvalidAddress("nothost".into())));
        assert_eq!(entry("10.0.0.1 http"), Err(GroupEntryError::InvalidPort("http".into())));
        assert_eq!(entry("fwmark"), Err(GroupEntryError::MissingFwmark));
        assert_eq!(entry("fwmark 1 inet5"), Err(GroupEntryError::UnknownFamily("inet5".into())));
    }

    #[test]
    fn test_family_tracking() {
        let mut vsg = VirtualServerGroup::new("g");
        assert!(vsg.is_empty());

        vsg.add(entry("fwmark 3").unwrap());
        assert!(vsg.fwmark_no_family());
        assert_eq!(vsg.family(), None);
        assert!(!vsg.is_ambiguous());

        vsg.add(entry("10.0.0.1 80").unwrap());
        vsg.add(entry("fwmark 4 inet6").unwrap());
        assert!(vsg.have_ipv4() && vsg.have_ipv6());
        assert!(vsg.is_ambiguous());
    }

    #[test]
    fn test_single_family() {
        let mut vsg = VirtualServerGroup::new("g");
        vsg.add(entry("2001:db8::1 80").unwrap());
        vsg.add(entry("fwmark 9 inet6").unwrap());
        assert_eq!(vsg.family(), Some(AddressFamily::Inet6));
    }
}
