//! Access: allow or deny clients by address
//!
//! ```text
//! Access Allow from 10.0.0.0/8 127.0.0.1
//! Access Deny from 192.168.1.13
//! Access Deny from all
//! ```
//!
//! A refused request gets 403 and the chain is aborted.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use http::StatusCode;

use super::ModuleArgs;
use crate::pipeline::{DirectiveOutcome, DirectivePair, PreDirective, RequestContext};

/// Single address or CIDR network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpRange {
    Any,
    Single(IpAddr),
    CidrV4 { network: Ipv4Addr, prefix_len: u8 },
    CidrV6 { network: Ipv6Addr, prefix_len: u8 },
}

impl IpRange {
    /// Parse `all`, an address, or `address/prefix`
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(IpRange::Any);
        }

        let Some((ip_str, prefix_str)) = s.split_once('/') else {
            return IpAddr::from_str(s)
                .map(IpRange::Single)
                .map_err(|_| format!("invalid address '{}'", s));
        };

        let prefix_len: u8 = prefix_str
            .parse()
            .map_err(|_| format!("invalid prefix in '{}'", s))?;

        if let Ok(ipv4) = Ipv4Addr::from_str(ip_str) {
            if prefix_len > 32 {
                return Err(format!("prefix too long in '{}'", s));
            }
            let network = Ipv4Addr::from(u32::from(ipv4) & v4_mask(prefix_len));
            Ok(IpRange::CidrV4 {
                network,
                prefix_len,
            })
        } else if let Ok(ipv6) = Ipv6Addr::from_str(ip_str) {
            if prefix_len > 128 {
                return Err(format!("prefix too long in '{}'", s));
            }
            let network = Ipv6Addr::from(u128::from(ipv6) & v6_mask(prefix_len));
            Ok(IpRange::CidrV6 {
                network,
                prefix_len,
            })
        } else {
            Err(format!("invalid address '{}'", ip_str))
        }
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        let ip = canonical(ip);
        match (self, &ip) {
            (IpRange::Any, _) => true,
            (IpRange::Single(range_ip), ip) => canonical(range_ip) == *ip,
            (
                IpRange::CidrV4 {
                    network,
                    prefix_len,
                },
                IpAddr::V4(ipv4),
            ) => u32::from(*ipv4) & v4_mask(*prefix_len) == u32::from(*network),
            (
                IpRange::CidrV6 {
                    network,
                    prefix_len,
                },
                IpAddr::V6(ipv6),
            ) => u128::from(*ipv6) & v6_mask(*prefix_len) == u128::from(*network),
            _ => false,
        }
    }
}

fn v4_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        !0u32 << (32 - prefix_len)
    }
}

fn v6_mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        !0u128 << (128 - prefix_len)
    }
}

/// IPv4-mapped IPv6 addresses compare as IPv4
fn canonical(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(*v6)),
        v4 => *v4,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    Allow,
    Deny,
}

pub fn build(args: &ModuleArgs) -> Result<DirectivePair, String> {
    let tokens = args.args();
    let policy = match tokens.first().map(|t| t.to_ascii_lowercase()) {
        Some(t) if t == "allow" => AccessPolicy::Allow,
        Some(t) if t == "deny" => AccessPolicy::Deny,
        _ => return Err("expected Allow or Deny".to_string()),
    };
    if !tokens.get(1).is_some_and(|t| t.eq_ignore_ascii_case("from")) {
        return Err("expected 'from' after the policy".to_string());
    }
    let ranges = tokens[2..]
        .iter()
        .map(|t| IpRange::parse(t))
        .collect::<Result<Vec<_>, _>>()?;
    if ranges.is_empty() {
        return Err("expected at least one host".to_string());
    }

    Ok(DirectivePair::new(
        args.id(),
        Some(Box::new(AccessRule { policy, ranges })),
        None,
    ))
}

#[derive(Debug)]
pub struct AccessRule {
    policy: AccessPolicy,
    ranges: Vec<IpRange>,
}

impl AccessRule {
    /// Unknown client addresses only match `all`
    fn matches(&self, remote: Option<IpAddr>) -> bool {
        self.ranges.iter().any(|range| match remote {
            Some(ip) => range.contains(&ip),
            None => *range == IpRange::Any,
        })
    }

    pub fn permits(&self, remote: Option<IpAddr>) -> bool {
        match self.policy {
            AccessPolicy::Allow => self.matches(remote),
            AccessPolicy::Deny => !self.matches(remote),
        }
    }
}

impl PreDirective for AccessRule {
    fn execute(&self, ctx: &mut RequestContext) -> DirectiveOutcome {
        let remote = ctx.request().remote_addr();
        if self.permits(remote) {
            return DirectiveOutcome::Continue;
        }
        tracing::info!(
            remote = ?remote,
            path = %ctx.request().path(),
            "Access refused"
        );
        ctx.response_mut()
            .send_error(StatusCode::FORBIDDEN, "Forbidden");
        DirectiveOutcome::Abort
    }
}
