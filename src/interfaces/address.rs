//! Pure classification of IPv6 addresses.
//!
//! The standard library's scope helpers for IPv6 are still unstable, so the
//! ranges the selector cares about are spelled out here as `Ipv6Net`s.

use ipnet::Ipv6Net;
use lazy_static::lazy_static;
use std::net::Ipv6Addr;

lazy_static! {
    static ref LINK_LOCAL_UNICAST: Ipv6Net = "fe80::/10".parse().expect("valid link-local prefix");
    static ref UNIQUE_LOCAL: Ipv6Net = "fc00::/7".parse().expect("valid unique-local prefix");
    static ref MULTICAST: Ipv6Net = "ff00::/8".parse().expect("valid multicast prefix");
}

/// `::ffff:a.b.c.d`, an IPv4 address in IPv6 form
pub fn is_ipv4_mapped(addr: &Ipv6Addr) -> bool {
    addr.to_ipv4_mapped().is_some()
}

pub fn is_link_local_unicast(addr: &Ipv6Addr) -> bool {
    LINK_LOCAL_UNICAST.contains(addr)
}

/// Unique local addresses (RFC 4193). These are private to a site even though
/// they pass [`is_global_unicast`].
pub fn is_unique_local(addr: &Ipv6Addr) -> bool {
    UNIQUE_LOCAL.contains(addr)
}

/// Anything that is not unspecified, loopback, multicast or link-local.
pub fn is_global_unicast(addr: &Ipv6Addr) -> bool {
    !addr.is_unspecified()
        && !addr.is_loopback()
        && !MULTICAST.contains(addr)
        && !is_link_local_unicast(addr)
}
