use std::net::{IpAddr, Ipv6Addr};

use tracing::{debug, info, instrument};

use crate::errors::Error;
use crate::interfaces::address::{is_global_unicast, is_ipv4_mapped, is_unique_local};
use crate::interfaces::{InterfaceAddress, InterfaceSource, NetworkInterface};

/// Pick the host's public IPv6 address for external registration.
///
/// Returns `Ok(None)` when no interface carries an eligible address; only a
/// failure to enumerate interfaces at all is an error. When more than one
/// address is eligible the first one in enumeration order wins. That order
/// comes from the OS, so which of several eligible addresses gets picked is
/// arbitrary.
#[instrument(skip(source))]
pub fn select_public_ipv6<S>(source: &S) -> Result<Option<Ipv6Addr>, Error>
where
    S: InterfaceSource + ?Sized,
{
    let interfaces = source.interfaces()?;
    let selected = interfaces
        .iter()
        .filter(|iface| is_candidate_interface(iface))
        .flat_map(|iface| iface.addresses.iter())
        .find_map(eligible_ipv6);

    match selected {
        Some(addr) => info!("selected public IPv6 address {}", addr),
        None => info!("no public IPv6 address on this host"),
    }
    Ok(selected)
}

fn is_candidate_interface(iface: &NetworkInterface) -> bool {
    let flags = iface.flags;
    if flags.loopback || !flags.up || !flags.running {
        debug!("skipping interface {} ({:?})", iface.name, flags);
        return false;
    }
    true
}

fn eligible_ipv6(address: &InterfaceAddress) -> Option<Ipv6Addr> {
    let addr = match address {
        InterfaceAddress::Inet(IpAddr::V6(addr)) => *addr,
        InterfaceAddress::Inet(IpAddr::V4(_)) => return None,
        InterfaceAddress::Unrecognized(entry) => {
            debug!("skipping unrecognized address entry {}", entry);
            return None;
        }
    };

    if is_ipv4_mapped(&addr) || !is_global_unicast(&addr) {
        return None;
    }
    // ULAs pass the global unicast check
    if is_unique_local(&addr) {
        return None;
    }
    Some(addr)
}
