use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};

use nix::ifaddrs::{InterfaceAddress as IfAddr, getifaddrs};
use nix::net::if_::InterfaceFlags as IfFlags;
use nix::sys::socket::SockaddrLike;
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::interfaces::{InterfaceAddress, InterfaceFlags, InterfaceSource, NetworkInterface};

/// Interfaces of the running host, read with getifaddrs(3)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    #[instrument]
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, Error> {
        let interfaces = group_by_interface(getifaddrs()?);
        debug!("found {} interfaces", interfaces.len());
        Ok(interfaces)
    }
}

/// getifaddrs returns one entry per (interface, address) pair. Fold them back
/// into interfaces, keeping the order in which each interface first appears.
fn group_by_interface(entries: impl IntoIterator<Item = IfAddr>) -> Vec<NetworkInterface> {
    let mut interfaces: Vec<NetworkInterface> = Vec::new();
    for entry in entries {
        let address = entry.address.as_ref().map(|address| {
            if let Some(sin) = address.as_sockaddr_in() {
                InterfaceAddress::Inet(IpAddr::V4(*SocketAddrV4::from(*sin).ip()))
            } else if let Some(sin6) = address.as_sockaddr_in6() {
                InterfaceAddress::Inet(IpAddr::V6(*SocketAddrV6::from(*sin6).ip()))
            } else {
                InterfaceAddress::Unrecognized(format!("{:?}", address.family()))
            }
        });

        let position = interfaces
            .iter()
            .position(|iface| iface.name == entry.interface_name);
        let index = match position {
            Some(index) => index,
            None => {
                interfaces.push(NetworkInterface {
                    name: entry.interface_name.clone(),
                    flags: convert_flags(entry.flags),
                    addresses: Vec::new(),
                });
                interfaces.len() - 1
            }
        };
        if let Some(address) = address {
            interfaces[index].addresses.push(address);
        }
    }
    interfaces
}

fn convert_flags(flags: IfFlags) -> InterfaceFlags {
    InterfaceFlags {
        up: flags.contains(IfFlags::IFF_UP),
        running: flags.contains(IfFlags::IFF_RUNNING),
        loopback: flags.contains(IfFlags::IFF_LOOPBACK),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_translated() {
        let flags = convert_flags(IfFlags::IFF_UP | IfFlags::IFF_RUNNING);
        assert_eq!(
            flags,
            InterfaceFlags {
                up: true,
                running: true,
                loopback: false
            }
        );
        assert!(convert_flags(IfFlags::IFF_LOOPBACK | IfFlags::IFF_UP).loopback);
        assert!(!convert_flags(IfFlags::empty()).up);
    }

    #[test]
    fn host_has_enumerable_interfaces() {
        let interfaces = SystemInterfaces.interfaces().unwrap();
        let mut names: Vec<&str> = interfaces.iter().map(|i| i.name.as_str()).collect();
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count, "interfaces are grouped by name");
    }
}
