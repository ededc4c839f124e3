use std::net::IpAddr;

use crate::errors::Error;

pub mod address;
mod selector;
mod system;

pub use selector::select_public_ipv6;
pub use system::SystemInterfaces;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceFlags {
    pub up: bool,
    pub running: bool,
    pub loopback: bool,
}

/// An address entry as reported for an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceAddress {
    Inet(IpAddr),
    /// Link-layer or otherwise unparseable entry, kept only for diagnostics
    Unrecognized(String),
}

/// Read-only view of one local network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub flags: InterfaceFlags,
    pub addresses: Vec<InterfaceAddress>,
}

/// Source of the host's network interfaces, in the order the OS reports them
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, Error>;
}
