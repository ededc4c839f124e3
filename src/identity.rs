use std::collections::HashMap;
use std::fmt::Formatter;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use serde_derive::Serialize;
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::errors::{Error, Field};
use crate::interfaces::{InterfaceSource, select_public_ipv6};
use crate::metadata::MetadataClient;

/// Identity of the VM we are running on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmInfo {
    pub name: String,
    pub external_ipv4: Ipv4Addr,
    /// `None` when the host has no public IPv6 address
    pub external_ipv6: Option<Ipv6Addr>,
    pub project_id: String,
    /// Short zone name, e.g. `us-central1-c`
    pub zone: String,
}

impl std::fmt::Display for VmInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "name:          {}", self.name)?;
        writeln!(f, "external IPv4: {}", self.external_ipv4)?;
        match self.external_ipv6 {
            Some(addr) => writeln!(f, "external IPv6: {}", addr)?,
            None => writeln!(f, "external IPv6: none")?,
        }
        writeln!(f, "project ID:    {}", self.project_id)?;
        write!(f, "zone:          {}", self.zone)
    }
}

/// Result of one lookup, tagged with the field it fills in
#[derive(Debug)]
enum Lookup {
    InstanceName(String),
    ExternalIpv4(Ipv4Addr),
    ExternalIpv6(Option<Ipv6Addr>),
    ProjectId(String),
    Zone(String),
}

#[derive(Debug, Default)]
struct PartialVmInfo {
    name: Option<String>,
    external_ipv4: Option<Ipv4Addr>,
    external_ipv6: Option<Option<Ipv6Addr>>,
    project_id: Option<String>,
    zone: Option<String>,
}

impl PartialVmInfo {
    fn record(&mut self, lookup: Lookup) {
        match lookup {
            Lookup::InstanceName(name) => self.name = Some(name),
            Lookup::ExternalIpv4(addr) => self.external_ipv4 = Some(addr),
            Lookup::ExternalIpv6(addr) => self.external_ipv6 = Some(addr),
            Lookup::ProjectId(project_id) => self.project_id = Some(project_id),
            Lookup::Zone(zone) => self.zone = Some(zone),
        }
    }

    fn finish(self) -> Result<VmInfo, Error> {
        fn missing(field: Field) -> Error {
            Error::UnexpectedExit(format!("lookup of {field} produced no value"))
        }
        Ok(VmInfo {
            name: self.name.ok_or_else(|| missing(Field::InstanceName))?,
            external_ipv4: self
                .external_ipv4
                .ok_or_else(|| missing(Field::ExternalIpv4))?,
            external_ipv6: self
                .external_ipv6
                .ok_or_else(|| missing(Field::ExternalIpv6))?,
            project_id: self.project_id.ok_or_else(|| missing(Field::ProjectId))?,
            zone: self.zone.ok_or_else(|| missing(Field::Zone))?,
        })
    }
}

/// Resolve the identity of the host VM.
///
/// Fails with [`Error::NotOnPlatform`] without doing any lookups when not on
/// GCE. Otherwise all five lookups run concurrently and are allowed to finish;
/// if any of them failed, the first failure observed is returned as
/// [`Error::LookupFailed`]. A missing public IPv6 address is not a failure.
///
/// With a `deadline`, lookups still pending when it expires are aborted and
/// [`Error::Timeout`] is returned.
#[instrument(skip(metadata, interfaces))]
pub async fn resolve_host_identity(
    metadata: Arc<dyn MetadataClient>,
    interfaces: Arc<dyn InterfaceSource>,
    deadline: Option<Duration>,
) -> Result<VmInfo, Error> {
    if !metadata.on_platform() {
        return Err(Error::NotOnPlatform);
    }

    let mut lookups = JoinSet::new();
    let fields = HashMap::from([
        (
            lookups.spawn(instance_name(metadata.clone())).id(),
            Field::InstanceName,
        ),
        (
            lookups.spawn(external_ipv4(metadata.clone())).id(),
            Field::ExternalIpv4,
        ),
        (
            lookups
                .spawn_blocking(move || external_ipv6(interfaces.as_ref()))
                .id(),
            Field::ExternalIpv6,
        ),
        (
            lookups.spawn(project_id(metadata.clone())).id(),
            Field::ProjectId,
        ),
        (lookups.spawn(zone(metadata)).id(), Field::Zone),
    ]);

    // Dropping the JoinSet on timeout aborts whatever is still running
    let info = match deadline {
        Some(deadline) => tokio::time::timeout(deadline, collect(&mut lookups, &fields))
            .await
            .map_err(|_| Error::Timeout(deadline))??,
        None => collect(&mut lookups, &fields).await?,
    };
    info!("resolved host identity: {:?}", info);
    Ok(info)
}

async fn collect(
    lookups: &mut JoinSet<Result<Lookup, Error>>,
    fields: &HashMap<Id, Field>,
) -> Result<VmInfo, Error> {
    let mut partial = PartialVmInfo::default();
    let mut first_error = None;

    while let Some(joined) = lookups.join_next_with_id().await {
        let outcome = joined
            .map_err(|e| {
                let cause = Error::UnexpectedExit(e.to_string());
                match fields.get(&e.id()) {
                    Some(field) => Error::lookup_failed(*field, cause),
                    None => cause,
                }
            })
            .and_then(|(_, lookup)| lookup);
        match outcome {
            Ok(lookup) => partial.record(lookup),
            Err(e) if first_error.is_none() => {
                warn!(field = ?e.failed_field(), "{}", e);
                first_error = Some(e);
            }
            Err(e) => debug!("discarding further failure: {}", e),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => partial.finish(),
    }
}

fn required(value: String) -> Result<String, Error> {
    if value.trim().is_empty() {
        return Err(Error::EmptyValue);
    }
    Ok(value)
}

fn parse_ipv4(value: String) -> Result<Ipv4Addr, Error> {
    let value = required(value)?;
    value.trim().parse().map_err(|_| Error::InvalidIpv4(value))
}

async fn instance_name(metadata: Arc<dyn MetadataClient>) -> Result<Lookup, Error> {
    metadata
        .instance_name()
        .await
        .and_then(required)
        .map(Lookup::InstanceName)
        .map_err(|e| Error::lookup_failed(Field::InstanceName, e))
}

async fn external_ipv4(metadata: Arc<dyn MetadataClient>) -> Result<Lookup, Error> {
    metadata
        .external_ipv4()
        .await
        .and_then(parse_ipv4)
        .map(Lookup::ExternalIpv4)
        .map_err(|e| Error::lookup_failed(Field::ExternalIpv4, e))
}

fn external_ipv6(interfaces: &dyn InterfaceSource) -> Result<Lookup, Error> {
    select_public_ipv6(interfaces)
        .map(Lookup::ExternalIpv6)
        .map_err(|e| Error::lookup_failed(Field::ExternalIpv6, e))
}

async fn project_id(metadata: Arc<dyn MetadataClient>) -> Result<Lookup, Error> {
    metadata
        .project_id()
        .await
        .and_then(required)
        .map(Lookup::ProjectId)
        .map_err(|e| Error::lookup_failed(Field::ProjectId, e))
}

async fn zone(metadata: Arc<dyn MetadataClient>) -> Result<Lookup, Error> {
    metadata
        .zone()
        .await
        .and_then(required)
        .map(Lookup::Zone)
        .map_err(|e| Error::lookup_failed(Field::Zone, e))
}
