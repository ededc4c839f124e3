use std::fmt::Formatter;
use std::time::Duration;

/// The VM identity field a lookup is responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    InstanceName,
    ExternalIpv4,
    ExternalIpv6,
    ProjectId,
    Zone,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Field::InstanceName => "instance name",
            Field::ExternalIpv4 => "external IPv4 address",
            Field::ExternalIpv6 => "external IPv6 address",
            Field::ProjectId => "project ID",
            Field::Zone => "zone",
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    // Resolution
    #[error("not running on Google Compute Engine")]
    NotOnPlatform,
    #[error("lookup of {field} failed")]
    LookupFailed {
        field: Field,
        #[source]
        cause: Box<Error>,
    },
    #[error("Timed out after {0:?} waiting for host identity")]
    Timeout(Duration),
    #[error("Task ended unexpectedly: {0}")]
    UnexpectedExit(String),

    // Metadata server
    #[error("HTTP error {0}")]
    Http(#[from] reqwest::Error),
    #[error("metadata key {0} is not defined")]
    MetadataNotDefined(String),
    #[error("metadata server returned {1} for {0}")]
    MetadataStatus(String, reqwest::StatusCode),
    #[error("expected IPv4 address, got {0:?}")]
    InvalidIpv4(String),
    #[error("metadata server returned an empty value")]
    EmptyValue,

    // Interface enumeration
    #[error("Failed to enumerate network interfaces: {0}")]
    Environment(#[from] nix::errno::Errno),

    // Setup
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Failed to install tracing subscriber: {0}")]
    TracingSetup(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error("Failed to create OTLP exporter: {0}")]
    Otlp(#[from] opentelemetry::trace::TraceError),
    #[error("JSON error {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn lookup_failed(field: Field, cause: Error) -> Self {
        Error::LookupFailed {
            field,
            cause: Box::new(cause),
        }
    }

    /// The field whose lookup failed, if this is a lookup failure
    pub fn failed_field(&self) -> Option<Field> {
        match self {
            Error::LookupFailed { field, .. } => Some(*field),
            _ => None,
        }
    }
}
