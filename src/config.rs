use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::Error;

const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
const DEFAULT_METADATA_HOST: &str = "169.254.169.254";
const DMI_PRODUCT_NAME: &str = "/sys/class/dmi/id/product_name";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataConfig {
    /// `host[:port]` of the metadata server
    pub host: String,
    /// Set when the host came from the environment, which also implies that
    /// we are on (or emulating) GCE
    pub host_overridden: bool,
    pub request_timeout: Duration,
    pub dmi_product_name: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub version: bool,
    pub json: bool,
    /// Bound on the whole resolution, `None` waits forever
    pub deadline: Option<Duration>,
    pub metadata: MetadataConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let args: Vec<String> = env::args().skip(1).collect();
        Config::parse(&args, env::var(METADATA_HOST_ENV).ok())
    }

    pub fn parse(args: &[String], metadata_host: Option<String>) -> Result<Self, Error> {
        let mut config = Config {
            version: false,
            json: false,
            deadline: Some(DEFAULT_DEADLINE),
            metadata: MetadataConfig {
                host: DEFAULT_METADATA_HOST.to_string(),
                host_overridden: false,
                request_timeout: REQUEST_TIMEOUT,
                dmi_product_name: PathBuf::from(DMI_PRODUCT_NAME),
            },
        };

        if let Some(host) = metadata_host.filter(|host| !host.is_empty()) {
            config.metadata.host = host;
            config.metadata.host_overridden = true;
        }

        let mut args = args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--version" => config.version = true,
                "--json" => config.json = true,
                "--timeout" => {
                    let value = args.next().ok_or_else(|| {
                        Error::InvalidArgument(String::from("--timeout requires a value"))
                    })?;
                    config.deadline = parse_deadline(value)?;
                }
                other => return Err(Error::InvalidArgument(format!("unknown argument {other}"))),
            }
        }
        Ok(config)
    }
}

fn parse_deadline(value: &str) -> Result<Option<Duration>, Error> {
    let seconds: u64 = value
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid timeout {value:?}")))?;
    Ok(match seconds {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn defaults() {
        let config = Config::parse(&[], None).unwrap();
        assert!(!config.version);
        assert!(!config.json);
        assert_eq!(config.deadline, Some(DEFAULT_DEADLINE));
        assert_eq!(config.metadata.host, DEFAULT_METADATA_HOST);
        assert!(!config.metadata.host_overridden);
    }

    #[test]
    fn flags_and_timeout() {
        let config = Config::parse(&args(&["--json", "--timeout", "3"]), None).unwrap();
        assert!(config.json);
        assert_eq!(config.deadline, Some(Duration::from_secs(3)));

        let config = Config::parse(&args(&["--timeout", "0"]), None).unwrap();
        assert_eq!(config.deadline, None);

        assert!(Config::parse(&args(&["--version"]), None).unwrap().version);
    }

    #[test]
    fn metadata_host_override() {
        let config = Config::parse(&[], Some("127.0.0.1:8080".to_string())).unwrap();
        assert_eq!(config.metadata.host, "127.0.0.1:8080");
        assert!(config.metadata.host_overridden);

        let config = Config::parse(&[], Some(String::new())).unwrap();
        assert!(!config.metadata.host_overridden);
    }

    #[test]
    fn bad_arguments() {
        let cases: [&[&str]; 3] = [&["--timeout"], &["--timeout", "soon"], &["--frobnicate"]];
        for bad in cases {
            assert!(
                matches!(Config::parse(&args(bad), None), Err(Error::InvalidArgument(_))),
                "{bad:?}"
            );
        }
    }
}
