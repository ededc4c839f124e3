use std::fs;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::config::MetadataConfig;
use crate::errors::Error;
use crate::metadata::MetadataClient;

const METADATA_PATH_PREFIX: &str = "computeMetadata/v1";
const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR: &str = "Google";

const PATH_INSTANCE_NAME: &str = "instance/name";
const PATH_EXTERNAL_IP: &str = "instance/network-interfaces/0/access-configs/0/external-ip";
const PATH_PROJECT_ID: &str = "project/project-id";
const PATH_ZONE: &str = "instance/zone";

/// Client for the Compute Engine metadata server
#[derive(Debug, Clone)]
pub struct GceMetadataClient {
    http: reqwest::Client,
    base_url: String,
    config: MetadataConfig,
}

impl GceMetadataClient {
    pub fn new(config: MetadataConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(GceMetadataClient {
            http,
            base_url: format!("http://{}/{}", config.host, METADATA_PATH_PREFIX),
            config,
        })
    }

    #[instrument(skip(self))]
    async fn get(&self, path: &str) -> Result<String, Error> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(Error::MetadataNotDefined(path.to_string())),
            status => return Err(Error::MetadataStatus(path.to_string(), status)),
        }

        let body = response.text().await?;
        debug!("metadata {} = {:?}", path, body);
        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl MetadataClient for GceMetadataClient {
    fn on_platform(&self) -> bool {
        if self.config.host_overridden {
            return true;
        }
        match fs::read_to_string(&self.config.dmi_product_name) {
            Ok(product) => product.contains("Google"),
            Err(e) => {
                debug!(
                    "cannot read {}: {}",
                    self.config.dmi_product_name.display(),
                    e
                );
                false
            }
        }
    }

    async fn instance_name(&self) -> Result<String, Error> {
        self.get(PATH_INSTANCE_NAME).await
    }

    async fn external_ipv4(&self) -> Result<String, Error> {
        self.get(PATH_EXTERNAL_IP).await
    }

    async fn project_id(&self) -> Result<String, Error> {
        self.get(PATH_PROJECT_ID).await
    }

    async fn zone(&self) -> Result<String, Error> {
        // Served as projects/<number>/zones/<zone>
        let zone = self.get(PATH_ZONE).await?;
        Ok(match zone.rsplit_once('/') {
            Some((_, short)) => short.to_string(),
            None => zone,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;

    use mockito::{Matcher, Server};
    use tempfile::NamedTempFile;

    use super::*;

    fn config_for(server: &Server) -> MetadataConfig {
        MetadataConfig {
            host: server.host_with_port(),
            host_overridden: true,
            request_timeout: Duration::from_secs(5),
            dmi_product_name: PathBuf::from("/nonexistent"),
        }
    }

    fn metadata_path(path: &str) -> String {
        format!("/{}/{}", METADATA_PATH_PREFIX, path)
    }

    #[tokio::test]
    async fn sends_flavor_header_and_trims_values() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", metadata_path(PATH_INSTANCE_NAME).as_str())
            .match_header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
            .with_status(200)
            .with_body("vm-1\n")
            .create_async()
            .await;

        let client = GceMetadataClient::new(config_for(&server)).unwrap();
        assert_eq!(client.instance_name().await.unwrap(), "vm-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn zone_is_reduced_to_its_short_name() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", metadata_path(PATH_ZONE).as_str())
            .with_body("projects/123456789/zones/us-central1-c")
            .create_async()
            .await;

        let client = GceMetadataClient::new(config_for(&server)).unwrap();
        assert_eq!(client.zone().await.unwrap(), "us-central1-c");
    }

    #[tokio::test]
    async fn missing_key_is_not_defined() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", metadata_path(PATH_EXTERNAL_IP).as_str())
            .with_status(404)
            .create_async()
            .await;

        let client = GceMetadataClient::new(config_for(&server)).unwrap();
        let result = client.external_ipv4().await;
        assert!(
            matches!(&result, Err(Error::MetadataNotDefined(path)) if path == PATH_EXTERNAL_IP),
            "{result:?}"
        );
    }

    #[tokio::test]
    async fn server_errors_carry_the_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = GceMetadataClient::new(config_for(&server)).unwrap();
        let result = client.project_id().await;
        assert!(
            matches!(
                &result,
                Err(Error::MetadataStatus(_, StatusCode::SERVICE_UNAVAILABLE))
            ),
            "{result:?}"
        );
    }

    #[test]
    fn platform_detection_without_override_reads_dmi() {
        let mut product = NamedTempFile::new().unwrap();
        writeln!(product, "Google Compute Engine").unwrap();

        let config = MetadataConfig {
            host: "169.254.169.254".to_string(),
            host_overridden: false,
            request_timeout: Duration::from_secs(1),
            dmi_product_name: product.path().to_path_buf(),
        };
        let client = GceMetadataClient::new(config.clone()).unwrap();
        assert!(client.on_platform());

        let client = GceMetadataClient::new(MetadataConfig {
            dmi_product_name: PathBuf::from("/nonexistent/product_name"),
            ..config
        })
        .unwrap();
        assert!(!client.on_platform());
    }

    #[test]
    fn other_hypervisors_are_not_gce() {
        let mut product = NamedTempFile::new().unwrap();
        writeln!(product, "Standard PC (Q35 + ICH9, 2009)").unwrap();

        let client = GceMetadataClient::new(MetadataConfig {
            host: "169.254.169.254".to_string(),
            host_overridden: false,
            request_timeout: Duration::from_secs(1),
            dmi_product_name: product.path().to_path_buf(),
        })
        .unwrap();
        assert!(!client.on_platform());
    }
}
