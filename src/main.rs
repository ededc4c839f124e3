mod config;
mod errors;
mod identity;
mod interfaces;
mod logging;
mod metadata;
mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::errors::Error;
use crate::identity::resolve_host_identity;
use crate::interfaces::SystemInterfaces;
use crate::metadata::GceMetadataClient;
use crate::utils::get_version_string;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;

    if config.version {
        println!("{}", get_version_string());
        return Ok(());
    }

    let _tracer_provider = logging::setup_tracing()?;

    let metadata = Arc::new(GceMetadataClient::new(config.metadata)?);
    let info = resolve_host_identity(metadata, Arc::new(SystemInterfaces), config.deadline).await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("{}", info);
    }
    Ok(())
}
