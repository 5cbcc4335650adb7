//! Status Commands

use anyhow::{bail, Result};
use appdrive_driver::{server_status, ServerStatus};
use serde::Serialize;

use crate::config::AppdriveConfig;
use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Serialize)]
pub struct StatusDisplay {
    pub server: String,
    #[serde(flatten)]
    pub status: ServerStatus,
}

impl TableDisplay for StatusDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["SERVER", "READY", "VERSION", "MESSAGE"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.server.clone(),
            if self.status.ready { "yes" } else { "no" }.to_string(),
            self.status.build_version.clone().unwrap_or_else(|| "-".to_string()),
            self.status.message.clone(),
        ]
    }
}

pub async fn execute(config: &AppdriveConfig, format: OutputFormat) -> Result<()> {
    let driver = config.driver_config();
    let status = match server_status(&driver.server_url, driver.request_timeout).await {
        Ok(status) => status,
        Err(e) => bail!("cannot reach automation server at {}: {}", driver.server_url, e),
    };

    let ready = status.ready;
    print_item(
        &StatusDisplay {
            server: driver.server_url,
            status,
        },
        format,
    )?;

    if !ready {
        bail!("automation server is not ready");
    }
    Ok(())
}
