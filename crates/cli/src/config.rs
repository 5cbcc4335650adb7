//! CLI configuration file

use appdrive_driver::{Capabilities, DriverConfig, DEFAULT_SERVER_URL};
use appdrive_flow::RunnerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "appdrive.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppdriveConfig {
    /// Directory of flow files
    pub flows_dir: PathBuf,

    /// Automation endpoint
    pub server: ServerConfig,

    /// Runner behaviour
    pub runner: RunnerSettings,

    /// Capabilities sent with every session; flows may override them
    pub capabilities: Capabilities,
}

impl Default for AppdriveConfig {
    fn default() -> Self {
        Self {
            flows_dir: PathBuf::from("flows"),
            server: ServerConfig::default(),
            runner: RunnerSettings::default(),
            capabilities: Capabilities::android(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Where results.json and screenshots are written
    pub output_dir: PathBuf,

    pub screenshot_on_failure: bool,

    /// Default timeout of `wait_for` steps
    pub wait_timeout_ms: u64,

    pub poll_interval_ms: u64,

    /// Fixed seed for generated values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("appdrive-results"),
            screenshot_on_failure: true,
            wait_timeout_ms: 10_000,
            poll_interval_ms: 500,
            seed: None,
        }
    }
}

impl AppdriveConfig {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            server_url: self.server.url.clone(),
            request_timeout: Duration::from_secs(self.server.request_timeout_secs),
            capabilities: self.capabilities.clone(),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            driver: self.driver_config(),
            flows_dir: self.flows_dir.clone(),
            output_dir: self.runner.output_dir.clone(),
            screenshot_on_failure: self.runner.screenshot_on_failure,
            wait_timeout: Duration::from_millis(self.runner.wait_timeout_ms),
            poll_interval: Duration::from_millis(self.runner.poll_interval_ms),
            seed: self.runner.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppdriveConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppdriveConfig::default());
        assert_eq!(config.server.url, "http://127.0.0.1:4723/wd/hub");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appdrive.toml");
        std::fs::write(
            &path,
            r#"
[server]
url = "http://10.0.2.2:4723/wd/hub"

[capabilities]
app = "/apks/jupiter-signed.apk"
deviceName = "emulator-5554"
automationName = "UiAutomator2"
appWaitForLaunch = false
noReset = true
newCommandTimeout = 300

[runner]
seed = 42
"#,
        )
        .unwrap();

        let config = AppdriveConfig::load(&path).unwrap();
        assert_eq!(config.server.url, "http://10.0.2.2:4723/wd/hub");
        assert_eq!(config.server.request_timeout_secs, 60);
        assert_eq!(config.capabilities.platform_name, "Android");
        assert_eq!(config.capabilities.app.as_deref(), Some("/apks/jupiter-signed.apk"));
        assert_eq!(config.capabilities.app_wait_for_launch, Some(false));
        assert_eq!(config.runner.seed, Some(42));
        assert!(config.runner.screenshot_on_failure);

        let runner = config.runner_config();
        assert_eq!(runner.wait_timeout, Duration::from_secs(10));
        let body = runner.driver.capabilities.session_request();
        assert_eq!(body["capabilities"]["alwaysMatch"]["appium:noReset"], true);
        assert_eq!(body["desiredCapabilities"]["newCommandTimeout"], 300);
        assert_eq!(runner.driver.capabilities.device_name.as_deref(), Some("emulator-5554"));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("appdrive.toml");
        let mut config = AppdriveConfig::default();
        config.runner.poll_interval_ms = 250;
        config.capabilities = config
            .capabilities
            .with_device("pixel-7")
            .with_extra("noReset", serde_json::json!(true));

        config.save(&path).unwrap();
        assert_eq!(AppdriveConfig::load(&path).unwrap(), config);
    }
}
