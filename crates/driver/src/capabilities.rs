//! Session capabilities
//!
//! Capabilities are sent twice when a session is created: as the W3C
//! `capabilities.alwaysMatch` object, where every non-standard key carries
//! the `appium:` vendor prefix, and as the legacy `desiredCapabilities`
//! object that older servers still read.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Standard W3C capability names, sent without a vendor prefix
const W3C_KEYS: &[&str] = &[
    "browserName",
    "browserVersion",
    "platformName",
    "acceptInsecureCerts",
    "pageLoadStrategy",
    "proxy",
    "setWindowRect",
    "timeouts",
    "unhandledPromptBehavior",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    pub platform_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    /// Path or URL of the APK to install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_package: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_wait_for_launch: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_sign: Option<bool>,

    /// Anything else, passed through as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::android()
    }
}

impl Capabilities {
    /// Bare Android capabilities: the server picks the device and app
    pub fn android() -> Self {
        Self {
            platform_name: "Android".to_string(),
            platform_version: None,
            device_name: None,
            app: None,
            app_package: None,
            automation_name: None,
            app_wait_for_launch: None,
            no_sign: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device_name = Some(device.into());
        self
    }

    pub fn with_automation(mut self, automation: impl Into<String>) -> Self {
        self.automation_name = Some(automation.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Overlay `other` on top of `self`; set fields in `other` win
    pub fn merged(&self, other: &Capabilities) -> Capabilities {
        let mut merged = self.clone();
        merged.platform_name = other.platform_name.clone();
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { merged.$field = other.$field.clone(); })*
            };
        }
        overlay!(
            platform_version,
            device_name,
            app,
            app_package,
            automation_name,
            app_wait_for_launch,
            no_sign
        );
        for (k, v) in &other.extra {
            merged.extra.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Flat key/value view with the plain camelCase names
    pub fn to_desired(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// `alwaysMatch` view with vendor-prefixed extension keys
    pub fn to_always_match(&self) -> Map<String, Value> {
        self.to_desired()
            .into_iter()
            .map(|(k, v)| {
                if W3C_KEYS.contains(&k.as_str()) || k.contains(':') {
                    (k, v)
                } else {
                    (format!("appium:{}", k), v)
                }
            })
            .collect()
    }

    /// Body for `POST /session`
    pub fn session_request(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": self.to_always_match(),
                "firstMatch": [{}],
            },
            "desiredCapabilities": self.to_desired(),
        })
    }
}
