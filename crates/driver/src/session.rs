//! Automation sessions
//!
//! A [`Session`] owns one server-side session: it is created with a set of
//! capabilities, issues commands until [`Session::quit`] and then refuses
//! further use.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::capabilities::Capabilities;
use crate::element::Element;
use crate::error::{DriverError, DriverResult};
use crate::keycode::KeyCode;
use crate::locator::Locator;
use crate::wire::{element_id, Transport};

/// Default endpoint of a locally running Appium server
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4723/wd/hub";

/// Connection settings for the automation endpoint
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Base URL, including any `/wd/hub` prefix
    pub server_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    pub capabilities: Capabilities,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            capabilities: Capabilities::android(),
        }
    }
}

/// Reply to `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub ready: bool,
    pub message: String,
    pub build_version: Option<String>,
}

/// Query the endpoint status without opening a session
pub async fn server_status(server_url: &str, request_timeout: Duration) -> DriverResult<ServerStatus> {
    let transport = Transport::new(server_url, request_timeout)?;
    let value = transport.command(Method::GET, "/status", None).await?;

    // Appium 1.x omits `ready` and only reports the build
    let ready = value.get("ready").and_then(Value::as_bool).unwrap_or(true);
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(if ready { "ready" } else { "not ready" })
        .to_string();
    let build_version = value
        .get("build")
        .and_then(|b| b.get("version"))
        .and_then(Value::as_str)
        .map(String::from);

    Ok(ServerStatus {
        ready,
        message,
        build_version,
    })
}

pub struct Session {
    transport: Transport,
    id: String,
    capabilities: Value,
    closed: AtomicBool,
}

impl Session {
    /// Negotiate a new session with the endpoint
    pub async fn start(config: &DriverConfig) -> DriverResult<Self> {
        let transport = Transport::new(&config.server_url, config.request_timeout)?;
        let body = config.capabilities.session_request();

        info!("Creating session at {}", transport.base_url());
        let reply = transport.send(Method::POST, "/session", Some(&body)).await?;

        // W3C: {"value": {"sessionId", "capabilities"}}
        // JSONWP: {"sessionId", "status", "value": {caps}}
        let (id, capabilities) = match reply.get("value").and_then(|v| v.get("sessionId")) {
            Some(Value::String(id)) => (id.clone(), reply["value"]["capabilities"].clone()),
            _ => match reply.get("sessionId").and_then(Value::as_str) {
                Some(id) => (id.to_string(), reply.get("value").cloned().unwrap_or(Value::Null)),
                None => {
                    return Err(DriverError::SessionNotCreated(format!(
                        "no session id in reply: {}",
                        reply
                    )))
                }
            },
        };

        info!("Session {} started", id);
        Ok(Self {
            transport,
            id,
            capabilities,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Capabilities the server actually granted
    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn path(&self, suffix: &str) -> String {
        format!("/session/{}{}", self.id, suffix)
    }

    async fn command(&self, method: Method, suffix: &str, body: Option<&Value>) -> DriverResult<Value> {
        if self.is_closed() {
            return Err(DriverError::InvalidSession(format!("session {} already closed", self.id)));
        }
        self.transport.command(method, &self.path(suffix), body).await
    }

    /// End the session. Later calls are no-ops.
    pub async fn quit(&self) -> DriverResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Deleting session {}", self.id);
        self.transport
            .command(Method::DELETE, &self.path(""), None)
            .await?;
        Ok(())
    }

    /// Server-side implicit wait applied to every lookup
    pub async fn set_implicit_wait(&self, wait: Duration) -> DriverResult<()> {
        let body = json!({ "implicit": wait.as_millis() as u64 });
        self.command(Method::POST, "/timeouts", Some(&body)).await?;
        Ok(())
    }

    pub async fn find_element(&self, locator: &Locator) -> DriverResult<Element> {
        debug!("find {}", locator);
        let value = self
            .command(Method::POST, "/element", Some(&serde_json::to_value(locator)?))
            .await?;
        let id = element_id(&value)?;
        Ok(Element::new(self.transport.clone(), self.id.clone(), id))
    }

    pub async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<Element>> {
        let value = self
            .command(Method::POST, "/elements", Some(&serde_json::to_value(locator)?))
            .await?;
        let refs = value
            .as_array()
            .ok_or_else(|| DriverError::UnexpectedResponse(format!("elements: {}", value)))?;
        refs.iter()
            .map(|r| {
                element_id(r).map(|id| Element::new(self.transport.clone(), self.id.clone(), id))
            })
            .collect()
    }

    /// Try each locator in turn and return the first element found.
    ///
    /// A miss moves on to the next locator; any other failure aborts.
    pub async fn find_first(&self, locators: &[Locator]) -> DriverResult<Element> {
        let mut attempts = Vec::with_capacity(locators.len());
        for locator in locators {
            match self.find_element(locator).await {
                Ok(element) => {
                    if !attempts.is_empty() {
                        info!("Fell back to {}", locator);
                    }
                    return Ok(element);
                }
                Err(e) if e.is_not_found() => {
                    warn!("{} did not match: {}", locator, e);
                    attempts.push(locator.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        Err(DriverError::LocatorsExhausted { attempts })
    }

    /// Poll until one of the locators resolves or `timeout` elapses
    pub async fn wait_for(
        &self,
        locators: &[Locator],
        timeout: Duration,
        poll_interval: Duration,
    ) -> DriverResult<Element> {
        let start = Instant::now();
        loop {
            match self.find_first(locators).await {
                Ok(element) => return Ok(element),
                Err(e) if e.is_not_found() => {
                    if start.elapsed() >= timeout {
                        let wanted: Vec<String> = locators.iter().map(|l| l.to_string()).collect();
                        return Err(DriverError::Timeout(format!(
                            "{} after {} ms",
                            wanted.join(" | "),
                            timeout.as_millis()
                        )));
                    }
                }
                Err(e) => return Err(e),
            }
            sleep(poll_interval).await;
        }
    }

    /// Send an Android key event
    pub async fn press_keycode(&self, key: KeyCode) -> DriverResult<()> {
        debug!("press {}", key);
        let body = json!({ "keycode": key.0 });
        self.command(Method::POST, "/appium/device/press_keycode", Some(&body))
            .await?;
        Ok(())
    }

    pub async fn press_keycode_times(&self, key: KeyCode, times: u32) -> DriverResult<()> {
        for _ in 0..times {
            self.press_keycode(key).await?;
        }
        Ok(())
    }

    /// Current driver settings
    pub async fn settings(&self) -> DriverResult<Value> {
        self.command(Method::GET, "/appium/settings", None).await
    }

    /// Touch-drag from the centre of `from` to the centre of `to`
    pub async fn scroll(&self, from: &Element, to: &Element) -> DriverResult<()> {
        let (x1, y1) = from.rect().await?.center();
        let (x2, y2) = to.rect().await?.center();
        debug!("scroll ({}, {}) -> ({}, {})", x1, y1, x2, y2);

        let body = json!({
            "actions": [{
                "type": "pointer",
                "id": "finger1",
                "parameters": { "pointerType": "touch" },
                "actions": [
                    { "type": "pointerMove", "duration": 0, "origin": "viewport", "x": x1, "y": y1 },
                    { "type": "pointerDown", "button": 0 },
                    { "type": "pause", "duration": 250 },
                    { "type": "pointerMove", "duration": 600, "origin": "viewport", "x": x2, "y": y2 },
                    { "type": "pointerUp", "button": 0 },
                ],
            }],
        });
        self.command(Method::POST, "/actions", Some(&body)).await?;
        self.command(Method::DELETE, "/actions", None).await?;
        Ok(())
    }

    /// PNG screenshot of the current screen
    pub async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| DriverError::UnexpectedResponse(format!("screenshot: {}", value)))?;
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(BASE64.decode(cleaned)?)
    }

    /// XML dump of the current view hierarchy
    pub async fn source(&self) -> DriverResult<String> {
        let value = self.command(Method::GET, "/source", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("server", &self.transport.base_url())
            .field("closed", &self.is_closed())
            .finish()
    }
}
