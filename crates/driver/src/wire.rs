//! HTTP transport for the WebDriver wire protocol
//!
//! Every command is a JSON request against the endpoint base URL. Replies
//! wrap their payload in `{"value": ...}`; failures carry either a W3C
//! `value.error` code or, from older servers, a numeric JSONWP `status`.

use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

use crate::error::{DriverError, DriverResult};

/// Key under which W3C servers return element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Key used by JSONWP servers
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

#[derive(Debug, Clone)]
pub(crate) struct Transport {
    client: Client,
    base_url: String,
}

impl Transport {
    pub(crate) fn new(base_url: &str, request_timeout: Duration) -> DriverResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a command and return the whole decoded reply
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> DriverResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        trace!("{} {} {}", method, url, body.map(|b| b.to_string()).unwrap_or_default());

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        trace!("{} <- {}", status, text);

        let reply: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) if !status.is_success() => {
                    return Err(DriverError::UnexpectedResponse(format!("{}: {}", status, text)));
                }
                Err(e) => return Err(e.into()),
            }
        };

        if let Some(err) = protocol_error(&reply) {
            return Err(err);
        }
        if !status.is_success() {
            return Err(DriverError::UnexpectedResponse(format!("{}: {}", status, text)));
        }
        Ok(reply)
    }

    /// Send a command and return its `value` payload
    pub(crate) async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> DriverResult<Value> {
        let mut reply = self.send(method, path, body).await?;
        Ok(reply.get_mut("value").map(Value::take).unwrap_or(Value::Null))
    }
}

/// Extract an error from either reply dialect
pub(crate) fn protocol_error(reply: &Value) -> Option<DriverError> {
    if let Some(code) = reply
        .get("value")
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
    {
        let message = reply["value"]
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(code);
        return Some(DriverError::from_w3c(code, message));
    }

    let status = reply.get("status").and_then(Value::as_i64)?;
    if status == 0 {
        return None;
    }
    let message = reply
        .get("value")
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let code = match status {
        6 => "invalid session id",
        7 => "no such element",
        10 => "stale element reference",
        21 => "timeout",
        32 => "invalid selector",
        33 => "session not created",
        _ => {
            return Some(DriverError::Protocol {
                code: format!("status {}", status),
                message,
            })
        }
    };
    Some(DriverError::from_w3c(code, message))
}

/// Pull the element id out of an element reference object
pub(crate) fn element_id(reference: &Value) -> DriverResult<String> {
    reference
        .get(ELEMENT_KEY)
        .or_else(|| reference.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| DriverError::UnexpectedResponse(format!("not an element reference: {}", reference)))
}
