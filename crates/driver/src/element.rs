//! Element handles

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::wire::Transport;

/// Position and size of an element in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementRect {
    pub fn center(&self) -> (i64, i64) {
        (
            (self.x + self.width / 2.0).round() as i64,
            (self.y + self.height / 2.0).round() as i64,
        )
    }
}

/// A located element, bound to the session that found it
#[derive(Debug, Clone)]
pub struct Element {
    transport: Transport,
    session_id: String,
    id: String,
}

impl Element {
    pub(crate) fn new(transport: Transport, session_id: String, id: String) -> Self {
        Self {
            transport,
            session_id,
            id,
        }
    }

    /// Server-side element reference id
    pub fn id(&self) -> &str {
        &self.id
    }

    fn path(&self, suffix: &str) -> String {
        format!("/session/{}/element/{}{}", self.session_id, self.id, suffix)
    }

    pub async fn click(&self) -> DriverResult<()> {
        debug!("click element {}", self.id);
        self.transport
            .command(Method::POST, &self.path("/click"), Some(&json!({})))
            .await?;
        Ok(())
    }

    /// Type into the element
    pub async fn send_keys(&self, text: &str) -> DriverResult<()> {
        let chars: Vec<String> = text.chars().map(String::from).collect();
        let body = json!({ "text": text, "value": chars });
        self.transport
            .command(Method::POST, &self.path("/value"), Some(&body))
            .await?;
        Ok(())
    }

    pub async fn clear(&self) -> DriverResult<()> {
        self.transport
            .command(Method::POST, &self.path("/clear"), Some(&json!({})))
            .await?;
        Ok(())
    }

    pub async fn text(&self) -> DriverResult<String> {
        let value = self.transport.command(Method::GET, &self.path("/text"), None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn is_displayed(&self) -> DriverResult<bool> {
        let value = self
            .transport
            .command(Method::GET, &self.path("/displayed"), None)
            .await?;
        match value {
            Value::Bool(b) => Ok(b),
            Value::String(s) => Ok(s == "true"),
            other => Err(DriverError::UnexpectedResponse(format!("displayed: {}", other))),
        }
    }

    /// Attribute value, `None` when the element has no such attribute
    pub async fn attribute(&self, name: &str) -> DriverResult<Option<String>> {
        let value = self
            .transport
            .command(Method::GET, &self.path(&format!("/attribute/{}", name)), None)
            .await?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    pub async fn rect(&self) -> DriverResult<ElementRect> {
        let value = self.transport.command(Method::GET, &self.path("/rect"), None).await?;
        Ok(serde_json::from_value(value)?)
    }
}
