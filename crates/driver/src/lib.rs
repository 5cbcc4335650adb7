//! appdrive automation client
//!
//! Async client for a remote mobile-automation endpoint (Appium) speaking
//! the W3C WebDriver protocol plus the Appium Android extensions:
//! - Session negotiation with W3C and legacy capability shapes
//! - Element lookup by XPath, accessibility id, id, class or UiAutomator
//! - Ordered locator fallback chains and polling waits
//! - Android key events, touch scrolls, settings and screenshots
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Session                                                  │
//! │    ├── start(DriverConfig) -> Session                     │
//! │    ├── find_element / find_first / wait_for -> Element    │
//! │    ├── press_keycode(KeyCode)                             │
//! │    ├── scroll(&Element, &Element)                         │
//! │    └── quit()                                             │
//! ├──────────────────────────────────────────────────────────┤
//! │  Element: click, send_keys, clear, text, rect, ...        │
//! ├──────────────────────────────────────────────────────────┤
//! │  Transport (reqwest)  ──HTTP/JSON──►  automation endpoint │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod capabilities;
pub mod element;
pub mod error;
pub mod keycode;
pub mod locator;
pub mod session;
mod wire;

#[cfg(feature = "fake")]
pub mod fake;

pub use capabilities::Capabilities;
pub use element::{Element, ElementRect};
pub use error::{DriverError, DriverResult};
pub use keycode::KeyCode;
pub use locator::{Locator, Strategy};
pub use session::{server_status, DriverConfig, ServerStatus, Session, DEFAULT_SERVER_URL};
pub use wire::ELEMENT_KEY;
