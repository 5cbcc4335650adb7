//! Declarative mobile UI flows
//!
//! A flow is a YAML file listing steps (tap, fill, key presses, sleeps,
//! scrolls, assertions) against an Appium endpoint. Values such as the test
//! email or password are declared once under `variables:` and referenced as
//! `${name}`.
//!
//! ## Example flow
//!
//! ```yaml
//! name: onboarding
//! tags: [smoke]
//! variables:
//!   email:
//!     generator: email
//! steps:
//!   - action: tap
//!     target:
//!       - text: NEXT
//!       - content_desc: onboarding-button
//!     times: 3
//!   - action: fill
//!     target:
//!       accessibility_id: register-email-or-phone
//!     value: ${email}
//!     clear_keystrokes: 25
//!     hide_keyboard: true
//! ```
//!
//! A target written as a list is a fallback chain: locators are tried in
//! order and the first match wins.

pub mod builtin;
pub mod error;
pub mod generate;
pub mod runner;
pub mod spec;
pub mod template;

pub use error::{FlowError, FlowResult};
pub use generate::{evaluate_strength, Generator, Strength};
pub use runner::{FlowOutcome, FlowRunner, RunnerConfig, StepOutcome, SuiteOutcome};
pub use spec::{Action, FlowSpec, FlowStep, Target};
