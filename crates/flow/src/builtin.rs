//! Flows compiled into the binary

use crate::error::{FlowError, FlowResult};
use crate::spec::FlowSpec;

const REGISTRATION: &str = include_str!("../flows/registration.yaml");
const REGISTRATION_LEGACY: &str = include_str!("../flows/registration-legacy.yaml");
const REGISTRATION_DEPOSIT: &str = include_str!("../flows/registration-deposit.yaml");

const BUILTINS: &[(&str, &str)] = &[
    ("registration", REGISTRATION),
    ("registration-legacy", REGISTRATION_LEGACY),
    ("registration-deposit", REGISTRATION_DEPOSIT),
];

/// Names of the built-in flows
pub fn names() -> Vec<&'static str> {
    BUILTINS.iter().map(|(name, _)| *name).collect()
}

/// Raw YAML of a built-in flow
pub fn source(name: &str) -> Option<&'static str> {
    BUILTINS.iter().find(|(n, _)| *n == name).map(|(_, yaml)| *yaml)
}

/// Parse a built-in flow by name
pub fn find(name: &str) -> FlowResult<FlowSpec> {
    let yaml = source(name).ok_or_else(|| FlowError::NotFound(name.to_string()))?;
    FlowSpec::from_yaml(yaml).map_err(|e| FlowError::SpecParse(format!("built-in '{}': {}", name, e)))
}

/// Every built-in flow, parsed
pub fn all() -> FlowResult<Vec<FlowSpec>> {
    BUILTINS.iter().map(|(name, _)| find(name)).collect()
}
