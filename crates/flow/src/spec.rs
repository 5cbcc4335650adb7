//! Flow files: steps, targets and validation

use appdrive_driver::{Capabilities, KeyCode, Locator, Strategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::error::{FlowError, FlowResult};
use crate::generate::Generator;
use crate::template;

/// A complete flow parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    /// Unique name for this flow
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering flows
    #[serde(default)]
    pub tags: Vec<String>,

    /// Capabilities layered over the runner defaults
    #[serde(default)]
    pub capabilities: Option<Capabilities>,

    /// Values generated once per run and referenced as `${name}`
    #[serde(default)]
    pub variables: BTreeMap<String, Generator>,

    /// Steps to execute in order
    pub steps: Vec<FlowStep>,
}

/// One step plus the flags shared by every action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStep {
    #[serde(flatten)]
    pub action: Action,

    /// A failing optional step is logged and the flow carries on
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl From<Action> for FlowStep {
    fn from(action: Action) -> Self {
        Self {
            action,
            optional: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Wait a fixed amount of time
    Sleep { ms: u64 },

    /// Click an element, possibly several times
    Tap {
        target: Target,
        #[serde(default = "default_times")]
        times: u32,
        /// Poll for the element up to this long instead of a single lookup
        #[serde(default)]
        wait_ms: Option<u64>,
    },

    /// Focus a text field, clear it and type a value
    Fill {
        target: Target,
        value: String,
        /// DEL key events sent after focusing
        #[serde(default)]
        clear_keystrokes: u32,
        /// One DEL per character of the field's current text
        #[serde(default)]
        clear_existing: bool,
        /// Pause between clearing and typing
        #[serde(default)]
        settle_ms: u64,
        /// Press DPAD_CENTER after typing
        #[serde(default)]
        submit: bool,
        /// Press BACK after typing to dismiss the keyboard
        #[serde(default)]
        hide_keyboard: bool,
        #[serde(default)]
        wait_ms: Option<u64>,
    },

    /// Send an Android key event
    PressKey {
        key: KeyCode,
        #[serde(default = "default_times")]
        times: u32,
    },

    /// Shorthand for `press_key: back`
    Back,

    /// Drag from one element to another
    Scroll { from: Target, to: Target },

    /// Poll until the element is present
    WaitFor {
        target: Target,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    AssertText {
        target: Target,
        #[serde(default)]
        equals: Option<String>,
        #[serde(default)]
        contains: Option<String>,
    },

    AssertVisible {
        target: Target,
        #[serde(default = "default_visible")]
        visible: bool,
    },

    /// Save a PNG of the current screen
    Screenshot { name: String },

    /// Log the driver settings
    LogSettings,

    Log { message: String },
}

fn default_times() -> u32 {
    1
}

fn default_visible() -> bool {
    true
}

/// One locator or an ordered fallback chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TargetSpec", into = "TargetSpec")]
pub struct Target(pub Vec<Locator>);

impl Target {
    pub fn locators(&self) -> &[Locator] {
        &self.0
    }

    /// Label for logs and reports: the first locator
    pub fn label(&self) -> String {
        match self.0.as_slice() {
            [] => "<none>".to_string(),
            [only] => only.to_string(),
            [first, rest @ ..] => format!("{} (+{} fallback)", first, rest.len()),
        }
    }
}

impl From<Locator> for Target {
    fn from(locator: Locator) -> Self {
        Target(vec![locator])
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetSpec {
    Chain(Vec<LocatorSpec>),
    One(LocatorSpec),
}

impl TryFrom<TargetSpec> for Target {
    type Error = String;

    fn try_from(spec: TargetSpec) -> Result<Self, Self::Error> {
        let specs = match spec {
            TargetSpec::Chain(specs) => specs,
            TargetSpec::One(spec) => vec![spec],
        };
        if specs.is_empty() {
            return Err("empty locator chain".to_string());
        }
        specs.into_iter().map(Locator::try_from).collect::<Result<Vec<_>, _>>().map(Target)
    }
}

impl From<Target> for TargetSpec {
    fn from(target: Target) -> Self {
        let mut specs: Vec<LocatorSpec> = target.0.into_iter().map(LocatorSpec::from).collect();
        if specs.len() == 1 {
            TargetSpec::One(specs.remove(0))
        } else {
            TargetSpec::Chain(specs)
        }
    }
}

/// How a locator is written in YAML: exactly one key set
#[derive(Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocatorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    accessibility_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uiautomator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_desc: Option<String>,
}

impl TryFrom<LocatorSpec> for Locator {
    type Error = String;

    fn try_from(spec: LocatorSpec) -> Result<Self, Self::Error> {
        let candidates = [
            spec.xpath.map(Locator::xpath),
            spec.accessibility_id.map(Locator::accessibility_id),
            spec.id.map(Locator::id),
            spec.class_name.map(Locator::class_name),
            spec.uiautomator.map(Locator::uiautomator),
            spec.text.as_deref().map(Locator::text),
            spec.content_desc.as_deref().map(Locator::content_desc),
        ];
        let mut set: Vec<Locator> = candidates.into_iter().flatten().collect();
        match set.len() {
            1 => Ok(set.remove(0)),
            0 => Err("locator needs one of xpath, accessibility_id, id, class_name, uiautomator, text, content_desc".to_string()),
            n => Err(format!("locator sets {} strategies; use a list for fallbacks", n)),
        }
    }
}

impl From<Locator> for LocatorSpec {
    fn from(locator: Locator) -> Self {
        let mut spec = LocatorSpec::default();
        let value = Some(locator.value);
        match locator.strategy {
            Strategy::XPath => spec.xpath = value,
            Strategy::AccessibilityId => spec.accessibility_id = value,
            Strategy::Id => spec.id = value,
            Strategy::ClassName => spec.class_name = value,
            Strategy::UiAutomator => spec.uiautomator = value,
        }
        spec
    }
}

/// Keys accepted on a step of each action, besides `action` and `optional`
const ACTION_FIELDS: &[(&str, &[&str])] = &[
    ("sleep", &["ms"]),
    ("tap", &["target", "times", "wait_ms"]),
    (
        "fill",
        &[
            "target",
            "value",
            "clear_keystrokes",
            "clear_existing",
            "settle_ms",
            "submit",
            "hide_keyboard",
            "wait_ms",
        ],
    ),
    ("press_key", &["key", "times"]),
    ("back", &[]),
    ("scroll", &["from", "to"]),
    ("wait_for", &["target", "timeout_ms"]),
    ("assert_text", &["target", "equals", "contains"]),
    ("assert_visible", &["target", "visible"]),
    ("screenshot", &["name"]),
    ("log_settings", &[]),
    ("log", &["message"]),
];

/// Reject keys no action understands; flattened steps would drop them silently
fn check_step_fields(doc: &serde_yaml::Value) -> FlowResult<()> {
    let Some(steps) = doc.get("steps").and_then(|s| s.as_sequence()) else {
        return Ok(());
    };
    for (i, step) in steps.iter().enumerate() {
        let Some(map) = step.as_mapping() else { continue };
        let Some(action) = map.get("action").and_then(|a| a.as_str()) else {
            continue;
        };
        // Unknown actions are reported by the parser itself
        let Some((_, fields)) = ACTION_FIELDS.iter().find(|(name, _)| *name == action) else {
            continue;
        };
        for key in map.keys() {
            let key = key.as_str().unwrap_or_default();
            if key != "action" && key != "optional" && !fields.contains(&key) {
                return Err(FlowError::SpecParse(format!(
                    "step {} ({}): unknown field '{}', expected one of: {}",
                    i + 1,
                    action,
                    key,
                    fields.join(", ")
                )));
            }
        }
    }
    Ok(())
}

impl Action {
    /// Short name for logs and reports
    pub fn describe(&self) -> String {
        match self {
            Action::Sleep { ms } => format!("sleep:{}ms", ms),
            Action::Tap { target, times, .. } if *times > 1 => {
                format!("tap x{}:{}", times, target.label())
            }
            Action::Tap { target, .. } => format!("tap:{}", target.label()),
            Action::Fill { target, .. } => format!("fill:{}", target.label()),
            Action::PressKey { key, times } if *times > 1 => format!("press_key x{}:{}", times, key),
            Action::PressKey { key, .. } => format!("press_key:{}", key),
            Action::Back => "back".to_string(),
            Action::Scroll { from, to } => format!("scroll:{} -> {}", from.label(), to.label()),
            Action::WaitFor { target, .. } => format!("wait_for:{}", target.label()),
            Action::AssertText { target, .. } => format!("assert_text:{}", target.label()),
            Action::AssertVisible { target, .. } => format!("assert_visible:{}", target.label()),
            Action::Screenshot { name } => format!("screenshot:{}", name),
            Action::LogSettings => "log_settings".to_string(),
            Action::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    /// Every string that goes through `${var}` substitution
    fn templated(&self) -> Vec<&str> {
        match self {
            Action::Fill { value, .. } => vec![value.as_str()],
            Action::Log { message } => vec![message.as_str()],
            Action::AssertText { equals, contains, .. } => {
                equals.iter().chain(contains.iter()).map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl FlowSpec {
    /// Parse a flow from a YAML string
    pub fn from_yaml(yaml: &str) -> FlowResult<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        check_step_fields(&doc)?;
        serde_yaml::from_value(doc).map_err(FlowError::from)
    }

    /// Parse a flow from a YAML file
    pub fn from_file(path: &Path) -> FlowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| FlowError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all flows from a directory
    pub fn load_all(dir: &Path) -> FlowResult<Vec<Self>> {
        let mut flows = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            flows.push(Self::from_file(entry.path())?);
        }

        Ok(flows)
    }

    /// Find a flow by name under `dir`, skipping files that do not parse
    pub fn find_in_dir(dir: &Path, name: &str) -> FlowResult<Option<Self>> {
        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            match Self::from_file(entry.path()) {
                Ok(flow) if flow.name == name => return Ok(Some(flow)),
                Ok(_) => {}
                Err(FlowError::Io(e)) => return Err(FlowError::Io(e)),
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }
        Ok(None)
    }

    /// Filter flows by tag
    pub fn filter_by_tag<'a>(flows: &'a [Self], tag: &str) -> Vec<&'a Self> {
        flows.iter().filter(|f| f.tags.iter().any(|t| t == tag)).collect()
    }

    /// Structural checks that do not need a device
    pub fn validate(&self) -> FlowResult<()> {
        let invalid = |reason: String| FlowError::Invalid {
            flow: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("no steps".to_string()));
        }
        for (name, generator) in &self.variables {
            generator
                .validate()
                .map_err(|e| invalid(format!("variable '{}': {}", name, e)))?;
        }

        for (i, step) in self.steps.iter().enumerate() {
            let at = |reason: String| invalid(format!("step {} ({}): {}", i + 1, step.action.describe(), reason));

            match &step.action {
                Action::Tap { times: 0, .. } | Action::PressKey { times: 0, .. } => {
                    return Err(at("times must be at least 1".to_string()));
                }
                Action::AssertText { equals: None, contains: None, .. } => {
                    return Err(at("needs equals or contains".to_string()));
                }
                _ => {}
            }

            for text in step.action.templated() {
                if let Some(missing) = template::references(text)
                    .into_iter()
                    .find(|r| !self.variables.contains_key(r))
                {
                    return Err(at(format!("undeclared variable ${{{}}}", missing)));
                }
            }
        }
        Ok(())
    }

    /// Names of variables whose values must not be reported
    pub fn secret_variables(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|(_, g)| g.is_secret())
            .map(|(n, _)| n.as_str())
            .collect()
    }
}
