//! Element locators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lookup strategy understood by the automation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "xpath")]
    XPath,
    #[serde(rename = "accessibility id")]
    AccessibilityId,
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "class name")]
    ClassName,
    #[serde(rename = "-android uiautomator")]
    UiAutomator,
}

impl Strategy {
    /// Wire name sent as `using`
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::XPath => "xpath",
            Strategy::AccessibilityId => "accessibility id",
            Strategy::Id => "id",
            Strategy::ClassName => "class name",
            Strategy::UiAutomator => "-android uiautomator",
        }
    }
}

/// A strategy plus the expression to look up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    #[serde(rename = "using")]
    pub strategy: Strategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, expr)
    }

    pub fn accessibility_id(id: impl Into<String>) -> Self {
        Self::new(Strategy::AccessibilityId, id)
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Strategy::Id, id)
    }

    pub fn class_name(name: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, name)
    }

    pub fn uiautomator(selector: impl Into<String>) -> Self {
        Self::new(Strategy::UiAutomator, selector)
    }

    /// Any element whose visible text equals `text`
    pub fn text(text: &str) -> Self {
        Self::xpath(format!("//*[@text={}]", xpath_literal(text)))
    }

    /// Any element whose `content-desc` equals `desc`
    pub fn content_desc(desc: &str) -> Self {
        Self::xpath(format!("//*[@content-desc={}]", xpath_literal(desc)))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy.as_str(), self.value)
    }
}

/// Quote a string for use inside an XPath expression.
///
/// XPath 1.0 has no escape sequences, so a value containing both quote kinds
/// is assembled with `concat()`.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('"') {
        return format!("\"{}\"", s);
    }
    if !s.contains('\'') {
        return format!("'{}'", s);
    }
    let parts: Vec<String> = s
        .split('"')
        .map(|p| format!("\"{}\"", p))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("NEXT", r#"//*[@text="NEXT"]"#)]
    #[test_case("I'VE ALREADY PAID", r#"//*[@text="I'VE ALREADY PAID"]"#)]
    #[test_case(r#"say "hi""#, r#"//*[@text='say "hi"']"#)]
    fn text_locator(text: &str, expected: &str) {
        assert_eq!(Locator::text(text).value, expected);
    }

    #[test]
    fn literal_with_both_quotes_uses_concat() {
        assert_eq!(
            xpath_literal(r#"it's "x""#),
            r#"concat("it's ", '"', "x", '"', "")"#
        );
    }

    #[test]
    fn serializes_as_using_value() {
        let json = serde_json::to_value(Locator::accessibility_id("register-id-number")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"using": "accessibility id", "value": "register-id-number"})
        );
    }

    #[test]
    fn display_names_strategy() {
        assert_eq!(
            Locator::content_desc("onboarding-button").to_string(),
            r#"xpath=//*[@content-desc="onboarding-button"]"#
        );
    }
}
