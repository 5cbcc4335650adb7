//! `${name}` substitution in step values

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

use crate::error::{FlowError, FlowResult};

static VAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"));

/// Names referenced by `input`, in order of appearance
pub fn references(input: &str) -> Vec<String> {
    VAR_REF
        .captures_iter(input)
        .map(|c| c[1].to_string())
        .collect()
}

/// Replace every `${name}` with its value
pub fn render(input: &str, vars: &BTreeMap<String, String>) -> FlowResult<String> {
    if let Some(missing) = references(input).into_iter().find(|n| !vars.contains_key(n)) {
        return Err(FlowError::UnknownVariable(missing));
    }
    Ok(VAR_REF
        .replace_all(input, |c: &Captures| vars[&c[1]].clone())
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("email".to_string(), "testemail4242@test.tst".to_string()),
            ("id_number".to_string(), "8001015009087".to_string()),
        ])
    }

    #[test]
    fn renders_known_variables() {
        assert_eq!(
            render("user ${email} / ${id_number}", &vars()).unwrap(),
            "user testemail4242@test.tst / 8001015009087"
        );
        assert_eq!(render("no refs", &vars()).unwrap(), "no refs");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let err = render("${password}", &vars()).unwrap_err();
        assert!(matches!(err, FlowError::UnknownVariable(n) if n == "password"));
    }

    #[test]
    fn dollar_without_braces_is_literal() {
        assert_eq!(render("$5 and ${email}", &vars()).unwrap(), "$5 and testemail4242@test.tst");
        assert_eq!(references("$email ${ email }"), Vec::<String>::new());
    }
}
