//! Throwaway identities for registration flows
//!
//! Every generator takes the RNG as a parameter so a seeded run produces the
//! same email, national id and password each time.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FlowError, FlowResult};

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!#$%&*+-=?@^_";

const PASSPHRASE_WORDS: &[&str] = &[
    "amber", "anchor", "basil", "beacon", "birch", "canyon", "cedar", "cobalt", "comet", "coral",
    "delta", "ember", "falcon", "fjord", "garnet", "glacier", "harbor", "hazel", "indigo", "island",
    "jasper", "juniper", "kelp", "lagoon", "lantern", "maple", "meadow", "nebula", "nimbus", "oasis",
    "onyx", "orchid", "pebble", "pine", "quartz", "quill", "raven", "reef", "saffron", "sierra",
    "summit", "tundra", "umber", "valley", "velvet", "willow", "yarrow", "zephyr",
];

/// Retries before giving up on a password that keeps failing the strength check
const MAX_PASSWORD_ATTEMPTS: usize = 32;

/// Value generator declared under `variables:` in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "generator", rename_all = "snake_case")]
pub enum Generator {
    /// `{prefix}{n}@{domain}` with `n` in `[min, max)`
    Email {
        #[serde(default = "default_email_prefix")]
        prefix: String,
        #[serde(default = "default_email_domain")]
        domain: String,
        #[serde(default = "default_email_min")]
        min: u64,
        #[serde(default = "default_email_max")]
        max: u64,
    },

    /// Integer in `[min, max)`
    Number { min: u64, max: u64 },

    /// 13-digit national identity number
    NationalId,

    /// Random characters from all four classes
    Password {
        #[serde(default = "default_password_min")]
        min_length: usize,
        #[serde(default = "default_password_max")]
        max_length: usize,
    },

    /// Words joined by `_`, randomly upper-cased, with a numeric suffix
    Passphrase {
        #[serde(default = "default_passphrase_words")]
        words: usize,
    },

    /// Decimal amount in `[min, max)` with two decimals
    Amount { min: f64, max: f64 },

    Literal { value: String },
}

fn default_email_prefix() -> String {
    "testemail".to_string()
}

fn default_email_domain() -> String {
    "test.tst".to_string()
}

fn default_email_min() -> u64 {
    1000
}

fn default_email_max() -> u64 {
    100_000
}

fn default_password_min() -> usize {
    15
}

fn default_password_max() -> usize {
    16
}

fn default_passphrase_words() -> usize {
    2
}

impl Generator {
    /// Whether generated values must be kept out of logs and reports
    pub fn is_secret(&self) -> bool {
        matches!(self, Generator::Password { .. } | Generator::Passphrase { .. })
    }

    /// Check parameters without generating anything
    pub fn validate(&self) -> FlowResult<()> {
        let bad = |msg: String| Err(FlowError::Generator(msg));
        match self {
            Generator::Email { min, max, .. } | Generator::Number { min, max } if min >= max => {
                bad(format!("empty range [{}, {})", min, max))
            }
            Generator::Password { min_length, max_length } if min_length > max_length => {
                bad(format!("min_length {} exceeds max_length {}", min_length, max_length))
            }
            Generator::Password { min_length, .. } if *min_length < 8 => {
                bad(format!("min_length {} is below the strength minimum of 8", min_length))
            }
            Generator::Passphrase { words } if *words < 2 => {
                bad(format!("passphrase needs at least two words, got {}", words))
            }
            Generator::Amount { min, max } if !(min.is_finite() && max.is_finite() && (max - min).is_finite()) => {
                bad(format!("amount bounds must be finite, got [{}, {})", min, max))
            }
            Generator::Amount { min, max } if !(min < max) => bad(format!("empty range [{}, {})", min, max)),
            _ => Ok(()),
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> FlowResult<String> {
        self.validate()?;
        Ok(match self {
            Generator::Email { prefix, domain, min, max } => email(rng, prefix, domain, *min, *max),
            Generator::Number { min, max } => rng.gen_range(*min..*max).to_string(),
            Generator::NationalId => national_id(rng),
            Generator::Password { min_length, max_length } => {
                retry_until_strong(|| password(&mut *rng, *min_length, *max_length))?
            }
            Generator::Passphrase { words } => retry_until_strong(|| passphrase(&mut *rng, *words))?,
            Generator::Amount { min, max } => amount(rng, *min, *max),
            Generator::Literal { value } => value.clone(),
        })
    }
}

/// Generate every declared variable
pub fn resolve<R: Rng + ?Sized>(
    variables: &BTreeMap<String, Generator>,
    rng: &mut R,
) -> FlowResult<BTreeMap<String, String>> {
    variables
        .iter()
        .map(|(name, generator)| Ok((name.clone(), generator.generate(rng)?)))
        .collect()
}

pub fn email<R: Rng + ?Sized>(rng: &mut R, prefix: &str, domain: &str, min: u64, max: u64) -> String {
    format!("{}{}@{}", prefix, rng.gen_range(min..max), domain)
}

pub fn national_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(1_000_000_000_000u64..10_000_000_000_000u64).to_string()
}

pub fn amount<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> String {
    format!("{:.2}", rng.gen_range(min..max))
}

/// Password with at least one character of every class
pub fn password<R: Rng + ?Sized>(rng: &mut R, min_length: usize, max_length: usize) -> String {
    let classes = [LOWER, UPPER, DIGITS, SPECIAL];
    let len = rng.gen_range(min_length..=max_length).max(classes.len());

    let mut chars: Vec<u8> = classes
        .iter()
        .filter_map(|class| class.choose(rng).copied())
        .collect();
    let all: Vec<u8> = classes.concat();
    while chars.len() < len {
        if let Some(c) = all.choose(rng) {
            chars.push(*c);
        }
    }
    chars.shuffle(rng);
    String::from_utf8_lossy(&chars).into_owned()
}

pub fn passphrase<R: Rng + ?Sized>(rng: &mut R, words: usize) -> String {
    let mut parts = Vec::with_capacity(words);
    for _ in 0..words {
        let word = PASSPHRASE_WORDS.choose(rng).copied().unwrap_or("word");
        if rng.gen_bool(0.5) {
            parts.push(word.to_uppercase());
        } else {
            parts.push(word.to_string());
        }
    }
    format!("{}{}", parts.join("_"), rng.gen_range(1..1000))
}

fn retry_until_strong(mut make: impl FnMut() -> String) -> FlowResult<String> {
    for _ in 0..MAX_PASSWORD_ATTEMPTS {
        let candidate = make();
        if evaluate_strength(&candidate).is_strong() {
            return Ok(candidate);
        }
    }
    Err(FlowError::Generator(format!(
        "no strong password after {} attempts",
        MAX_PASSWORD_ATTEMPTS
    )))
}

/// Outcome of [`evaluate_strength`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Strength {
    /// Failed required checks
    pub errors: Vec<String>,
    pub optional_passed: usize,
}

impl Strength {
    pub fn is_strong(&self) -> bool {
        self.errors.is_empty()
    }
}

/// OWASP-style password strength check.
///
/// Required: length within 8..=128 and no character repeated three times in
/// a row. Optional (all four must pass): lowercase, uppercase, digit and
/// special character.
pub fn evaluate_strength(password: &str) -> Strength {
    const MIN_LEN: usize = 8;
    const MAX_LEN: usize = 128;
    const MIN_OPTIONAL: usize = 4;

    let mut errors = Vec::new();
    let len = password.chars().count();
    if len < MIN_LEN {
        errors.push(format!("The password must be at least {} characters long.", MIN_LEN));
    }
    if len > MAX_LEN {
        errors.push(format!("The password must be fewer than {} characters.", MAX_LEN));
    }
    let chars: Vec<char> = password.chars().collect();
    if chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2]) {
        errors.push("The password may not contain sequences of three or more repeated characters.".into());
    }

    let optional = [
        (password.chars().any(|c| c.is_ascii_lowercase()), "at least one lowercase letter"),
        (password.chars().any(|c| c.is_ascii_uppercase()), "at least one uppercase letter"),
        (password.chars().any(|c| c.is_ascii_digit()), "at least one number"),
        (password.chars().any(|c| !c.is_ascii_alphanumeric()), "at least one special character"),
    ];
    let optional_passed = optional.iter().filter(|(ok, _)| *ok).count();
    if optional_passed < MIN_OPTIONAL {
        for (_, msg) in optional.iter().filter(|(ok, _)| !*ok) {
            errors.push(format!("The password must contain {}.", msg));
        }
    }

    Strength {
        errors,
        optional_passed,
    }
}
