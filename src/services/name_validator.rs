//! Naming rules for buckets (projects) before anything touches the network.
//!
//! Rules:
//! - lowercase letters, digits and hyphens only
//! - length within the configured bounds (3–63 by default)
//! - starts and ends with a letter or digit, no consecutive hyphens
//! - not already taken, or (in ownable mode) taken by the caller
//!
//! Evaluation is pure and never fails; an empty candidate simply fails the
//! character and length rules.

use crate::errors::{AirlockError, AirlockResult};
use crate::models::validation::{
    Check, NameReport, Rule, ValidationHelper, ValidationResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 63;

/// How a collision with an already-known name is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniquenessMode {
    /// Any known name is a collision.
    #[default]
    Strict,
    /// A known name owned by the caller may be reused.
    Ownable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyConfig")]
pub struct NamingPolicy {
    min_len: usize,
    max_len: usize,
    uniqueness: UniquenessMode,
}

#[derive(Deserialize)]
#[serde(default)]
struct PolicyConfig {
    min_len: usize,
    max_len: usize,
    uniqueness: UniquenessMode,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_len: NAME_MIN_LEN,
            max_len: NAME_MAX_LEN,
            uniqueness: UniquenessMode::Strict,
        }
    }
}

impl TryFrom<PolicyConfig> for NamingPolicy {
    type Error = AirlockError;

    fn try_from(cfg: PolicyConfig) -> Result<Self, Self::Error> {
        NamingPolicy::new(cfg.min_len, cfg.max_len, cfg.uniqueness)
    }
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            min_len: NAME_MIN_LEN,
            max_len: NAME_MAX_LEN,
            uniqueness: UniquenessMode::Strict,
        }
    }
}

impl NamingPolicy {
    pub fn new(min_len: usize, max_len: usize, uniqueness: UniquenessMode) -> AirlockResult<Self> {
        if min_len == 0 {
            return Err(AirlockError::InvalidPolicy(
                "minimum name length must be at least 1".into(),
            ));
        }
        if min_len > max_len {
            return Err(AirlockError::InvalidPolicy(format!(
                "minimum name length {min_len} exceeds maximum {max_len}"
            )));
        }
        Ok(Self {
            min_len,
            max_len,
            uniqueness,
        })
    }

    pub fn with_uniqueness(mut self, uniqueness: UniquenessMode) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn uniqueness(&self) -> UniquenessMode {
        self.uniqueness
    }
}

/// Names already in use, and which of them belong to the requesting caller.
///
/// `owned` is `None` while ownership has not been looked up; an ownable-mode
/// collision then stays `Pending`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingNames {
    names: BTreeSet<String>,
    owned: Option<BTreeSet<String>>,
}

impl ExistingNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            owned: None,
        }
    }

    /// Record which known names the caller owns. Owned names are also known.
    pub fn with_owned<I, S>(mut self, owned: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let owned: BTreeSet<String> = owned.into_iter().map(Into::into).collect();
        self.names.extend(owned.iter().cloned());
        self.owned = Some(owned);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn ownership(&self, name: &str) -> Option<bool> {
        self.owned.as_ref().map(|owned| owned.contains(name))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NameValidator {
    policy: NamingPolicy,
}

impl NameValidator {
    pub fn new(policy: NamingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &NamingPolicy {
        &self.policy
    }

    pub fn validate(&self, candidate: &str, existing: &ExistingNames) -> ValidationResult {
        ValidationResult {
            lower_case_or_numeric: Check::from_bool(is_lower_case_or_numeric(candidate)),
            length_in_range: Check::from_bool(self.is_length_in_range(candidate)),
            alpha_numeric_dash: Check::from_bool(is_alpha_numeric_dash(candidate)),
            unique_or_ownable: self.uniqueness(candidate, existing),
        }
    }

    /// Validate and attach the helpers a display surface renders.
    pub fn report(&self, candidate: &str, existing: &ExistingNames) -> NameReport {
        let result = self.validate(candidate, existing);
        NameReport {
            helpers: self.helpers(&result),
            result,
        }
    }

    /// One helper per rule, always in [`Rule::ALL`] order.
    pub fn helpers(&self, result: &ValidationResult) -> Vec<ValidationHelper> {
        Rule::ALL
            .into_iter()
            .map(|rule| ValidationHelper {
                check: rule,
                message: self.message(rule),
                severity: result.get(rule).severity(),
            })
            .collect()
    }

    fn message(&self, rule: Rule) -> String {
        match rule {
            Rule::LowerCaseOrNumeric => {
                "Only lowercase letters (a-z), numbers (0-9) and hyphens (-)".into()
            }
            Rule::LengthInRange => format!(
                "Between {} and {} characters",
                self.policy.min_len, self.policy.max_len
            ),
            Rule::AlphaNumericDash => {
                "Starts and ends with a letter or number, no consecutive hyphens".into()
            }
            Rule::UniqueOrOwnable => match self.policy.uniqueness {
                UniquenessMode::Strict => "Not already in use".into(),
                UniquenessMode::Ownable => "Not in use by another project".into(),
            },
        }
    }

    fn is_length_in_range(&self, candidate: &str) -> bool {
        let len = candidate.chars().count();
        (self.policy.min_len..=self.policy.max_len).contains(&len)
    }

    fn uniqueness(&self, candidate: &str, existing: &ExistingNames) -> Check {
        if !existing.contains(candidate) {
            return Check::Pass;
        }
        match self.policy.uniqueness {
            UniquenessMode::Strict => Check::Fail,
            UniquenessMode::Ownable => match existing.ownership(candidate) {
                Some(owned) => Check::from_bool(owned),
                None => Check::Pending,
            },
        }
    }
}

fn is_name_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '-')
}

fn is_lower_case_or_numeric(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.chars().all(is_name_char)
}

fn is_alpha_numeric_dash(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.chars().all(is_name_char)
        && !candidate.starts_with('-')
        && !candidate.ends_with('-')
        && !candidate.contains("--")
}
