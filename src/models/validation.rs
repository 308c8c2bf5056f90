//! Outcome of evaluating the naming rules against one candidate name.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// State of a single naming rule.
///
/// `Pending` means the rule has not been evaluated yet (for example while an
/// ownership lookup is still in flight). It is neither a pass nor a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Check {
    Pass,
    Fail,
    #[default]
    Pending,
}

impl Check {
    pub fn from_bool(passed: bool) -> Self {
        if passed { Check::Pass } else { Check::Fail }
    }

    pub fn is_pass(self) -> bool {
        self == Check::Pass
    }

    pub fn is_fail(self) -> bool {
        self == Check::Fail
    }

    pub fn severity(self) -> Severity {
        match self {
            Check::Pass => Severity::Success,
            Check::Fail => Severity::Error,
            Check::Pending => Severity::Info,
        }
    }
}

// Wire form is `true` / `false` / `null`.
impl Serialize for Check {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Check::Pass => serializer.serialize_bool(true),
            Check::Fail => serializer.serialize_bool(false),
            Check::Pending => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Check {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<bool>::deserialize(deserializer)? {
            Some(passed) => Check::from_bool(passed),
            None => Check::Pending,
        })
    }
}

/// The four naming rules, in the order their helpers are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rule {
    LowerCaseOrNumeric,
    LengthInRange,
    AlphaNumericDash,
    UniqueOrOwnable,
}

impl Rule {
    pub const ALL: [Rule; 4] = [
        Rule::LowerCaseOrNumeric,
        Rule::LengthInRange,
        Rule::AlphaNumericDash,
        Rule::UniqueOrOwnable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Rule::LowerCaseOrNumeric => "lowerCaseOrNumeric",
            Rule::LengthInRange => "lengthInRange",
            Rule::AlphaNumericDash => "alphaNumericDash",
            Rule::UniqueOrOwnable => "uniqueOrOwnable",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Icon class a display surface should use for a helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// Per-rule results for one candidate name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub lower_case_or_numeric: Check,
    pub length_in_range: Check,
    pub alpha_numeric_dash: Check,
    pub unique_or_ownable: Check,
}

impl ValidationResult {
    /// Result before any rule has been evaluated.
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn get(&self, rule: Rule) -> Check {
        match rule {
            Rule::LowerCaseOrNumeric => self.lower_case_or_numeric,
            Rule::LengthInRange => self.length_in_range,
            Rule::AlphaNumericDash => self.alpha_numeric_dash,
            Rule::UniqueOrOwnable => self.unique_or_ownable,
        }
    }

    /// True only when every rule is `Pass`.
    pub fn is_valid(&self) -> bool {
        Rule::ALL.iter().all(|rule| self.get(*rule).is_pass())
    }

    /// True once no rule is `Pending`.
    pub fn is_settled(&self) -> bool {
        Rule::ALL
            .iter()
            .all(|rule| self.get(*rule) != Check::Pending)
    }

    pub fn failing_rules(&self) -> Vec<Rule> {
        Rule::ALL
            .into_iter()
            .filter(|rule| self.get(*rule).is_fail())
            .collect()
    }
}

/// Display guidance for one rule. One helper exists per rule regardless of
/// whether the rule passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationHelper {
    pub check: Rule,
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
}

/// Validation result together with its helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameReport {
    pub result: ValidationResult,
    pub helpers: Vec<ValidationHelper>,
}

impl NameReport {
    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }
}
