//! Verdict vocabulary and the escalation rule for atomic sub-checks
//!
//! Every step and every atomic check ends in one of three verdicts:
//! - `Pass`: deterministically confirmed
//! - `Warn`: observed but not provably correct (often SPEC_REQUIRED)
//! - `Fail`: expected anchor or behavior absent
//!
//! When an intent produces several atomic checks the parent verdict is never
//! stored independently; it is always derived with [`escalate`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal verdict of a step or an atomic check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    /// Lowercase label used for atomic check records
    pub fn as_lower(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Warn => "warn",
            Verdict::Fail => "fail",
        }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Verdict::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "Pass"),
            Verdict::Warn => write!(f, "Warn"),
            Verdict::Fail => write!(f, "Fail"),
        }
    }
}

/// Fail dominates warn dominates pass. An empty set escalates to `Pass`.
pub fn escalate<I>(verdicts: I) -> Verdict
where
    I: IntoIterator<Item = Verdict>,
{
    verdicts.into_iter().fold(Verdict::Pass, |acc, v| acc.max(v))
}

/// Serde helper for the lowercase atomic-check representation
mod lowercase {
    use super::Verdict;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Verdict, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(v.as_lower())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Verdict, D::Error> {
        let raw = String::deserialize(d)?;
        match raw.to_ascii_lowercase().as_str() {
            "pass" => Ok(Verdict::Pass),
            "warn" => Ok(Verdict::Warn),
            "fail" => Ok(Verdict::Fail),
            other => Err(serde::de::Error::custom(format!("unknown verdict '{}'", other))),
        }
    }
}

/// A single independently scored sub-condition of an intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicCheck {
    pub name: String,
    #[serde(with = "lowercase")]
    pub status: Verdict,
    pub detail: String,
}

impl AtomicCheck {
    pub fn new(name: impl Into<String>, status: Verdict, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }

    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, Verdict::Pass, detail)
    }

    pub fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, Verdict::Warn, detail)
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, Verdict::Fail, detail)
    }
}

/// Ordered set of atomic checks belonging to one intent execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomicCheckResult {
    checks: Vec<AtomicCheck>,
}

impl AtomicCheckResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, check: AtomicCheck) -> &mut Self {
        self.checks.push(check);
        self
    }

    pub fn checks(&self) -> &[AtomicCheck] {
        &self.checks
    }

    pub fn get(&self, name: &str) -> Option<&AtomicCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Parent verdict derived from the set
    pub fn overall(&self) -> Verdict {
        escalate(self.checks.iter().map(|c| c.status))
    }

    /// One-line `name=status` summary for step messages
    pub fn summary(&self) -> String {
        self.checks
            .iter()
            .map(|c| format!("{}={}", c.name, c.status.as_lower()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<AtomicCheck> for AtomicCheckResult {
    fn from_iter<T: IntoIterator<Item = AtomicCheck>>(iter: T) -> Self {
        Self {
            checks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_fail_dominates() {
        assert_eq!(
            escalate([Verdict::Pass, Verdict::Warn, Verdict::Fail]),
            Verdict::Fail
        );
        assert_eq!(escalate([Verdict::Pass, Verdict::Warn]), Verdict::Warn);
        assert_eq!(escalate([Verdict::Pass, Verdict::Pass]), Verdict::Pass);
        assert_eq!(escalate(Vec::<Verdict>::new()), Verdict::Pass);
    }

    #[test]
    fn test_single_pass_does_not_mask_unverified_sibling() {
        let set: AtomicCheckResult = vec![
            AtomicCheck::pass("deactivated_tabs", "found 2"),
            AtomicCheck::warn("many_tabs", "SPEC_REQUIRED"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.overall(), Verdict::Warn);
    }

    #[test]
    fn test_every_subset_respects_escalation() {
        let all = [Verdict::Pass, Verdict::Warn, Verdict::Fail];
        for a in all {
            for b in all {
                for c in all {
                    let set: AtomicCheckResult = [a, b, c]
                        .iter()
                        .enumerate()
                        .map(|(i, v)| AtomicCheck::new(format!("c{}", i), *v, ""))
                        .collect();
                    let expected = if [a, b, c].contains(&Verdict::Fail) {
                        Verdict::Fail
                    } else if [a, b, c].contains(&Verdict::Warn) {
                        Verdict::Warn
                    } else {
                        Verdict::Pass
                    };
                    assert_eq!(set.overall(), expected);
                }
            }
        }
    }

    #[test]
    fn test_atomic_serializes_lowercase() {
        let check = AtomicCheck::warn("many_tabs", "tab count 7 reported");
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["status"], "warn");
        let back: AtomicCheck = serde_json::from_value(json).unwrap();
        assert_eq!(back.status, Verdict::Warn);
    }

    #[test]
    fn test_summary_format() {
        let set: AtomicCheckResult = vec![
            AtomicCheck::warn("many_tabs", ""),
            AtomicCheck::fail("arrows_functional", ""),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.summary(), "many_tabs=warn, arrows_functional=fail");
    }
}
