//! Label selector compilation and matching
//!
//! A [`LabelSelector`] from the API is compiled once into a [`Selector`],
//! a canonical list of requirements that every label set is evaluated
//! against. All requirements must hold for a selector to match.

use crate::{FlotillaError, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Relationship between a label key and a set of values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    Equals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl Operator {
    /// Parse a `matchExpressions` operator
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "In" => Ok(Self::In),
            "NotIn" => Ok(Self::NotIn),
            "Exists" => Ok(Self::Exists),
            "DoesNotExist" => Ok(Self::DoesNotExist),
            other => Err(FlotillaError::invalid_selector(format!(
                "unsupported operator {:?}",
                other
            ))),
        }
    }
}

/// A single compiled constraint
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    /// Build a requirement, checking operand arity for the operator
    pub fn new(
        key: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let key = key.into();
        let values: BTreeSet<String> = values.into_iter().collect();

        if key.is_empty() {
            return Err(FlotillaError::invalid_selector("label key must not be empty"));
        }

        match operator {
            Operator::Equals if values.len() != 1 => {
                return Err(FlotillaError::invalid_selector(format!(
                    "exactly one value required for key {:?}",
                    key
                )));
            }
            Operator::In | Operator::NotIn if values.is_empty() => {
                return Err(FlotillaError::invalid_selector(format!(
                    "values must be non-empty for operator {:?} on key {:?}",
                    operator, key
                )));
            }
            Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
                return Err(FlotillaError::invalid_selector(format!(
                    "values must be empty for operator {:?} on key {:?}",
                    operator, key
                )));
            }
            _ => {}
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    /// Check the requirement against a label set
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, joined()),
            Operator::In => write!(f, "{} in ({})", self.key, joined()),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, joined()),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// A compiled label selector
///
/// The empty selector matches every label set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector that matches everything
    pub fn everything() -> Self {
        Self::default()
    }

    /// Selector requiring every given label to be present with the given value
    pub fn from_set<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let requirements = labels
            .into_iter()
            .map(|(k, v)| Requirement {
                key: k.into(),
                operator: Operator::Equals,
                values: BTreeSet::from([v.into()]),
            })
            .collect();
        Self::from_requirements(requirements)
    }

    /// Compile an API label selector
    pub fn from_label_selector(selector: &LabelSelector) -> Result<Self> {
        let mut requirements = Vec::new();

        if let Some(match_labels) = &selector.match_labels {
            for (key, value) in match_labels {
                requirements.push(Requirement::new(
                    key.clone(),
                    Operator::Equals,
                    [value.clone()],
                )?);
            }
        }

        if let Some(match_expressions) = &selector.match_expressions {
            for expr in match_expressions {
                requirements.push(compile_expression(expr)?);
            }
        }

        Ok(Self::from_requirements(requirements))
    }

    fn from_requirements(mut requirements: Vec<Requirement>) -> Self {
        requirements.sort();
        requirements.dedup();
        Self { requirements }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Check whether a label set satisfies every requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

fn compile_expression(expr: &LabelSelectorRequirement) -> Result<Requirement> {
    let operator = Operator::parse(&expr.operator)?;
    Requirement::new(
        expr.key.clone(),
        operator,
        expr.values.clone().unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn expression(key: &str, operator: &str, values: Option<&[&str]>) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: values.map(|vs| vs.iter().map(|v| v.to_string()).collect()),
        }
    }

    fn selector_with(expressions: Vec<LabelSelectorRequirement>) -> LabelSelector {
        LabelSelector {
            match_labels: None,
            match_expressions: Some(expressions),
        }
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = Selector::from_label_selector(&LabelSelector::default()).unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("region", "us-west")])));

        let empty_map = LabelSelector {
            match_labels: Some(BTreeMap::new()),
            match_expressions: Some(vec![]),
        };
        assert!(Selector::from_label_selector(&empty_map).unwrap().is_empty());
    }

    #[test]
    fn test_match_labels_is_exact_equality() {
        let selector = Selector::from_label_selector(&LabelSelector {
            match_labels: Some(labels(&[("region", "us-west"), ("env", "prod")])),
            match_expressions: None,
        })
        .unwrap();

        assert!(selector.matches(&labels(&[("region", "us-west"), ("env", "prod"), ("zone", "z1")])));
        assert!(!selector.matches(&labels(&[("region", "us-west")])));
        assert!(!selector.matches(&labels(&[("region", "us-east"), ("env", "prod")])));
    }

    #[test]
    fn test_match_labels_equals_from_set() {
        let compiled = Selector::from_label_selector(&LabelSelector {
            match_labels: Some(labels(&[("region", "us-west")])),
            match_expressions: None,
        })
        .unwrap();
        assert_eq!(compiled, Selector::from_set([("region", "us-west")]));
    }

    #[test]
    fn test_in_and_not_in() {
        let selector = Selector::from_label_selector(&selector_with(vec![
            expression("zone", "In", Some(&["z1", "z2"])),
            expression("tier", "NotIn", Some(&["canary"])),
        ]))
        .unwrap();

        assert!(selector.matches(&labels(&[("zone", "z1")])));
        assert!(selector.matches(&labels(&[("zone", "z2"), ("tier", "stable")])));
        assert!(!selector.matches(&labels(&[("zone", "z3")])));
        assert!(!selector.matches(&labels(&[("zone", "z1"), ("tier", "canary")])));
        // In requires the key to be present
        assert!(!selector.matches(&labels(&[])));
    }

    #[test]
    fn test_not_in_matches_missing_key() {
        let selector =
            Selector::from_label_selector(&selector_with(vec![expression("tier", "NotIn", Some(&["canary"]))]))
                .unwrap();
        assert!(selector.matches(&labels(&[])));
    }

    #[test]
    fn test_exists_and_does_not_exist() {
        let selector = Selector::from_label_selector(&selector_with(vec![
            expression("gpu", "Exists", None),
            expression("deprecated", "DoesNotExist", Some(&[])),
        ]))
        .unwrap();

        assert!(selector.matches(&labels(&[("gpu", "")])));
        assert!(selector.matches(&labels(&[("gpu", "a100")])));
        assert!(!selector.matches(&labels(&[])));
        assert!(!selector.matches(&labels(&[("gpu", "a100"), ("deprecated", "true")])));
    }

    #[test]
    fn test_invalid_expressions_are_rejected() {
        let cases = vec![
            expression("test-key", "In", None),
            expression("test-key", "NotIn", Some(&[])),
            expression("test-key", "Exists", Some(&["x"])),
            expression("test-key", "DoesNotExist", Some(&["x"])),
            expression("test-key", "Gt", Some(&["1"])),
            expression("", "Exists", None),
        ];

        for case in cases {
            let result = Selector::from_label_selector(&selector_with(vec![case.clone()]));
            assert!(
                matches!(result, Err(FlotillaError::InvalidSelector { .. })),
                "expected {:?} to be rejected",
                case
            );
        }
    }

    #[test]
    fn test_compiled_form_is_canonical() {
        let a = Selector::from_label_selector(&selector_with(vec![
            expression("b", "In", Some(&["2", "1"])),
            expression("a", "Exists", None),
        ]))
        .unwrap();
        let b = Selector::from_label_selector(&selector_with(vec![
            expression("a", "Exists", None),
            expression("b", "In", Some(&["1", "2"])),
        ]))
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "a,b in (1,2)");
    }
}
