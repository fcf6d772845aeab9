// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Label and field selector support
//!
//! Selectors are the filters a Kubernetes API server applies before returning
//! a list. Sources that hold documents locally evaluate them here.
//!
//! ## Syntax
//!
//! - Label selectors: comma-separated `key=value`, `key==value`, `key!=value`,
//!   `key` (exists) and `!key` (does not exist)
//! - Field selectors: comma-separated `path=value`, `path==value`,
//!   `path!=value` where `path` is a dotted document path
//!
//! Set-based label requirements (`in`, `notin`) are rejected.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::query::path;

/// Represents a selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorOperator {
    /// Equals operator (= or ==)
    Equals,
    /// Not equals operator (!=)
    NotEquals,
    /// Key present (labels only)
    Exists,
    /// Key absent (labels only)
    NotExists,
}

/// One requirement of a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Label key or field path
    pub key: String,
    pub operator: SelectorOperator,
    /// Empty for `Exists` / `NotExists`
    pub value: String,
}

impl Requirement {
    /// Convert to Kubernetes selector string format
    ///
    /// Examples:
    /// - `Requirement { key: "status.phase", operator: Equals, value: "Running" }`
    ///   → `"status.phase=Running"`
    /// - `Requirement { key: "app", operator: NotExists, .. }` → `"!app"`
    pub fn to_k8s_string(&self) -> String {
        match self.operator {
            SelectorOperator::Equals => format!("{}={}", self.key, self.value),
            SelectorOperator::NotEquals => format!("{}!={}", self.key, self.value),
            SelectorOperator::Exists => self.key.clone(),
            SelectorOperator::NotExists => format!("!{}", self.key),
        }
    }

    fn parse(term: &str, allow_existence: bool) -> Result<Self> {
        let invalid = || Error::InvalidSelector(term.to_string());

        let (key, operator, value) = if let Some((k, v)) = term.split_once("!=") {
            (k, SelectorOperator::NotEquals, v)
        } else if let Some((k, v)) = term.split_once("==") {
            (k, SelectorOperator::Equals, v)
        } else if let Some((k, v)) = term.split_once('=') {
            (k, SelectorOperator::Equals, v)
        } else if !allow_existence {
            return Err(invalid());
        } else if let Some(k) = term.strip_prefix('!') {
            (k, SelectorOperator::NotExists, "")
        } else {
            (term, SelectorOperator::Exists, "")
        };

        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || key.contains(char::is_whitespace) || value.contains(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(Self {
            key: key.to_string(),
            operator,
            value: value.to_string(),
        })
    }
}

fn split_terms(selector: &str) -> impl Iterator<Item = &str> {
    selector.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Label selector, all requirements AND-ed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    pub requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn parse(selector: &str) -> Result<Self> {
        let requirements = split_terms(selector)
            .map(|t| Requirement::parse(t, true))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { requirements })
    }

    /// Evaluate against `metadata.labels` of a document
    pub fn matches(&self, doc: &Value) -> bool {
        let labels = doc.pointer("/metadata/labels").and_then(Value::as_object);
        self.requirements.iter().all(|r| {
            let actual = labels.and_then(|l| l.get(&r.key)).and_then(Value::as_str);
            match r.operator {
                SelectorOperator::Equals => actual == Some(r.value.as_str()),
                SelectorOperator::NotEquals => actual != Some(r.value.as_str()),
                SelectorOperator::Exists => actual.is_some(),
                SelectorOperator::NotExists => actual.is_none(),
            }
        })
    }
}

/// Field selector, all requirements AND-ed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    pub requirements: Vec<Requirement>,
}

impl FieldSelector {
    pub fn parse(selector: &str) -> Result<Self> {
        let requirements = split_terms(selector)
            .map(|t| Requirement::parse(t, false))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { requirements })
    }

    /// Evaluate against a document. A missing field reads as the empty string.
    pub fn matches(&self, doc: &Value) -> bool {
        self.requirements.iter().all(|r| {
            let resolved = path::resolve(doc, &r.key);
            let actual = resolved.values.first().map(String::as_str).unwrap_or("");
            match r.operator {
                SelectorOperator::Equals => actual == r.value,
                SelectorOperator::NotEquals => actual != r.value,
                SelectorOperator::Exists | SelectorOperator::NotExists => false,
            }
        })
    }
}

/// Join two comma-separated selectors
pub fn merge_selectors(first: Option<&str>, second: &str) -> String {
    match first.map(str::trim).filter(|s| !s.is_empty()) {
        Some(first) if !second.trim().is_empty() => format!("{},{}", first, second.trim()),
        Some(first) => first.to_string(),
        None => second.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod() -> Value {
        json!({
            "metadata": {"name": "web-1", "namespace": "default", "labels": {"app": "web", "tier": "frontend"}},
            "spec": {"nodeName": "node-1"},
            "status": {"phase": "Running"}
        })
    }

    #[test]
    fn test_requirement_to_k8s_string() {
        let selector = LabelSelector::parse("app=web, tier!=db, canary, !legacy").unwrap();
        let rendered: Vec<String> = selector.requirements.iter().map(|r| r.to_k8s_string()).collect();
        assert_eq!(rendered, vec!["app=web", "tier!=db", "canary", "!legacy"]);
    }

    #[test]
    fn test_label_selector_matching() {
        let p = pod();
        assert!(LabelSelector::parse("app=web").unwrap().matches(&p));
        assert!(LabelSelector::parse("app==web,tier=frontend").unwrap().matches(&p));
        assert!(!LabelSelector::parse("app=web,tier=backend").unwrap().matches(&p));
        assert!(LabelSelector::parse("app!=db").unwrap().matches(&p));
        assert!(LabelSelector::parse("tier").unwrap().matches(&p));
        assert!(LabelSelector::parse("!canary").unwrap().matches(&p));
        assert!(!LabelSelector::parse("canary").unwrap().matches(&p));
        assert!(LabelSelector::parse("").unwrap().matches(&p));
    }

    #[test]
    fn test_label_selector_without_labels() {
        let doc = json!({"metadata": {"name": "bare"}});
        assert!(LabelSelector::parse("app!=web").unwrap().matches(&doc));
        assert!(!LabelSelector::parse("app=web").unwrap().matches(&doc));
    }

    #[test]
    fn test_set_based_rejected() {
        assert!(matches!(
            LabelSelector::parse("env in (prod, dev)"),
            Err(Error::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_field_selector_matching() {
        let p = pod();
        assert!(FieldSelector::parse("status.phase=Running").unwrap().matches(&p));
        assert!(FieldSelector::parse("metadata.name==web-1,spec.nodeName=node-1").unwrap().matches(&p));
        assert!(!FieldSelector::parse("status.phase!=Running").unwrap().matches(&p));
        // missing field compares as empty
        assert!(FieldSelector::parse("spec.schedulerName!=default").unwrap().matches(&p));
    }

    #[test]
    fn test_field_selector_requires_operator() {
        assert!(FieldSelector::parse("status.phase").is_err());
    }

    #[test]
    fn test_merge_selectors() {
        assert_eq!(merge_selectors(None, "app=web"), "app=web");
        assert_eq!(merge_selectors(Some("app=web"), "tier=fe"), "app=web,tier=fe");
        assert_eq!(merge_selectors(Some("app=web"), ""), "app=web");
        assert_eq!(merge_selectors(Some(""), "tier=fe"), "tier=fe");
    }
}
