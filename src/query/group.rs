// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Applying a whole WHERE clause to a document collection.
//!
//! Two strategies are available. [`apply_tree`] evaluates the parsed
//! expression tree and honors parenthesized grouping. [`apply_grouped`]
//! partitions the flat condition list by connective and narrows the
//! collection once per group, ignoring nesting.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::matcher::matches;
use crate::sql::ast::{Condition, Connective, Predicate};

/// How a query's WHERE clause is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Evaluate the expression tree exactly
    #[default]
    Tree,
    /// Flat AND/OR groups, nesting ignored
    Grouped,
}

/// Evaluate a predicate tree against one document
pub fn evaluate(doc: &Value, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Comparison(c) => matches(doc, c),
        Predicate::And(children) => children.iter().all(|p| evaluate(doc, p)),
        Predicate::Or(children) => children.iter().any(|p| evaluate(doc, p)),
    }
}

/// Keep the documents satisfying `predicate`, preserving input order
pub fn apply_tree(docs: Vec<Value>, predicate: &Predicate) -> Vec<Value> {
    let before = docs.len();
    let kept: Vec<Value> = docs.into_iter().filter(|d| evaluate(d, predicate)).collect();
    debug!(before, after = kept.len(), "applied predicate tree");
    kept
}

/// Narrow `docs` by connective groups.
///
/// Conditions are partitioned by connective in first-seen order. An OR group
/// keeps a document when any of its conditions matches, an AND group when all
/// of them do. Groups are applied one after another.
pub fn apply_grouped(mut docs: Vec<Value>, conditions: &[Condition]) -> Vec<Value> {
    let mut order: Vec<Connective> = Vec::new();
    for c in conditions {
        if !order.contains(&c.connective) {
            order.push(c.connective);
        }
    }

    for connective in order {
        let group: Vec<&Condition> = conditions
            .iter()
            .filter(|c| c.connective == connective)
            .collect();
        let before = docs.len();
        docs.retain(|doc| match connective {
            Connective::Or => group.iter().any(|c| matches(doc, c)),
            Connective::And => group.iter().all(|c| matches(doc, c)),
        });
        debug!(
            connective = %connective,
            conditions = group.len(),
            before,
            after = docs.len(),
            "applied condition group"
        );
    }
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqlParser;
    use crate::sql::ast::Operator;
    use serde_json::json;

    fn pod(name: &str, ns: &str, phase: &str) -> Value {
        json!({"metadata": {"name": name, "namespace": ns}, "status": {"phase": phase}})
    }

    fn names(docs: &[Value]) -> Vec<&str> {
        docs.iter()
            .filter_map(|d| d["metadata"]["name"].as_str())
            .collect()
    }

    fn cmp(field: &str, value: &str) -> Predicate {
        Predicate::Comparison(Condition::new(field, Operator::Eq, value))
    }

    fn pods() -> Vec<Value> {
        vec![
            pod("a", "default", "Running"),
            pod("b", "kube-system", "Running"),
            pod("c", "default", "Pending"),
            pod("d", "kube-system", "Failed"),
        ]
    }

    #[test]
    fn test_tree_respects_nesting() {
        // namespace = default AND (phase = Pending OR phase = Failed)
        let p = Predicate::And(vec![
            cmp("metadata.namespace", "default"),
            Predicate::Or(vec![
                cmp("status.phase", "Pending"),
                cmp("status.phase", "Failed"),
            ]),
        ]);
        assert_eq!(names(&apply_tree(pods(), &p)), vec!["c"]);
    }

    #[test]
    fn test_grouped_ignores_nesting() {
        let conditions = vec![
            Condition::new("metadata.namespace", Operator::Eq, "default"),
            Condition::new("status.phase", Operator::Eq, "Pending").with_connective(Connective::Or),
            Condition::new("status.phase", Operator::Eq, "Failed").with_connective(Connective::Or),
        ];
        // AND group keeps a, c then OR group keeps c
        assert_eq!(names(&apply_grouped(pods(), &conditions)), vec!["c"]);
    }

    #[test]
    fn test_grouped_or_first_seen() {
        let conditions = vec![
            Condition::new("metadata.name", Operator::Eq, "a").with_connective(Connective::Or),
            Condition::new("metadata.name", Operator::Eq, "d").with_connective(Connective::Or),
            Condition::new("metadata.namespace", Operator::Eq, "kube-system"),
        ];
        assert_eq!(names(&apply_grouped(pods(), &conditions)), vec!["d"]);
    }

    #[test]
    fn test_grouped_empty_conditions_keep_all() {
        assert_eq!(apply_grouped(pods(), &[]).len(), 4);
    }

    #[test]
    fn test_tree_preserves_order() {
        let p = cmp("status.phase", "Running");
        assert_eq!(names(&apply_tree(pods(), &p)), vec!["a", "b"]);
    }

    /// Parse a WHERE expression and evaluate it both ways
    fn where_matches(doc: &Value, expr: &str) -> (bool, bool) {
        let parsed = SqlParser::new().parse_where(expr).unwrap();
        let predicate = parsed.predicate.unwrap();
        let tree = evaluate(doc, &predicate);
        let grouped = !apply_grouped(vec![doc.clone()], &parsed.conditions).is_empty();
        (tree, grouped)
    }

    #[test]
    fn test_scenario_array_predicate_positive_and_negative() {
        let node = json!({"status": {"addresses": [
            {"type": "InternalIP", "address": "10.0.0.1"},
            {"type": "Hostname", "address": "node-1"}
        ]}});
        assert_eq!(
            where_matches(&node, "status.addresses[type=InternalIP].address = '10.0.0.1'"),
            (true, true)
        );
        assert_eq!(
            where_matches(&node, "status.addresses[type=InternalIP].address != '10.0.0.1'"),
            (false, false)
        );
    }

    #[test]
    fn test_scenario_in_list() {
        let doc = json!({"metadata": {"name": "b"}});
        assert_eq!(where_matches(&doc, "metadata.name in ('a','b','c')"), (true, true));
        assert_eq!(where_matches(&doc, "metadata.name not in ('a','b','c')"), (false, false));
    }

    #[test]
    fn test_scenario_between() {
        let doc = json!({"spec": {"replicas": 3}});
        assert_eq!(where_matches(&doc, "spec.replicas between 2 and 5"), (true, true));
        assert_eq!(where_matches(&doc, "spec.replicas = 6"), (false, false));
    }

    #[test]
    fn test_scenario_appended_where() {
        let doc = json!({"a": 1, "c": 3});
        // a=1 OR b=2, with c=3 appended as its own fragment
        let expr = "(a=1 OR b=2) and (c=3)";
        assert_eq!(where_matches(&doc, expr), (true, true));
        assert_eq!(where_matches(&json!({"a": 1, "c": 4}), expr), (false, false));
    }

    #[test]
    fn test_three_way_mix_diverges() {
        // a AND (b OR c) OR d: flat grouping requires a, the tree does not
        let doc = json!({"a": 0, "b": 0, "c": 0, "d": 1});
        assert_eq!(where_matches(&doc, "a = 1 and (b = 1 or c = 1) or d = 1"), (true, false));
    }

    #[test]
    fn test_filter_mode_serde() {
        let m: FilterMode = serde_json::from_str("\"grouped\"").unwrap();
        assert_eq!(m, FilterMode::Grouped);
        assert_eq!(serde_json::to_string(&FilterMode::Tree).unwrap(), "\"tree\"");
    }
}
