// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Field path resolution against resource documents.
//!
//! # Syntax
//!
//! - `.field` - object field access: `status.phase`
//! - `[key=value]` - keep only array elements whose `key` equals `value`:
//!   `status.addresses[type=InternalIP].address`
//! - `[n]` - array index (0-based): `spec.containers[0].image`
//!
//! Arrays met without a selector are expanded, so `spec.containers.image`
//! yields one value per container. The output is always text: strings as is,
//! numbers and booleans as their JSON form.

use serde_json::Value;

/// Array selector attached to a path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Single-key equality filter on array elements
    Match { key: String, value: String },
    /// Array index
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub field: String,
    pub selector: Option<Selector>,
}

/// A parsed dotted field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

/// Result of resolving a path: every matching scalar as text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub values: Vec<String>,
    pub found: bool,
}

impl Resolved {
    fn from_values(values: Vec<String>) -> Self {
        let found = !values.is_empty();
        Self { values, found }
    }

    /// The single value, if exactly one was resolved
    pub fn single(&self) -> Option<&str> {
        match self.values.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

impl FieldPath {
    /// Parse a dotted path. Dots inside `[...]` do not split segments.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        for raw in split_segments(path) {
            if raw.is_empty() {
                continue;
            }
            segments.push(parse_segment(raw));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Resolve this path against a document
    pub fn resolve(&self, doc: &Value) -> Resolved {
        let mut values = Vec::new();
        collect(doc, &self.segments, None, &mut values);
        Resolved::from_values(values)
    }
}

/// Resolve `path` against `doc`
pub fn resolve(doc: &Value, path: &str) -> Resolved {
    FieldPath::parse(path).resolve(doc)
}

/// Render a scalar JSON value as text. Objects, arrays and null have no
/// scalar form.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in path.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                parts.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts
}

fn parse_segment(raw: &str) -> PathSegment {
    let Some(open) = raw.find('[') else {
        return PathSegment {
            field: raw.to_string(),
            selector: None,
        };
    };
    let close = raw[open..].find(']').map(|i| open + i).unwrap_or(raw.len());
    let field = raw[..open].to_string();
    let inner = raw[open + 1..close].trim();

    let selector = if let Ok(index) = inner.parse::<usize>() {
        Some(Selector::Index(index))
    } else if let Some((key, value)) = inner.split_once('=') {
        Some(Selector::Match {
            key: key.trim().to_string(),
            value: trim_quotes(value.trim()).to_string(),
        })
    } else {
        None
    };

    PathSegment { field, selector }
}

fn trim_quotes(s: &str) -> &str {
    for quote in ['\'', '"', '`'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Walk `node` along `segments`. `pending` is the selector of the segment
/// that produced `node`; it only applies when `node` is an array.
fn collect(node: &Value, segments: &[PathSegment], pending: Option<&Selector>, out: &mut Vec<String>) {
    match node {
        Value::Array(items) => match pending {
            Some(Selector::Index(i)) => {
                if let Some(item) = items.get(*i) {
                    collect(item, segments, None, out);
                }
            }
            Some(sel @ Selector::Match { key, value }) => {
                for item in items {
                    match item {
                        Value::Object(map) => {
                            let hit = map
                                .get(key)
                                .and_then(scalar_text)
                                .is_some_and(|v| v == *value);
                            if hit {
                                collect(item, segments, None, out);
                            }
                        }
                        Value::Array(_) => collect(item, segments, Some(sel), out),
                        _ => {}
                    }
                }
            }
            None => {
                for item in items {
                    collect(item, segments, None, out);
                }
            }
        },
        Value::Object(map) => {
            let Some((first, rest)) = segments.split_first() else {
                return;
            };
            if let Some(child) = map.get(&first.field) {
                collect(child, rest, first.selector.as_ref(), out);
            }
        }
        scalar => {
            if segments.is_empty()
                && let Some(text) = scalar_text(scalar)
            {
                out.push(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node() -> Value {
        json!({
            "metadata": {"name": "node-1", "labels": {"zone": "a"}},
            "spec": {"unschedulable": false, "podCIDRs": ["10.244.0.0/24", "fd00::/64"]},
            "status": {
                "capacity": {"cpu": 4},
                "addresses": [
                    {"type": "InternalIP", "address": "10.0.0.1"},
                    {"type": "Hostname", "address": "node-1"}
                ]
            }
        })
    }

    #[test]
    fn test_simple_field() {
        let r = resolve(&node(), "metadata.name");
        assert!(r.found);
        assert_eq!(r.values, vec!["node-1"]);
        assert_eq!(r.single(), Some("node-1"));
    }

    #[test]
    fn test_number_and_bool_rendered_as_text() {
        assert_eq!(resolve(&node(), "status.capacity.cpu").values, vec!["4"]);
        assert_eq!(resolve(&node(), "spec.unschedulable").values, vec!["false"]);
    }

    #[test]
    fn test_missing_field() {
        let r = resolve(&node(), "metadata.namespace");
        assert!(!r.found);
        assert!(r.values.is_empty());
    }

    #[test]
    fn test_segments_past_scalar_not_found() {
        assert!(!resolve(&node(), "metadata.name.first").found);
    }

    #[test]
    fn test_object_leaf_not_found() {
        assert!(!resolve(&node(), "metadata.labels").found);
    }

    #[test]
    fn test_array_expansion() {
        let r = resolve(&node(), "status.addresses.address");
        assert_eq!(r.values, vec!["10.0.0.1", "node-1"]);
        assert_eq!(r.single(), None);
    }

    #[test]
    fn test_scalar_array_leaf() {
        let r = resolve(&node(), "spec.podCIDRs");
        assert_eq!(r.values, vec!["10.244.0.0/24", "fd00::/64"]);
    }

    #[test]
    fn test_array_predicate() {
        let r = resolve(&node(), "status.addresses[type=InternalIP].address");
        assert_eq!(r.values, vec!["10.0.0.1"]);
    }

    #[test]
    fn test_array_predicate_quoted_literal() {
        let r = resolve(&node(), "status.addresses[type='Hostname'].address");
        assert_eq!(r.values, vec!["node-1"]);
    }

    #[test]
    fn test_array_predicate_no_match() {
        let r = resolve(&node(), "status.addresses[type=ExternalIP].address");
        assert!(!r.found);
    }

    #[test]
    fn test_array_index() {
        assert_eq!(resolve(&node(), "status.addresses[1].type").values, vec!["Hostname"]);
        assert!(!resolve(&node(), "status.addresses[5].type").found);
    }

    #[test]
    fn test_predicate_on_deeper_segment() {
        let pod = json!({
            "spec": {"containers": [
                {"name": "app", "image": "nginx:1.25", "ports": [{"containerPort": 80}]},
                {"name": "sidecar", "image": "envoy:1.30"}
            ]}
        });
        assert_eq!(resolve(&pod, "spec.containers[name=sidecar].image").values, vec!["envoy:1.30"]);
        assert_eq!(resolve(&pod, "spec.containers.ports.containerPort").values, vec!["80"]);
    }

    #[test]
    fn test_predicate_on_object_segment_ignored() {
        let doc = json!({
            "spec": {"template": {"containers": [
                {"type": "x", "image": "nginx:1.25"},
                {"type": "y", "image": "envoy:1.30"}
            ]}}
        });
        let r = resolve(&doc, "spec.template[type=x].containers.image");
        assert_eq!(r.values, vec!["nginx:1.25", "envoy:1.30"]);
        let r = resolve(&doc, "spec.template[0].containers.image");
        assert_eq!(r.values, vec!["nginx:1.25", "envoy:1.30"]);
    }

    #[test]
    fn test_predicate_literal_with_dots() {
        let doc = json!({"status": {"addresses": [{"address": "10.0.0.1", "type": "InternalIP"}]}});
        let r = resolve(&doc, "status.addresses[address=10.0.0.1].type");
        assert_eq!(r.values, vec!["InternalIP"]);
    }

    #[test]
    fn test_nested_arrays_without_predicate() {
        let doc = json!({"matrix": [[{"v": 1}, {"v": 2}], [{"v": 3}]]});
        assert_eq!(resolve(&doc, "matrix.v").values, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_null_not_found() {
        let doc = json!({"spec": {"nodeName": null}});
        assert!(!resolve(&doc, "spec.nodeName").found);
    }

    #[test]
    fn test_empty_array_not_found() {
        let doc = json!({"metadata": {"finalizers": []}});
        assert!(!resolve(&doc, "metadata.finalizers").found);
    }

    #[test]
    fn test_parse_segments() {
        let path = FieldPath::parse("status.addresses[type=InternalIP].address");
        assert_eq!(path.segments().len(), 3);
        assert_eq!(
            path.segments()[1].selector,
            Some(Selector::Match {
                key: "type".to_string(),
                value: "InternalIP".to_string()
            })
        );
    }
}
