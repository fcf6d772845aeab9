// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Turning query results into rows and printing them.

mod csv;
mod json;
mod table;
mod yaml;

pub use csv::CsvFormatter;
pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use k8sorm::kubernetes::ResourceRegistry;
use k8sorm::query::path;
use k8sorm::sql::ColumnRef;

/// Columns shown for `SELECT *`
const DEFAULT_COLUMNS: &[&str] = &["name", "namespace", "kind", "age"];

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Project documents onto the selected columns
    pub fn from_documents(columns: &[ColumnRef], docs: &[Value]) -> Self {
        Self::project(columns, docs, Utc::now())
    }

    fn project(columns: &[ColumnRef], docs: &[Value], now: DateTime<Utc>) -> Self {
        const STAR: &[ColumnRef] = &[ColumnRef::Star];
        let columns = if columns.is_empty() { STAR } else { columns };

        let mut headers = Vec::new();
        let mut extractors: Vec<Box<dyn Fn(&Value) -> Value + '_>> = Vec::new();
        for column in columns {
            match column {
                ColumnRef::Star => {
                    headers.extend(DEFAULT_COLUMNS.iter().map(|c| c.to_string()));
                    extractors.push(Box::new(|d: &Value| column_value(d, "metadata.name")));
                    extractors.push(Box::new(|d: &Value| column_value(d, "metadata.namespace")));
                    extractors.push(Box::new(|d: &Value| column_value(d, "kind")));
                    extractors.push(Box::new(move |d: &Value| {
                        d.pointer("/metadata/creationTimestamp")
                            .and_then(Value::as_str)
                            .map(|ts| Value::String(format_age(ts, now)))
                            .unwrap_or(Value::Null)
                    }));
                }
                ColumnRef::Named { name, alias } => {
                    headers.push(alias.clone().unwrap_or_else(|| name.clone()));
                    extractors.push(Box::new(move |d: &Value| column_value(d, name)));
                }
            }
        }

        let rows = docs
            .iter()
            .map(|doc| extractors.iter().map(|extract| extract(doc)).collect())
            .collect();
        Self { columns: headers, rows }
    }

    /// One row per known resource type
    pub fn resources(registry: &ResourceRegistry) -> Self {
        let rows = registry
            .list()
            .into_iter()
            .map(|r| {
                vec![
                    Value::String(r.plural.clone()),
                    Value::String(r.kind.clone()),
                    Value::String(r.api_version()),
                    Value::Bool(r.namespaced),
                    Value::String(r.short_names.join(",")),
                ]
            })
            .collect();
        Self {
            columns: ["table_name", "kind", "api_version", "namespaced", "aliases"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rows,
        }
    }

    pub fn format(&self, format: OutputFormat, no_headers: bool) -> String {
        match format {
            OutputFormat::Table => TableFormatter::format(self, no_headers),
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Csv => CsvFormatter::format(self, no_headers),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }

    /// Rows as column-keyed objects
    pub fn to_json_rows(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    /// Rows rendered as display text
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|v| format_json_value(v).unwrap_or_default()).collect())
            .collect()
    }
}

/// Value of one column. Plain dotted paths keep the JSON value (objects
/// included), anything else goes through the path resolver.
fn column_value(doc: &Value, path: &str) -> Value {
    let direct = get_nested_value(doc, path);
    if !direct.is_null() {
        return direct;
    }
    let resolved = path::resolve(doc, path);
    match resolved.values.as_slice() {
        [] => Value::Null,
        [one] => Value::String(one.clone()),
        many => Value::Array(many.iter().cloned().map(Value::String).collect()),
    }
}

/// Navigate a dotted path in a JSON value
fn get_nested_value(value: &Value, path: &str) -> Value {
    let mut current = value;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part).unwrap_or(&Value::Null),
            Value::Array(arr) => match part.parse::<usize>() {
                Ok(idx) => arr.get(idx).unwrap_or(&Value::Null),
                Err(_) => &Value::Null,
            },
            _ => &Value::Null,
        };
    }
    current.clone()
}

/// Format a JSON value for display. `None` for null.
fn format_json_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(serde_json::to_string(value).unwrap_or_default()),
    }
}

/// kubectl style age: `45s`, `12m`, `3h`, `9d`
pub fn format_age(timestamp: &str, now: DateTime<Utc>) -> String {
    let Ok(created) = DateTime::parse_from_rfc3339(timestamp) else {
        return timestamp.to_string();
    };

    let secs = now.signed_duration_since(created).num_seconds();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node() -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"name": "node-1", "creationTimestamp": "2025-01-01T00:00:00Z", "labels": {"zone": "a"}},
            "status": {"addresses": [
                {"type": "InternalIP", "address": "10.0.0.1"},
                {"type": "Hostname", "address": "node-1"}
            ]}
        })
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-03T06:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_star_columns() {
        let result = QueryResult::project(&[ColumnRef::Star], &[node()], now());
        assert_eq!(result.columns, vec!["name", "namespace", "kind", "age"]);
        assert_eq!(
            result.rows[0],
            vec![json!("node-1"), Value::Null, json!("Node"), json!("2d")]
        );
        assert_eq!(result.text_rows()[0], vec!["node-1", "", "Node", "2d"]);
    }

    #[test]
    fn test_named_columns_and_alias() {
        let columns = vec![
            ColumnRef::Named {
                name: "status.addresses[type=InternalIP].address".to_string(),
                alias: Some("ip".to_string()),
            },
            ColumnRef::Named {
                name: "metadata.labels".to_string(),
                alias: None,
            },
            ColumnRef::Named {
                name: "status.addresses.address".to_string(),
                alias: None,
            },
        ];
        let result = QueryResult::project(&columns, &[node()], now());
        assert_eq!(result.columns, vec!["ip", "metadata.labels", "status.addresses.address"]);
        assert_eq!(result.rows[0][0], json!("10.0.0.1"));
        assert_eq!(result.rows[0][1], json!({"zone": "a"}));
        assert_eq!(result.rows[0][2], json!(["10.0.0.1", "node-1"]));
        assert_eq!(result.text_rows()[0][1], r#"{"zone":"a"}"#);
    }

    #[test]
    fn test_json_rows() {
        let result = QueryResult::project(&[ColumnRef::Star], &[node()], now());
        let rows = result.to_json_rows();
        assert_eq!(rows[0]["name"], "node-1");
        assert_eq!(rows[0]["age"], "2d");
    }

    #[test]
    fn test_resources_listing() {
        let registry = k8sorm::kubernetes::build_core_registry();
        let result = QueryResult::resources(&registry);
        let pods = result.rows.iter().find(|r| r[0] == "pods").unwrap();
        assert_eq!(pods[2], "v1");
        assert_eq!(pods[3], true);
        assert_eq!(pods[4], "po");
    }

    #[test]
    fn test_format_age() {
        let now = now();
        assert_eq!(format_age("2025-01-03T05:59:30Z", now), "30s");
        assert_eq!(format_age("2025-01-03T05:15:00Z", now), "45m");
        assert_eq!(format_age("2025-01-03T01:00:00Z", now), "5h");
        assert_eq!(format_age("not-a-time", now), "not-a-time");
    }

    #[test]
    fn test_get_nested_value_array_index() {
        let doc = node();
        assert_eq!(get_nested_value(&doc, "status.addresses.1.type"), json!("Hostname"));
        assert_eq!(get_nested_value(&doc, "status.addresses.x"), Value::Null);
        assert_eq!(get_nested_value(&doc, "metadata.name.deeper"), Value::Null);
    }
}
