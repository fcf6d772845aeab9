// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! ORDER BY handling: type-aware, multi-key, stable sorting of documents.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use super::path::FieldPath;
use super::value::{TypedValue, detect_type};
use crate::error::{Error, Result};

/// Field used when a query has no ORDER BY
pub const DEFAULT_ORDER_FIELD: &str = "metadata.creationTimestamp";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dir {
    #[default]
    Asc,
    Desc,
}

impl Dir {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub dir: Dir,
}

impl OrderKey {
    pub fn new(field: impl Into<String>, dir: Dir) -> Self {
        Self {
            field: field.into(),
            dir,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.dir)
    }
}

/// Ordered list of sort keys, first key most significant
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderSpec {
    pub keys: Vec<OrderKey>,
}

impl OrderSpec {
    /// `metadata.creationTimestamp desc`
    pub fn default_order() -> Self {
        Self {
            keys: vec![OrderKey::new(DEFAULT_ORDER_FIELD, Dir::Desc)],
        }
    }

    /// Parse `[order by] f1 [asc|desc], f2 [asc|desc], ...`.
    ///
    /// Field names may be wrapped in backticks or quotes.
    pub fn parse(text: &str) -> Result<Self> {
        let mut body = text.trim();
        if let Some(rest) = strip_keyword(body, "order") {
            body = strip_keyword(rest, "by").unwrap_or(rest);
        }

        let mut keys = Vec::new();
        for term in body.split(',') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let (field, dir) = match term.rsplit_once(char::is_whitespace) {
                Some((field, dir)) if dir.eq_ignore_ascii_case("desc") => (field.trim(), Dir::Desc),
                Some((field, dir)) if dir.eq_ignore_ascii_case("asc") => (field.trim(), Dir::Asc),
                Some(_) => {
                    return Err(Error::UnsupportedExpression(format!(
                        "invalid ORDER BY term `{}`",
                        term
                    )));
                }
                None => (term, Dir::Asc),
            };
            keys.push(OrderKey::new(unquote(field), dir));
        }
        Ok(Self { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sort `docs` in place. Stable: equal documents keep their input order.
    pub fn sort(&self, docs: &mut Vec<Value>) {
        if self.keys.is_empty() || docs.len() < 2 {
            return;
        }
        let paths: Vec<FieldPath> = self.keys.iter().map(|k| FieldPath::parse(&k.field)).collect();

        // Resolve every key once per document
        let mut decorated: Vec<(Vec<Option<TypedValue>>, Value)> = docs
            .drain(..)
            .map(|doc| {
                let keys = paths.iter().map(|p| sort_value(p, &doc)).collect();
                (keys, doc)
            })
            .collect();

        decorated.sort_by(|(a, _), (b, _)| {
            for (i, key) in self.keys.iter().enumerate() {
                let ordering = compare_keys(a[i].as_ref(), b[i].as_ref(), key.dir);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        docs.extend(decorated.into_iter().map(|(_, doc)| doc));
        debug!(order = %self, count = docs.len(), "sorted documents");
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.keys.iter().map(|k| k.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}

/// A document's value for one key. Missing and multi-valued fields have none.
fn sort_value(path: &FieldPath, doc: &Value) -> Option<TypedValue> {
    path.resolve(doc).single().map(detect_type)
}

/// Comparable values first, ordered by `dir`; non-comparable ones last
fn compare_keys(a: Option<&TypedValue>, b: Option<&TypedValue>, dir: Dir) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => dir.apply(compare_values(a, b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Total order over typed values. Different kinds order by kind.
pub fn compare_values(a: &TypedValue, b: &TypedValue) -> Ordering {
    match (a, b) {
        (TypedValue::Text(a), TypedValue::Text(b)) => a.cmp(b),
        (TypedValue::Number(a), TypedValue::Number(b)) => a.total_cmp(b),
        (TypedValue::Time(a), TypedValue::Time(b)) => a.cmp(b),
        (TypedValue::Boolean(a), TypedValue::Boolean(b)) => a.cmp(b),
        _ => a.kind().cmp(&b.kind()),
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    let rest = &text[keyword.len()..];
    if head.eq_ignore_ascii_case(keyword) && rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn unquote(field: &str) -> String {
    let field = field.trim();
    for quote in ['`', '"', '\''] {
        if field.len() >= 2 && field.starts_with(quote) && field.ends_with(quote) {
            return field[1..field.len() - 1].to_string();
        }
    }
    field.to_string()
}
