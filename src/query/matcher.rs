// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Single-condition evaluation against one document.
//!
//! A field path may resolve to several values (arrays are expanded). Positive
//! operators match when any value satisfies the comparator, negative operators
//! when none satisfies their positive counterpart. A field that does not
//! resolve never matches, whatever the operator.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Timelike};
use regex::Regex;
use serde_json::Value;
use tracing::trace;

use super::path;
use super::value::{TypedValue, parse_bool, parse_number, parse_time};
use crate::sql::ast::{Condition, Operator};

/// Case-insensitive connective of `low AND high`
static AND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s+AND\s+").expect("valid between regex"));

/// Evaluate `condition` against `doc`
pub fn matches(doc: &Value, condition: &Condition) -> bool {
    let resolved = path::resolve(doc, &condition.field);
    if !resolved.found {
        trace!(field = %condition.field, "field not found");
        return false;
    }

    let positive = condition.operator.positive();
    let any = resolved
        .values
        .iter()
        .any(|v| compare(v, positive, condition));

    let result = if condition.operator.is_negative() { !any } else { any };
    trace!(
        condition = %condition,
        values = ?resolved.values,
        result,
        "condition evaluated"
    );
    result
}

/// Apply a positive operator's comparator to one field value
fn compare(field: &str, operator: Operator, condition: &Condition) -> bool {
    match operator {
        Operator::Eq => compare_eq(field, &condition.typed),
        Operator::Like => compare_like(field, &condition.value),
        Operator::In => compare_in(field, &condition.value),
        Operator::Between => compare_between(field, &condition.value),
        Operator::Gt => compare_ordered(field, &condition.typed, |o| o.is_gt()),
        Operator::Lt => compare_ordered(field, &condition.typed, |o| o.is_lt()),
        Operator::Ge => compare_ordered(field, &condition.typed, |o| o.is_ge()),
        Operator::Le => compare_ordered(field, &condition.typed, |o| o.is_le()),
        // Negative operators are resolved through `positive()` by the caller
        Operator::Ne | Operator::NotLike | Operator::NotIn | Operator::NotBetween => false,
    }
}

fn compare_eq(field: &str, literal: &TypedValue) -> bool {
    match literal {
        TypedValue::Text(s) => field.to_lowercase() == s.to_lowercase(),
        TypedValue::Number(n) => parse_number(field).is_some_and(|f| f == *n),
        TypedValue::Time(t) => parse_time(field).is_some_and(|f| f == *t),
        TypedValue::Boolean(b) => parse_bool(field).is_some_and(|f| f == *b),
    }
}

/// SQL LIKE with `%` only at the ends, case-insensitive
fn compare_like(field: &str, pattern: &str) -> bool {
    let field = field.to_lowercase();
    let (starts, rest) = match pattern.strip_prefix('%') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let (ends, needle) = match rest.strip_suffix('%') {
        Some(needle) => (true, needle),
        None => (false, rest),
    };
    let needle = needle.to_lowercase();

    match (starts, ends) {
        (true, true) => field.contains(&needle),
        (false, true) => field.starts_with(&needle),
        (true, false) => field.ends_with(&needle),
        (false, false) => field == needle,
    }
}

/// `(a, b, c)` membership: numeric, then temporal, then exact text
fn compare_in(field: &str, list: &str) -> bool {
    let inner = list.trim();
    let inner = inner.strip_prefix('(').unwrap_or(inner);
    let inner = inner.strip_suffix(')').unwrap_or(inner);

    let field_num = parse_number(field);
    let field_time = parse_time(field);

    split_outside_quotes(inner, ',')
        .into_iter()
        .map(unquote)
        .any(|item| {
            let item = item.as_str();
            if let (Some(f), Some(v)) = (field_num, parse_number(item))
                && f == v
            {
                return true;
            }
            if let (Some(f), Some(v)) = (field_time, parse_time(item)) {
                let hit = if item.contains(':') {
                    same_clock(&f, &v)
                } else {
                    f.date_naive() == v.date_naive()
                };
                if hit {
                    return true;
                }
            }
            field == item
        })
}

fn same_clock(a: &DateTime<FixedOffset>, b: &DateTime<FixedOffset>) -> bool {
    a.hour() == b.hour() && a.minute() == b.minute() && a.second() == b.second()
}

/// Inclusive range: numbers first, then times, then byte-wise strings
fn compare_between(field: &str, range: &str) -> bool {
    let Some(and) = AND_RE.find_iter(range).find(|m| !quoted_at(range, m.start())) else {
        return false;
    };
    let (low, high) = (&range[..and.start()], &range[and.end()..]);
    if low.trim().is_empty() || high.trim().is_empty() {
        return false;
    }
    let (low, high) = (unquote(low), unquote(high));
    let (low, high) = (low.as_str(), high.as_str());

    if let Some(f) = parse_number(field)
        && let (Some(lo), Some(hi)) = (parse_number(low), parse_number(high))
    {
        return f >= lo && f <= hi;
    }
    if let Some(f) = parse_time(field)
        && let (Some(lo), Some(hi)) = (parse_time(low), parse_time(high))
    {
        return f >= lo && f <= hi;
    }
    field >= low && field <= high
}

fn compare_ordered(
    field: &str,
    literal: &TypedValue,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    match literal {
        TypedValue::Number(n) => parse_number(field)
            .and_then(|f| f.partial_cmp(n))
            .is_some_and(accept),
        TypedValue::Time(t) => parse_time(field).is_some_and(|f| accept(f.cmp(t))),
        TypedValue::Boolean(_) | TypedValue::Text(_) => false,
    }
}

/// Split on `sep` except inside single or double quotes
fn split_outside_quotes(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == sep => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Whether byte offset `pos` of `text` falls inside a quoted literal
fn quoted_at(text: &str, pos: usize) -> bool {
    let mut quote = None;
    for c in text[..pos].chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None => {}
        }
    }
    quote.is_some()
}

/// Strip one pair of surrounding quotes, folding doubled quotes inside
fn unquote(s: &str) -> String {
    let s = s.trim();
    for quote in ['\'', '"', '`'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            let doubled: String = [quote, quote].iter().collect();
            return s[1..s.len() - 1].replace(&doubled, &quote.to_string());
        }
    }
    s.to_string()
}
