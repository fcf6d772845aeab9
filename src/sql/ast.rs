// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Internal representation of parsed queries.

use std::fmt;
use std::str::FromStr;

use crate::query::value::{TypedValue, detect_type};

/// Connective linking a condition to its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Connective {
    #[default]
    And,
    Or,
}

impl Connective {
    pub fn as_str(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Like,
    NotLike,
    In,
    NotIn,
    Gt,
    Lt,
    Ge,
    Le,
    Between,
    NotBetween,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Between => "between",
            Operator::NotBetween => "not between",
        }
    }

    /// Negative operators match a multi-valued field only when no value
    /// satisfies their positive counterpart.
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            Operator::Ne | Operator::NotLike | Operator::NotIn | Operator::NotBetween
        )
    }

    /// The positive operator whose comparator this operator negates
    pub fn positive(self) -> Operator {
        match self {
            Operator::Ne => Operator::Eq,
            Operator::NotLike => Operator::Like,
            Operator::NotIn => Operator::In,
            Operator::NotBetween => Operator::Between,
            other => other,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match normalized.as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            "like" => Ok(Operator::Like),
            "not like" => Ok(Operator::NotLike),
            "in" => Ok(Operator::In),
            "not in" => Ok(Operator::NotIn),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            "between" => Ok(Operator::Between),
            "not between" => Ok(Operator::NotBetween),
            _ => Err(format!("unknown operator `{}`", s)),
        }
    }
}

/// One atomic predicate: `field operator value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Nesting level assigned while parsing
    pub depth: usize,
    pub connective: Connective,
    /// Dotted document path, e.g. `status.addresses[type=InternalIP].address`
    pub field: String,
    pub operator: Operator,
    /// Unquoted literal text. Lists are `(a, b)`, ranges `low and high`.
    pub value: String,
    /// `value` after type detection
    pub typed: TypedValue,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        let value = value.into();
        let typed = detect_type(&value);
        Self {
            depth: 0,
            connective: Connective::And,
            field: field.into(),
            operator,
            value,
            typed,
        }
    }

    pub fn with_connective(mut self, connective: Connective) -> Self {
        self.connective = connective;
        self
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// Boolean expression tree preserving the WHERE clause's nesting
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Combine two predicates with AND, flattening nested ANDs
    pub fn and(left: Predicate, right: Predicate) -> Predicate {
        let mut children = Vec::new();
        for p in [left, right] {
            match p {
                Predicate::And(inner) => children.extend(inner),
                other => children.push(other),
            }
        }
        Predicate::And(children)
    }

    /// Combine two predicates with OR, flattening nested ORs
    pub fn or(left: Predicate, right: Predicate) -> Predicate {
        let mut children = Vec::new();
        for p in [left, right] {
            match p {
                Predicate::Or(inner) => children.extend(inner),
                other => children.push(other),
            }
        }
        Predicate::Or(children)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison(c) => write!(f, "{}", c),
            Predicate::And(children) | Predicate::Or(children) => {
                let sep = if matches!(self, Predicate::And(_)) { " AND " } else { " OR " };
                let parts: Vec<String> = children.iter().map(|c| format!("({})", c)).collect();
                f.write_str(&parts.join(sep))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// Select all columns
    Star,
    /// Named field path, possibly with alias
    Named { name: String, alias: Option<String> },
}

/// Result of parsing one statement
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    /// Table (resource) name from the FROM clause
    pub resource: Option<String>,
    pub columns: Vec<ColumnRef>,
    /// Flat condition list in parse order
    pub conditions: Vec<Condition>,
    /// Expression tree of the WHERE clause
    pub predicate: Option<Predicate>,
    /// WHERE clause rendered back to text
    pub where_text: Option<String>,
    /// ORDER BY clause as `field [asc|desc], ...`
    pub order_by: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Accumulated filter state of one query builder
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub conditions: Vec<Condition>,
    pub predicate: Option<Predicate>,
    /// Accumulated WHERE expression text
    pub where_text: Option<String>,
    /// Full synthetic statement last parsed
    pub sql: String,
    pub order: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub parsed: bool,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
