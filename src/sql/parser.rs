// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! SQL to condition model.
//!
//! Statements are parsed with the MySQL dialect: backticks quote identifiers
//! and both quote styles delimit strings, so `metadata.name = "web"` works.

use sqlparser::ast::{
    self, BinaryOperator, Expr, LimitClause, ObjectName, OrderByKind, SelectItem, SetExpr, Statement,
    TableFactor, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tracing::{debug, warn};

use super::ast::*;
use super::preprocess::quote_bracket_paths;
use crate::error::{Error, Result};
use crate::query::value::detect_type;

/// Table name used when wrapping a bare WHERE expression
const WHERE_WRAPPER_TABLE: &str = "fake";

pub struct SqlParser {
    dialect: MySqlDialect,
    lenient: bool,
}

impl SqlParser {
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
            lenient: false,
        }
    }

    /// Skip unsupported WHERE nodes instead of failing the parse
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Parse a full `SELECT ... FROM resource [WHERE] [ORDER BY] [LIMIT]`
    pub fn parse_select(&self, sql: &str) -> Result<ParsedQuery> {
        let sql = quote_bracket_paths(sql.trim().trim_end_matches(';'));
        debug!(sql = %sql, "parsing statement");

        let mut statements = Parser::parse_sql(&self.dialect, &sql).map_err(|source| Error::SqlParse {
            sql: sql.clone(),
            source,
        })?;
        if statements.len() != 1 {
            return Err(Error::UnsupportedStatement(format!(
                "expected exactly one statement, got {}",
                statements.len()
            )));
        }
        match statements.remove(0) {
            Statement::Query(query) => self.convert_query(&query),
            other => Err(Error::UnsupportedStatement(other.to_string())),
        }
    }

    /// Parse a bare WHERE expression such as `a = 1 or b like 'x%'`
    pub fn parse_where(&self, expr: &str) -> Result<ParsedQuery> {
        self.parse_select(&where_statement(expr))
    }

    fn convert_query(&self, query: &ast::Query) -> Result<ParsedQuery> {
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            other => {
                return Err(Error::UnsupportedStatement(format!(
                    "only SELECT queries are supported: {}",
                    other
                )));
            }
        };

        let resource = match select.from.first().map(|t| &t.relation) {
            Some(TableFactor::Table { name, .. }) => table_name(name),
            Some(other) => {
                return Err(Error::UnsupportedStatement(format!(
                    "complex table expressions are not supported: {}",
                    other
                )));
            }
            None => None,
        };

        let columns = self.convert_select_items(&select.projection)?;

        let mut parsed = ParsedQuery {
            resource,
            columns,
            ..Default::default()
        };

        if let Some(selection) = &select.selection {
            let mut walker = WhereWalker::default();
            let predicate = walker.walk(selection, 0, Connective::And);
            if !walker.diagnostics.is_empty() && !self.lenient {
                return Err(Error::UnsupportedExpression(walker.diagnostics.join("; ")));
            }
            parsed.conditions = walker.conditions;
            parsed.predicate = predicate;
            parsed.where_text = Some(selection.to_string());
        }

        if let Some(order_by) = &query.order_by {
            parsed.order_by = self.convert_order_by(order_by)?;
        }

        if let Some(limit_clause) = &query.limit_clause {
            let (limit, offset) = self.convert_limit(limit_clause)?;
            parsed.limit = limit;
            parsed.offset = offset;
        }

        debug!(
            resource = ?parsed.resource,
            conditions = parsed.conditions.len(),
            order = ?parsed.order_by,
            limit = ?parsed.limit,
            offset = ?parsed.offset,
            "parsed statement"
        );
        Ok(parsed)
    }

    fn convert_select_items(&self, items: &[SelectItem]) -> Result<Vec<ColumnRef>> {
        let mut columns = Vec::new();
        for item in items {
            match item {
                SelectItem::Wildcard(_) => columns.push(ColumnRef::Star),
                SelectItem::UnnamedExpr(expr) => {
                    let name = field_name(expr).ok_or_else(|| {
                        Error::UnsupportedExpression(format!("select item `{}`", expr))
                    })?;
                    columns.push(ColumnRef::Named { name, alias: None });
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    let name = field_name(expr).ok_or_else(|| {
                        Error::UnsupportedExpression(format!("select item `{}`", expr))
                    })?;
                    columns.push(ColumnRef::Named {
                        name,
                        alias: Some(alias.value.clone()),
                    });
                }
                other => {
                    return Err(Error::UnsupportedExpression(format!("select item `{}`", other)));
                }
            }
        }
        Ok(columns)
    }

    /// ORDER BY rendered as `field asc|desc, ...`
    fn convert_order_by(&self, order_by: &ast::OrderBy) -> Result<Option<String>> {
        let exprs = match &order_by.kind {
            OrderByKind::Expressions(exprs) => exprs,
            OrderByKind::All(_) => {
                return Err(Error::UnsupportedExpression("ORDER BY ALL".to_string()));
            }
        };

        let mut terms = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let field = field_name(&expr.expr).ok_or_else(|| {
                Error::UnsupportedExpression(format!("ORDER BY `{}`", expr.expr))
            })?;
            let dir = if expr.options.asc == Some(false) { "desc" } else { "asc" };
            terms.push(format!("{} {}", field, dir));
        }
        Ok((!terms.is_empty()).then(|| terms.join(", ")))
    }

    fn convert_limit(&self, clause: &LimitClause) -> Result<(Option<usize>, Option<usize>)> {
        match clause {
            LimitClause::LimitOffset { limit, offset, .. } => {
                let limit = limit.as_ref().map(|e| count_value("LIMIT", e)).transpose()?;
                let offset = offset
                    .as_ref()
                    .map(|o| count_value("OFFSET", &o.value))
                    .transpose()?;
                Ok((limit, offset))
            }
            LimitClause::OffsetCommaLimit { offset, limit } => Ok((
                Some(count_value("LIMIT", limit)?),
                Some(count_value("OFFSET", offset)?),
            )),
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a bare WHERE expression into a full statement
pub fn where_statement(expr: &str) -> String {
    format!("SELECT * FROM {} WHERE ({})", WHERE_WRAPPER_TABLE, expr)
}

/// Collects conditions from a WHERE expression.
///
/// A comparison is recorded at the current depth with the connective it was
/// reached through. AND/OR descend one level and tag both sides with their
/// own connective. Parentheses descend two levels and reset the connective to
/// AND.
#[derive(Default)]
struct WhereWalker {
    conditions: Vec<Condition>,
    diagnostics: Vec<String>,
}

impl WhereWalker {
    fn walk(&mut self, expr: &Expr, depth: usize, connective: Connective) -> Option<Predicate> {
        match expr {
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => {
                    let l = self.walk(left, depth + 1, Connective::And);
                    let r = self.walk(right, depth + 1, Connective::And);
                    combine(l, r, Predicate::and)
                }
                BinaryOperator::Or => {
                    let l = self.walk(left, depth + 1, Connective::Or);
                    let r = self.walk(right, depth + 1, Connective::Or);
                    combine(l, r, Predicate::or)
                }
                BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq => {
                    let operator = match op {
                        BinaryOperator::Eq => Operator::Eq,
                        BinaryOperator::NotEq => Operator::Ne,
                        BinaryOperator::Lt => Operator::Lt,
                        BinaryOperator::LtEq => Operator::Le,
                        BinaryOperator::Gt => Operator::Gt,
                        _ => Operator::Ge,
                    };
                    match (field_name(left), literal_text(right)) {
                        (Some(field), Some(value)) => self.push(depth, connective, field, operator, value),
                        _ => self.unsupported(expr),
                    }
                }
                _ => self.unsupported(expr),
            },
            Expr::Nested(inner) => self.walk(inner, depth + 2, Connective::And),
            Expr::Between {
                expr: field,
                negated,
                low,
                high,
            } => {
                let operator = if *negated { Operator::NotBetween } else { Operator::Between };
                match (field_name(field), quoted_literal(low), quoted_literal(high)) {
                    (Some(field), Some(low), Some(high)) => {
                        self.push(depth, connective, field, operator, format!("{} and {}", low, high))
                    }
                    _ => self.unsupported(expr),
                }
            }
            Expr::InList {
                expr: field,
                list,
                negated,
            } => {
                let operator = if *negated { Operator::NotIn } else { Operator::In };
                let items: Option<Vec<String>> = list.iter().map(quoted_literal).collect();
                match (field_name(field), items) {
                    (Some(field), Some(items)) => {
                        self.push(depth, connective, field, operator, format!("({})", items.join(", ")))
                    }
                    _ => self.unsupported(expr),
                }
            }
            Expr::Like {
                negated,
                expr: field,
                pattern,
                ..
            }
            | Expr::ILike {
                negated,
                expr: field,
                pattern,
                ..
            } => {
                let operator = if *negated { Operator::NotLike } else { Operator::Like };
                match (field_name(field), literal_text(pattern)) {
                    (Some(field), Some(pattern)) => self.push(depth, connective, field, operator, pattern),
                    _ => self.unsupported(expr),
                }
            }
            _ => self.unsupported(expr),
        }
    }

    fn push(
        &mut self,
        depth: usize,
        connective: Connective,
        field: String,
        operator: Operator,
        value: String,
    ) -> Option<Predicate> {
        let condition = Condition {
            depth,
            connective,
            field,
            operator,
            typed: detect_type(&value),
            value,
        };
        self.conditions.push(condition.clone());
        Some(Predicate::Comparison(condition))
    }

    fn unsupported(&mut self, expr: &Expr) -> Option<Predicate> {
        warn!(expression = %expr, "unsupported WHERE expression");
        self.diagnostics.push(expr.to_string());
        None
    }
}

fn combine(
    left: Option<Predicate>,
    right: Option<Predicate>,
    join: fn(Predicate, Predicate) -> Predicate,
) -> Option<Predicate> {
    match (left, right) {
        (Some(l), Some(r)) => Some(join(l, r)),
        (one, None) | (None, one) => one,
    }
}

/// Last identifier of a possibly qualified table name
fn table_name(name: &ObjectName) -> Option<String> {
    name.0
        .iter()
        .filter_map(|part| part.as_ident())
        .next_back()
        .map(|ident| ident.value.clone())
}

/// Dotted field path of an identifier expression
fn field_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(idents) => Some(
            idents
                .iter()
                .map(|i| i.value.as_str())
                .collect::<Vec<_>>()
                .join("."),
        ),
        _ => None,
    }
}

/// Unquoted text of a literal. Bare words are taken as text.
fn literal_text(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => Some(s.clone()),
            SqlValue::Number(n, _) => Some(n.to_string()),
            SqlValue::Boolean(b) => Some(b.to_string()),
            SqlValue::Null => Some("null".to_string()),
            _ => None,
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => literal_text(expr).map(|t| format!("-{}", t)),
        Expr::UnaryOp {
            op: UnaryOperator::Plus,
            expr,
        } => literal_text(expr),
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => field_name(expr),
        _ => None,
    }
}

/// Like [`literal_text`], but string literals keep their single quotes so
/// list and range separators inside them survive
fn quoted_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
                Some(format!("'{}'", s.replace('\'', "''")))
            }
            _ => literal_text(expr),
        },
        _ => literal_text(expr),
    }
}

fn count_value(clause: &'static str, expr: &Expr) -> Result<usize> {
    let invalid = || Error::InvalidLimit {
        clause,
        value: expr.to_string(),
    };
    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::Number(n, _) => n.to_string().parse::<usize>().map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}
