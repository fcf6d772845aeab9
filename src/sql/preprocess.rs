// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Text rewrites applied before SQL reaches the parser.
//!
//! - `?` placeholders are substituted from typed arguments
//! - bare field paths carrying an array selector, such as
//!   `status.addresses[type=InternalIP].address`, are wrapped in backticks so
//!   the dialect sees a single identifier

use std::fmt;

/// A positional argument for a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for SqlArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlArg::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlArg::Int(i) => write!(f, "{}", i),
            SqlArg::Float(x) => write!(f, "{}", x),
            SqlArg::Bool(b) => write!(f, "{}", b),
            SqlArg::Null => f.write_str("NULL"),
        }
    }
}

impl From<&str> for SqlArg {
    fn from(s: &str) -> Self {
        SqlArg::Str(s.to_string())
    }
}

impl From<String> for SqlArg {
    fn from(s: String) -> Self {
        SqlArg::Str(s)
    }
}

impl From<&String> for SqlArg {
    fn from(s: &String) -> Self {
        SqlArg::Str(s.clone())
    }
}

macro_rules! int_arg {
    ($($t:ty),*) => {
        $(impl From<$t> for SqlArg {
            fn from(v: $t) -> Self {
                SqlArg::Int(v as i64)
            }
        })*
    };
}

int_arg!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for SqlArg {
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or(SqlArg::Float(v as f64), SqlArg::Int)
    }
}

impl From<f32> for SqlArg {
    fn from(v: f32) -> Self {
        SqlArg::Float(f64::from(v))
    }
}

impl From<f64> for SqlArg {
    fn from(v: f64) -> Self {
        SqlArg::Float(v)
    }
}

impl From<bool> for SqlArg {
    fn from(v: bool) -> Self {
        SqlArg::Bool(v)
    }
}

impl<T: Into<SqlArg>> From<Option<T>> for SqlArg {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlArg::Null, Into::into)
    }
}

/// Replace `?` placeholders outside string literals with `args`, in order.
/// Placeholders without a matching argument are left as is.
pub fn format_sql(sql: &str, args: &[SqlArg]) -> String {
    if args.is_empty() {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + args.len() * 8);
    let mut args = args.iter();
    let mut quote: Option<char> = None;

    for c in sql.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (Some(_), c) => out.push(c),
            (None, '\'' | '"' | '`') => {
                quote = Some(c);
                out.push(c);
            }
            (None, '?') => match args.next() {
                Some(arg) => out.push_str(&arg.to_string()),
                None => out.push('?'),
            },
            (None, c) => out.push(c),
        }
    }
    out
}

/// Wrap bare field paths that contain `[...]` in backticks.
///
/// Text inside string literals and already quoted identifiers is untouched.
pub fn quote_bracket_paths(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '\'' | '"' | '`') {
            let end = skip_quoted(&chars, i);
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let end = scan_path(&chars, i);
            let token: String = chars[i..end].iter().collect();
            if token.contains('[') {
                out.push('`');
                out.push_str(&token);
                out.push('`');
            } else {
                out.push_str(&token);
            }
            i = end;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Index just past the literal opened at `start`. `''` inside a literal is an
/// escaped quote.
fn skip_quoted(chars: &[char], start: usize) -> usize {
    let q = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == q {
            if chars.get(i + 1) == Some(&q) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Index just past an identifier path starting at `start`, brackets included
fn scan_path(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            i += 1;
        } else if c == '[' {
            match chars[i..].iter().position(|&ch| ch == ']') {
                Some(close) => i += close + 1,
                None => return chars.len(),
            }
        } else {
            break;
        }
    }
    i
}

/// True when a WHERE fragment carries no condition: empty, `()` or `(())`
pub fn is_empty_fragment(fragment: &str) -> bool {
    let compact: String = fragment.chars().filter(|c| !c.is_whitespace()).collect();
    matches!(compact.as_str(), "" | "()" | "(())")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sql_args() {
        let sql = format_sql(
            "metadata.name = ? and spec.replicas > ? and ready = ?",
            &["web".into(), 3i64.into(), true.into()],
        );
        assert_eq!(sql, "metadata.name = 'web' and spec.replicas > 3 and ready = true");
    }

    #[test]
    fn test_format_sql_escapes_quotes() {
        let sql = format_sql("metadata.name = ?", &["o'brien".into()]);
        assert_eq!(sql, "metadata.name = 'o''brien'");
    }

    #[test]
    fn test_format_sql_skips_literals_and_extra_placeholders() {
        let sql = format_sql("a = '?' and b = ? and c = ?", &[1i64.into()]);
        assert_eq!(sql, "a = '?' and b = 1 and c = ?");
    }

    #[test]
    fn test_format_sql_null_and_float() {
        let none: Option<i32> = None;
        assert_eq!(format_sql("a = ? or b = ?", &[none.into(), 1.5f64.into()]), "a = NULL or b = 1.5");
    }

    #[test]
    fn test_quote_bracket_paths() {
        let sql = "select * from node where status.addresses[type=InternalIP].address = '10.0.0.1'";
        assert_eq!(
            quote_bracket_paths(sql),
            "select * from node where `status.addresses[type=InternalIP].address` = '10.0.0.1'"
        );
    }

    #[test]
    fn test_quote_bracket_paths_quoted_predicate() {
        let sql = "status.addresses[type='Internal IP'].address like '%10%'";
        assert_eq!(
            quote_bracket_paths(sql),
            "`status.addresses[type='Internal IP'].address` like '%10%'"
        );
    }

    #[test]
    fn test_quote_bracket_paths_leaves_literals_alone() {
        let sql = "a = 'x[1]' and `b[0].c` = 1 and metadata.name = 'it''s'";
        assert_eq!(quote_bracket_paths(sql), sql);
    }

    #[test]
    fn test_empty_fragments() {
        assert!(is_empty_fragment(""));
        assert!(is_empty_fragment(" ( ) "));
        assert!(is_empty_fragment("(( ))"));
        assert!(!is_empty_fragment("(a = 1)"));
    }
}
