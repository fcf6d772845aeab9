// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! SQL front end: statement parsing into the condition model, plus the text
//! rewrites applied before parsing.

pub mod ast;
pub mod parser;
pub mod preprocess;

pub use ast::{ColumnRef, Condition, Connective, Filter, Operator, ParsedQuery, Predicate};
pub use parser::{SqlParser, where_statement};
pub use preprocess::{SqlArg, format_sql, is_empty_fragment, quote_bracket_paths};
