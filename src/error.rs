// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error type for the query engine and the query builder.
//!
//! Field resolution misses and comparison type mismatches are not errors:
//! they only make a condition not match. Everything here aborts the query
//! step that produced it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse SQL `{sql}`: {source}")]
    SqlParse {
        sql: String,
        #[source]
        source: sqlparser::parser::ParserError,
    },

    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("unsupported expression in WHERE clause: {0}")]
    UnsupportedExpression(String),

    #[error("invalid {clause} value `{value}`")]
    InvalidLimit { clause: &'static str, value: String },

    #[error("resource {name} not found, available: {}", available.join(", "))]
    UnknownResource { name: String, available: Vec<String> },

    #[error("no resource selected, call resource() or sql() first")]
    MissingResource,

    #[error("invalid selector requirement `{0}`")]
    InvalidSelector(String),

    #[error("cluster `{0}` is not registered")]
    UnknownCluster(String),

    #[error("cluster `{0}` is already registered")]
    DuplicateCluster(String),

    #[error("{resource} `{name}` not found")]
    NotFound { resource: String, name: String },

    #[error("resource source error: {0:#}")]
    Source(#[from] anyhow::Error),

    #[error("failed to decode document: {0}")]
    Decode(#[from] serde_json::Error),
}
