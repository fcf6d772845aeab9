// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory query engine: field resolution, condition matching, WHERE
//! evaluation, ordering and the query builder that ties them together.

pub mod builder;
pub mod group;
pub mod matcher;
pub mod order;
pub mod path;
pub mod value;

pub use builder::{ListResult, NamespaceScope, Query};
pub use group::{FilterMode, apply_grouped, apply_tree, evaluate};
pub use matcher::matches;
pub use order::{Dir, OrderKey, OrderSpec};
pub use path::{FieldPath, Resolved, resolve};
pub use value::{TypedValue, ValueKind, detect_type, parse_time};
