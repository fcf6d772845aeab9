// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Chainable, SQL-filtered queries over Kubernetes resource documents.
//!
//! Documents come from a [`ResourceSource`]. A [`Cluster`] pairs a source
//! with a result cache and engine settings, and [`Query`] builds and runs a
//! query against it:
//!
//! ```ignore
//! let cluster = Arc::new(Cluster::new("local", Arc::new(source)));
//! let running = cluster
//!     .query()
//!     .sql("select * from pods where status.phase = 'Running' order by metadata.name")
//!     .list()
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod kubernetes;
pub mod query;
pub mod sql;

pub use error::{Error, Result};
pub use kubernetes::{Cluster, ClusterRegistry, ResourceSource, StaticSource};
pub use query::{FilterMode, ListResult, Query};
pub use sql::SqlArg;
