// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

pub mod cache;
pub mod registry;
pub mod resources;
pub mod selectors;
pub mod source;

pub use cache::ResultCache;
pub use registry::{Cluster, ClusterRegistry};
pub use resources::{ResourceInfo, ResourceRegistry, build_core_registry};
pub use source::{ApiFilters, ListParams, ResourceSource, StaticSource};
