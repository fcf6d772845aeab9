// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Registered clusters.
//!
//! A [`Cluster`] bundles a document source with its own result cache and
//! engine settings. The [`ClusterRegistry`] is an explicit value owned by the
//! caller; the first cluster registered becomes the default.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use super::cache::{ResultCache, list_key};
use super::resources::{ResourceInfo, ResourceRegistry};
use super::source::{ListParams, ResourceSource};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::query::Query;

pub struct Cluster {
    id: String,
    source: Arc<dyn ResourceSource>,
    cache: ResultCache<Vec<Value>>,
    config: EngineConfig,
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("cached_keys", &self.cache.len())
            .finish()
    }
}

impl Cluster {
    pub fn new(id: impl Into<String>, source: Arc<dyn ResourceSource>) -> Self {
        Self::with_config(id, source, EngineConfig::default())
    }

    pub fn with_config(id: impl Into<String>, source: Arc<dyn ResourceSource>, config: EngineConfig) -> Self {
        Self {
            id: id.into(),
            source,
            cache: ResultCache::new(config.cache_capacity),
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        self.source.registry()
    }

    pub fn cache(&self) -> &ResultCache<Vec<Value>> {
        &self.cache
    }

    /// Start a query against this cluster
    pub fn query(self: &Arc<Self>) -> Query {
        Query::new(Arc::clone(self))
    }

    /// Look up a resource type by any of its names
    pub fn resolve_resource(&self, name: &str) -> Result<ResourceInfo> {
        self.registry().get(name).cloned().ok_or_else(|| Error::UnknownResource {
            name: name.to_string(),
            available: self.registry().names(),
        })
    }

    /// List through the cache
    pub async fn list(&self, resource: &ResourceInfo, params: &ListParams, ttl: Duration) -> Result<Vec<Value>> {
        let key = list_key(resource, params);
        self.cache
            .get_or_compute(&key, ttl, || async {
                self.source.list(resource, params).await.map_err(Error::Source)
            })
            .await
    }

    /// Fetch one named document through the cache
    pub async fn get(
        &self,
        resource: &ResourceInfo,
        namespace: Option<&str>,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Value>> {
        let key = format!("get:{}/{}/{}/{}", namespace.unwrap_or("*"), resource.api_version(), resource.plural, name);
        let found = self
            .cache
            .get_or_compute(&key, ttl, || async {
                let doc = self
                    .source
                    .get(resource, namespace, name)
                    .await
                    .map_err(Error::Source)?;
                Ok::<_, Error>(doc.into_iter().collect())
            })
            .await?;
        Ok(found.into_iter().next())
    }
}

#[derive(Debug, Default)]
struct Clusters {
    by_id: HashMap<String, Arc<Cluster>>,
    default_id: Option<String>,
}

/// Explicit set of clusters keyed by id
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    inner: RwLock<Clusters>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cluster. The first one added becomes the default.
    pub fn register(&self, cluster: Cluster) -> Result<Arc<Cluster>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.by_id.contains_key(cluster.id()) {
            return Err(Error::DuplicateCluster(cluster.id().to_string()));
        }
        let cluster = Arc::new(cluster);
        if inner.default_id.is_none() {
            inner.default_id = Some(cluster.id().to_string());
        }
        info!(cluster = %cluster.id(), "registered cluster");
        inner.by_id.insert(cluster.id().to_string(), Arc::clone(&cluster));
        Ok(cluster)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Cluster>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownCluster(id.to_string()))
    }

    /// Remove a cluster. Removing the default promotes the smallest remaining id.
    pub fn remove(&self, id: &str) -> Result<Arc<Cluster>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = inner
            .by_id
            .remove(id)
            .ok_or_else(|| Error::UnknownCluster(id.to_string()))?;
        if inner.default_id.as_deref() == Some(id) {
            inner.default_id = inner.by_id.keys().min().cloned();
            debug!(cluster = %id, new_default = ?inner.default_id, "removed default cluster");
        }
        Ok(removed)
    }

    /// Sorted cluster ids
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn default_cluster(&self) -> Option<Arc<Cluster>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.default_id.as_ref().and_then(|id| inner.by_id.get(id)).cloned()
    }

    pub fn set_default(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.by_id.contains_key(id) {
            return Err(Error::UnknownCluster(id.to_string()));
        }
        inner.default_id = Some(id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::source::StaticSource;
    use serde_json::json;

    fn cluster(id: &str) -> Cluster {
        let source = StaticSource::new()
            .with_documents([json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {"name": "web", "namespace": "default"}
            })])
            .unwrap();
        Cluster::new(id, Arc::new(source))
    }

    #[test]
    fn test_register_and_default() {
        let registry = ClusterRegistry::new();
        assert!(registry.default_cluster().is_none());
        registry.register(cluster("prod")).unwrap();
        registry.register(cluster("dev")).unwrap();
        assert_eq!(registry.ids(), vec!["dev", "prod"]);
        assert_eq!(registry.default_cluster().unwrap().id(), "prod");
        assert_eq!(registry.get("dev").unwrap().id(), "dev");
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let registry = ClusterRegistry::new();
        registry.register(cluster("prod")).unwrap();
        assert!(matches!(registry.register(cluster("prod")), Err(Error::DuplicateCluster(id)) if id == "prod"));
        assert!(matches!(registry.get("staging"), Err(Error::UnknownCluster(_))));
        assert!(matches!(registry.set_default("staging"), Err(Error::UnknownCluster(_))));
    }

    #[test]
    fn test_remove_default_promotes_next() {
        let registry = ClusterRegistry::new();
        registry.register(cluster("c")).unwrap();
        registry.register(cluster("b")).unwrap();
        registry.register(cluster("a")).unwrap();
        registry.remove("c").unwrap();
        assert_eq!(registry.default_cluster().unwrap().id(), "a");
        registry.set_default("b").unwrap();
        assert_eq!(registry.default_cluster().unwrap().id(), "b");
        assert!(registry.remove("c").is_err());
    }

    #[test]
    fn test_resolve_resource() {
        let c = cluster("prod");
        assert_eq!(c.resolve_resource("po").unwrap().plural, "pods");
        match c.resolve_resource("widgets") {
            Err(Error::UnknownResource { name, available }) => {
                assert_eq!(name, "widgets");
                assert!(available.contains(&"pods".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_through_cache() {
        let c = cluster("prod");
        let pods = c.resolve_resource("pods").unwrap();
        let ttl = Duration::from_secs(60);
        let found = c.get(&pods, Some("default"), "web", ttl).await.unwrap();
        assert_eq!(found.unwrap()["metadata"]["name"], "web");
        assert!(c.get(&pods, Some("default"), "db", ttl).await.unwrap().is_none());
        assert_eq!(c.cache().len(), 2);
    }
}
