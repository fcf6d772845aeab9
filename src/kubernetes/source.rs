// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Where documents come from.
//!
//! The query engine never talks to a cluster itself. It asks a
//! [`ResourceSource`] for the documents of one resource type, pushing down
//! the namespace scope and any label/field selectors. [`StaticSource`] serves
//! documents held in memory, typically loaded from `kubectl get -o json|yaml`
//! output.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::resources::{ResourceInfo, ResourceRegistry, build_core_registry};
use super::selectors::{FieldSelector, LabelSelector};

/// Parameters to push down to the source
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ApiFilters {
    /// Label selector string (e.g., "app=nginx,version=v1")
    pub label_selector: Option<String>,
    /// Field selector string (e.g., "status.phase=Running")
    pub field_selector: Option<String>,
}

impl ApiFilters {
    pub fn is_empty(&self) -> bool {
        self.label_selector.is_none() && self.field_selector.is_none()
    }
}

/// Scope and filters of one list call
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListParams {
    /// `None` lists all namespaces. Ignored for cluster-scoped resources.
    pub namespace: Option<String>,
    pub filters: ApiFilters,
}

impl ListParams {
    pub fn all_namespaces() -> Self {
        Self::default()
    }

    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: ApiFilters) -> Self {
        self.filters = filters;
        self
    }
}

#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Resource types this source can serve
    fn registry(&self) -> &ResourceRegistry;

    /// List documents of one resource type
    async fn list(&self, resource: &ResourceInfo, params: &ListParams) -> Result<Vec<Value>>;

    /// Fetch one document by name
    async fn get(&self, resource: &ResourceInfo, namespace: Option<&str>, name: &str) -> Result<Option<Value>> {
        let params = ListParams {
            namespace: namespace.map(str::to_string),
            filters: ApiFilters {
                label_selector: None,
                field_selector: Some(format!("metadata.name={}", name)),
            },
        };
        Ok(self.list(resource, &params).await?.into_iter().next())
    }
}

/// In-memory source
#[derive(Debug)]
pub struct StaticSource {
    registry: ResourceRegistry,
    /// Documents by resource plural, in insertion order
    documents: HashMap<String, Vec<Value>>,
    list_calls: AtomicUsize,
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticSource {
    /// Empty source knowing the built-in resource types
    pub fn new() -> Self {
        Self {
            registry: build_core_registry(),
            documents: HashMap::new(),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_documents(mut self, docs: impl IntoIterator<Item = Value>) -> Result<Self> {
        for doc in docs {
            self.add_document(doc)?;
        }
        Ok(self)
    }

    /// Add one object, or every item of a `*List` object.
    ///
    /// Nothing is added unless every object carries a kind.
    pub fn add_document(&mut self, doc: Value) -> Result<()> {
        let mut staged = Vec::new();
        flatten_document(doc, &mut staged)?;
        for (kind, doc) in staged {
            self.insert_document(kind, doc);
        }
        Ok(())
    }

    fn insert_document(&mut self, kind: String, doc: Value) {
        let api_version = doc.get("apiVersion").and_then(Value::as_str).unwrap_or("v1").to_string();
        let group = api_version.rsplit_once('/').map(|(g, _)| g).unwrap_or("");

        let plural = match self.registry.find_kind(group, &kind) {
            Some(info) => info.plural.clone(),
            None => {
                let namespaced = doc.pointer("/metadata/namespace").is_some();
                let info = ResourceInfo::from_api_version(&api_version, &kind, namespaced);
                let plural = info.plural.clone();
                debug!(kind = %kind, api_version = %api_version, plural = %plural, "registered resource type");
                self.registry.add(info);
                plural
            }
        };
        trace!(kind = %kind, name = ?doc.pointer("/metadata/name"), "added document");
        self.documents.entry(plural).or_default().push(doc);
    }

    /// Load a JSON or YAML file. YAML files may hold several documents.
    pub async fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let docs = if is_json {
            vec![serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {}", path.display()))?]
        } else {
            parse_yaml_documents(&content).with_context(|| format!("Failed to parse YAML in {}", path.display()))?
        };

        let mut staged = Vec::new();
        for doc in docs {
            flatten_document(doc, &mut staged).with_context(|| format!("Invalid document in {}", path.display()))?;
        }
        let added = staged.len();
        for (kind, doc) in staged {
            self.insert_document(kind, doc);
        }
        debug!(path = %path.display(), documents = added, "loaded file");
        Ok(added)
    }

    /// Total number of documents held
    pub fn len(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `list` calls served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResourceSource for StaticSource {
    fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    async fn list(&self, resource: &ResourceInfo, params: &ListParams) -> Result<Vec<Value>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);

        let labels = params
            .filters
            .label_selector
            .as_deref()
            .map(LabelSelector::parse)
            .transpose()?;
        let fields = params
            .filters
            .field_selector
            .as_deref()
            .map(FieldSelector::parse)
            .transpose()?;
        let namespace = params.namespace.as_deref().filter(|_| resource.namespaced);

        let docs: Vec<Value> = self
            .documents
            .get(&resource.plural)
            .map(|docs| {
                docs.iter()
                    .filter(|d| namespace.is_none_or(|ns| d.pointer("/metadata/namespace").and_then(Value::as_str) == Some(ns)))
                    .filter(|d| labels.as_ref().is_none_or(|s| s.matches(d)))
                    .filter(|d| fields.as_ref().is_none_or(|s| s.matches(d)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            resource = %resource.plural,
            namespace = ?namespace,
            label_selector = ?params.filters.label_selector,
            field_selector = ?params.filters.field_selector,
            count = docs.len(),
            "listed documents"
        );
        Ok(docs)
    }
}

fn is_list(doc: &Value) -> bool {
    doc.get("kind")
        .and_then(Value::as_str)
        .is_some_and(|k| k.ends_with("List"))
        && doc.get("items").is_some_and(Value::is_array)
}

/// Expand lists and arrays into `(kind, object)` pairs, failing on any object without a kind
fn flatten_document(doc: Value, out: &mut Vec<(String, Value)>) -> Result<()> {
    if is_list(&doc) {
        let api_version = doc.get("apiVersion").and_then(Value::as_str).map(str::to_string);
        let items = match doc {
            Value::Object(mut map) => map.remove("items"),
            _ => None,
        };
        if let Some(Value::Array(items)) = items {
            for mut item in items {
                // Typed lists omit apiVersion on items
                if let (Some(obj), Some(api_version)) = (item.as_object_mut(), api_version.as_ref())
                    && !obj.contains_key("apiVersion")
                    && api_version != "v1"
                {
                    obj.insert("apiVersion".to_string(), Value::String(api_version.clone()));
                }
                flatten_document(item, out)?;
            }
        }
        return Ok(());
    }
    if let Value::Array(items) = doc {
        for item in items {
            flatten_document(item, out)?;
        }
        return Ok(());
    }

    let kind = doc
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("document has no kind"))?
        .to_string();
    out.push((kind, doc));
    Ok(())
}

/// Every non-empty document of a YAML stream
pub fn parse_yaml_documents(content: &str) -> Result<Vec<Value>> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn pod(name: &str, ns: &str, app: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": name, "namespace": ns, "labels": {"app": app}},
            "status": {"phase": "Running"}
        })
    }

    fn source() -> StaticSource {
        StaticSource::new()
            .with_documents([
                pod("a", "default", "web"),
                pod("b", "kube-system", "dns"),
                pod("c", "default", "db"),
            ])
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_namespace_scope() {
        let src = source();
        let pods = src.registry().get("pods").unwrap().clone();
        assert_eq!(src.list(&pods, &ListParams::all_namespaces()).await.unwrap().len(), 3);
        assert_eq!(src.list(&pods, &ListParams::namespaced("default")).await.unwrap().len(), 2);
        assert_eq!(src.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_list_selectors() {
        let src = source();
        let pods = src.registry().get("po").unwrap().clone();
        let params = ListParams::all_namespaces().with_filters(ApiFilters {
            label_selector: Some("app!=dns".to_string()),
            field_selector: Some("metadata.namespace=default".to_string()),
        });
        assert_eq!(src.list(&pods, &params).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_selector_is_error() {
        let src = source();
        let pods = src.registry().get("pods").unwrap().clone();
        let params = ListParams::all_namespaces().with_filters(ApiFilters {
            label_selector: Some("app in (web)".to_string()),
            field_selector: None,
        });
        assert!(src.list(&pods, &params).await.is_err());
    }

    #[tokio::test]
    async fn test_default_get() {
        let src = source();
        let pods = src.registry().get("pods").unwrap().clone();
        let found = src.get(&pods, Some("default"), "c").await.unwrap();
        assert_eq!(found.unwrap()["metadata"]["labels"]["app"], "db");
        assert!(src.get(&pods, Some("kube-system"), "c").await.unwrap().is_none());
    }

    #[test]
    fn test_list_object_expanded_and_crd_registered() {
        let list = json!({
            "apiVersion": "cert-manager.io/v1",
            "kind": "CertificateList",
            "items": [
                {"kind": "Certificate", "metadata": {"name": "tls", "namespace": "web"}}
            ]
        });
        let src = StaticSource::new().with_documents([list]).unwrap();
        assert_eq!(src.len(), 1);
        let cert = src.registry().get("certificate").unwrap();
        assert_eq!(cert.group, "cert-manager.io");
        assert!(cert.namespaced);
    }

    #[test]
    fn test_document_without_kind_rejected() {
        assert!(StaticSource::new().with_documents([json!({"metadata": {}})]).is_err());
    }

    #[test]
    fn test_list_with_kindless_item_adds_nothing() {
        let list = json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": [pod("x", "default", "web"), {"metadata": {"name": "y"}}]
        });
        let mut src = StaticSource::new();
        assert!(src.add_document(list).is_err());
        assert_eq!(src.len(), 0);
    }

    #[tokio::test]
    async fn test_load_file_rejects_whole_stream() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "apiVersion: v1\nkind: Node\nmetadata:\n  name: n1\n---\nmetadata:\n  name: n2\n").unwrap();

        let mut src = StaticSource::new();
        assert!(src.load_file(file.path()).await.is_err());
        assert_eq!(src.len(), 0);
    }

    #[tokio::test]
    async fn test_load_yaml_multi_document() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "apiVersion: v1\nkind: Node\nmetadata:\n  name: n1\n---\n---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  namespace: default\nspec:\n  replicas: 3\n"
        )
        .unwrap();

        let mut src = StaticSource::new();
        assert_eq!(src.load_file(file.path()).await.unwrap(), 2);
        let deploy = src.registry().get("deploy").unwrap().clone();
        let docs = src.list(&deploy, &ListParams::all_namespaces()).await.unwrap();
        assert_eq!(docs[0]["spec"]["replicas"], 3);
    }

    #[tokio::test]
    async fn test_load_json_list() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let list = json!({"apiVersion": "v1", "kind": "List", "items": [pod("x", "default", "web"), pod("y", "default", "web")]});
        write!(file, "{}", list).unwrap();

        let mut src = StaticSource::new();
        assert_eq!(src.load_file(file.path()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let mut src = StaticSource::new();
        let err = src.load_file("/nonexistent/k8sorm/pods.yaml").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
