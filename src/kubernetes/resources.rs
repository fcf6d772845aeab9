// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource type registry.
//!
//! Maps the names a query may use for a resource type (plural, singular,
//! kind, short names) to a single [`ResourceInfo`].

use std::collections::HashMap;

/// Description of one resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// API group, empty for the core group
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Canonical name (lowercase plural, e.g. "pods")
    pub plural: String,
    /// Lowercase singular, e.g. "pod"
    pub singular: String,
    /// Short names, e.g. "po"
    pub short_names: Vec<String>,
    pub namespaced: bool,
    /// Built in (as opposed to derived from loaded documents)
    pub is_core: bool,
}

impl ResourceInfo {
    pub fn new(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_lowercase(),
            singular: kind.to_lowercase(),
            short_names: Vec::new(),
            namespaced,
            is_core: false,
        }
    }

    /// Derive a resource type from a document's `apiVersion` and `kind`.
    /// The plural is guessed the way kubectl does for unknown kinds.
    pub fn from_api_version(api_version: &str, kind: &str, namespaced: bool) -> Self {
        let (group, version) = match api_version.rsplit_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self::new(group, version, kind, &guess_plural(kind), namespaced)
    }

    pub fn with_short_names(mut self, names: &[&str]) -> Self {
        self.short_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Every name this resource answers to, lowercase
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![
            self.plural.clone(),
            self.singular.clone(),
            self.kind.to_lowercase(),
        ];
        names.extend(self.short_names.iter().map(|n| n.to_lowercase()));
        names.dedup();
        names
    }
}

fn guess_plural(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with('x') {
        format!("{}es", lower)
    } else if let Some(stem) = lower.strip_suffix('y')
        && !stem.ends_with(['a', 'e', 'i', 'o', 'u'])
    {
        format!("{}ies", stem)
    } else {
        format!("{}s", lower)
    }
}

/// Registry of known resource types
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    /// Resources indexed by plural name
    by_plural: HashMap<String, ResourceInfo>,
    /// Any accepted name to plural name
    alias_map: HashMap<String, String>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource. Built-in entries keep their names when a derived entry
    /// with the same name arrives.
    pub fn add(&mut self, info: ResourceInfo) {
        if let Some(existing) = self.by_plural.get(&info.plural)
            && existing.is_core
            && !info.is_core
        {
            return;
        }
        for name in info.names() {
            let taken_by_core = self
                .alias_map
                .get(&name)
                .and_then(|p| self.by_plural.get(p))
                .is_some_and(|owner| owner.is_core);
            if taken_by_core && !info.is_core {
                continue;
            }
            self.alias_map.insert(name, info.plural.clone());
        }
        self.by_plural.insert(info.plural.clone(), info);
    }

    /// Look up by plural, singular, kind or short name, ignoring case
    pub fn get(&self, name: &str) -> Option<&ResourceInfo> {
        let plural = self.alias_map.get(&name.to_lowercase())?;
        self.by_plural.get(plural)
    }

    /// Look up by group and kind
    pub fn find_kind(&self, group: &str, kind: &str) -> Option<&ResourceInfo> {
        self.by_plural
            .values()
            .find(|r| r.group == group && r.kind.eq_ignore_ascii_case(kind))
    }

    /// All resources sorted by plural name
    pub fn list(&self) -> Vec<&ResourceInfo> {
        let mut resources: Vec<_> = self.by_plural.values().collect();
        resources.sort_by(|a, b| a.plural.cmp(&b.plural));
        resources
    }

    /// Sorted plural names, used in lookup errors
    pub fn names(&self) -> Vec<String> {
        self.list().into_iter().map(|r| r.plural.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_plural.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_plural.is_empty()
    }
}

/// Registry of the built-in Kubernetes resource types
pub fn build_core_registry() -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();

    macro_rules! add_resource {
        ($group:expr, $version:expr, $kind:expr, $plural:expr, namespaced, [$($alias:expr),* $(,)?]) => {
            add_resource!(@inner $group, $version, $kind, $plural, true, [$($alias),*])
        };
        ($group:expr, $version:expr, $kind:expr, $plural:expr, cluster, [$($alias:expr),* $(,)?]) => {
            add_resource!(@inner $group, $version, $kind, $plural, false, [$($alias),*])
        };
        (@inner $group:expr, $version:expr, $kind:expr, $plural:expr, $namespaced:expr, [$($alias:expr),*]) => {{
            let mut info = ResourceInfo::new($group, $version, $kind, $plural, $namespaced)
                .with_short_names(&[$($alias),*]);
            info.is_core = true;
            registry.add(info);
        }};
    }

    // core/v1
    add_resource!("", "v1", "Pod", "pods", namespaced, ["po"]);
    add_resource!("", "v1", "Service", "services", namespaced, ["svc"]);
    add_resource!("", "v1", "ConfigMap", "configmaps", namespaced, ["cm"]);
    add_resource!("", "v1", "Secret", "secrets", namespaced, []);
    add_resource!("", "v1", "Event", "events", namespaced, ["ev"]);
    add_resource!("", "v1", "ServiceAccount", "serviceaccounts", namespaced, ["sa"]);
    add_resource!("", "v1", "Endpoints", "endpoints", namespaced, ["ep"]);
    add_resource!("", "v1", "PersistentVolumeClaim", "persistentvolumeclaims", namespaced, ["pvc"]);
    add_resource!("", "v1", "ResourceQuota", "resourcequotas", namespaced, ["quota"]);
    add_resource!("", "v1", "LimitRange", "limitranges", namespaced, ["limits"]);
    add_resource!("", "v1", "Node", "nodes", cluster, ["no"]);
    add_resource!("", "v1", "Namespace", "namespaces", cluster, ["ns"]);
    add_resource!("", "v1", "PersistentVolume", "persistentvolumes", cluster, ["pv"]);

    // apps/v1
    add_resource!("apps", "v1", "Deployment", "deployments", namespaced, ["deploy"]);
    add_resource!("apps", "v1", "StatefulSet", "statefulsets", namespaced, ["sts"]);
    add_resource!("apps", "v1", "DaemonSet", "daemonsets", namespaced, ["ds"]);
    add_resource!("apps", "v1", "ReplicaSet", "replicasets", namespaced, ["rs"]);

    // batch/v1
    add_resource!("batch", "v1", "Job", "jobs", namespaced, []);
    add_resource!("batch", "v1", "CronJob", "cronjobs", namespaced, ["cj"]);

    add_resource!("networking.k8s.io", "v1", "Ingress", "ingresses", namespaced, ["ing"]);
    add_resource!("networking.k8s.io", "v1", "NetworkPolicy", "networkpolicies", namespaced, ["netpol"]);
    add_resource!("networking.k8s.io", "v1", "IngressClass", "ingressclasses", cluster, []);
    add_resource!("autoscaling", "v2", "HorizontalPodAutoscaler", "horizontalpodautoscalers", namespaced, ["hpa"]);
    add_resource!("policy", "v1", "PodDisruptionBudget", "poddisruptionbudgets", namespaced, ["pdb"]);
    add_resource!("storage.k8s.io", "v1", "StorageClass", "storageclasses", cluster, ["sc"]);

    // rbac.authorization.k8s.io/v1
    add_resource!("rbac.authorization.k8s.io", "v1", "Role", "roles", namespaced, []);
    add_resource!("rbac.authorization.k8s.io", "v1", "RoleBinding", "rolebindings", namespaced, []);
    add_resource!("rbac.authorization.k8s.io", "v1", "ClusterRole", "clusterroles", cluster, []);
    add_resource!("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding", "clusterrolebindings", cluster, []);

    add_resource!("apiextensions.k8s.io", "v1", "CustomResourceDefinition", "customresourcedefinitions", cluster, ["crd", "crds"]);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_any_name() {
        let registry = build_core_registry();
        for name in ["pods", "pod", "Pod", "PO"] {
            assert_eq!(registry.get(name).map(|r| r.plural.as_str()), Some("pods"), "{}", name);
        }
        assert_eq!(registry.get("deploy").map(|r| r.kind.as_str()), Some("Deployment"));
        assert!(registry.get("widgets").is_none());
    }

    #[test]
    fn test_scope_and_api_version() {
        let registry = build_core_registry();
        let node = registry.get("node").unwrap();
        assert!(!node.namespaced);
        assert_eq!(node.api_version(), "v1");
        let ing = registry.get("ing").unwrap();
        assert!(ing.namespaced);
        assert_eq!(ing.api_version(), "networking.k8s.io/v1");
    }

    #[test]
    fn test_derived_does_not_shadow_core() {
        let mut registry = build_core_registry();
        // A CRD whose kind collides with a built-in name
        registry.add(ResourceInfo::from_api_version("example.com/v1", "Pod", true));
        assert_eq!(registry.get("pod").unwrap().group, "");
    }

    #[test]
    fn test_derived_resource() {
        let mut registry = ResourceRegistry::new();
        registry.add(ResourceInfo::from_api_version("cert-manager.io/v1", "Certificate", true));
        let cert = registry.get("certificates").unwrap();
        assert_eq!(cert.group, "cert-manager.io");
        assert_eq!(registry.get("certificate"), Some(cert));
        assert_eq!(registry.names(), vec!["certificates"]);
        assert!(registry.find_kind("cert-manager.io", "certificate").is_some());
    }

    #[test]
    fn test_guess_plural() {
        assert_eq!(guess_plural("Ingress"), "ingresses");
        assert_eq!(guess_plural("NetworkPolicy"), "networkpolicies");
        assert_eq!(guess_plural("Gateway"), "gateways");
        assert_eq!(guess_plural("Pod"), "pods");
    }
}
