// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Chainable query builder
//!
//! A [`Query`] collects scope, filters and pagination, then runs once through
//! one of the terminal calls ([`Query::list`], [`Query::get`],
//! [`Query::count`] and their typed variants). A step that fails (an
//! unparsable WHERE fragment, a bad ORDER BY) is remembered and reported by
//! the terminal call, so a broken query never fetches anything.
//!
//! ```ignore
//! let pods = cluster
//!     .query()
//!     .resource("pods")
//!     .namespace("kube-system")
//!     .where_clause("status.phase = 'Running'")
//!     .order("metadata.name asc")
//!     .limit(10)
//!     .list()
//!     .await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::group::{FilterMode, apply_grouped, apply_tree};
use super::order::OrderSpec;
use crate::error::{Error, Result};
use crate::kubernetes::registry::Cluster;
use crate::kubernetes::resources::ResourceInfo;
use crate::kubernetes::selectors::merge_selectors;
use crate::kubernetes::source::{ApiFilters, ListParams};
use crate::sql::{ColumnRef, Filter, SqlArg, SqlParser, format_sql, is_empty_fragment, where_statement};

/// Namespace the query runs in
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceScope {
    /// Nothing chosen, namespaced resources use `default`
    #[default]
    Unset,
    One(String),
    All,
}

/// Documents returned by a list, with the match count before pagination
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult<T = Value> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug)]
pub struct Query {
    cluster: Arc<Cluster>,
    resource: Option<String>,
    scope: NamespaceScope,
    name: Option<String>,
    columns: Vec<ColumnRef>,
    filter: Filter,
    filters: ApiFilters,
    cache_ttl: Option<Duration>,
    remove_managed_fields: bool,
    error: Option<Error>,
}

impl Query {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        Self {
            cluster,
            resource: None,
            scope: NamespaceScope::Unset,
            name: None,
            columns: Vec::new(),
            filter: Filter::default(),
            filters: ApiFilters::default(),
            cache_ttl: None,
            remove_managed_fields: false,
            error: None,
        }
    }

    /// Resource type by plural, singular, kind or short name
    pub fn resource(mut self, name: impl Into<String>) -> Self {
        self.resource = Some(name.into());
        self
    }

    /// `"*"` selects all namespaces, `""` the `default` namespace
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.scope = match namespace {
            "*" => NamespaceScope::All,
            "" => NamespaceScope::One("default".to_string()),
            ns => NamespaceScope::One(ns.to_string()),
        };
        self
    }

    /// Several namespaces. Lists every namespace and keeps documents from
    /// the given ones. A `"*"` among them selects all namespaces.
    pub fn namespaces<I, S>(self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let namespaces: Vec<String> = namespaces.into_iter().map(|s| s.as_ref().to_string()).collect();
        match namespaces.as_slice() {
            [one] => self.namespace(one),
            list if list.iter().any(|ns| ns == "*") => self.all_namespaces(),
            [] => self,
            list => {
                let clause = list
                    .iter()
                    .map(|ns| format!("metadata.namespace='{}'", ns.replace('\'', "''")))
                    .collect::<Vec<_>>()
                    .join(" or ");
                self.all_namespaces().where_clause(&format!("({})", clause))
            }
        }
    }

    pub fn all_namespaces(mut self) -> Self {
        self.scope = NamespaceScope::All;
        self
    }

    /// Object name, used by `get` and as a field selector by `list`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// AND a WHERE expression onto the ones already given
    pub fn where_clause(self, expr: &str) -> Self {
        self.where_args(expr, &[])
    }

    /// Like [`Query::where_clause`], with `?` placeholders filled from `args`
    pub fn where_args(mut self, expr: &str, args: &[SqlArg]) -> Self {
        let fragment = format_sql(expr, args);
        if is_empty_fragment(&fragment) {
            return self;
        }
        let text = match &self.filter.where_text {
            Some(prev) => format!("({}) and ({})", prev, fragment.trim()),
            None => fragment.trim().to_string(),
        };

        match self.parser().parse_where(&text) {
            Ok(parsed) => {
                self.filter.conditions = parsed.conditions;
                self.filter.predicate = parsed.predicate;
                self.filter.sql = where_statement(&text);
                self.filter.where_text = Some(text);
                self.filter.parsed = true;
                self
            }
            Err(e) => self.fail(e),
        }
    }

    /// Take resource, WHERE, ORDER BY and LIMIT/OFFSET from one SELECT
    /// statement. The scope becomes all namespaces unless set afterwards.
    pub fn sql(self, sql: &str) -> Self {
        self.sql_args(sql, &[])
    }

    pub fn sql_args(mut self, sql: &str, args: &[SqlArg]) -> Self {
        let sql = format_sql(sql, args);
        let parsed = match self.parser().parse_select(&sql) {
            Ok(parsed) => parsed,
            Err(e) => return self.fail(e),
        };

        self.scope = NamespaceScope::All;
        if let Some(resource) = parsed.resource {
            self.resource = Some(resource);
        }
        self.columns = parsed.columns;
        self.filter.conditions = parsed.conditions;
        self.filter.predicate = parsed.predicate;
        self.filter.where_text = parsed.where_text;
        self.filter.sql = sql;
        self.filter.parsed = true;
        if parsed.limit.is_some() {
            self.filter.limit = parsed.limit;
        }
        if parsed.offset.is_some() {
            self.filter.offset = parsed.offset;
        }
        match parsed.order_by {
            Some(order) => self.order(&order),
            None => self,
        }
    }

    /// ORDER BY text, e.g. `metadata.name asc, status.phase desc`
    pub fn order(mut self, order: &str) -> Self {
        if let Err(e) = OrderSpec::parse(order) {
            return self.fail(e);
        }
        self.filter.order = Some(order.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.filter.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.filter.offset = Some(offset);
        self
    }

    /// Alias of [`Query::offset`]
    pub fn skip(self, skip: usize) -> Self {
        self.offset(skip)
    }

    pub fn with_label_selector(mut self, selector: &str) -> Self {
        self.filters.label_selector = non_empty(merge_selectors(self.filters.label_selector.as_deref(), selector));
        self
    }

    pub fn with_field_selector(mut self, selector: &str) -> Self {
        self.filters.field_selector = non_empty(merge_selectors(self.filters.field_selector.as_deref(), selector));
        self
    }

    /// Cache the fetched documents for `ttl`, zero disables
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Drop `metadata.managedFields` from returned documents
    pub fn remove_managed_fields(mut self) -> Self {
        self.remove_managed_fields = true;
        self
    }

    /// Columns of the SELECT given to [`Query::sql`]
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Fetch, filter, sort and paginate
    pub async fn list(self) -> Result<ListResult> {
        let (query, resource) = self.prepare()?;
        let mut params = query.list_params(&resource);
        if let Some(name) = &query.name {
            params.filters.field_selector = Some(merge_selectors(
                params.filters.field_selector.as_deref(),
                &format!("metadata.name={}", name),
            ));
        }

        let docs = query.cluster.list(&resource, &params, query.ttl()).await?;
        let fetched = docs.len();

        let mut docs = match (&query.filter.predicate, query.cluster.config().filter_mode) {
            (None, _) => docs,
            (Some(predicate), FilterMode::Tree) => apply_tree(docs, predicate),
            (Some(_), FilterMode::Grouped) => apply_grouped(docs, &query.filter.conditions),
        };
        let total = docs.len();

        let order = match query.filter.order.as_deref() {
            Some(text) => OrderSpec::parse(text)?,
            None => OrderSpec::default_order(),
        };
        order.sort(&mut docs);

        let offset = query.filter.offset.unwrap_or(0);
        let mut items: Vec<Value> = docs.into_iter().skip(offset).collect();
        if let Some(limit) = query.filter.limit.filter(|l| *l > 0) {
            items.truncate(limit);
        }
        if query.remove_managed_fields {
            items.iter_mut().for_each(strip_managed_fields);
        }

        debug!(
            cluster = %query.cluster.id(),
            resource = %resource.plural,
            fetched,
            total,
            returned = items.len(),
            order = %order,
            "listed"
        );
        Ok(ListResult { items, total })
    }

    /// [`Query::list`] deserialized into `T`
    pub async fn list_as<T: DeserializeOwned>(self) -> Result<ListResult<T>> {
        let ListResult { items, total } = self.list().await?;
        let items = items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()?;
        Ok(ListResult { items, total })
    }

    /// One document by name. WHERE, ORDER BY and pagination do not apply.
    pub async fn get(self) -> Result<Value> {
        let (query, resource) = self.prepare()?;
        let name = query.name.clone().ok_or_else(|| Error::NotFound {
            resource: resource.plural.clone(),
            name: String::new(),
        })?;
        let namespace = match (&query.scope, resource.namespaced) {
            (_, false) | (NamespaceScope::All, true) => None,
            (NamespaceScope::One(ns), true) => Some(ns.as_str()),
            (NamespaceScope::Unset, true) => Some("default"),
        };

        let mut doc = query
            .cluster
            .get(&resource, namespace, &name, query.ttl())
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: resource.plural.clone(),
                name: name.clone(),
            })?;
        if query.remove_managed_fields {
            strip_managed_fields(&mut doc);
        }
        Ok(doc)
    }

    pub async fn get_as<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.get().await?)?)
    }

    /// Number of matching documents, ignoring LIMIT and OFFSET
    pub async fn count(self) -> Result<usize> {
        Ok(self.list().await?.total)
    }

    fn parser(&self) -> SqlParser {
        SqlParser::new().lenient(self.cluster.config().lenient_where)
    }

    fn fail(mut self, error: Error) -> Self {
        debug!(error = %error, "query step failed");
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    /// Surface a deferred error, then resolve the resource type
    fn prepare(mut self) -> Result<(Self, ResourceInfo)> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let name = self.resource.as_deref().ok_or(Error::MissingResource)?;
        let resource = self.cluster.resolve_resource(name)?;
        Ok((self, resource))
    }

    fn list_params(&self, resource: &ResourceInfo) -> ListParams {
        let namespace = match (&self.scope, resource.namespaced) {
            (_, false) | (NamespaceScope::All, true) => None,
            (NamespaceScope::One(ns), true) => Some(ns.clone()),
            (NamespaceScope::Unset, true) => Some("default".to_string()),
        };
        ListParams {
            namespace,
            filters: self.filters.clone(),
        }
    }

    fn ttl(&self) -> Duration {
        self.cache_ttl.unwrap_or_else(|| self.cluster.config().cache_ttl())
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn strip_managed_fields(doc: &mut Value) {
    if let Some(metadata) = doc.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.remove("managedFields");
    }
}
